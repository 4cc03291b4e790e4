//! Entity extraction from operator text.
//!
//! The normalizer only ever sees [`ExtractedEntities`]. Where they come
//! from is pluggable: [`RegexExtractor`] is the built-in keyword/pattern
//! extractor, and model-backed extractors implement the same trait.

use std::sync::LazyLock;

use async_trait::async_trait;
use ibn_protocol::{ExtractedEntities, Slo};
use regex::Regex;

use crate::error::PipelineResult;

/// Trait for anything that turns intent text into raw entities.
#[async_trait]
pub trait EntityExtractor: Send + Sync {
    async fn extract(&self, text: &str) -> PipelineResult<ExtractedEntities>;

    /// Name of this extractor (for logging/audit).
    fn name(&self) -> &str;
}

static DEVICE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\b(PE[1-9]\d*|CE[1-9]\d*|P[1-9]\d*)\b",
        r"(?i)\b([A-Z]{2,}-[A-Z0-9]+-[A-Z0-9]+)\b",
        r"\b(\w+-\w+-\d+)\b",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static INTERFACE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\b((?:xe|ge|et)-\d+/\d+/\d+)\b",
        r"(?i)\b(GigabitEthernet\d+/\d+/\d+|Gi\d+/\d+/\d+)\b",
        r"(?i)\b((?:10|100)GE\d+/\d+/\d+)\b",
        r"(?i)\b(Ethernet\d+/\d+|eth\d+/\d+)\b",
        r"(?i)\b(port\s+\d+/\d+/\d+)\b",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Protocol name and the words that imply it.
static PROTOCOLS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("bgp", r"\b(?:bgp|ebgp|ibgp|as\d+|as \d+)\b"),
        ("isis", r"\b(?:isis|is-is|level-1|level-2)\b"),
        ("ospf", r"\b(?:ospf|ospfv2|ospfv3|area)\b"),
        ("ldp", r"\b(?:ldp|label|mpls)\b"),
        ("rsvp", r"\b(?:rsvp|rsvp-te)\b"),
        ("segment-routing", r"\b(?:segment-routing|sr|sr-mpls|sr-te|srv6)\b"),
    ]
    .into_iter()
    .map(|(name, p)| (name, Regex::new(p).unwrap()))
    .collect()
});

static RE_LATENCY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+(?:\.\d+)?)\s*ms\s*(?:latency|delay|rtt)|(?:latency|delay|rtt)\s*(?:of|under|below|<)?\s*(\d+(?:\.\d+)?)\s*ms").unwrap()
});
static RE_LOSS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*%?\s*(?:packet\s+)?loss").unwrap());
static RE_JITTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+(?:\.\d+)?)\s*ms\s*jitter|jitter\s*(?:of|under|below|<)?\s*(\d+(?:\.\d+)?)\s*ms").unwrap()
});

static RE_MTU: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bmtu[:\s]*(\d+)").unwrap());
static RE_VLAN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bvlan[:\s]*(\d+)").unwrap());
static RE_VRF: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bvrf\s+([A-Za-z0-9_\-.]+)").unwrap());
static RE_RD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\brd\s+([0-9.:]+)").unwrap());
static RE_RT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\brt\s+([0-9.:]+)").unwrap());
static RE_AS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bas\s*(\d+)\b").unwrap());

/// Pattern-matching extractor. Case-insensitive; every list keeps the
/// order of first appearance without duplicates.
pub struct RegexExtractor;

impl RegexExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RegexExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EntityExtractor for RegexExtractor {
    async fn extract(&self, text: &str) -> PipelineResult<ExtractedEntities> {
        Ok(extract_entities(text))
    }

    fn name(&self) -> &str {
        "regex"
    }
}

/// Synchronous core of [`RegexExtractor`].
pub fn extract_entities(text: &str) -> ExtractedEntities {
    let lower = text.to_lowercase();
    let mut entities = ExtractedEntities {
        devices: find_all(&DEVICE_PATTERNS, text),
        interfaces: find_all(&INTERFACE_PATTERNS, text),
        protocols: PROTOCOLS
            .iter()
            .filter(|(_, re)| re.is_match(&lower))
            .map(|(name, _)| name.to_string())
            .collect(),
        address_families: address_families(&lower),
        slo: Slo {
            latency_ms: first_number(&RE_LATENCY, &lower),
            loss_pct: first_number(&RE_LOSS, &lower),
            jitter_ms: first_number(&RE_JITTER, &lower),
        },
        mtu: capture(&RE_MTU, text).and_then(|v| v.parse().ok()),
        bfd: lower.contains("bfd"),
        auth: lower.contains("auth").then(|| "keychain-default".to_string()),
        ..ExtractedEntities::default()
    };

    let attrs = &mut entities.attributes;
    attrs.vrf_name = capture(&RE_VRF, text).map(|v| v.trim_end_matches(['.', '-']).to_string());
    attrs.route_distinguisher = capture(&RE_RD, text).map(str::to_string);
    attrs.route_targets = dedup(
        RE_RT
            .captures_iter(text)
            .filter_map(|c| c.get(1).map(|m| m.as_str().to_string())),
    );
    attrs.autonomous_system = capture(&RE_AS, text).and_then(|v| v.parse().ok());
    attrs.vlan = capture(&RE_VLAN, text).and_then(|v| v.parse().ok());
    entities
}

fn find_all(patterns: &[Regex], text: &str) -> Vec<String> {
    // A name can match several patterns; keep the first sighting.
    let mut hits: Vec<(usize, String)> = patterns
        .iter()
        .flat_map(|re| {
            re.captures_iter(text)
                .filter_map(|c| c.get(1).map(|m| (m.start(), m.as_str().to_string())))
        })
        .collect();
    hits.sort_by_key(|(pos, _)| *pos);
    dedup(hits.into_iter().map(|(_, s)| s))
}

fn dedup(items: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

fn address_families(lower: &str) -> Vec<String> {
    let mut families = Vec::new();
    let has = |terms: &[&str]| terms.iter().any(|t| lower.contains(t));
    if has(&["ipv4", "v4", "inet"]) {
        families.push("ipv4");
    }
    if has(&["ipv6", "v6", "inet6"]) {
        families.push("ipv6");
    }
    if lower.contains("vpnv4") {
        families.push("vpnv4");
    }
    if lower.contains("vpnv6") {
        families.push("vpnv6");
    }
    if has(&["evpn", "l2vpn"]) {
        families.push("l2vpn-evpn");
    }
    families.into_iter().map(String::from).collect()
}

fn capture<'t>(re: &Regex, text: &'t str) -> Option<&'t str> {
    re.captures(text).and_then(|c| c.get(1)).map(|m| m.as_str())
}

/// First number captured by any group of `re`.
fn first_number(re: &Regex, text: &str) -> Option<f64> {
    re.captures(text).and_then(|c| {
        c.iter()
            .skip(1)
            .flatten()
            .next()
            .and_then(|m| m.as_str().parse().ok())
    })
}
