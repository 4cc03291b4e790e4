//! Intent normalization: raw entities to a [`NormalizedIntent`].

use std::collections::BTreeSet;

use ibn_protocol::{
    Endpoint, ExtractedEntities, IntentPolicy, NormalizedIntent, Routing, ServiceType,
    TelemetryHint,
};

/// Service keywords, checked in order; the first hit wins.
const SERVICE_KEYWORDS: &[(ServiceType, &[&str])] = &[
    (ServiceType::L3vpn, &["l3vpn", "vrf", "vpnv4", "vpnv6"]),
    (ServiceType::L2vpnEpipe, &["l2vpn", "epipe", "vpws", "e-line"]),
    (ServiceType::Evpn, &["evpn", "vxlan", "e-lan"]),
    (ServiceType::Isis, &["isis", "is-is"]),
    (ServiceType::Ospf, &["ospf"]),
    (ServiceType::Bgp, &["bgp"]),
    (ServiceType::Qos, &["qos", "queue", "shaping"]),
    (ServiceType::Acl, &["acl", "filter", "firewall"]),
    (ServiceType::Srv6, &["srv6"]),
    (ServiceType::SegmentRouting, &["segment", "sr-mpls", "sr-te"]),
    (ServiceType::Telemetry, &["telemetry", "streaming"]),
];

/// Service type from the intent text; L3VPN when nothing matches.
pub fn detect_service_type(text: &str) -> ServiceType {
    let lower = text.to_lowercase();
    SERVICE_KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|w| lower.contains(w)))
        .map(|(service, _)| *service)
        .unwrap_or(ServiceType::L3vpn)
}

/// Build the normalized intent. Never fails: missing pieces get defaults
/// and an empty endpoint list becomes the `auto/auto` placeholder.
pub fn normalize(
    text: &str,
    entities: &ExtractedEntities,
    telemetry_hint: Option<&TelemetryHint>,
) -> NormalizedIntent {
    let service_type = detect_service_type(text);
    let endpoints = endpoints(entities, telemetry_hint);
    let routing = routing(entities);
    let slo = (!entities.slo.is_empty()).then(|| entities.slo.clone());
    let policy = IntentPolicy {
        mtu: entities.mtu.unwrap_or(IntentPolicy::default().mtu),
        bfd: entities.bfd,
        auth: entities.auth.clone(),
    };

    tracing::debug!(
        service = %service_type,
        endpoints = endpoints.len(),
        has_routing = routing.is_some(),
        "intent normalized"
    );

    NormalizedIntent {
        service_type,
        endpoints,
        routing,
        slo,
        policy,
        attributes: entities.attributes.clone(),
    }
}

fn endpoints(entities: &ExtractedEntities, hint: Option<&TelemetryHint>) -> Vec<Endpoint> {
    let (devices, interfaces) = match hint {
        Some(hint) if entities.devices.is_empty() => {
            let interfaces = if entities.interfaces.is_empty() {
                &hint.interfaces
            } else {
                &entities.interfaces
            };
            (&hint.devices, interfaces)
        }
        _ => (&entities.devices, &entities.interfaces),
    };

    let vrf_tag = entities
        .attributes
        .vrf_name
        .as_ref()
        .map(|vrf| format!("vrf:{vrf}"));

    let endpoints: Vec<Endpoint> = devices
        .iter()
        .enumerate()
        .map(|(i, device)| {
            let lower = device.to_lowercase();
            let mut tags = Vec::new();
            if lower.contains("pe") {
                tags.push("pe".to_string());
            }
            if lower.contains("ce") {
                tags.push("ce".to_string());
            }
            tags.extend(vrf_tag.clone());
            Endpoint {
                device: device.clone(),
                interface: interfaces.get(i).cloned().unwrap_or_else(|| "auto".into()),
                tags,
            }
        })
        .collect();

    if endpoints.is_empty() {
        vec![Endpoint::auto_discovered()]
    } else {
        endpoints
    }
}

fn routing(entities: &ExtractedEntities) -> Option<Routing> {
    if entities.protocols.is_empty() && entities.address_families.is_empty() {
        return None;
    }
    let or_default = |found: &[String], default: &[&str]| -> BTreeSet<String> {
        if found.is_empty() {
            default.iter().map(|s| s.to_string()).collect()
        } else {
            found.iter().cloned().collect()
        }
    };
    Some(Routing {
        protocols: or_default(&entities.protocols, &["bgp"]),
        address_families: or_default(&entities.address_families, &["ipv4", "ipv6"]),
    })
}
