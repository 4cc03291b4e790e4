//! Intent types: what the operator asked for, in vendor-neutral form.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Network service family an intent targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceType {
    L3vpn,
    L2vpnEpipe,
    Evpn,
    Bgp,
    Isis,
    Ospf,
    Qos,
    Acl,
    Srv6,
    SegmentRouting,
    Telemetry,
}

impl ServiceType {
    pub const ALL: [ServiceType; 11] = [
        Self::L3vpn,
        Self::L2vpnEpipe,
        Self::Evpn,
        Self::Bgp,
        Self::Isis,
        Self::Ospf,
        Self::Qos,
        Self::Acl,
        Self::Srv6,
        Self::SegmentRouting,
        Self::Telemetry,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::L3vpn => "l3vpn",
            Self::L2vpnEpipe => "l2vpn-epipe",
            Self::Evpn => "evpn",
            Self::Bgp => "bgp",
            Self::Isis => "isis",
            Self::Ospf => "ospf",
            Self::Qos => "qos",
            Self::Acl => "acl",
            Self::Srv6 => "srv6",
            Self::SegmentRouting => "segment-routing",
            Self::Telemetry => "telemetry",
        }
    }

    /// Services that rewrite core routing state.
    pub fn is_core_routing(&self) -> bool {
        matches!(self, Self::L3vpn | Self::Evpn)
    }
}

impl std::fmt::Display for ServiceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A device/interface attachment point of the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub device: String,
    pub interface: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Endpoint {
    /// Placeholder used when the intent names no device at all.
    pub fn auto_discovered() -> Self {
        Self {
            device: "auto".into(),
            interface: "auto".into(),
            tags: vec!["auto-discovered".into()],
        }
    }

    /// Value of the first `key:value` tag with the given key.
    pub fn tag_value(&self, key: &str) -> Option<&str> {
        self.tags.iter().find_map(|t| {
            t.strip_prefix(key)
                .and_then(|rest| rest.strip_prefix(':'))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Routing {
    pub protocols: BTreeSet<String>,
    pub address_families: BTreeSet<String>,
}

/// Service-level objectives. All fields are optional targets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Slo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loss_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jitter_ms: Option<f64>,
}

impl Slo {
    pub fn is_empty(&self) -> bool {
        self.latency_ms.is_none() && self.loss_pct.is_none() && self.jitter_ms.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentPolicy {
    #[serde(default = "default_mtu")]
    pub mtu: u32,
    #[serde(default)]
    pub bfd: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<String>,
}

pub const DEFAULT_MTU: u32 = 1500;

fn default_mtu() -> u32 {
    DEFAULT_MTU
}

impl Default for IntentPolicy {
    fn default() -> Self {
        Self {
            mtu: DEFAULT_MTU,
            bfd: false,
            auth: None,
        }
    }
}

/// Service parameters pulled out of the intent text (VRF, RD/RT, AS, VLAN).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vrf_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_distinguisher: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub route_targets: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autonomous_system: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlan: Option<u16>,
}

/// Vendor-neutral description of a requested network change.
///
/// Built once by the normalizer and only read afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedIntent {
    pub service_type: ServiceType,
    /// Never empty.
    pub endpoints: Vec<Endpoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing: Option<Routing>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slo: Option<Slo>,
    #[serde(default)]
    pub policy: IntentPolicy,
    #[serde(default)]
    pub attributes: ServiceAttributes,
}

impl NormalizedIntent {
    /// VRF name: the first endpoint's `vrf:` tag, then the extracted VRF,
    /// then `VRF_<SERVICE>`.
    pub fn vrf_name(&self) -> String {
        self.endpoints
            .first()
            .and_then(|ep| ep.tag_value("vrf"))
            .map(str::to_string)
            .or_else(|| self.attributes.vrf_name.clone())
            .unwrap_or_else(|| format!("VRF_{}", self.service_type.as_str().to_uppercase()))
    }

    /// Latency target, if the intent carries one.
    pub fn latency_target_ms(&self) -> Option<f64> {
        self.slo.as_ref().and_then(|s| s.latency_ms)
    }
}

/// Raw entities pulled out of intent text by an extractor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedEntities {
    #[serde(default)]
    pub devices: Vec<String>,
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub protocols: Vec<String>,
    #[serde(default)]
    pub address_families: Vec<String>,
    #[serde(default)]
    pub slo: Slo,
    #[serde(default)]
    pub mtu: Option<u32>,
    #[serde(default)]
    pub bfd: bool,
    #[serde(default)]
    pub auth: Option<String>,
    #[serde(default)]
    pub attributes: ServiceAttributes,
}

/// Optional live context: devices/interfaces seen in telemetry that the
/// intent may refer to implicitly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryHint {
    #[serde(default)]
    pub devices: Vec<String>,
    #[serde(default)]
    pub interfaces: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceWindow {
    /// ISO-8601 start time as supplied by the operator.
    pub start: String,
    pub duration_min: u32,
}

/// Change-management policy supplied alongside an intent. Unknown keys are
/// ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangePolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maintenance_window: Option<MaintenanceWindow>,
    /// Confirmed-commit timeout override, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback_timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation_required: Option<bool>,
}
