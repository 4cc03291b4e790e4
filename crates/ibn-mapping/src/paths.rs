//! YANG path mapping.
//!
//! Path sets are looked up by `(Vendor, ServiceType)`. Pairs without a
//! vendor-specific entry use the neutral OpenConfig/IETF set for the
//! service, so every pair maps to at least one path.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use ibn_protocol::{
    Device, MappingEntry, ModelDiscoveryResult, NormalizedIntent, ServiceType, Vendor,
};

// ── Cisco IOS-XR ──────────────────────────────────────────────

const CISCO_L3VPN: &[&str] = &[
    "Cisco-IOS-XR-infra-rsi-cfg:vrfs/vrf/vrf-name",
    "Cisco-IOS-XR-infra-rsi-cfg:vrfs/vrf/description",
    "Cisco-IOS-XR-infra-rsi-cfg:vrfs/vrf/vpn-id",
    "Cisco-IOS-XR-mpls-vpn-cfg:l3vpn/vrfs/vrf",
    "Cisco-IOS-XR-bgp-cfg:bgp/instance/instance-as/four-byte-as/default-vrf/global/route-distinguisher",
];

const CISCO_EVPN: &[&str] = &[
    "Cisco-IOS-XR-l2vpn-cfg:l2vpn/database/bridge-domain-groups/bridge-domain-group",
    "Cisco-IOS-XR-l2vpn-cfg:l2vpn/database/xconnect-groups/xconnect-group",
    "Cisco-IOS-XR-evpn-cfg:evpn/enable",
    "Cisco-IOS-XR-evpn-cfg:evpn/interfaces/interface",
];

const CISCO_L2VPN_EPIPE: &[&str] = &[
    "Cisco-IOS-XR-l2vpn-cfg:l2vpn/database/xconnect-groups/xconnect-group",
    "Cisco-IOS-XR-l2vpn-cfg:l2vpn/database/xconnect-groups/xconnect-group/p2p-xconnects/p2p-xconnect",
];

const CISCO_BGP: &[&str] = &[
    "Cisco-IOS-XR-bgp-cfg:bgp/instance/instance-as/four-byte-as",
    "Cisco-IOS-XR-bgp-cfg:bgp/instance/instance-as/four-byte-as/default-vrf/global/router-id",
    "Cisco-IOS-XR-bgp-cfg:bgp/instance/instance-as/four-byte-as/default-vrf/bgp-entity/neighbors/neighbor",
];

const CISCO_ISIS: &[&str] = &[
    "Cisco-IOS-XR-clns-isis-cfg:isis/instances/instance/instance-name",
    "Cisco-IOS-XR-clns-isis-cfg:isis/instances/instance/running/addresses/address",
    "Cisco-IOS-XR-clns-isis-cfg:isis/instances/instance/running/interfaces/interface",
];

const CISCO_OSPF: &[&str] = &[
    "Cisco-IOS-XR-ipv4-ospf-cfg:ospf/processes/process/process-name",
    "Cisco-IOS-XR-ipv4-ospf-cfg:ospf/processes/process/default-vrf/router-id",
    "Cisco-IOS-XR-ipv4-ospf-cfg:ospf/processes/process/default-vrf/area-addresses/area-area-id",
];

const CISCO_BFD: &[&str] = &[
    "Cisco-IOS-XR-ip-bfd-cfg:bfd/ipv4bf-table/ipv4bf-mhop-table/ipv4bf-mhop/destination-address",
    "Cisco-IOS-XR-ip-bfd-cfg:bfd/ipv4bf-table/ipv4bf-shfrom-table/ipv4bf-sh/source-address",
];

// ── Nokia SR OS ───────────────────────────────────────────────

const NOKIA_L3VPN: &[&str] = &[
    "nokia-conf:configure/service/vprn/service-id",
    "nokia-conf:configure/service/vprn/customer",
    "nokia-conf:configure/service/vprn/description",
    "nokia-conf:configure/service/vprn/route-distinguisher",
    "nokia-conf:configure/service/vprn/vrf-target",
];

const NOKIA_EVPN: &[&str] = &[
    "nokia-conf:configure/service/epipe/service-id",
    "nokia-conf:configure/service/vpls/service-id",
    "nokia-conf:configure/service/epipe/bgp-evpn/evi",
    "nokia-conf:configure/service/vpls/bgp-evpn/evi",
];

const NOKIA_L2VPN_EPIPE: &[&str] = &[
    "nokia-conf:configure/service/epipe/service-id",
    "nokia-conf:configure/service/epipe/sap",
    "nokia-conf:configure/service/epipe/spoke-sdp",
];

const NOKIA_BGP: &[&str] = &[
    "nokia-conf:configure/router/bgp/autonomous-system",
    "nokia-conf:configure/router/bgp/router-id",
    "nokia-conf:configure/router/bgp/group",
    "nokia-conf:configure/router/bgp/neighbor",
];

const NOKIA_ISIS: &[&str] = &[
    "nokia-conf:configure/router/isis/instance",
    "nokia-conf:configure/router/isis/area-address",
    "nokia-conf:configure/router/isis/interface",
];

const NOKIA_OSPF: &[&str] = &[
    "nokia-conf:configure/router/ospf/instance",
    "nokia-conf:configure/router/ospf/router-id",
    "nokia-conf:configure/router/ospf/area",
];

const NOKIA_BFD: &[&str] = &[
    "nokia-conf:configure/router/bfd/session-type",
    "nokia-conf:configure/router/bfd/transmit-interval",
    "nokia-conf:configure/router/bfd/receive-interval",
];

// ── Juniper Junos ─────────────────────────────────────────────

const JUNOS_L3VPN: &[&str] = &[
    "junos-conf-routing-instances:configuration/routing-instances/instance/name",
    "junos-conf-routing-instances:configuration/routing-instances/instance/instance-type",
    "junos-conf-routing-instances:configuration/routing-instances/instance/route-distinguisher",
    "junos-conf-routing-instances:configuration/routing-instances/instance/vrf-target",
];

const JUNOS_EVPN: &[&str] = &[
    "junos-conf-protocols:configuration/protocols/evpn/encapsulation",
    "junos-conf-protocols:configuration/protocols/evpn/extended-vni-list",
    "junos-conf-routing-instances:configuration/routing-instances/instance/protocols/evpn",
];

const JUNOS_BGP: &[&str] = &[
    "junos-conf-protocols:configuration/protocols/bgp/group/name",
    "junos-conf-protocols:configuration/protocols/bgp/group/neighbor",
    "junos-conf-routing-options:configuration/routing-options/autonomous-system",
];

const JUNOS_BFD: &[&str] = &[
    "junos-conf-protocols:configuration/protocols/bfd/session",
    "junos-conf-protocols:configuration/protocols/bfd/traceoptions",
];

// ── Neutral (OpenConfig / IETF) ───────────────────────────────

const OC_L3VPN: &[&str] = &[
    "openconfig-network-instance:network-instances/network-instance/name",
    "openconfig-network-instance:network-instances/network-instance/config/type",
    "openconfig-network-instance:network-instances/network-instance/config/route-distinguisher",
];

const OC_EVPN: &[&str] = &[
    "openconfig-evpn:evpn/global/config/enabled",
    "openconfig-network-instance:network-instances/network-instance/evpn/config",
];

const OC_L2VPN_EPIPE: &[&str] = &[
    "openconfig-network-instance:network-instances/network-instance/config/type",
    "openconfig-network-instance:network-instances/network-instance/connection-points/connection-point",
    "ietf-l2vpn-svc:l2vpn-svc/vpn-services/vpn-service",
];

const OC_BGP: &[&str] = &[
    "openconfig-bgp:bgp/global/config/as",
    "openconfig-bgp:bgp/global/config/router-id",
    "openconfig-bgp:bgp/neighbors/neighbor",
];

const OC_ISIS: &[&str] = &[
    "openconfig-isis:isis/global/config/instance",
    "openconfig-isis:isis/global/afi-safi",
    "openconfig-isis:isis/interfaces/interface",
];

const OC_OSPF: &[&str] = &[
    "openconfig-ospfv2:ospfv2/global/config/router-id",
    "openconfig-ospfv2:ospfv2/areas/area",
    "openconfig-ospfv2:ospfv2/areas/area/interfaces/interface",
];

const OC_QOS: &[&str] = &[
    "openconfig-qos:qos/classifiers/classifier",
    "openconfig-qos:qos/forwarding-groups/forwarding-group",
    "openconfig-qos:qos/interfaces/interface",
];

const OC_ACL: &[&str] = &[
    "openconfig-acl:acl/acl-sets/acl-set",
    "openconfig-acl:acl/interfaces/interface",
];

const IETF_SRV6: &[&str] = &[
    "ietf-srv6-base:srv6/locators/locator",
    "ietf-srv6-base:srv6/encapsulation/source-address",
];

const OC_SEGMENT_ROUTING: &[&str] = &[
    "openconfig-segment-routing:segment-routing/srgbs/srgb",
    "openconfig-network-instance:network-instances/network-instance/protocols/protocol/isis/global/segment-routing/config/enabled",
];

const OC_TELEMETRY: &[&str] = &[
    "openconfig-telemetry:telemetry-system/sensor-groups/sensor-group",
    "openconfig-telemetry:telemetry-system/destination-groups/destination-group",
    "openconfig-telemetry:telemetry-system/subscriptions/persistent-subscriptions/persistent-subscription",
];

const OC_BFD: &[&str] = &[
    "openconfig-bfd:bfd/interfaces/interface",
    "openconfig-bfd:bfd/ipv4-single-hop/sessions/session",
];

/// Vendor-specific path set, if the vendor has one for this service.
fn vendor_paths(vendor: Vendor, service: ServiceType) -> Option<&'static [&'static str]> {
    use ServiceType as S;
    use Vendor as V;
    let paths = match (vendor, service) {
        (V::Cisco, S::L3vpn) => CISCO_L3VPN,
        (V::Cisco, S::Evpn) => CISCO_EVPN,
        (V::Cisco, S::L2vpnEpipe) => CISCO_L2VPN_EPIPE,
        (V::Cisco, S::Bgp) => CISCO_BGP,
        (V::Cisco, S::Isis) => CISCO_ISIS,
        (V::Cisco, S::Ospf) => CISCO_OSPF,
        (V::Nokia, S::L3vpn) => NOKIA_L3VPN,
        (V::Nokia, S::Evpn) => NOKIA_EVPN,
        (V::Nokia, S::L2vpnEpipe) => NOKIA_L2VPN_EPIPE,
        (V::Nokia, S::Bgp) => NOKIA_BGP,
        (V::Nokia, S::Isis) => NOKIA_ISIS,
        (V::Nokia, S::Ospf) => NOKIA_OSPF,
        (V::Juniper, S::L3vpn) => JUNOS_L3VPN,
        (V::Juniper, S::Evpn) => JUNOS_EVPN,
        (V::Juniper, S::Bgp) => JUNOS_BGP,
        _ => return None,
    };
    Some(paths)
}

/// The neutral path set for a service. Never empty.
fn neutral_paths(service: ServiceType) -> &'static [&'static str] {
    match service {
        ServiceType::L3vpn => OC_L3VPN,
        ServiceType::Evpn => OC_EVPN,
        ServiceType::L2vpnEpipe => OC_L2VPN_EPIPE,
        ServiceType::Bgp => OC_BGP,
        ServiceType::Isis => OC_ISIS,
        ServiceType::Ospf => OC_OSPF,
        ServiceType::Qos => OC_QOS,
        ServiceType::Acl => OC_ACL,
        ServiceType::Srv6 => IETF_SRV6,
        ServiceType::SegmentRouting => OC_SEGMENT_ROUTING,
        ServiceType::Telemetry => OC_TELEMETRY,
    }
}

fn bfd_paths(vendor: Vendor) -> &'static [&'static str] {
    match vendor {
        Vendor::Cisco => CISCO_BFD,
        Vendor::Nokia => NOKIA_BFD,
        Vendor::Juniper => JUNOS_BFD,
        _ => OC_BFD,
    }
}

/// Paths for `service` on `vendor`, plus BFD paths when requested.
pub fn service_paths(vendor: Vendor, intent: &NormalizedIntent) -> Vec<String> {
    let base = vendor_paths(vendor, intent.service_type)
        .unwrap_or_else(|| neutral_paths(intent.service_type));
    let bfd: &[&str] = if intent.policy.bfd {
        bfd_paths(vendor)
    } else {
        &[]
    };
    base.iter().chain(bfd).map(|p| p.to_string()).collect()
}

fn vendor_notes(vendor: Vendor, intent: &NormalizedIntent) -> Vec<String> {
    let mut notes = Vec::new();
    match vendor {
        Vendor::Cisco => {
            if intent.service_type == ServiceType::L3vpn {
                notes.push("IOS-XR uses separate VRF and BGP VPNv4 configuration");
            }
            if intent.policy.bfd {
                notes.push("BFD requires explicit interface configuration");
            }
        }
        Vendor::Nokia => {
            if intent.service_type == ServiceType::L3vpn {
                notes.push("SR OS uses service-based VPN configuration");
            }
            notes.push("Nokia requires explicit service activation");
        }
        Vendor::Juniper => {
            if intent.service_type == ServiceType::Evpn {
                notes.push("Junos requires EVPN protocol configuration under routing-instances");
            }
            notes.push("Juniper uses commit-confirmed for safe configuration");
        }
        _ => {}
    }
    notes.into_iter().map(String::from).collect()
}

/// YANG module a path belongs to (the part before the first `:`).
fn module_of(path: &str) -> &str {
    path.split(':').next().unwrap_or(path)
}

/// Map one device. Pure: the same inputs always give the same entry.
pub fn map_paths(
    intent: &NormalizedIntent,
    device: &Device,
    discovery: Option<&ModelDiscoveryResult>,
) -> MappingEntry {
    let yang_paths = service_paths(device.vendor, intent);
    let mut notes = vendor_notes(device.vendor, intent);

    if let Some(discovery) = discovery {
        let available: Vec<String> = discovery.models_found.iter().cloned().collect();
        let unconfirmed: BTreeSet<&str> = yang_paths
            .iter()
            .filter(|p| !validate_yang_path(p, &available))
            .map(|p| module_of(p))
            .collect();
        if !unconfirmed.is_empty() {
            let modules: Vec<&str> = unconfirmed.into_iter().collect();
            notes.push(format!(
                "Modules not confirmed by discovery: {}",
                modules.join(", ")
            ));
        }
    }

    MappingEntry {
        device_id: device.device_id.clone(),
        vendor: device.vendor,
        os_version: device.os_version.clone(),
        yang_paths,
        notes: (!notes.is_empty()).then(|| notes.join("; ")),
    }
}

/// One entry per inventory device, in inventory order.
///
/// Discovery results are matched by `target == device_id`.
pub fn create_mappings(
    intent: &NormalizedIntent,
    inventory: &[Device],
    discovery: &[ModelDiscoveryResult],
) -> Vec<MappingEntry> {
    let by_target: HashMap<&str, &ModelDiscoveryResult> = discovery
        .iter()
        .map(|r| (r.target.as_str(), r))
        .collect();
    inventory
        .iter()
        .map(|device| {
            let entry = map_paths(intent, device, by_target.get(device.device_id.as_str()).copied());
            tracing::debug!(
                device_id = %device.device_id,
                vendor = %device.vendor,
                paths = entry.yang_paths.len(),
                "mapped device"
            );
            entry
        })
        .collect()
}

/// True when some available model string mentions the path's module.
pub fn validate_yang_path(path: &str, available_models: &[String]) -> bool {
    let module = module_of(path);
    available_models.iter().any(|m| m.contains(module))
}

const OPENCONFIG_EQUIVALENTS: &[(&str, &str)] = &[
    ("vrf", "network-instance"),
    ("bgp", "bgp"),
    ("isis", "isis"),
    ("ospf", "ospfv2"),
    ("interface", "interface"),
];

const IETF_EQUIVALENTS: &[(&str, &str)] = &[
    ("l3vpn", "ietf-l3vpn-svc"),
    ("l2vpn", "ietf-l2vpn-svc"),
    ("bgp", "ietf-bgp"),
    ("isis", "ietf-isis"),
    ("ospf", "ietf-ospf"),
];

fn to_openconfig(path: &str) -> Option<String> {
    let lower = path.to_lowercase();
    OPENCONFIG_EQUIVALENTS
        .iter()
        .find(|(term, _)| lower.contains(term))
        .map(|(_, oc)| format!("openconfig-{oc}:..."))
}

fn to_ietf(path: &str) -> Option<String> {
    let lower = path.to_lowercase();
    IETF_EQUIVALENTS
        .iter()
        .find(|(term, _)| lower.contains(term))
        .map(|(_, module)| format!("{module}:..."))
}

/// For each unsupported path, the neutral modules that could replace it,
/// offered only when the device advertises models of that family.
pub fn suggest_alternatives(
    unsupported_paths: &[String],
    available_models: &[String],
) -> BTreeMap<String, Vec<String>> {
    let has_openconfig = available_models.iter().any(|m| m.contains("openconfig"));
    let has_ietf = available_models.iter().any(|m| m.contains("ietf"));

    unsupported_paths
        .iter()
        .map(|path| {
            let mut alternatives = Vec::new();
            if !path.contains("openconfig") && has_openconfig {
                alternatives.extend(to_openconfig(path));
            }
            if !path.contains("ietf") && has_ietf {
                alternatives.extend(to_ietf(path));
            }
            (path.clone(), alternatives)
        })
        .collect()
}
