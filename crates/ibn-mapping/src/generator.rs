//! Candidate payload generation.

use std::collections::HashMap;

use ibn_protocol::{
    CandidatePayload, Device, MappingEntry, NormalizedIntent, PayloadType, ServiceType,
    Transport, Vendor,
};

use crate::templates::{RenderContext, render};

const CAP_CANDIDATE: &str = "capability:urn:ietf:params:netconf:capability:candidate:1.0";
const CAP_VALIDATE: &str = "capability:urn:ietf:params:netconf:capability:validate:1.0";

/// One payload per inventory device that has a mapping entry.
///
/// Inventory and mapping table are joined on `device_id`. Devices without a
/// mapping entry, and devices whose payload fails to render, are logged and
/// left out; the remaining payloads keep inventory order.
pub fn generate(
    intent: &NormalizedIntent,
    mapping_table: &[MappingEntry],
    inventory: &[Device],
) -> Vec<CandidatePayload> {
    let mappings: HashMap<&str, &MappingEntry> = mapping_table
        .iter()
        .map(|m| (m.device_id.as_str(), m))
        .collect();

    inventory
        .iter()
        .filter_map(|device| {
            let Some(mapping) = mappings.get(device.device_id.as_str()) else {
                tracing::warn!(device_id = %device.device_id, "no mapping entry for device, skipping");
                return None;
            };
            let transport = device.config_transport();
            let ctx = RenderContext::new(intent, device);
            let payload = match render(&ctx, transport) {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::error!(device_id = %device.device_id, error = %e, "payload rendering failed");
                    return None;
                }
            };
            Some(CandidatePayload {
                target: device.device_id.clone(),
                vendor: mapping.vendor,
                transport,
                payload_type: payload_type(transport),
                payload,
                prechecks: prechecks(mapping.vendor),
                post_validation: post_validation(intent, &ctx.vrf_name),
            })
        })
        .collect()
}

fn payload_type(transport: Transport) -> PayloadType {
    match transport {
        Transport::Netconf => PayloadType::Xml,
        Transport::Restconf => PayloadType::Json,
        Transport::Gnmi => PayloadType::GnmiSet,
    }
}

/// Capabilities and features the device must have before the change.
pub fn prechecks(vendor: Vendor) -> Vec<String> {
    let feature = match vendor {
        Vendor::Cisco => "feature:bgp-vpnv4",
        Vendor::Nokia => "feature:service-vprn",
        Vendor::Juniper => "feature:routing-instances",
        Vendor::Arista => "feature:vrf",
        Vendor::Huawei => "feature:vpn-instance",
        Vendor::Generic => "feature:openconfig-network-instance",
    };
    [CAP_CANDIDATE, CAP_VALIDATE, feature]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Checks to run once the change is in place.
pub fn post_validation(intent: &NormalizedIntent, vrf_name: &str) -> Vec<String> {
    let mut checks: Vec<String> = match intent.service_type {
        ServiceType::L3vpn => vec![
            format!("get-config filter: //*[local-name()='vrf' and text()='{vrf_name}']"),
            format!("operational check: VRF {vrf_name} routing table exists"),
            format!("bgp check: VPNv4 routes for VRF {vrf_name}"),
        ],
        ServiceType::Evpn => vec![format!("operational check: EVPN instance {vrf_name} is up")],
        ServiceType::L2vpnEpipe => vec![format!("operational check: pseudowire {vrf_name} is up")],
        ServiceType::Bgp => vec!["bgp check: neighbors established".into()],
        ServiceType::Isis => vec!["operational check: IS-IS adjacencies up".into()],
        ServiceType::Ospf => vec!["operational check: OSPF neighbors full".into()],
        ServiceType::Qos => vec!["operational check: QoS policy applied to interfaces".into()],
        ServiceType::Acl => vec!["operational check: ACL applied to interfaces".into()],
        ServiceType::Srv6 => vec!["operational check: SRv6 locator advertised".into()],
        ServiceType::SegmentRouting => {
            vec!["operational check: segment routing labels allocated".into()]
        }
        ServiceType::Telemetry => {
            vec!["operational check: telemetry subscriptions active".into()]
        }
    };
    if intent.policy.bfd {
        checks.push("bfd check: sessions established".into());
    }
    checks
}
