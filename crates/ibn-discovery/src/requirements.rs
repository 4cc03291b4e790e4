//! Models a device must support for a given service.

use ibn_protocol::{ModelRef, ServiceType, Vendor};

const L3VPN_BASE: &[&str] = &[
    "ietf-l3vpn-svc@2018-01-19",
    "ietf-network-instance@2019-01-21",
    "openconfig-network-instance@2021-08-24",
];

const L3VPN_CISCO: &[&str] = &[
    "Cisco-IOS-XR-mpls-vpn-cfg@2019-04-05",
    "cisco-xr-openconfig-network-instance-deviations@2019-04-05",
];

const L3VPN_NOKIA: &[&str] = &[
    "nokia-conf-service@2021-09-30",
    "nokia-state-service@2021-09-30",
];

const L3VPN_JUNIPER: &[&str] = &["junos-conf-routing-instances@2021-01-01"];

const L2VPN: &[&str] = &[
    "ietf-l2vpn-svc@2020-08-24",
    "openconfig-evpn@2021-06-16",
    "ietf-evpn@2021-07-13",
];

const BGP: &[&str] = &["ietf-bgp@2019-03-21", "openconfig-bgp@2021-08-06"];

const ISIS: &[&str] = &["ietf-isis@2020-02-24", "openconfig-isis@2021-07-28"];

const OSPF: &[&str] = &["ietf-ospf@2020-02-24", "openconfig-ospf@2021-07-28"];

/// Required models for `service` on `vendor`, in a stable order.
/// Services without a defined model set return an empty list.
pub fn required_models(service: ServiceType, vendor: Vendor) -> Vec<ModelRef> {
    let mut models: Vec<&str> = Vec::new();
    match service {
        ServiceType::L3vpn => {
            models.extend_from_slice(L3VPN_BASE);
            match vendor {
                Vendor::Cisco => models.extend_from_slice(L3VPN_CISCO),
                Vendor::Nokia => models.extend_from_slice(L3VPN_NOKIA),
                Vendor::Juniper => models.extend_from_slice(L3VPN_JUNIPER),
                _ => {}
            }
        }
        ServiceType::Evpn | ServiceType::L2vpnEpipe => models.extend_from_slice(L2VPN),
        ServiceType::Bgp => models.extend_from_slice(BGP),
        ServiceType::Isis => models.extend_from_slice(ISIS),
        ServiceType::Ospf => models.extend_from_slice(OSPF),
        _ => {}
    }
    models.into_iter().map(ModelRef::parse).collect()
}
