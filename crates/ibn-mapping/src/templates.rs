//! Payload renderers.
//!
//! A renderer is picked from a table keyed by `(Vendor, ServiceType,
//! Transport)`. A miss retries with [`Vendor::Generic`], and a second miss
//! falls back to a stub that renders valid but inert content flagged for
//! manual review.

use ibn_protocol::{Device, NormalizedIntent, ServiceType, Transport, Vendor};
use serde_json::json;

use crate::error::{RenderError, RenderResult};

pub const DEFAULT_ASN: u32 = 65000;
pub const DEFAULT_SERVICE_ID: u32 = 100;

const NETCONF_BASE_NS: &str = "urn:ietf:params:xml:ns:netconf:base:1.0";

/// Everything a renderer needs for one device.
#[derive(Debug, Clone)]
pub struct RenderContext<'a> {
    pub intent: &'a NormalizedIntent,
    pub device: &'a Device,
    pub vrf_name: String,
    /// Device ASN, else the intent's AS, else 65000.
    pub asn: u32,
    /// Right-hand side of the RD/RT: the service id on Nokia, the device id
    /// everywhere else.
    pub index: String,
}

impl<'a> RenderContext<'a> {
    pub fn new(intent: &'a NormalizedIntent, device: &'a Device) -> Self {
        let asn = device
            .bgp_asn
            .or(intent.attributes.autonomous_system)
            .unwrap_or(DEFAULT_ASN);
        let index = match device.vendor {
            Vendor::Nokia => device.service_id.unwrap_or(DEFAULT_SERVICE_ID).to_string(),
            _ => device.device_id.clone(),
        };
        Self {
            intent,
            device,
            vrf_name: intent.vrf_name(),
            asn,
            index,
        }
    }

    pub fn route_distinguisher(&self) -> String {
        format!("{}:{}", self.asn, self.index)
    }

    pub fn route_target(&self) -> String {
        format!("target:{}:{}", self.asn, self.index)
    }

    fn check(&self) -> RenderResult<()> {
        let vrf = &self.vrf_name;
        if vrf.is_empty() || vrf.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(RenderError::InvalidValue {
                field: "vrf name",
                value: vrf.clone(),
            });
        }
        Ok(())
    }
}

type Renderer = fn(&RenderContext<'_>) -> RenderResult<String>;

fn lookup(vendor: Vendor, service: ServiceType, transport: Transport) -> Option<Renderer> {
    use ServiceType as S;
    use Transport as T;
    use Vendor as V;
    let renderer: Renderer = match (vendor, service, transport) {
        (V::Cisco, S::L3vpn, T::Netconf) => cisco_l3vpn_xml,
        (V::Nokia, S::L3vpn, T::Netconf) => nokia_l3vpn_xml,
        (V::Juniper, S::L3vpn, T::Netconf) => junos_l3vpn_xml,
        (V::Generic, S::L3vpn, T::Netconf) => openconfig_l3vpn_xml,
        (V::Generic, S::L3vpn | S::Evpn | S::L2vpnEpipe, T::Gnmi) => openconfig_instance_gnmi,
        (V::Generic, _, T::Restconf) => service_restconf_json,
        _ => return None,
    };
    Some(renderer)
}

/// Render the payload for `ctx.device` over `transport`.
pub fn render(ctx: &RenderContext<'_>, transport: Transport) -> RenderResult<String> {
    ctx.check()?;
    let service = ctx.intent.service_type;
    match lookup(ctx.device.vendor, service, transport)
        .or_else(|| lookup(Vendor::Generic, service, transport))
    {
        Some(renderer) => renderer(ctx),
        None => {
            tracing::debug!(
                device_id = %ctx.device.device_id,
                vendor = %ctx.device.vendor,
                %service,
                %transport,
                "no template, rendering review stub"
            );
            stub(ctx, transport)
        }
    }
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

fn cisco_l3vpn_xml(ctx: &RenderContext<'_>) -> RenderResult<String> {
    let vrf = escape(&ctx.vrf_name);
    let asn = ctx.asn;
    let index = escape(&ctx.index);
    Ok(format!(
        r#"<config xmlns="{NETCONF_BASE_NS}">
  <vrfs xmlns="http://cisco.com/ns/yang/Cisco-IOS-XR-infra-rsi-cfg">
    <vrf>
      <vrf-name>{vrf}</vrf-name>
      <create/>
      <description>L3VPN service for {vrf}</description>
      <vpn-id>
        <vpn-oui>1</vpn-oui>
        <vpn-index>1</vpn-index>
      </vpn-id>
    </vrf>
  </vrfs>
  <bgp xmlns="http://cisco.com/ns/yang/Cisco-IOS-XR-bgp-cfg">
    <instance>
      <instance-name>default</instance-name>
      <instance-as>
        <as>0</as>
        <four-byte-as>
          <as>{asn}</as>
          <bgp-running/>
          <vrfs>
            <vrf>
              <vrf-name>{vrf}</vrf-name>
              <vrf-global>
                <route-distinguisher>
                  <type>as</type>
                  <as>{asn}</as>
                  <as-index>{index}</as-index>
                </route-distinguisher>
                <route-target>
                  <route-target-as-format>
                    <as>{asn}</as>
                    <as-index>{index}</as-index>
                  </route-target-as-format>
                </route-target>
              </vrf-global>
            </vrf>
          </vrfs>
        </four-byte-as>
      </instance-as>
    </instance>
  </bgp>
</config>"#
    ))
}

fn nokia_l3vpn_xml(ctx: &RenderContext<'_>) -> RenderResult<String> {
    let vrf = escape(&ctx.vrf_name);
    let service_id = escape(&ctx.index);
    let rd = escape(&ctx.route_distinguisher());
    let rt = escape(&ctx.route_target());
    Ok(format!(
        r#"<config xmlns="{NETCONF_BASE_NS}">
  <configure xmlns="urn:nokia.com:sros:ns:yang:sr:conf">
    <service>
      <vprn>
        <service-id>{service_id}</service-id>
        <admin-state>enable</admin-state>
        <service-name>{vrf}</service-name>
        <customer>1</customer>
        <description>L3VPN service for {vrf}</description>
        <route-distinguisher>{rd}</route-distinguisher>
        <auto-bind-tunnel>
          <resolution>any</resolution>
        </auto-bind-tunnel>
        <vrf-target>
          <community>{rt}</community>
          <import-export/>
        </vrf-target>
        <bgp-ipvpn>
          <mpls>
            <admin-state>enable</admin-state>
            <route-distinguisher>{rd}</route-distinguisher>
            <vrf-target>
              <export>{rt}</export>
              <import>{rt}</import>
            </vrf-target>
          </mpls>
        </bgp-ipvpn>
      </vprn>
    </service>
  </configure>
</config>"#
    ))
}

fn junos_l3vpn_xml(ctx: &RenderContext<'_>) -> RenderResult<String> {
    let vrf = escape(&ctx.vrf_name);
    let rd = escape(&ctx.route_distinguisher());
    let rt = escape(&ctx.route_target());
    Ok(format!(
        r#"<config xmlns="{NETCONF_BASE_NS}">
  <configuration xmlns="http://xml.juniper.net/xnm/1.1/xnm">
    <routing-instances>
      <instance>
        <name>{vrf}</name>
        <instance-type>vrf</instance-type>
        <route-distinguisher>
          <rd-type>{rd}</rd-type>
        </route-distinguisher>
        <vrf-target>
          <community>{rt}</community>
        </vrf-target>
        <vrf-table-label/>
        <protocols>
          <bgp>
            <group>
              <name>ibgp</name>
              <type>internal</type>
              <family>
                <inet-vpn>
                  <unicast/>
                </inet-vpn>
              </family>
            </group>
          </bgp>
        </protocols>
      </instance>
    </routing-instances>
  </configuration>
</config>"#
    ))
}

fn openconfig_l3vpn_xml(ctx: &RenderContext<'_>) -> RenderResult<String> {
    let vrf = escape(&ctx.vrf_name);
    let policy = escape(&ctx.vrf_name.to_uppercase());
    let rd = escape(&ctx.route_distinguisher());
    Ok(format!(
        r#"<config xmlns="{NETCONF_BASE_NS}">
  <network-instances xmlns="http://openconfig.net/yang/network-instance">
    <network-instance>
      <name>{vrf}</name>
      <config>
        <name>{vrf}</name>
        <type xmlns:oc-ni-types="http://openconfig.net/yang/network-instance-types">oc-ni-types:L3VRF</type>
        <description>L3VPN service for {vrf}</description>
        <route-distinguisher>{rd}</route-distinguisher>
      </config>
      <inter-instance-policies>
        <apply-policy>
          <config>
            <import-policy>IMPORT_{policy}</import-policy>
            <export-policy>EXPORT_{policy}</export-policy>
          </config>
        </apply-policy>
      </inter-instance-policies>
    </network-instance>
  </network-instances>
</config>"#
    ))
}

/// gNMI SetRequest creating the service's network instance.
fn openconfig_instance_gnmi(ctx: &RenderContext<'_>) -> RenderResult<String> {
    let instance_type = match ctx.intent.service_type {
        ServiceType::Evpn => "L2VSI",
        ServiceType::L2vpnEpipe => "L2P2P",
        _ => "L3VRF",
    };
    let mut update = vec![json!({
        "path": { "elem": [{ "name": "config" }, { "name": "type" }] },
        "val": { "string_val": instance_type }
    })];
    if instance_type == "L3VRF" {
        update.push(json!({
            "path": { "elem": [{ "name": "config" }, { "name": "route-distinguisher" }] },
            "val": { "string_val": ctx.route_distinguisher() }
        }));
    }
    let request = json!({
        "prefix": {
            "elem": [
                { "name": "network-instances" },
                { "name": "network-instance", "key": { "name": ctx.vrf_name } }
            ]
        },
        "update": update
    });
    Ok(serde_json::to_string_pretty(&request)?)
}

/// RESTCONF body describing the service and its endpoints.
fn service_restconf_json(ctx: &RenderContext<'_>) -> RenderResult<String> {
    let intent = ctx.intent;
    let endpoints: Vec<_> = intent
        .endpoints
        .iter()
        .map(|ep| json!({ "device": ep.device, "interface": ep.interface }))
        .collect();
    let body = json!({
        "ietf-restconf:data": {
            "service": {
                "service-type": intent.service_type.as_str(),
                "name": ctx.vrf_name,
                "route-distinguisher": ctx.route_distinguisher(),
                "route-target": ctx.route_target(),
                "mtu": intent.policy.mtu,
                "bfd": intent.policy.bfd,
                "endpoints": endpoints
            }
        }
    });
    Ok(serde_json::to_string_pretty(&body)?)
}

fn stub(ctx: &RenderContext<'_>, transport: Transport) -> RenderResult<String> {
    let note = format!(
        "{} service {} on {}: no {} template for {}, manual review required",
        ctx.intent.service_type, ctx.vrf_name, ctx.device.device_id, transport, ctx.device.vendor
    );
    match transport {
        Transport::Netconf => Ok(format!(
            "<config xmlns=\"{NETCONF_BASE_NS}\">\n  <!-- {} -->\n</config>",
            escape(&note).replace("--", "- -")
        )),
        Transport::Gnmi | Transport::Restconf => {
            Ok(serde_json::to_string_pretty(&json!({ "comment": note }))?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ibn_protocol::{Endpoint, IntentPolicy, ServiceAttributes};

    fn intent(service_type: ServiceType) -> NormalizedIntent {
        NormalizedIntent {
            service_type,
            endpoints: vec![Endpoint {
                device: "PE1".into(),
                interface: "Gi0/0/0/1".into(),
                tags: vec!["pe".into(), "vrf:CUST_A".into()],
            }],
            routing: None,
            slo: None,
            policy: IntentPolicy::default(),
            attributes: ServiceAttributes {
                autonomous_system: Some(64512),
                ..ServiceAttributes::default()
            },
        }
    }

    #[test]
    fn asn_prefers_device_then_intent_then_default() {
        let i = intent(ServiceType::L3vpn);
        let with_asn = Device::new("PE1", Vendor::Cisco).with_bgp_asn(65001);
        assert_eq!(RenderContext::new(&i, &with_asn).asn, 65001);

        let plain = Device::new("PE1", Vendor::Cisco);
        assert_eq!(RenderContext::new(&i, &plain).asn, 64512);

        let mut bare = intent(ServiceType::L3vpn);
        bare.attributes.autonomous_system = None;
        assert_eq!(RenderContext::new(&bare, &plain).asn, DEFAULT_ASN);
    }

    #[test]
    fn nokia_indexes_by_service_id() {
        let i = intent(ServiceType::L3vpn);
        let d = Device::new("PE2", Vendor::Nokia);
        let ctx = RenderContext::new(&i, &d);
        assert_eq!(ctx.route_distinguisher(), "64512:100");
        assert_eq!(ctx.route_target(), "target:64512:100");

        let xml = render(&ctx, Transport::Netconf).unwrap();
        assert!(xml.contains("<service-id>100</service-id>"));
        assert!(xml.contains("<service-name>CUST_A</service-name>"));
        assert!(xml.contains("<community>target:64512:100</community>"));
    }

    #[test]
    fn cisco_xml_embeds_vrf_and_asn() {
        let i = intent(ServiceType::L3vpn);
        let d = Device::new("PE1", Vendor::Cisco);
        let xml = render(&RenderContext::new(&i, &d), Transport::Netconf).unwrap();
        assert!(xml.starts_with("<config xmlns=\"urn:ietf:params:xml:ns:netconf:base:1.0\">"));
        assert!(xml.contains("<vrf-name>CUST_A</vrf-name>"));
        assert!(xml.contains("<as>64512</as>"));
        assert!(xml.contains("<as-index>PE1</as-index>"));
    }

    #[test]
    fn unlisted_vendor_uses_openconfig() {
        let i = intent(ServiceType::L3vpn);
        let d = Device::new("LEAF1", Vendor::Arista);
        let xml = render(&RenderContext::new(&i, &d), Transport::Netconf).unwrap();
        assert!(xml.contains("http://openconfig.net/yang/network-instance"));
        assert!(xml.contains("<route-distinguisher>64512:LEAF1</route-distinguisher>"));
        assert!(xml.contains("IMPORT_CUST_A"));
    }

    #[test]
    fn gnmi_set_request_shape() {
        let i = intent(ServiceType::L3vpn);
        let d = Device::new("LEAF1", Vendor::Arista).with_transports(false, true, false);
        let raw = render(&RenderContext::new(&i, &d), Transport::Gnmi).unwrap();
        let v: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(v["prefix"]["elem"][1]["key"]["name"], "CUST_A");
        assert_eq!(v["update"][0]["val"]["string_val"], "L3VRF");
        assert_eq!(v["update"][1]["val"]["string_val"], "64512:LEAF1");
    }

    #[test]
    fn restconf_body_lists_endpoints() {
        let i = intent(ServiceType::Qos);
        let d = Device::new("CE1", Vendor::Huawei).with_transports(false, false, true);
        let raw = render(&RenderContext::new(&i, &d), Transport::Restconf).unwrap();
        let v: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let service = &v["ietf-restconf:data"]["service"];
        assert_eq!(service["service-type"], "qos");
        assert_eq!(service["endpoints"][0]["interface"], "Gi0/0/0/1");
    }

    #[test]
    fn missing_template_renders_review_stub() {
        let i = intent(ServiceType::Ospf);
        let d = Device::new("P1", Vendor::Juniper);
        let xml = render(&RenderContext::new(&i, &d), Transport::Netconf).unwrap();
        assert!(xml.contains("<!-- ospf service CUST_A on P1"));
        assert!(xml.contains("manual review required"));

        let gnmi = render(&RenderContext::new(&i, &d), Transport::Gnmi).unwrap();
        assert!(gnmi.contains("manual review required"));
    }

    #[test]
    fn vrf_names_are_escaped_or_rejected() {
        let mut i = intent(ServiceType::L3vpn);
        i.endpoints[0].tags = vec!["vrf:A&B".into()];
        let d = Device::new("PE1", Vendor::Generic);
        let xml = render(&RenderContext::new(&i, &d), Transport::Netconf).unwrap();
        assert!(xml.contains("<name>A&amp;B</name>"));

        i.endpoints[0].tags = vec!["vrf:".into()];
        let err = render(&RenderContext::new(&i, &d), Transport::Netconf).unwrap_err();
        assert!(matches!(err, RenderError::InvalidValue { .. }));
    }
}
