use serde::{Deserialize, Serialize};

/// Network equipment vendor.
///
/// Unknown vendor strings in inventory files map to [`Vendor::Generic`],
/// which is served by the vendor-neutral (OpenConfig / IETF) tables.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Vendor {
    Cisco,
    Nokia,
    Juniper,
    Arista,
    Huawei,
    #[default]
    Generic,
}

impl Vendor {
    /// Case-insensitive lookup; anything unrecognised is `Generic`.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "cisco" => Self::Cisco,
            "nokia" => Self::Nokia,
            "juniper" => Self::Juniper,
            "arista" => Self::Arista,
            "huawei" => Self::Huawei,
            _ => Self::Generic,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cisco => "cisco",
            Self::Nokia => "nokia",
            Self::Juniper => "juniper",
            Self::Arista => "arista",
            Self::Huawei => "huawei",
            Self::Generic => "generic",
        }
    }
}

impl std::fmt::Display for Vendor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lowercased vendor name when `raw` is not one of the known vendors.
fn unrecognised_vendor(vendor: Vendor, raw: &str) -> Option<String> {
    let name = raw.trim().to_ascii_lowercase();
    (vendor == Vendor::Generic && !name.is_empty() && name != Vendor::Generic.as_str())
        .then_some(name)
}

/// Management protocol used to talk to a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Netconf,
    Restconf,
    Gnmi,
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Netconf => "netconf",
            Self::Restconf => "restconf",
            Self::Gnmi => "gnmi",
        };
        f.write_str(s)
    }
}

/// Login credentials for a managed device. The password never appears in
/// `Debug` output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// One inventory record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "DeviceRecord")]
pub struct Device {
    /// Unique device identifier; every per-device join uses this key.
    pub device_id: String,
    pub vendor: Vendor,
    /// Inventory vendor name when it is not one of [`Vendor`]'s variants.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_name: Option<String>,
    pub os_version: String,
    /// Management address. Falls back to `device_id` when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mgmt_ip: Option<String>,
    pub netconf_enabled: bool,
    pub gnmi_enabled: bool,
    pub restconf_enabled: bool,
    pub netconf_port: u16,
    pub gnmi_port: u16,
    pub restconf_port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bgp_asn: Option<u32>,
    /// Service identifier used by service-oriented platforms (SR OS VPRN).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_id: Option<u32>,
}

/// Inventory record as written in files and API bodies.
#[derive(Deserialize)]
struct DeviceRecord {
    #[serde(alias = "hostname")]
    device_id: String,
    #[serde(default)]
    vendor: String,
    #[serde(default)]
    vendor_name: Option<String>,
    #[serde(default = "default_os_version")]
    os_version: String,
    #[serde(default, alias = "host")]
    mgmt_ip: Option<String>,
    #[serde(default = "default_true")]
    netconf_enabled: bool,
    #[serde(default)]
    gnmi_enabled: bool,
    #[serde(default)]
    restconf_enabled: bool,
    #[serde(default = "default_netconf_port")]
    netconf_port: u16,
    #[serde(default = "default_gnmi_port")]
    gnmi_port: u16,
    #[serde(default = "default_restconf_port")]
    restconf_port: u16,
    #[serde(default)]
    credentials: Option<Credentials>,
    #[serde(default)]
    bgp_asn: Option<u32>,
    #[serde(default)]
    service_id: Option<u32>,
}

impl From<DeviceRecord> for Device {
    fn from(r: DeviceRecord) -> Self {
        let vendor = Vendor::from_name(&r.vendor);
        let vendor_name = r
            .vendor_name
            .as_deref()
            .and_then(|name| unrecognised_vendor(vendor, name))
            .or_else(|| unrecognised_vendor(vendor, &r.vendor));
        Self {
            device_id: r.device_id,
            vendor,
            vendor_name,
            os_version: r.os_version,
            mgmt_ip: r.mgmt_ip,
            netconf_enabled: r.netconf_enabled,
            gnmi_enabled: r.gnmi_enabled,
            restconf_enabled: r.restconf_enabled,
            netconf_port: r.netconf_port,
            gnmi_port: r.gnmi_port,
            restconf_port: r.restconf_port,
            credentials: r.credentials,
            bgp_asn: r.bgp_asn,
            service_id: r.service_id,
        }
    }
}

fn default_os_version() -> String {
    "unknown".to_string()
}

fn default_true() -> bool {
    true
}

fn default_netconf_port() -> u16 {
    830
}

fn default_gnmi_port() -> u16 {
    9339
}

fn default_restconf_port() -> u16 {
    443
}

impl Device {
    /// A NETCONF-enabled device with default ports and no credentials.
    pub fn new(device_id: impl Into<String>, vendor: Vendor) -> Self {
        Self {
            device_id: device_id.into(),
            vendor,
            vendor_name: None,
            os_version: default_os_version(),
            mgmt_ip: None,
            netconf_enabled: true,
            gnmi_enabled: false,
            restconf_enabled: false,
            netconf_port: default_netconf_port(),
            gnmi_port: default_gnmi_port(),
            restconf_port: default_restconf_port(),
            credentials: None,
            bgp_asn: None,
            service_id: None,
        }
    }

    /// A device whose vendor is given by inventory name. Names outside
    /// [`Vendor`] map to `Generic` but stay distinguishable.
    pub fn with_vendor_name(device_id: impl Into<String>, name: &str) -> Self {
        let vendor = Vendor::from_name(name);
        Self {
            vendor_name: unrecognised_vendor(vendor, name),
            ..Self::new(device_id, vendor)
        }
    }

    /// Vendor identity for counting distinct vendors.
    pub fn vendor_key(&self) -> &str {
        self.vendor_name.as_deref().unwrap_or(self.vendor.as_str())
    }

    pub fn with_os_version(mut self, os_version: impl Into<String>) -> Self {
        self.os_version = os_version.into();
        self
    }

    pub fn with_transports(mut self, netconf: bool, gnmi: bool, restconf: bool) -> Self {
        self.netconf_enabled = netconf;
        self.gnmi_enabled = gnmi;
        self.restconf_enabled = restconf;
        self
    }

    pub fn with_bgp_asn(mut self, asn: u32) -> Self {
        self.bgp_asn = Some(asn);
        self
    }

    /// Address used to open management sessions.
    pub fn address(&self) -> &str {
        self.mgmt_ip.as_deref().unwrap_or(&self.device_id)
    }

    /// Transport used to push configuration: NETCONF, then RESTCONF, then
    /// gNMI. A device with nothing enabled still gets NETCONF.
    pub fn config_transport(&self) -> Transport {
        if self.netconf_enabled {
            Transport::Netconf
        } else if self.restconf_enabled {
            Transport::Restconf
        } else if self.gnmi_enabled {
            Transport::Gnmi
        } else {
            Transport::Netconf
        }
    }
}
