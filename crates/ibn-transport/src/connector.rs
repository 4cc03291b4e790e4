//! Per-device session factory.

use async_trait::async_trait;
use ibn_protocol::Device;

use crate::config::TransportConfig;
use crate::error::{TransportError, TransportResult, with_timeout};
use crate::gnmi::GnmiSession;
use crate::netconf::NetconfSession;
use crate::restconf::{HttpRestconfClient, RestconfSession};

/// Opens management sessions to inventory devices.
///
/// Each call returns a fresh session owned by the caller; sessions are never
/// shared between concurrent work units.
#[async_trait]
pub trait DeviceConnector: Send + Sync {
    async fn netconf(&self, device: &Device) -> TransportResult<Box<dyn NetconfSession>>;

    async fn gnmi(&self, device: &Device) -> TransportResult<Box<dyn GnmiSession>>;

    async fn restconf(&self, device: &Device) -> TransportResult<Box<dyn RestconfSession>>;
}

/// Connector for real devices.
///
/// RESTCONF runs over the built-in HTTP client. NETCONF-over-SSH and gNMI
/// report [`TransportError::Unsupported`] until a session implementation is
/// registered for them, so discovery degrades to repository resolution.
pub struct LiveConnector {
    config: TransportConfig,
}

impl LiveConnector {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }

    fn restconf_root(&self, device: &Device) -> String {
        format!(
            "{}://{}:{}/restconf",
            self.config.restconf_scheme,
            device.address(),
            device.restconf_port
        )
    }
}

impl Default for LiveConnector {
    fn default() -> Self {
        Self::new(TransportConfig::default())
    }
}

#[async_trait]
impl DeviceConnector for LiveConnector {
    async fn netconf(&self, device: &Device) -> TransportResult<Box<dyn NetconfSession>> {
        tracing::debug!(device_id = %device.device_id, "no NETCONF session implementation linked");
        Err(TransportError::Unsupported("NETCONF".into()))
    }

    async fn gnmi(&self, device: &Device) -> TransportResult<Box<dyn GnmiSession>> {
        tracing::debug!(device_id = %device.device_id, "no gNMI session implementation linked");
        Err(TransportError::Unsupported("gNMI".into()))
    }

    async fn restconf(&self, device: &Device) -> TransportResult<Box<dyn RestconfSession>> {
        let root = self.restconf_root(device);
        let client = HttpRestconfClient::new(root, device.credentials.clone(), &self.config)?;
        // Reachability probe so connect failures surface here, not mid-operation.
        with_timeout("restconf connect", self.config.connect_timeout(), async {
            client.get_config("").await.map(|_| ())
        })
        .await?;
        Ok(Box::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ibn_protocol::Vendor;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn netconf_is_unsupported() {
        let connector = LiveConnector::default();
        let device = Device::new("PE1", Vendor::Cisco);
        let err = connector.netconf(&device).await.err().unwrap();
        assert!(matches!(err, TransportError::Unsupported(_)));
    }

    #[tokio::test]
    async fn restconf_connects_to_device_address() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/restconf/data"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .mount(&server)
            .await;

        let addr = server.address();
        let mut device = Device::new("leaf1", Vendor::Arista).with_transports(false, false, true);
        device.mgmt_ip = Some(addr.ip().to_string());
        device.restconf_port = addr.port();

        let connector = LiveConnector::new(TransportConfig {
            restconf_scheme: "http".into(),
            ..TransportConfig::default()
        });
        let session = connector.restconf(&device).await.unwrap();
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn restconf_connect_failure() {
        let mut device = Device::new("leaf9", Vendor::Arista);
        device.mgmt_ip = Some("127.0.0.1".into());
        device.restconf_port = 1;
        let connector = LiveConnector::new(TransportConfig {
            restconf_scheme: "http".into(),
            connect_timeout_secs: 2,
            ..TransportConfig::default()
        });
        assert!(connector.restconf(&device).await.is_err());
    }
}
