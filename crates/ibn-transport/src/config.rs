use std::time::Duration;

use serde::Deserialize;

/// Session settings shared by all transports.
#[derive(Debug, Clone, Deserialize)]
pub struct TransportConfig {
    /// Deadline for opening a session.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Deadline for a single RPC / HTTP request.
    #[serde(default = "default_rpc_timeout")]
    pub rpc_timeout_secs: u64,
    /// Accept self-signed device certificates (lab gear).
    #[serde(default = "default_accept_invalid_certs")]
    pub accept_invalid_certs: bool,
    /// URL scheme for RESTCONF endpoints.
    #[serde(default = "default_restconf_scheme")]
    pub restconf_scheme: String,
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_rpc_timeout() -> u64 {
    30
}

fn default_accept_invalid_certs() -> bool {
    true
}

fn default_restconf_scheme() -> String {
    "https".to_string()
}

impl TransportConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            rpc_timeout_secs: default_rpc_timeout(),
            accept_invalid_certs: default_accept_invalid_certs(),
            restconf_scheme: default_restconf_scheme(),
        }
    }
}
