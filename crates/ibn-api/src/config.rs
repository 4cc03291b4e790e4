//! API server configuration.

use serde::Deserialize;

/// Top-level API server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Listen address (e.g., "0.0.0.0").
    #[serde(default = "default_host")]
    pub host: String,
    /// Listen port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Controller TOML config; built-in defaults when unset.
    #[serde(default)]
    pub controller_config: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl ApiConfig {
    /// Load config from `IBN_API_HOST`, `IBN_API_PORT` and `IBN_CONFIG`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let port = match lookup("IBN_API_PORT") {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!(value = %raw, "invalid IBN_API_PORT, using default");
                defaults.port
            }),
            None => defaults.port,
        };
        Self {
            host: lookup("IBN_API_HOST").unwrap_or(defaults.host),
            port,
            controller_config: lookup("IBN_CONFIG"),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            controller_config: None,
        }
    }
}
