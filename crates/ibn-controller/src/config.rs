//! Controller configuration, loadable from TOML.

use std::path::PathBuf;

use ibn_commit::CommitConfig;
use ibn_discovery::{DiscoveryConfig, RepositoryConfig};
use ibn_transport::TransportConfig;
use serde::Deserialize;

/// Top-level configuration for the intent pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct ControllerConfig {
    /// Directory holding the YANG model cache.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub commit: CommitConfig,
    /// Schema repositories for discovery fallback.
    #[serde(default)]
    pub repositories: RepositoryConfig,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./yang_cache")
}

impl ControllerConfig {
    /// Load config from a TOML file path.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            discovery: DiscoveryConfig::default(),
            transport: TransportConfig::default(),
            commit: CommitConfig::default(),
            repositories: RepositoryConfig::default(),
        }
    }
}
