use std::time::Duration;

use serde::Deserialize;

/// Discovery engine tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryConfig {
    /// Devices probed at the same time.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Deadline for one live probe (connect plus all RPCs).
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
    /// Cached schemas older than this are refetched.
    #[serde(default = "default_cache_max_age_days")]
    pub cache_max_age_days: u64,
}

fn default_max_concurrency() -> usize {
    8
}

fn default_probe_timeout() -> u64 {
    30
}

fn default_cache_max_age_days() -> u64 {
    7
}

impl DiscoveryConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn cache_max_age(&self) -> Duration {
        Duration::from_secs(self.cache_max_age_days * 86_400)
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            probe_timeout_secs: default_probe_timeout(),
            cache_max_age_days: default_cache_max_age_days(),
        }
    }
}
