use std::time::Duration;

use serde::Deserialize;

/// Commit engine tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct CommitConfig {
    /// Deadline for each device operation (connect, edit, validate, ...).
    #[serde(default = "default_operation_timeout")]
    pub operation_timeout_secs: u64,
    /// Confirmed-commit window used when the caller does not give one.
    #[serde(default = "default_confirm_timeout")]
    pub confirm_timeout_minutes: u64,
    /// How often the expiry sweeper runs.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_operation_timeout() -> u64 {
    60
}

fn default_confirm_timeout() -> u64 {
    10
}

fn default_sweep_interval() -> u64 {
    30
}

impl CommitConfig {
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

impl Default for CommitConfig {
    fn default() -> Self {
        Self {
            operation_timeout_secs: default_operation_timeout(),
            confirm_timeout_minutes: default_confirm_timeout(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}
