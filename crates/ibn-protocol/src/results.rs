//! Outcomes reported by the validation & commit engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Device-side operation recorded in a validation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConfigOperation {
    EditConfig,
    Validate,
    Commit,
    DiscardChanges,
    GnmiSet,
    RestconfPatch,
    SyntaxCheck,
    TelemetryQuery,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub operation: ConfigOperation,
    pub success: bool,
    pub duration_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    pub test_name: String,
    pub details: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<StepOutcome>,
}

impl ValidationResult {
    pub fn new(success: bool, test_name: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            success,
            target: None,
            test_name: test_name.into(),
            details: details.into(),
            timestamp: Utc::now(),
            duration_ms: None,
            steps: Vec::new(),
        }
    }

    pub fn for_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitResult {
    pub success: bool,
    pub device: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback_info: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl CommitResult {
    pub fn succeeded(device: impl Into<String>, commit_id: impl Into<String>) -> Self {
        Self {
            success: true,
            device: device.into(),
            commit_id: Some(commit_id.into()),
            rollback_info: None,
            error_message: None,
            timestamp: Utc::now(),
        }
    }

    pub fn failed(device: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            device: device.into(),
            commit_id: None,
            rollback_info: None,
            error_message: Some(error.into()),
            timestamp: Utc::now(),
        }
    }

    pub fn with_rollback_info(mut self, info: serde_json::Value) -> Self {
        self.rollback_info = Some(info);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_commit_serializes_error() {
        let r = CommitResult::failed("PE1", "Configuration validation failed");
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error_message"], "Configuration validation failed");
        assert!(json.get("commit_id").is_none());
    }

    #[test]
    fn validation_result_target() {
        let r = ValidationResult::new(true, "NETCONF validation", "ok").for_target("PE2");
        assert_eq!(r.target.as_deref(), Some("PE2"));
        assert!(r.steps.is_empty());
    }
}
