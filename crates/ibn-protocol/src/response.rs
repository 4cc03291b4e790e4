//! Intent processing request and response envelopes.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::device::Device;
use crate::discovery::ModelDiscoveryResult;
use crate::intent::{ChangePolicy, MaintenanceWindow, NormalizedIntent, TelemetryHint};
use crate::payload::{CandidatePayload, MappingEntry};
use crate::risk::RiskAssessment;

/// Input to the intent processor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentRequest {
    /// Free-form operator text.
    pub intent: String,
    #[serde(default)]
    pub inventory: Vec<Device>,
    #[serde(default)]
    pub policy: ChangePolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telemetry_hint: Option<TelemetryHint>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackPlan {
    pub method: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitPlan {
    pub strategy: String,
    pub batching: String,
    pub rollback: RollbackPlan,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maintenance_window: Option<MaintenanceWindow>,
}

/// Post-deployment checks and the telemetry used to evaluate them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationPlan {
    pub tests: Vec<String>,
    /// `gnmi:<path>` or `netconf filter: <subtree>` entries.
    pub telemetry_queries: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditLog {
    pub timestamp: DateTime<Utc>,
    /// Distinct discovery sources, sorted.
    pub sources: Vec<String>,
    /// `payload_<index>` → SHA-256 hex of the payload text.
    pub hashes: BTreeMap<String, String>,
}

/// Full pipeline output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentResponse {
    pub intent_summary: String,
    pub risk_assessment: RiskAssessment,
    pub model_discovery: Vec<ModelDiscoveryResult>,
    pub normalized_intent: NormalizedIntent,
    pub mapping_table: Vec<MappingEntry>,
    pub candidate_payloads: Vec<CandidatePayload>,
    pub commit_plan: CommitPlan,
    pub verification_plan: VerificationPlan,
    pub audit_log: AuditLog,
}

/// Reduced response returned when the pipeline itself fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub intent_summary: String,
    pub risk_assessment: RiskAssessment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProcessResponse {
    Completed(Box<IntentResponse>),
    Failed(ErrorResponse),
}

impl ProcessResponse {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    pub fn completed(&self) -> Option<&IntentResponse> {
        match self {
            Self::Completed(r) => Some(r),
            Self::Failed(_) => None,
        }
    }
}
