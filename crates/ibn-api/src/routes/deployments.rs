//! Validate, commit, confirm and roll back candidate configuration.
//!
//! Payloads come either from a processed intent (`intent_id`) or are
//! posted directly (`payloads`). Per-device failures are reported inside
//! the result list, so these handlers answer 200 once the request itself
//! is well formed.

use std::collections::BTreeMap;

use axum::Json;
use axum::extract::State;
use ibn_commit::{ActiveCommit, MAX_CONFIRM_TIMEOUT_MINUTES, run_verification};
use ibn_protocol::{CandidatePayload, CommitResult, ValidationResult};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Where the payloads for a deployment request come from.
#[derive(Debug, Default, Deserialize)]
pub struct PayloadSource {
    #[serde(default)]
    pub intent_id: Option<Uuid>,
    #[serde(default)]
    pub payloads: Option<Vec<CandidatePayload>>,
}

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    #[serde(flatten)]
    pub source: PayloadSource,
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Deserialize)]
pub struct CommitRequest {
    #[serde(flatten)]
    pub source: PayloadSource,
    #[serde(default = "default_confirmed")]
    pub confirmed: bool,
    /// Confirmation window; the engine's configured default when absent.
    #[serde(default)]
    pub timeout_minutes: Option<u64>,
}

fn default_confirmed() -> bool {
    true
}

/// Body of confirm and rollback. No targets means every pending commit.
#[derive(Debug, Default, Deserialize)]
pub struct TargetsRequest {
    #[serde(default)]
    pub targets: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub intent_id: Uuid,
}

async fn resolve_payloads(
    state: &AppState,
    source: PayloadSource,
) -> ApiResult<Vec<CandidatePayload>> {
    let payloads = match (source.intent_id, source.payloads) {
        (Some(_), Some(_)) => {
            return Err(ApiError::BadRequest(
                "give either intent_id or payloads, not both".into(),
            ));
        }
        (Some(id), None) => {
            let record = state
                .intent(id)
                .await
                .ok_or_else(|| ApiError::NotFound(format!("intent '{id}' not found")))?;
            record
                .response
                .completed()
                .map(|r| r.candidate_payloads.clone())
                .ok_or_else(|| {
                    ApiError::Conflict(format!("intent '{id}' failed processing; nothing to deploy"))
                })?
        }
        (None, Some(payloads)) => payloads,
        (None, None) => {
            return Err(ApiError::BadRequest(
                "either intent_id or payloads is required".into(),
            ));
        }
    };
    if payloads.is_empty() {
        return Err(ApiError::BadRequest("no payloads to deploy".into()));
    }
    Ok(payloads)
}

/// POST /api/v1/deployments/validate
pub async fn validate(
    State(state): State<AppState>,
    Json(req): Json<ValidateRequest>,
) -> ApiResult<Json<Vec<ValidationResult>>> {
    let payloads = resolve_payloads(&state, req.source).await?;
    tracing::info!(targets = payloads.len(), dry_run = req.dry_run, "validating configuration");
    Ok(Json(
        state
            .engine
            .validate_configuration(&payloads, req.dry_run)
            .await,
    ))
}

/// POST /api/v1/deployments/commit
pub async fn commit(
    State(state): State<AppState>,
    Json(req): Json<CommitRequest>,
) -> ApiResult<Json<Vec<CommitResult>>> {
    let payloads = resolve_payloads(&state, req.source).await?;
    let timeout_minutes = req
        .timeout_minutes
        .unwrap_or(state.engine.config().confirm_timeout_minutes);
    if req.confirmed && !(1..=MAX_CONFIRM_TIMEOUT_MINUTES).contains(&timeout_minutes) {
        return Err(ApiError::BadRequest(format!(
            "timeout_minutes must be between 1 and {MAX_CONFIRM_TIMEOUT_MINUTES} for a confirmed commit"
        )));
    }
    tracing::info!(
        targets = payloads.len(),
        confirmed = req.confirmed,
        timeout_minutes,
        "committing configuration"
    );
    Ok(Json(
        state
            .engine
            .commit_configurations(&payloads, req.confirmed, timeout_minutes)
            .await,
    ))
}

/// POST /api/v1/deployments/confirm
pub async fn confirm(
    State(state): State<AppState>,
    Json(req): Json<TargetsRequest>,
) -> Json<Vec<CommitResult>> {
    Json(state.engine.confirm_commits(req.targets.as_deref()).await)
}

/// POST /api/v1/deployments/rollback
pub async fn rollback(
    State(state): State<AppState>,
    Json(req): Json<TargetsRequest>,
) -> Json<Vec<CommitResult>> {
    Json(state.engine.rollback_configurations(req.targets.as_deref()).await)
}

/// GET /api/v1/deployments/active: confirmed commits awaiting confirmation.
pub async fn active(State(state): State<AppState>) -> Json<BTreeMap<String, ActiveCommit>> {
    state.engine.cleanup_expired_commits();
    Json(state.engine.get_active_commits())
}

/// POST /api/v1/deployments/verify: run an intent's verification plan
/// against the registered inventory.
pub async fn verify(
    State(state): State<AppState>,
    Json(req): Json<VerifyRequest>,
) -> ApiResult<Json<Vec<ValidationResult>>> {
    let id = req.intent_id;
    let record = state
        .intent(id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("intent '{id}' not found")))?;
    let plan = record
        .response
        .completed()
        .map(|r| r.verification_plan.clone())
        .ok_or_else(|| ApiError::Conflict(format!("intent '{id}' has no verification plan")))?;

    let inventory = state.inventory().await;
    Ok(Json(
        run_verification(
            &plan,
            &inventory,
            state.connector.clone(),
            state.engine.config().operation_timeout(),
        )
        .await,
    ))
}
