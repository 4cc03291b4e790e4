//! Intent submission and history endpoints.

use axum::Json;
use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use ibn_protocol::{ChangePolicy, Device, IntentRequest, ProcessResponse, RiskLevel, TelemetryHint};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::state::{AppState, IntentRecord};

/// Body of `POST /api/v1/intents`.
#[derive(Debug, Deserialize)]
pub struct SubmitIntent {
    pub intent: String,
    /// Devices for this intent. They join the registered inventory; the
    /// whole registered inventory is used when absent.
    #[serde(default)]
    pub inventory: Option<Vec<Device>>,
    #[serde(default)]
    pub policy: ChangePolicy,
    #[serde(default)]
    pub telemetry_hint: Option<TelemetryHint>,
}

/// List view of a processed intent.
#[derive(Debug, Serialize)]
pub struct IntentSummary {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub intent_summary: String,
    pub completed: bool,
    pub risk_level: RiskLevel,
    pub payloads: usize,
}

impl From<&IntentRecord> for IntentSummary {
    fn from(record: &IntentRecord) -> Self {
        let (intent_summary, risk_level, payloads) = match &record.response {
            ProcessResponse::Completed(r) => (
                r.intent_summary.clone(),
                r.risk_assessment.level,
                r.candidate_payloads.len(),
            ),
            ProcessResponse::Failed(e) => (e.intent_summary.clone(), e.risk_assessment.level, 0),
        };
        Self {
            id: record.id,
            created_at: record.created_at,
            intent_summary,
            completed: record.response.is_completed(),
            risk_level,
            payloads,
        }
    }
}

/// POST /api/v1/intents: run the pipeline and keep the result.
///
/// Pipeline failures are still stored and returned with 200; the record's
/// `response` carries the error.
pub async fn submit_intent(
    State(state): State<AppState>,
    Json(req): Json<SubmitIntent>,
) -> ApiResult<Json<IntentRecord>> {
    if req.intent.trim().is_empty() {
        return Err(ApiError::BadRequest("intent text is empty".into()));
    }

    let inventory = match req.inventory {
        Some(devices) => {
            state.register_devices(&devices).await;
            devices
        }
        None => state.inventory().await,
    };

    let id = Uuid::now_v7();
    tracing::info!(intent_id = %id, devices = inventory.len(), "processing intent");

    let response = state
        .processor
        .process(IntentRequest {
            intent: req.intent.clone(),
            inventory,
            policy: req.policy,
            telemetry_hint: req.telemetry_hint,
        })
        .await;

    let record = IntentRecord {
        id,
        intent: req.intent,
        created_at: Utc::now(),
        response,
    };
    state.intents.write().await.push(record.clone());
    Ok(Json(record))
}

/// GET /api/v1/intents: list processed intents, oldest first.
pub async fn list_intents(State(state): State<AppState>) -> Json<Vec<IntentSummary>> {
    let intents = state.intents.read().await;
    Json(intents.iter().map(IntentSummary::from).collect())
}

/// GET /api/v1/intents/{id}: full pipeline output of one intent.
pub async fn get_intent(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<IntentRecord>> {
    state
        .intent(id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("intent '{id}' not found")))
}
