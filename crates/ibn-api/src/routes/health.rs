//! Controller health.

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub version: &'static str,
    pub devices: usize,
    pub intents: usize,
    /// Confirmed commits still waiting for confirmation.
    pub pending_commits: usize,
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<Health> {
    Json(Health {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        devices: state.devices.read().await.len(),
        intents: state.intents.read().await.len(),
        pending_commits: state.engine.registry().len(),
    })
}
