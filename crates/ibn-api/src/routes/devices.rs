//! Inventory endpoints.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use ibn_protocol::Device;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// GET /api/v1/devices: list the registered inventory.
pub async fn list_devices(State(state): State<AppState>) -> Json<Vec<Device>> {
    Json(state.inventory().await)
}

/// GET /api/v1/devices/{id}: get one device.
pub async fn get_device(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> ApiResult<Json<Device>> {
    let devices = state.devices.read().await;
    devices
        .get(&device_id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("device '{device_id}' not found")))
}

/// POST /api/v1/devices: register a device. Ids are unique.
pub async fn register_device(
    State(state): State<AppState>,
    Json(device): Json<Device>,
) -> ApiResult<(StatusCode, Json<Device>)> {
    if device.device_id.trim().is_empty() {
        return Err(ApiError::BadRequest("device_id must not be empty".into()));
    }

    {
        let mut devices = state.devices.write().await;
        if devices.contains_key(&device.device_id) {
            return Err(ApiError::Conflict(format!(
                "device '{}' already registered",
                device.device_id
            )));
        }
        devices.insert(device.device_id.clone(), device.clone());
    }
    state.engine.register_devices(std::slice::from_ref(&device));

    tracing::info!(
        device_id = %device.device_id,
        vendor = %device.vendor,
        "device registered"
    );
    Ok((StatusCode::CREATED, Json(device)))
}
