//! Device Status Routes

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use alerting::{DeviceSnapshot, DeviceStatus};

use crate::error::ApiError;
use crate::SharedState;

/// Query parameters for the device list
#[derive(Debug, Deserialize)]
pub struct DeviceQuery {
    /// Filter by status
    pub status: Option<DeviceStatus>,
}

/// Response for the device list
#[derive(Debug, Serialize)]
pub struct DevicesResponse {
    pub data: Vec<DeviceSnapshot>,
    pub count: usize,
    /// Devices not currently in the normal state
    pub unhealthy_count: usize,
}

/// List every tracked device
pub async fn list_devices(
    State(state): State<SharedState>,
    Query(params): Query<DeviceQuery>,
) -> Json<DevicesResponse> {
    let devices: Vec<DeviceSnapshot> = state
        .manager
        .get_states()
        .into_iter()
        .filter(|d| params.status.map_or(true, |s| d.status == s))
        .collect();

    let unhealthy = devices.iter().filter(|d| d.status != DeviceStatus::Normal).count();

    Json(DevicesResponse {
        count: devices.len(),
        unhealthy_count: unhealthy,
        data: devices,
    })
}

/// Get one device
pub async fn get_device(
    State(state): State<SharedState>,
    Path(device_id): Path<String>,
) -> Result<Json<DeviceSnapshot>, ApiError> {
    state
        .manager
        .get_state(&device_id)
        .map(Json)
        .ok_or(ApiError::DeviceNotFound(device_id))
}

/// Stop tracking a decommissioned device
pub async fn delete_device(
    State(state): State<SharedState>,
    Path(device_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.manager.evict(&device_id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::DeviceNotFound(device_id))
    }
}
