//! `/resources` observability endpoints, backed by the registry.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde_json::{json, Value};

use crate::domain::models::{is_valid_drone_uuid, DroneRecord, DRONE_UUID_PATTERN};

use super::security::{authorize, ApiError};
use super::ApiState;

// Both endpoints require a valid token but no particular scope.
const REQUIRED_SCOPES: &[&str] = &[];

/// `GET /resources/` - list of managed resources.
pub async fn get_resources(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<Vec<DroneRecord>>, ApiError> {
    authorize(&state.auth, &headers, REQUIRED_SCOPES)?;

    let records = state
        .registry
        .get_resources()
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?;
    Ok(Json(records))
}

/// `GET /resources/{drone_uuid}/state` - current state of one resource.
pub async fn get_resource_state(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(drone_uuid): Path<String>,
) -> Result<Json<Value>, ApiError> {
    authorize(&state.auth, &headers, REQUIRED_SCOPES)?;

    if !is_valid_drone_uuid(&drone_uuid) {
        return Err(ApiError::Validation(format!(
            "drone_uuid does not match {DRONE_UUID_PATTERN}"
        )));
    }

    let state_name = state
        .registry
        .get_resource_state(&drone_uuid)
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?
        .ok_or(ApiError::NotFound("Drone not found"))?;

    Ok(Json(json!({ "drone_uuid": drone_uuid, "state": state_name })))
}
