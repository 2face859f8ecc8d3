//! Info handlers for system information and root endpoint

use crate::api::error::ApiError;
use crate::api::AppState;

use axum::{extract::State, Json};
use relaybank_core::api::{ApiResponse, InfoResponse};
use relaybank_core::unix_secs;
use serde_json::{json, Value};
use tracing::debug;

/// Handle the root endpoint.
///
/// Provide basic service identification and status. Useful for health checks.
///
/// # Endpoint
///
/// `GET /`
pub(crate) async fn root() -> Result<Json<ApiResponse<Value>>, ApiError> {
    debug!("Request: GET /");

    let data = json!({
        "service": "relaybank relay server",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "ok"
    });

    Ok(Json(ApiResponse::success(data)))
}

/// Retrieve system information.
///
/// # Endpoint
///
/// `GET /api/v0/info`
///
/// # Returns
///
/// - `version` - Server version
/// - `device_kind` - `udin` or `daenet`
/// - `model` - Identified model, or the agent address for DAEnetIP2
/// - `relay_count` - Currently visible relays; 0 while the device is degraded
/// - `uptime` - Server uptime in seconds
pub(crate) async fn get_info(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<InfoResponse>>, ApiError> {
    debug!("Request: GET /api/v0/info");

    let bank = state.files.bank();
    let info_response = InfoResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        device_kind: bank.kind(),
        model: bank.model(),
        relay_count: bank.relay_count(),
        mock: state.mock,
        uptime: state.start_time.elapsed().as_secs(),
        started_at: unix_secs(state.files.started_at()),
    };

    Ok(Json(ApiResponse::success(info_response)))
}
