//! Device lifecycle handlers

use crate::api::error::ApiError;
use crate::api::AppState;
use crate::api_ok;
use axum::{extract::State, Json};
use relaybank_core::api::{ApiResponse, DeviceActionResponse};
use tracing::{debug, info};

/// Re-run device setup.
///
/// For UDIN boards this reopens the port and identifies the board again,
/// which is the only way back from the degraded zero-relay state.
///
/// # Endpoint
///
/// `POST /api/v0/device/reinitialize`
pub(crate) async fn reinitialize(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<DeviceActionResponse>>, ApiError> {
    debug!("Request: POST /api/v0/device/reinitialize");

    let relay_count = state.files.bank().reinitialize().await?;
    info!("Device reinitialized with {} relays", relay_count);

    api_ok!(DeviceActionResponse {
        relay_count,
        message: format!("{} ready", state.files.bank().model()),
    })
}
