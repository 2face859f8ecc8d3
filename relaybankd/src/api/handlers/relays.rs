//! Relay handlers: the relay files over HTTP

use crate::api::error::ApiError;
use crate::api::AppState;
use crate::api_ok;
use crate::relay_files::relay_name;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    Json,
};
use relaybank_core::api::{
    ApiResponse, DeviceActionResponse, RelayListResponse, RelayValueResponse, RelayWriteResponse,
};
use serde::Deserialize;
use tracing::{debug, info};

/// Query parameters for relay writes
#[derive(Deserialize)]
pub(crate) struct WriteQuery {
    /// Byte offset of the write; anything but 0 is ignored
    pub offset: Option<u64>,
}

fn lookup(state: &AppState, name: &str) -> Result<usize, ApiError> {
    state
        .files
        .lookup(name)
        .ok_or_else(|| ApiError::not_found(format!("No such relay: {}", name)))
}

/// List every visible relay.
///
/// # Endpoint
///
/// `GET /api/v0/relays`
pub(crate) async fn list_relays(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<RelayListResponse>>, ApiError> {
    debug!("Request: GET /api/v0/relays");

    let relays = state.files.entries().await;
    api_ok!(RelayListResponse {
        count: relays.len(),
        relays,
    })
}

/// Read one relay file.
///
/// # Endpoint
///
/// `GET /api/v0/relay/:name`
pub(crate) async fn read_relay(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse<RelayValueResponse>>, ApiError> {
    debug!("Request: GET /api/v0/relay/{}", name);

    let channel = lookup(&state, &name)?;
    let byte = state.files.read(channel).await?;

    api_ok!(RelayValueResponse {
        name: relay_name(channel),
        value: char::from(byte).to_string(),
    })
}

/// Write the request body to one relay file.
///
/// The first body byte decides the state: `1` is on, anything else off.
///
/// # Endpoint
///
/// `PUT /api/v0/relay/:name?offset=N`
pub(crate) async fn write_relay(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<WriteQuery>,
    body: Bytes,
) -> Result<Json<ApiResponse<RelayWriteResponse>>, ApiError> {
    debug!("Request: PUT /api/v0/relay/{} ({} bytes)", name, body.len());

    let channel = lookup(&state, &name)?;
    let written = state
        .files
        .write(channel, &body, query.offset.unwrap_or(0))
        .await?;

    api_ok!(RelayWriteResponse {
        name: relay_name(channel),
        written,
    })
}

/// Switch every relay off.
///
/// # Endpoint
///
/// `POST /api/v0/relays/reset`
pub(crate) async fn reset_relays(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<DeviceActionResponse>>, ApiError> {
    debug!("Request: POST /api/v0/relays/reset");

    let bank = state.files.bank();
    bank.reset_all().await?;
    info!("All relays reset via API");

    api_ok!(DeviceActionResponse {
        relay_count: bank.relay_count(),
        message: "All relays switched off".to_string(),
    })
}
