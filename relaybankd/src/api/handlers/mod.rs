//! API request handlers for the relaybank daemon REST API.
//!
//! # Handler Modules
//!
//! - [`info`] - System information and root endpoint
//! - [`relays`] - Relay files: listing, read, write, reset
//! - [`device`] - Device lifecycle (reinitialize)
//!
//! # API Structure
//!
//! All handlers follow a consistent pattern:
//! - Accept `State<AppState>` for accessing shared application state
//! - Return `Result<Json<ApiResponse<T>>, ApiError>` for uniform responses
//! - Use `api_ok!()` for response construction
//! - Log operations using the `tracing` crate

pub mod device;
pub mod info;
pub mod relays;
