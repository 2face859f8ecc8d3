//! API models for the relaybank REST API
//!
//! This module contains request and response models for the relaybank REST API.

use crate::device::DeviceKind;
use crate::types::RelayState;
use serde::{Deserialize, Serialize};

/// Generic API response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum ApiResponse<T> {
    #[serde(rename = "success")]
    Success { data: T },
    #[serde(rename = "error")]
    Error { error: String },
}

impl<T> ApiResponse<T> {
    /// Create a successful response
    pub fn success(data: T) -> Self {
        Self::Success { data }
    }

    /// Create an error response
    pub fn error(error: String) -> Self {
        Self::Error { error }
    }
}

/// Server information response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfoResponse {
    /// Server version
    pub version: String,
    /// Device family being driven
    pub device_kind: DeviceKind,
    /// Model or peer description reported by the driver
    pub model: String,
    /// Currently visible relay count (0 when degraded)
    pub relay_count: usize,
    /// Whether the daemon runs against a simulated device
    pub mock: bool,
    /// Server uptime in seconds
    pub uptime: u64,
    /// Service start time, seconds since the Unix epoch
    pub started_at: u64,
}

/// One relay as listed by the directory endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayEntry {
    /// File name, `r1`..`rN`
    pub name: String,
    /// 0-based channel index
    pub channel: usize,
    /// Current state, `None` if the device could not be read
    pub state: Option<RelayState>,
    /// Last modification, seconds since the Unix epoch
    pub modified: u64,
    /// File size in bytes (always 1)
    pub size: u64,
}

/// Relay directory listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayListResponse {
    /// Number of visible relays
    pub count: usize,
    /// Visible relays in channel order
    pub relays: Vec<RelayEntry>,
}

/// Contents of a single relay file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayValueResponse {
    /// File name
    pub name: String,
    /// `"0"` or `"1"`
    pub value: String,
}

/// Result of writing to a relay file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayWriteResponse {
    /// File name
    pub name: String,
    /// Bytes accepted (0 for a no-op write)
    pub written: usize,
}

/// Result of a device-level operation (reset, reinitialize)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceActionResponse {
    /// Relay count after the operation
    pub relay_count: usize,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_response_tagging() {
        let ok: ApiResponse<usize> = ApiResponse::success(8);
        let json = serde_json::to_string(&ok).unwrap();
        assert_eq!(json, r#"{"status":"success","data":8}"#);

        let err: ApiResponse<()> = ApiResponse::error("boom".to_string());
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(json, r#"{"status":"error","error":"boom"}"#);
    }

    #[test]
    fn test_relay_list_roundtrip_shape() {
        let list = RelayListResponse {
            count: 1,
            relays: vec![RelayEntry {
                name: "r1".to_string(),
                channel: 0,
                state: Some(RelayState::On),
                modified: 42,
                size: 1,
            }],
        };
        let value = serde_json::to_value(&list).unwrap();
        assert_eq!(value["relays"][0]["state"], "on");
        assert_eq!(value["relays"][0]["name"], "r1");
    }
}
