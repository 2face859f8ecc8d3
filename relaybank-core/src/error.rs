//! Error types for the relaybank system

use thiserror::Error;

/// Core error type for relay operations
#[derive(Error, Debug)]
pub enum RelayError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serial port errors
    #[error("Serial port error: {0}")]
    Serial(String),

    /// SNMP transport errors (socket, send, receive)
    #[error("SNMP error: {0}")]
    Snmp(String),

    /// Wire protocol violations: echo mismatch, malformed response
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A response line arrived without its CR LF terminator
    #[error("Short read from device: {0:?}")]
    ShortRead(Vec<u8>),

    /// The device answered with a non-zero error status
    #[error("Device reported error status {status} at index {index}")]
    DeviceStatus { status: i64, index: i64 },

    /// Channel index outside the visible relay range
    #[error("Relay channel out of range: {channel} (device exposes {count} relays)")]
    InvalidChannel { channel: usize, count: usize },

    /// The attached device did not identify as a supported model
    #[error("Unsupported device: {0:?}")]
    UnsupportedDevice(String),

    /// Invalid input or arguments
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Parsing errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Timeout errors
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// No device session is open
    #[error("Device not found")]
    DeviceNotFound,

    /// Device disconnected (USB unplugged, power cycle)
    #[error("Device disconnected: {0}")]
    DeviceDisconnected(String),
}

impl RelayError {
    /// Whether this error belongs to the I/O class surfaced to presentation callers.
    ///
    /// Everything except bad addressing and bad input is I/O-class: transport,
    /// protocol and device-status failures are indistinguishable to a reader of
    /// a relay file.
    pub fn is_io_class(&self) -> bool {
        !matches!(
            self,
            RelayError::InvalidChannel { .. } | RelayError::InvalidInput(_) | RelayError::Config(_)
        )
    }
}

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, RelayError>;

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        RelayError::Parse(err.to_string())
    }
}

impl From<toml::de::Error> for RelayError {
    fn from(err: toml::de::Error) -> Self {
        RelayError::Config(err.to_string())
    }
}
