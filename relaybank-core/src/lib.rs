//! relaybank Core Library
//!
//! Shared types, device tables, channel addressing and configuration for the
//! relaybank project. Used by the hardware drivers and the daemon.

pub mod address;
pub mod api;
pub mod config;
pub mod device;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use address::{daenet_relay_oid, udin_relay_digit, validate_channel, AddressTable, Oid};
pub use config::{default_config_path, StaticConfig};
pub use device::*;
pub use error::*;
pub use types::*;
