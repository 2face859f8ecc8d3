//! Configuration types for relaybank
//!
//! [`StaticConfig`] holds server, device, serial and SNMP settings. It is
//! loaded once at startup from a TOML file and never written back.

mod paths;
mod static_config;

pub use paths::default_config_path;
pub use static_config::{DeviceSection, SerialConfig, ServerConfig, SnmpConfig, StaticConfig};
