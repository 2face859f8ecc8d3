//! Static configuration loaded once at startup
//!
//! This configuration is read-only after the daemon starts.

use serde::{Deserialize, Serialize};

use crate::device::{DaenetIp2, DeviceConfig, DeviceKind};

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub bind: String,
    /// Server port
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 3010,
        }
    }
}

/// Which device family to drive
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DeviceSection {
    /// Device family
    pub kind: DeviceKind,
    /// Log every line and datagram sent to or received from the device
    pub debug_wire: bool,
}

/// Serial UDIN board settings
///
/// The line settings are fixed (see [`UdinSerial`](crate::UdinSerial)).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Character device of the board
    pub path: String,
    /// Switch every relay off (`r0`) right after identification
    pub reset_on_start: bool,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            path: "/dev/ttyUSB0".to_string(),
            reset_on_start: false,
        }
    }
}

/// DAEnetIP2 SNMP settings
///
/// The round-trip deadline is not configurable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnmpConfig {
    /// Agent address, `host` or `host:port`
    pub peer: String,
    /// SNMPv1 community string
    pub community: String,
    /// Number of relays to expose (clamped to the hardware maximum)
    pub relays: usize,
}

impl Default for SnmpConfig {
    fn default() -> Self {
        Self {
            peer: "192.168.1.100".to_string(),
            community: "private".to_string(),
            relays: DaenetIp2::MAX_RELAYS,
        }
    }
}

/// Static configuration for the relaybank daemon.
///
/// Located at `~/.config/relaybank/config.toml` by default. Every section and
/// field is optional; missing values take their defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StaticConfig {
    pub server: ServerConfig,
    pub device: DeviceSection,
    pub serial: SerialConfig,
    pub snmp: SnmpConfig,
}

impl StaticConfig {
    /// Parse StaticConfig from TOML string.
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Serialize StaticConfig to TOML string.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_static_config() {
        let config = StaticConfig::default();
        assert_eq!(config.server.port, 3010);
        assert_eq!(config.device.kind, DeviceKind::Udin);
        assert_eq!(config.snmp.relays, 16);
        assert_eq!(config.snmp.community, "private");
    }

    #[test]
    fn test_static_config_serialization() {
        let toml_str = StaticConfig::default().to_toml().unwrap();

        assert!(toml_str.contains("[server]"));
        assert!(toml_str.contains("[device]"));
        assert!(toml_str.contains("[serial]"));
        assert!(toml_str.contains("[snmp]"));
        assert!(toml_str.contains("kind = \"udin\""));
    }

    #[test]
    fn test_static_config_deserialization() {
        let toml_str = r#"
            [server]
            bind = "0.0.0.0"
            port = 8080

            [device]
            kind = "daenet"
            debug_wire = true

            [snmp]
            peer = "10.0.0.7:1161"
            community = "relays"
            relays = 12
        "#;

        let config = StaticConfig::from_toml(toml_str).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.device.kind, DeviceKind::Daenet);
        assert!(config.device.debug_wire);
        assert_eq!(config.snmp.peer, "10.0.0.7:1161");
        assert_eq!(config.snmp.relays, 12);
        // Untouched section keeps defaults
        assert_eq!(config.serial.path, "/dev/ttyUSB0");
    }

    #[test]
    fn test_partial_section_fills_defaults() {
        let toml_str = r#"
            [serial]
            path = "/dev/ttyACM3"
        "#;

        let config = StaticConfig::from_toml(toml_str).unwrap();
        assert_eq!(config.serial.path, "/dev/ttyACM3");
        assert!(!config.serial.reset_on_start);
        assert_eq!(config.server.port, 3010);
    }

    #[test]
    fn test_line_and_deadline_settings_are_not_configurable() {
        let toml_str = r#"
            [serial]
            baud_rate = 115200

            [snmp]
            timeout_ms = 0
        "#;

        let config = StaticConfig::from_toml(toml_str).unwrap();
        let serialized = config.to_toml().unwrap();
        assert!(!serialized.contains("baud_rate"));
        assert!(!serialized.contains("timeout_ms"));
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let toml_str = r#"
            [device]
            kind = "modbus"
        "#;
        assert!(StaticConfig::from_toml(toml_str).is_err());
    }
}
