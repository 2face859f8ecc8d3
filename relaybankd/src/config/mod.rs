//! Configuration loading for the daemon
//!
//! The static TOML file is read once at startup, then command-line flags are
//! layered on top. Nothing is written back.

use relaybank_core::{DeviceKind, RelayError, Result, StaticConfig};
use std::path::Path;
use tokio::fs;
use tracing::{debug, info};

/// Load the static configuration, falling back to defaults when the file is absent
pub(crate) async fn load_static_config(path: &Path) -> Result<StaticConfig> {
    if !path.exists() {
        info!(
            "Configuration file not found: {}. Using defaults.",
            path.display()
        );
        return Ok(StaticConfig::default());
    }

    let contents = fs::read_to_string(path)
        .await
        .map_err(|e| RelayError::Config(format!("Failed to read {}: {}", path.display(), e)))?;

    let config = StaticConfig::from_toml(&contents)
        .map_err(|e| RelayError::Config(format!("Failed to parse {}: {}", path.display(), e)))?;

    debug!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Command-line values that take precedence over the file
#[derive(Debug, Default, Clone)]
pub(crate) struct Overrides {
    pub kind: Option<DeviceKind>,
    /// Serial path or SNMP peer, depending on the device kind
    pub device: Option<String>,
    pub community: Option<String>,
    pub relays: Option<usize>,
    pub bind: Option<String>,
    pub port: Option<u16>,
    pub debug_wire: bool,
}

impl Overrides {
    pub fn apply(&self, config: &mut StaticConfig) {
        if let Some(kind) = self.kind {
            config.device.kind = kind;
        }
        if let Some(device) = &self.device {
            match config.device.kind {
                DeviceKind::Udin => config.serial.path = device.clone(),
                DeviceKind::Daenet => config.snmp.peer = device.clone(),
            }
        }
        if let Some(community) = &self.community {
            config.snmp.community = community.clone();
        }
        if let Some(relays) = self.relays {
            config.snmp.relays = relays;
        }
        if let Some(bind) = &self.bind {
            config.server.bind = bind.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if self.debug_wire {
            config.device.debug_wire = true;
        }
    }
}

/// Log the effective settings once at startup
pub(crate) fn log_config(config: &StaticConfig) {
    debug!("--- Server Config ---");
    debug!("  Bind: {}:{}", config.server.bind, config.server.port);
    debug!("--- Device Config ---");
    debug!("  Kind: {}", config.device.kind.name());
    debug!("  Wire debug: {}", config.device.debug_wire);
    match config.device.kind {
        DeviceKind::Udin => {
            debug!("  Serial port: {}", config.serial.path);
            debug!("  Reset on start: {}", config.serial.reset_on_start);
        }
        DeviceKind::Daenet => {
            debug!("  Peer: {}", config.snmp.peer);
            debug!("  Relays: {}", config.snmp.relays);
        }
    }
    debug!("--------------------");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = load_static_config(&temp_dir.path().join("config.toml"))
            .await
            .unwrap();

        assert_eq!(config.server.port, 3010);
        assert_eq!(config.device.kind, DeviceKind::Udin);
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[device]\nkind = \"daenet\"\n\n[snmp]\npeer = \"10.1.1.1\"\nrelays = 8\n",
        )
        .unwrap();

        let config = load_static_config(&path).await.unwrap();
        assert_eq!(config.device.kind, DeviceKind::Daenet);
        assert_eq!(config.snmp.peer, "10.1.1.1");
        assert_eq!(config.snmp.relays, 8);
    }

    #[tokio::test]
    async fn test_invalid_file_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[server]\nport = \"not a number\"\n").unwrap();

        let err = load_static_config(&path).await.unwrap_err();
        assert!(matches!(err, RelayError::Config(_)));
    }

    #[test]
    fn test_device_override_follows_kind() {
        let mut config = StaticConfig::default();
        Overrides {
            device: Some("/dev/ttyACM1".to_string()),
            ..Overrides::default()
        }
        .apply(&mut config);
        assert_eq!(config.serial.path, "/dev/ttyACM1");

        let mut config = StaticConfig::default();
        Overrides {
            kind: Some(DeviceKind::Daenet),
            device: Some("relays.lan".to_string()),
            community: Some("secret".to_string()),
            relays: Some(4),
            ..Overrides::default()
        }
        .apply(&mut config);
        assert_eq!(config.snmp.peer, "relays.lan");
        assert_eq!(config.snmp.community, "secret");
        assert_eq!(config.snmp.relays, 4);
        assert_eq!(config.serial.path, "/dev/ttyUSB0");
    }

    #[test]
    fn test_server_overrides() {
        let mut config = StaticConfig::default();
        Overrides {
            bind: Some("0.0.0.0".to_string()),
            port: Some(9000),
            debug_wire: true,
            ..Overrides::default()
        }
        .apply(&mut config);
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.server.port, 9000);
        assert!(config.device.debug_wire);
    }
}
