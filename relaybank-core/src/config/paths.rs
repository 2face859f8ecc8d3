//! Default path resolution for the configuration file
//!
//! Uses the XDG config directory when available, with a system-wide fallback.

use std::path::PathBuf;

/// Returns the default path for the static configuration file.
///
/// - Linux/macOS: `~/.config/relaybank/config.toml`
/// - Fallback: `/etc/relaybank/config.toml`
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("/etc"))
        .join("relaybank")
        .join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_path_is_toml() {
        let path = default_config_path();
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("toml"));
        assert!(path.ends_with("relaybank/config.toml"));
    }
}
