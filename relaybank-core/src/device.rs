//! Device definitions and the supported-model table
//!
//! Each hardware family implements the `DeviceConfig` trait with its fixed
//! characteristics. Serial devices additionally identify themselves with a
//! verbatim string, which is looked up in [`UDIN_MODELS`] to learn how many
//! relays the attached board really has.
//!
//! Note: Actual hardware I/O is in the `relaybank-hardware` crate. This module
//! only contains device specifications.

use serde::{Deserialize, Serialize};

/// Hardware family configuration trait
///
/// # Example
///
/// ```
/// use relaybank_core::device::{DeviceConfig, UdinSerial};
///
/// const MAX: usize = UdinSerial::MAX_RELAYS;
/// assert_eq!(MAX, 8);
/// ```
pub trait DeviceConfig: Send + Sync + 'static {
    /// Human-readable family name
    const NAME: &'static str;

    /// Upper bound on relay channels for this family
    const MAX_RELAYS: usize;

    /// Upper bound on one request/response exchange in milliseconds
    const DEFAULT_TIMEOUT_MS: u64;
}

/// UDIN USB relay boards driven over a serial line
///
/// - 9600 baud, 8 data bits, no parity, one stop bit, no flow control
/// - Relays addressed by a single decimal digit, so at most 8 on the wire
pub struct UdinSerial;

impl UdinSerial {
    /// Serial line speed
    pub const BAUD_RATE: u32 = 9600;
}

impl DeviceConfig for UdinSerial {
    const NAME: &'static str = "UDIN serial relay board";
    const MAX_RELAYS: usize = 8;
    const DEFAULT_TIMEOUT_MS: u64 = 1000;
}

/// Denkovi DAEnetIP2 network relay controller driven over SNMPv1
pub struct DaenetIp2;

impl DaenetIp2 {
    /// Default SNMP agent port
    pub const SNMP_PORT: u16 = 161;
}

impl DeviceConfig for DaenetIp2 {
    const NAME: &'static str = "Denkovi DAEnetIP2";
    const MAX_RELAYS: usize = 16;
    const DEFAULT_TIMEOUT_MS: u64 = 1000;
}

/// A serial model the daemon knows how to drive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceModel {
    /// Identity string the device returns for the `?` command, matched verbatim
    pub identity: &'static str,
    /// Number of relays on this model
    pub relay_count: usize,
}

/// Supported serial models. Extend by adding entries.
pub const UDIN_MODELS: &[DeviceModel] = &[DeviceModel {
    identity: "UDIN-8R 8 x Relay V1.0",
    relay_count: 8,
}];

/// Look up a device identity string in [`UDIN_MODELS`].
///
/// Comparison is exact: no trimming, no case folding.
///
/// ```
/// use relaybank_core::device::identify_model;
///
/// assert_eq!(identify_model("UDIN-8R 8 x Relay V1.0").map(|m| m.relay_count), Some(8));
/// assert!(identify_model("udin-8r 8 x relay v1.0").is_none());
/// ```
pub fn identify_model(identity: &str) -> Option<&'static DeviceModel> {
    UDIN_MODELS.iter().find(|model| model.identity == identity)
}

/// Runtime device family selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// Serial UDIN board
    #[default]
    Udin,
    /// Networked DAEnetIP2 controller
    Daenet,
}

impl std::str::FromStr for DeviceKind {
    type Err = crate::RelayError;

    /// Parse device kind from string (for CLI --kind flag)
    ///
    /// ```
    /// use std::str::FromStr;
    /// use relaybank_core::device::DeviceKind;
    ///
    /// assert_eq!(DeviceKind::from_str("serial").unwrap(), DeviceKind::Udin);
    /// assert_eq!(DeviceKind::from_str("snmp").unwrap(), DeviceKind::Daenet);
    /// assert!(DeviceKind::from_str("modbus").is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "udin" | "serial" => Ok(DeviceKind::Udin),
            "daenet" | "daenetip2" | "snmp" => Ok(DeviceKind::Daenet),
            _ => Err(crate::RelayError::InvalidInput(format!(
                "Unknown device kind: '{}'. Valid options: udin, daenet",
                s
            ))),
        }
    }
}

impl DeviceKind {
    /// Get human-readable family name
    pub fn name(&self) -> &'static str {
        match self {
            DeviceKind::Udin => UdinSerial::NAME,
            DeviceKind::Daenet => DaenetIp2::NAME,
        }
    }

    /// Get the channel bound for this family
    pub fn max_relays(&self) -> usize {
        match self {
            DeviceKind::Udin => UdinSerial::MAX_RELAYS,
            DeviceKind::Daenet => DaenetIp2::MAX_RELAYS,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceKind::Udin => "udin",
            DeviceKind::Daenet => "daenet",
        }
    }
}
