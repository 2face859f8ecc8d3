//! Relay state types shared by drivers, daemon and API models

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Switch position of a single relay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RelayState {
    /// Relay open
    #[default]
    Off,
    /// Relay closed
    On,
}

impl RelayState {
    /// Interpret the first byte written to a relay file.
    ///
    /// Only ASCII `'1'` switches the relay on; every other byte means off.
    pub fn from_byte(byte: u8) -> Self {
        if byte == b'1' {
            RelayState::On
        } else {
            RelayState::Off
        }
    }

    /// ASCII representation used by relay files (`'0'` or `'1'`)
    pub fn as_byte(self) -> u8 {
        match self {
            RelayState::Off => b'0',
            RelayState::On => b'1',
        }
    }

    pub fn is_on(self) -> bool {
        self == RelayState::On
    }
}

impl From<bool> for RelayState {
    fn from(on: bool) -> Self {
        if on {
            RelayState::On
        } else {
            RelayState::Off
        }
    }
}

impl std::fmt::Display for RelayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelayState::Off => f.write_str("off"),
            RelayState::On => f.write_str("on"),
        }
    }
}

/// Result of reading one relay: its state and when it last changed
///
/// Remote devices cannot tell when a relay last switched, so drivers without a
/// cache report the time of the read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayReading {
    pub state: RelayState,
    pub modified: SystemTime,
}

impl RelayReading {
    /// Reading stamped with the current wall-clock time
    pub fn now(state: RelayState) -> Self {
        Self {
            state,
            modified: SystemTime::now(),
        }
    }

    /// Modification time as whole seconds since the Unix epoch
    pub fn modified_secs(&self) -> u64 {
        unix_secs(self.modified)
    }
}

/// Convert a timestamp to whole seconds since the Unix epoch (0 if earlier)
pub fn unix_secs(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
