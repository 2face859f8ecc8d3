//! Relay channels presented as one-byte files
//!
//! Channel `i` is the file `r{i+1}`. Reading yields `'0'` or `'1'`; writing
//! switches the relay on when the first byte is `'1'` and off otherwise.

use crate::hardware::RelayBank;
use relaybank_core::api::RelayEntry;
use relaybank_core::{unix_secs, DeviceKind, RelayState, Result};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, warn};

/// File name for a 0-based channel
pub(crate) fn relay_name(channel: usize) -> String {
    format!("r{}", channel + 1)
}

/// Channel for a file name, or `None` if the name is not `r1..r{count}`
///
/// Leading zeros, signs and anything after the digits are rejected.
pub(crate) fn parse_relay_name(name: &str, count: usize) -> Option<usize> {
    let digits = name.strip_prefix('r')?;
    if digits.is_empty() || digits.starts_with('0') || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let number: usize = digits.parse().ok()?;
    (1..=count).contains(&number).then(|| number - 1)
}

pub(crate) struct RelayFiles {
    bank: Arc<dyn RelayBank>,
    started_at: SystemTime,
}

impl RelayFiles {
    pub fn new(bank: Arc<dyn RelayBank>) -> Self {
        Self {
            bank,
            started_at: SystemTime::now(),
        }
    }

    pub fn bank(&self) -> &Arc<dyn RelayBank> {
        &self.bank
    }

    pub fn count(&self) -> usize {
        self.bank.relay_count()
    }

    pub fn started_at(&self) -> SystemTime {
        self.started_at
    }

    pub fn lookup(&self, name: &str) -> Option<usize> {
        parse_relay_name(name, self.count())
    }

    pub async fn read(&self, channel: usize) -> Result<u8> {
        let reading = self.bank.read_relay(channel).await?;
        Ok(reading.state.as_byte())
    }

    /// Write `data` at `offset`; returns the number of bytes accepted
    ///
    /// Empty writes and writes past the first byte change nothing. A failed
    /// DAEnetIP2 set is logged and still reported as written.
    pub async fn write(&self, channel: usize, data: &[u8], offset: u64) -> Result<usize> {
        let Some(&first) = data.first() else {
            return Ok(0);
        };
        if offset != 0 {
            debug!("Ignoring write to {} at offset {}", relay_name(channel), offset);
            return Ok(0);
        }

        let state = RelayState::from_byte(first);
        match self.bank.write_relay(channel, state).await {
            Ok(()) => Ok(data.len()),
            Err(e) if self.bank.kind() == DeviceKind::Daenet && e.is_io_class() => {
                warn!("Failed to switch {} {}: {}", relay_name(channel), state, e);
                Ok(data.len())
            }
            Err(e) => Err(e),
        }
    }

    /// Directory listing with per-file attributes
    ///
    /// A relay that cannot be read is still listed, with no state and the
    /// service start time as its modification time.
    pub async fn entries(&self) -> Vec<RelayEntry> {
        let mut entries = Vec::with_capacity(self.count());
        for channel in 0..self.count() {
            let (state, modified) = match self.bank.read_relay(channel).await {
                Ok(reading) => (Some(reading.state), reading.modified),
                Err(e) => {
                    warn!("Failed to read {}: {}", relay_name(channel), e);
                    (None, self.started_at)
                }
            };
            entries.push(RelayEntry {
                name: relay_name(channel),
                channel,
                state,
                modified: unix_secs(modified),
                size: 1,
            });
        }
        entries
    }
}
