//! Channel address table
//!
//! Maps a 0-based relay channel to the address the transport understands:
//! an SNMP object identifier for DAEnetIP2, a single command digit for UDIN.
//! Out-of-range channels are rejected here and never reach a transport.

use crate::{RelayError, Result};
use std::fmt;
use std::str::FromStr;

/// Vendor MIB prefix for DAEnetIP2 relay outputs (enterprise 19865)
pub const DAENET_RELAY_PREFIX: [u32; 9] = [1, 3, 6, 1, 4, 1, 19865, 1, 2];

/// Relays per bank in the DAEnetIP2 MIB layout
pub const RELAYS_PER_BANK: usize = 8;

/// Reject a channel outside `0..count`
pub fn validate_channel(channel: usize, count: usize) -> Result<()> {
    if channel >= count {
        return Err(RelayError::InvalidChannel { channel, count });
    }
    Ok(())
}

/// SNMP object identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Oid(Vec<u32>);

impl Oid {
    pub fn new(arcs: Vec<u32>) -> Result<Self> {
        if arcs.len() < 2 {
            return Err(RelayError::InvalidInput(format!(
                "OID needs at least two arcs, got {}",
                arcs.len()
            )));
        }
        if arcs[0] > 2 || (arcs[0] < 2 && arcs[1] >= 40) {
            return Err(RelayError::InvalidInput(format!(
                "Invalid leading OID arcs: {}.{}",
                arcs[0], arcs[1]
            )));
        }
        Ok(Self(arcs))
    }

    pub fn arcs(&self) -> &[u32] {
        &self.0
    }
}

impl fmt::Display for Oid {
    /// Dotted notation without a leading dot: `1.3.6.1.4.1.19865.1.2.1.1.0`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, arc) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", arc)?;
        }
        Ok(())
    }
}

impl FromStr for Oid {
    type Err = RelayError;

    /// Parse dotted notation, with or without a leading dot
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.strip_prefix('.').unwrap_or(s);
        let arcs = trimmed
            .split('.')
            .map(|arc| {
                arc.parse::<u32>()
                    .map_err(|e| RelayError::Parse(format!("Invalid OID arc '{}' in {}: {}", arc, s, e)))
            })
            .collect::<Result<Vec<u32>>>()?;
        Oid::new(arcs)
    }
}

/// OID of the DAEnetIP2 relay output for a 0-based channel.
///
/// `bank = channel / 8 + 1`, `offset = channel % 8 + 1`, followed by the
/// scalar instance `.0`.
///
/// ```
/// use relaybank_core::address::daenet_relay_oid;
///
/// assert_eq!(daenet_relay_oid(0).to_string(), "1.3.6.1.4.1.19865.1.2.1.1.0");
/// assert_eq!(daenet_relay_oid(8).to_string(), "1.3.6.1.4.1.19865.1.2.2.1.0");
/// ```
pub fn daenet_relay_oid(channel: usize) -> Oid {
    let bank = (channel / RELAYS_PER_BANK + 1) as u32;
    let offset = (channel % RELAYS_PER_BANK + 1) as u32;
    let mut arcs = DAENET_RELAY_PREFIX.to_vec();
    arcs.extend_from_slice(&[bank, offset, 0]);
    Oid(arcs)
}

/// Precomputed OIDs for the configured DAEnetIP2 channels
///
/// Built once at startup and read-only afterwards.
#[derive(Debug, Clone)]
pub struct AddressTable {
    oids: Vec<Oid>,
}

impl AddressTable {
    pub fn new(relay_count: usize) -> Self {
        Self {
            oids: (0..relay_count).map(daenet_relay_oid).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.oids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.oids.is_empty()
    }

    /// Address for a channel, or `InvalidChannel` when out of range
    pub fn get(&self, channel: usize) -> Result<&Oid> {
        validate_channel(channel, self.oids.len())?;
        Ok(&self.oids[channel])
    }
}

/// Wire digit for a UDIN relay: channel `i` is addressed as `i + 1`.
pub fn udin_relay_digit(channel: usize, count: usize) -> Result<char> {
    validate_channel(channel, count)?;
    char::from_digit((channel + 1) as u32, 10).ok_or(RelayError::InvalidChannel { channel, count })
}
