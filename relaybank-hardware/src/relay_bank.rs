//! Common contract for every relay controller
//!
//! Both drivers expose the same three operations: read a channel, switch a
//! channel, and report how many channels are currently visible. The daemon
//! only ever talks to a `dyn RelayBank`.

use async_trait::async_trait;
use relaybank_core::{DeviceKind, RelayReading, RelayState, Result};

#[async_trait]
pub trait RelayBank: Send + Sync {
    /// Device family behind this bank
    fn kind(&self) -> DeviceKind;

    /// Model name (serial) or peer address (SNMP), for logs and the info endpoint
    fn model(&self) -> String;

    /// Number of visible relays. Zero means the device is unusable.
    fn relay_count(&self) -> usize;

    /// Current state of a channel
    async fn read_relay(&self, channel: usize) -> Result<RelayReading>;

    /// Switch a channel on or off
    async fn write_relay(&self, channel: usize, state: RelayState) -> Result<()>;

    /// Switch every relay off, where the device supports it
    async fn reset_all(&self) -> Result<()>;

    /// Re-run device setup. Returns the relay count afterwards.
    async fn reinitialize(&self) -> Result<usize>;

    /// Close the transport session
    async fn close(&self);
}
