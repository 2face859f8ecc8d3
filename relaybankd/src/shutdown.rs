//! Shutdown handling for graceful daemon termination

use crate::hardware::RelayBank;
use std::sync::Arc;
use tracing::info;

/// Close the device session before the daemon exits
///
/// Relays keep whatever state they were last switched to; only the port or
/// socket is released.
pub async fn close_device(bank: &Arc<dyn RelayBank>) {
    info!("Closing {} session...", bank.kind().name());
    bank.close().await;
    info!("Device session closed");
}
