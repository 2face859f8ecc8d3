//! relaybank-hardware
//!
//! Device drivers for the supported relay boards: the UDIN serial protocol
//! and DAEnetIP2 over SNMPv1. Both sit behind the `RelayBank` trait that the
//! daemon consumes.
//
//! Public API:
//! - `udin_controller::UdinController`: cached, self-verifying UDIN driver
//! - `daenet_controller::DaenetController`: live SNMP driver
//! - `serial_driver::SerialDriver`: low-level serial line I/O
//! - `snmp_session::UdpSnmpSession`: SNMPv1 request/response over UDP
//! - `mock`: simulated boards for tests and `--mock` mode

pub mod daenet_controller;
pub mod mock;
pub mod relay_bank;
pub mod serial_driver;
pub mod snmp_codec;
pub mod snmp_session;
pub mod udin_controller;

pub use daenet_controller::DaenetController;
pub use relay_bank::RelayBank;
pub use serial_driver::{SerialDriver, SerialTransport};
pub use snmp_session::{SnmpTransport, UdpSnmpSession};
pub use udin_controller::UdinController;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn controllers_are_relay_banks() {
        let board = mock::MockDaenetBoard::new();
        let bank: Arc<dyn RelayBank> = Arc::new(DaenetController::new(board.session(), 8));
        assert_eq!(bank.relay_count(), 8);

        let udin: Arc<dyn RelayBank> = Arc::new(UdinController::new(Box::new(|| {
            Ok(mock::MockUdinBoard::udin_8r().connect())
        })));
        assert_eq!(udin.relay_count(), 0);
    }
}
