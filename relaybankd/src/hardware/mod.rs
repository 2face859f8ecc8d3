//! Device setup for the daemon
//!
//! Builds the single `RelayBank` the daemon serves from the effective
//! configuration: a real UDIN board or DAEnetIP2 agent, or a simulated one
//! in mock mode.

pub use relaybank_hardware::{
    DaenetController, RelayBank, SerialDriver, SerialTransport, SnmpTransport, UdinController,
    UdpSnmpSession,
};

/// Device connection utilities
pub(crate) mod connection {
    use super::*;
    use relaybank_core::{
        DaenetIp2, DeviceConfig, DeviceKind, RelayError, Result, StaticConfig, UdinSerial,
    };
    use relaybank_hardware::mock::{MockDaenetBoard, MockUdinBoard};
    use relaybank_hardware::udin_controller::TransportFactory;
    use std::sync::Arc;
    use std::time::Duration;
    use tracing::{error, info, warn};

    /// Whether a startup failure should stop the daemon
    ///
    /// A transport that cannot be opened is fatal. A board that is present
    /// but does not identify is served with zero relays and can be brought
    /// back with a reinitialize request.
    pub fn is_fatal_startup_error(err: &RelayError) -> bool {
        matches!(
            err,
            RelayError::Serial(_)
                | RelayError::Snmp(_)
                | RelayError::Io(_)
                | RelayError::DeviceDisconnected(_)
                | RelayError::Config(_)
        )
    }

    fn serial_factory(path: String, debug_wire: bool) -> TransportFactory<dyn SerialTransport> {
        Box::new(move || {
            let driver = SerialDriver::open(&path, debug_wire)?;
            Ok(Box::new(driver) as Box<dyn SerialTransport>)
        })
    }

    fn mock_serial_factory(board: MockUdinBoard) -> TransportFactory<dyn SerialTransport> {
        Box::new(move || Ok(board.connect() as Box<dyn SerialTransport>))
    }

    /// Open the configured device
    ///
    /// Returns an error only for failures that should stop the daemon.
    pub async fn connect_device(config: &StaticConfig, mock: bool) -> Result<Arc<dyn RelayBank>> {
        let debug_wire = config.device.debug_wire;

        match config.device.kind {
            DeviceKind::Udin => {
                let factory = if mock {
                    info!("Mock mode: simulating a UDIN-8R board");
                    mock_serial_factory(MockUdinBoard::udin_8r())
                } else {
                    info!(
                        "Connecting to UDIN board at {} ({} baud)...",
                        config.serial.path,
                        UdinSerial::BAUD_RATE
                    );
                    serial_factory(config.serial.path.clone(), debug_wire)
                };

                let controller: UdinController = UdinController::new(factory);
                match controller.initialize().await {
                    Ok(count) => {
                        info!("UDIN board ready with {} relays", count);
                        if config.serial.reset_on_start {
                            match controller.reset_all().await {
                                Ok(()) => info!("Relays reset on start"),
                                Err(e) => warn!("Failed to reset relays on start: {}", e),
                            }
                        }
                    }
                    Err(e) if is_fatal_startup_error(&e) => {
                        error!("Failed to open UDIN board: {}", e);
                        return Err(e);
                    }
                    Err(e) => {
                        warn!("UDIN board not identified ({}); serving zero relays", e);
                    }
                }
                Ok(Arc::new(controller))
            }
            DeviceKind::Daenet => {
                let session: Box<dyn SnmpTransport> = if mock {
                    info!("Mock mode: simulating a DAEnetIP2 agent");
                    MockDaenetBoard::new().session()
                } else {
                    info!("Connecting to DAEnetIP2 at {}...", config.snmp.peer);
                    let session = UdpSnmpSession::open(
                        &config.snmp.peer,
                        &config.snmp.community,
                        Duration::from_millis(DaenetIp2::DEFAULT_TIMEOUT_MS),
                        debug_wire,
                    )
                    .await
                    .map_err(|e| {
                        error!("Failed to open SNMP session: {}", e);
                        e
                    })?;
                    Box::new(session)
                };

                let controller: DaenetController =
                    DaenetController::new(session, config.snmp.relays);
                Ok(Arc::new(controller))
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_startup_error_classification() {
            assert!(is_fatal_startup_error(&RelayError::Serial(
                "Failed to open serial port".into()
            )));
            assert!(is_fatal_startup_error(&RelayError::Snmp("bind".into())));
            assert!(!is_fatal_startup_error(&RelayError::UnsupportedDevice(
                "UDIN-4R".into()
            )));
            assert!(!is_fatal_startup_error(&RelayError::Timeout("?".into())));
            assert!(!is_fatal_startup_error(&RelayError::Protocol("echo".into())));
        }

        #[tokio::test]
        async fn test_connect_mock_udin() {
            let config = StaticConfig::default();
            let bank = connect_device(&config, true).await.unwrap();

            assert_eq!(bank.kind(), DeviceKind::Udin);
            assert_eq!(bank.relay_count(), 8);
            assert_eq!(bank.model(), "UDIN-8R 8 x Relay V1.0");
        }

        #[tokio::test]
        async fn test_connect_mock_daenet_clamps_relays() {
            let mut config = StaticConfig::default();
            config.device.kind = DeviceKind::Daenet;
            config.snmp.relays = 20;

            let bank = connect_device(&config, true).await.unwrap();
            assert_eq!(bank.kind(), DeviceKind::Daenet);
            assert_eq!(bank.relay_count(), 16);
        }

        #[tokio::test]
        async fn test_missing_serial_port_is_fatal() {
            let mut config = StaticConfig::default();
            config.serial.path = "/dev/relaybank-does-not-exist".to_string();

            let err = connect_device(&config, false).await.err().unwrap();
            assert!(is_fatal_startup_error(&err));
        }
    }
}
