//! UDIN Controller - relay control over the UDIN ASCII protocol
//!
//! Every command is echoed by the board before any response line. Relay
//! state is cached: the board has no single-relay query, so reads never
//! touch the wire and every switch is followed by an aggregate `s0` query
//! that must agree with the cache.

use crate::relay_bank::RelayBank;
use crate::serial_driver::{is_disconnect_error, SerialTransport};
use async_trait::async_trait;
use relaybank_core::{
    identify_model, udin_relay_digit, DeviceConfig, DeviceKind, DeviceModel, RelayError,
    RelayReading, RelayState, Result, UdinSerial,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;
use std::time::SystemTime;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Commands supported by UDIN boards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `?` - report the identity string
    Identify,
    /// `s0` - report all relay states as a decimal bitmask
    QueryState,
    /// `n<d>` - switch relay `d` on
    SwitchOn(char),
    /// `f<d>` - switch relay `d` off
    SwitchOff(char),
    /// `r0` - switch every relay off
    ResetAll,
}

impl Command {
    /// Wire token, without the trailing CR
    pub fn token(&self) -> String {
        match self {
            Command::Identify => "?".to_string(),
            Command::QueryState => "s0".to_string(),
            Command::SwitchOn(digit) => format!("n{}", digit),
            Command::SwitchOff(digit) => format!("f{}", digit),
            Command::ResetAll => "r0".to_string(),
        }
    }

    /// Whether a response line follows the echo
    pub fn has_response(&self) -> bool {
        matches!(self, Command::Identify | Command::QueryState)
    }
}

/// Build the switch command for a 0-based channel
pub fn switch_command(channel: usize, relay_count: usize, state: RelayState) -> Result<Command> {
    let digit = udin_relay_digit(channel, relay_count)?;
    Ok(match state {
        RelayState::On => Command::SwitchOn(digit),
        RelayState::Off => Command::SwitchOff(digit),
    })
}

/// Decode an `s0` response: bit `k` set means relay `k + 1` is on
pub fn parse_aggregate_state(line: &str) -> Result<u32> {
    line.trim()
        .parse::<u32>()
        .map_err(|e| RelayError::Parse(format!("Invalid relay state response {:?}: {}", line, e)))
}

/// Opens a fresh transport for identification and reinitialization
pub type TransportFactory<T> = Box<dyn Fn() -> Result<Box<T>> + Send + Sync>;

#[derive(Debug, Clone, Copy)]
struct RelayCell {
    state: RelayState,
    modified: SystemTime,
}

/// Everything guarded by the device lock: the port and the relay cache
struct Session<T: SerialTransport + ?Sized> {
    transport: Option<Box<T>>,
    cells: [RelayCell; UdinSerial::MAX_RELAYS],
}

impl<T: SerialTransport + ?Sized> Session<T> {
    fn empty() -> Self {
        let now = SystemTime::now();
        Self {
            transport: None,
            cells: [RelayCell {
                state: RelayState::Off,
                modified: now,
            }; UdinSerial::MAX_RELAYS],
        }
    }

    fn close(&mut self) {
        if let Some(transport) = self.transport.take() {
            info!(
                "Closing serial port {}",
                transport.port_path().unwrap_or("<unknown>")
            );
        }
    }

    /// One synchronous exchange: command, echo check, optional response line
    async fn exchange(&mut self, command: Command) -> Result<Option<String>> {
        let transport = self.transport.as_mut().ok_or(RelayError::DeviceNotFound)?;
        let token = command.token();

        debug!("Sending command: {:?} ({})", command, token);

        transport.clear_input_buffer()?;
        transport.send_line(&token).await?;

        let echo = transport.read_line().await?;
        if echo != token {
            error!(
                "UDIN device failed to echo command ({:?} != {:?})",
                echo, token
            );
            return Err(RelayError::Protocol(format!(
                "Device failed to echo command {:?}, got {:?}",
                token, echo
            )));
        }

        if !command.has_response() {
            return Ok(None);
        }

        let response = transport.read_line().await.map_err(|e| {
            error!("Failed to get response for command {}: {}", token, e);
            e
        })?;
        debug!("Response: {:?}", response);
        Ok(Some(response))
    }

    async fn query(&mut self, command: Command) -> Result<String> {
        self.exchange(command).await?.ok_or_else(|| {
            RelayError::Protocol(format!("Command {:?} produced no response", command))
        })
    }

    async fn query_state(&mut self) -> Result<u32> {
        let line = self.query(Command::QueryState).await?;
        parse_aggregate_state(&line)
    }

    fn seed(&mut self, mask: u32, modified: SystemTime) {
        for (i, cell) in self.cells.iter_mut().enumerate() {
            *cell = RelayCell {
                state: RelayState::from(mask & (1 << i) != 0),
                modified,
            };
        }
    }
}

/// UDIN relay board controller
///
/// Generic over the transport type, allowing real hardware (`SerialDriver`)
/// or mock transports for testing. All device traffic and every cache
/// update happen under one lock; the visible relay count is published
/// separately so `relay_count()` never waits on the device.
pub struct UdinController<T: SerialTransport + ?Sized = dyn SerialTransport> {
    session: Mutex<Session<T>>,
    relay_count: AtomicUsize,
    model: RwLock<Option<&'static DeviceModel>>,
    factory: TransportFactory<T>,
}

impl<T: SerialTransport + ?Sized> UdinController<T> {
    /// Create a controller with no device attached yet
    ///
    /// Nothing is opened until [`initialize`](Self::initialize) runs.
    pub fn new(factory: TransportFactory<T>) -> Self {
        Self {
            session: Mutex::new(Session::empty()),
            relay_count: AtomicUsize::new(0),
            model: RwLock::new(None),
            factory,
        }
    }

    /// Number of relays currently exposed
    pub fn relay_count(&self) -> usize {
        self.relay_count.load(Ordering::SeqCst)
    }

    /// Identified model, if any
    pub fn model(&self) -> Option<&'static DeviceModel> {
        self.model.read().ok().and_then(|guard| *guard)
    }

    fn set_model(&self, model: Option<&'static DeviceModel>) {
        if let Ok(mut guard) = self.model.write() {
            *guard = model;
        }
    }

    /// Open the port, identify the board and seed the cache from `s0`
    ///
    /// A port that cannot be opened is an error. A board that answers with an
    /// unknown identity is closed again and leaves the controller with zero
    /// relays (`UnsupportedDevice`). Runs under the device lock, so it never
    /// interleaves with relay operations.
    pub async fn initialize(&self) -> Result<usize> {
        let mut session = self.session.lock().await;

        self.relay_count.store(0, Ordering::SeqCst);
        self.set_model(None);
        session.close();
        session.seed(0, SystemTime::now());

        let transport = (self.factory)()?;
        let port_path = transport.port_path().unwrap_or("<unknown>").to_string();
        session.transport = Some(transport);

        let identity = match session.query(Command::Identify).await {
            Ok(identity) => identity,
            Err(e) => {
                error!("Failed to identify device on {}: {}", port_path, e);
                session.close();
                return Err(e);
            }
        };

        let Some(model) = identify_model(&identity) else {
            warn!("No UDIN device found on {} (identity {:?})", port_path, identity);
            session.close();
            return Err(RelayError::UnsupportedDevice(identity));
        };

        let mask = match session.query_state().await {
            Ok(mask) => mask,
            Err(e) => {
                error!("Failed to read initial relay state: {}", e);
                session.close();
                return Err(e);
            }
        };

        session.seed(mask, SystemTime::now());
        self.set_model(Some(model));
        self.relay_count.store(model.relay_count, Ordering::SeqCst);

        info!(
            "Device found: {} on {} ({} relays, state mask {:#04x})",
            model.identity, port_path, model.relay_count, mask
        );
        Ok(model.relay_count)
    }

    /// Cached state of a relay. Never touches the wire.
    pub async fn get_relay(&self, channel: usize) -> Result<RelayReading> {
        let session = self.session.lock().await;
        udin_relay_digit(channel, self.relay_count())?;

        let cell = session.cells[channel];
        Ok(RelayReading {
            state: cell.state,
            modified: cell.modified,
        })
    }

    /// Switch a relay and verify the board agrees afterwards
    ///
    /// A request matching the cached state sends nothing. A divergence found
    /// by the verification read is not reported as an error here; it hides
    /// every relay instead. When the switch exchange itself fails the board
    /// may still have acted, so the state is checked against the unchanged
    /// cache before the error is returned.
    pub async fn set_relay(&self, channel: usize, state: RelayState) -> Result<()> {
        let mut session = self.session.lock().await;
        let command = switch_command(channel, self.relay_count(), state)?;

        if session.cells[channel].state == state {
            debug!("Relay {} already {}", channel + 1, state);
            return Ok(());
        }

        if let Err(e) = session.exchange(command).await {
            self.recheck(&mut session, &e).await;
            return Err(e);
        }

        session.cells[channel] = RelayCell {
            state,
            modified: SystemTime::now(),
        };
        debug!("Relay {} switched {}", channel + 1, state);

        self.verify(&mut session).await
    }

    /// Switch every relay off with `r0`, then verify
    pub async fn reset_all(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        if self.relay_count() == 0 {
            return Err(RelayError::DeviceNotFound);
        }

        if let Err(e) = session.exchange(Command::ResetAll).await {
            self.recheck(&mut session, &e).await;
            return Err(e);
        }

        session.seed(0, SystemTime::now());
        info!("All relays switched off");

        self.verify(&mut session).await
    }

    /// Close the port and hide every relay
    pub async fn close(&self) {
        let mut session = self.session.lock().await;
        session.close();
        self.relay_count.store(0, Ordering::SeqCst);
    }

    /// Compare the cache against a fresh `s0` read; collapse on mismatch
    ///
    /// A state that cannot be read cannot be trusted either, so a failed read
    /// also hides every relay.
    async fn verify(&self, session: &mut Session<T>) -> Result<()> {
        let mask = match session.query_state().await {
            Ok(mask) => mask,
            Err(e) => {
                error!("Failed to read relay state for verification: {}", e);
                self.handle_failure(session, &e);
                if self.relay_count.swap(0, Ordering::SeqCst) != 0 {
                    warn!("Relay state unknown; hiding all relays until reinitialized");
                }
                return Err(e);
            }
        };

        let count = self.relay_count();
        let mut consistent = true;
        for (i, cell) in session.cells[..count].iter().enumerate() {
            let reported = RelayState::from(mask & (1 << i) != 0);
            if reported != cell.state {
                error!(
                    "Relay {} has inconsistent state (expected {}, device reports {})",
                    i + 1,
                    cell.state,
                    reported
                );
                consistent = false;
            }
        }

        if !consistent {
            warn!("Relay state diverged from device; hiding all relays until reinitialized");
            self.relay_count.store(0, Ordering::SeqCst);
        }

        Ok(())
    }

    /// After a failed command, find out whether the board acted anyway
    async fn recheck(&self, session: &mut Session<T>, err: &RelayError) {
        if is_disconnect_error(err) {
            self.handle_failure(session, err);
            return;
        }

        warn!("Command failed ({}); checking relay state", err);
        // verify logs and collapses on its own
        let _ = self.verify(session).await;
    }

    /// A lost device takes the relays with it; anything else is left alone
    fn handle_failure(&self, session: &mut Session<T>, err: &RelayError) {
        if is_disconnect_error(err) {
            error!("Serial device lost: {}", err);
            session.close();
            self.relay_count.store(0, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl<T: SerialTransport + ?Sized + 'static> RelayBank for UdinController<T> {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Udin
    }

    fn model(&self) -> String {
        match UdinController::model(self) {
            Some(model) => model.identity.to_string(),
            None => format!("{} (not identified)", UdinSerial::NAME),
        }
    }

    fn relay_count(&self) -> usize {
        UdinController::relay_count(self)
    }

    async fn read_relay(&self, channel: usize) -> Result<RelayReading> {
        self.get_relay(channel).await
    }

    async fn write_relay(&self, channel: usize, state: RelayState) -> Result<()> {
        self.set_relay(channel, state).await
    }

    async fn reset_all(&self) -> Result<()> {
        UdinController::reset_all(self).await
    }

    async fn reinitialize(&self) -> Result<usize> {
        self.initialize().await
    }

    async fn close(&self) {
        UdinController::close(self).await
    }
}
