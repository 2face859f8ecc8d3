//! Simulated relay devices
//!
//! `MockUdinBoard` and `MockDaenetBoard` hold the simulated hardware state
//! and hand out transports attached to it, so a test (or the daemon in
//! `--mock` mode) can drive a controller and inspect or perturb the board
//! from outside.

use crate::serial_driver::SerialTransport;
use crate::snmp_codec::{Pdu, PduType, Value, VarBind};
use crate::snmp_session::SnmpTransport;
use async_trait::async_trait;
use relaybank_core::{daenet_relay_oid, DaenetIp2, DeviceConfig, Oid, RelayError, Result};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// One command/response exchange as seen by a simulated device
#[derive(Debug, Clone)]
pub struct Exchange {
    pub request: String,
    pub started: Instant,
    pub finished: Instant,
}

/// True if any two exchanges overlap in time
pub fn exchanges_overlap(exchanges: &[Exchange]) -> bool {
    let mut sorted: Vec<&Exchange> = exchanges.iter().collect();
    sorted.sort_by_key(|exchange| exchange.started);
    sorted
        .windows(2)
        .any(|pair| pair[1].started < pair[0].finished)
}

fn lock<T>(state: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panicking test thread must not wedge the others
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug)]
struct UdinBoardState {
    identity: String,
    relays: u32,
    /// XORed into every `s0` answer
    state_fault: u32,
    echo_fault: bool,
    silent: bool,
    /// Commands still to be ignored outright
    dropped_commands: usize,
    /// Commands still to be executed without an answer
    lost_replies: usize,
    latency: Duration,
    sent: Vec<String>,
    exchanges: Vec<Exchange>,
}

impl UdinBoardState {
    fn respond(&mut self, token: &str) -> Vec<String> {
        if self.silent {
            return Vec::new();
        }
        if self.dropped_commands > 0 {
            self.dropped_commands -= 1;
            return Vec::new();
        }

        let answer = match token.as_bytes() {
            b"?" => Some(self.identity.clone()),
            b"s0" => Some((self.relays ^ self.state_fault).to_string()),
            b"r0" => {
                self.relays = 0;
                None
            }
            [b'n', digit @ b'1'..=b'9'] => {
                self.relays |= 1 << (digit - b'1');
                None
            }
            [b'f', digit @ b'1'..=b'9'] => {
                self.relays &= !(1 << (digit - b'1'));
                None
            }
            _ => None,
        };

        if self.lost_replies > 0 {
            self.lost_replies -= 1;
            return Vec::new();
        }

        let echo = if self.echo_fault {
            format!("{}?", token)
        } else {
            token.to_string()
        };
        std::iter::once(echo).chain(answer).collect()
    }
}

/// Simulated UDIN board
#[derive(Debug, Clone)]
pub struct MockUdinBoard {
    state: Arc<Mutex<UdinBoardState>>,
}

impl MockUdinBoard {
    pub fn new(identity: &str) -> Self {
        Self {
            state: Arc::new(Mutex::new(UdinBoardState {
                identity: identity.to_string(),
                relays: 0,
                state_fault: 0,
                echo_fault: false,
                silent: false,
                dropped_commands: 0,
                lost_replies: 0,
                latency: Duration::ZERO,
                sent: Vec::new(),
                exchanges: Vec::new(),
            })),
        }
    }

    /// The only board model with a known identity
    pub fn udin_8r() -> Self {
        Self::new("UDIN-8R 8 x Relay V1.0")
    }

    /// Open a new transport to this board
    pub fn connect(&self) -> Box<MockUdinDevice> {
        Box::new(MockUdinDevice {
            board: self.clone(),
            inbox: VecDeque::new(),
            current: None,
        })
    }

    /// Physical relay state, bit `k` for relay `k + 1`
    pub fn relays(&self) -> u32 {
        lock(&self.state).relays
    }

    /// Change relay state behind the controller's back
    pub fn set_relays(&self, mask: u32) {
        lock(&self.state).relays = mask;
    }

    /// Flip these bits in every `s0` answer
    pub fn set_state_fault(&self, mask: u32) {
        lock(&self.state).state_fault = mask;
    }

    /// Echo a corrupted token
    pub fn set_echo_fault(&self, enabled: bool) {
        lock(&self.state).echo_fault = enabled;
    }

    /// Stop answering altogether
    pub fn set_silent(&self, silent: bool) {
        lock(&self.state).silent = silent;
    }

    /// Ignore the next `count` commands entirely
    pub fn drop_commands(&self, count: usize) {
        lock(&self.state).dropped_commands = count;
    }

    /// Execute the next `count` commands but send nothing back
    pub fn drop_replies(&self, count: usize) {
        lock(&self.state).lost_replies = count;
    }

    /// Delay applied after every command
    pub fn set_latency(&self, latency: Duration) {
        lock(&self.state).latency = latency;
    }

    /// Every token received, in order
    pub fn sent_commands(&self) -> Vec<String> {
        lock(&self.state).sent.clone()
    }

    /// Switch commands (`n<d>`, `f<d>`) received so far
    pub fn switch_commands(&self) -> Vec<String> {
        lock(&self.state)
            .sent
            .iter()
            .filter(|token| token.starts_with('n') || token.starts_with('f'))
            .cloned()
            .collect()
    }

    pub fn exchanges(&self) -> Vec<Exchange> {
        lock(&self.state).exchanges.clone()
    }
}

/// Transport attached to a [`MockUdinBoard`]
pub struct MockUdinDevice {
    board: MockUdinBoard,
    inbox: VecDeque<String>,
    current: Option<(String, Instant)>,
}

impl MockUdinDevice {
    fn finish_exchange(&mut self) {
        if let Some((request, started)) = self.current.take() {
            lock(&self.board.state).exchanges.push(Exchange {
                request,
                started,
                finished: Instant::now(),
            });
        }
    }
}

#[async_trait]
impl SerialTransport for MockUdinDevice {
    async fn send_line(&mut self, token: &str) -> Result<()> {
        self.finish_exchange();
        let started = Instant::now();

        let (lines, latency) = {
            let mut state = lock(&self.board.state);
            state.sent.push(token.to_string());
            (state.respond(token), state.latency)
        };

        if !latency.is_zero() {
            sleep(latency).await;
        }

        self.inbox.extend(lines);
        self.current = Some((token.to_string(), started));
        Ok(())
    }

    async fn read_line(&mut self) -> Result<String> {
        let line = self
            .inbox
            .pop_front()
            .ok_or_else(|| RelayError::Timeout("No response from device".to_string()))?;
        if self.inbox.is_empty() {
            self.finish_exchange();
        }
        Ok(line)
    }

    fn clear_input_buffer(&mut self) -> Result<()> {
        self.inbox.clear();
        self.finish_exchange();
        Ok(())
    }

    fn port_path(&self) -> Option<&str> {
        Some("mock://udin")
    }
}

#[derive(Debug)]
struct DaenetBoardState {
    values: HashMap<Oid, i64>,
    error_status: Option<(i64, i64)>,
    unreachable: bool,
    latency: Duration,
    requests: Vec<Pdu>,
    exchanges: Vec<Exchange>,
}

/// Simulated DAEnetIP2 agent with all 16 relay objects present
#[derive(Debug, Clone)]
pub struct MockDaenetBoard {
    state: Arc<Mutex<DaenetBoardState>>,
}

impl Default for MockDaenetBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDaenetBoard {
    pub fn new() -> Self {
        let values = (0..DaenetIp2::MAX_RELAYS)
            .map(|channel| (daenet_relay_oid(channel), 0))
            .collect();
        Self {
            state: Arc::new(Mutex::new(DaenetBoardState {
                values,
                error_status: None,
                unreachable: false,
                latency: Duration::ZERO,
                requests: Vec::new(),
                exchanges: Vec::new(),
            })),
        }
    }

    /// Open a new session to this agent
    pub fn session(&self) -> Box<MockSnmpAgent> {
        Box::new(MockSnmpAgent {
            board: self.clone(),
            next_request_id: 1,
        })
    }

    pub fn value(&self, oid: &Oid) -> Option<i64> {
        lock(&self.state).values.get(oid).copied()
    }

    pub fn set_value(&self, oid: Oid, value: i64) {
        lock(&self.state).values.insert(oid, value);
    }

    /// Answer every request with this (error-status, error-index)
    pub fn set_error_status(&self, status: Option<(i64, i64)>) {
        lock(&self.state).error_status = status;
    }

    /// Time out every request
    pub fn set_unreachable(&self, unreachable: bool) {
        lock(&self.state).unreachable = unreachable;
    }

    pub fn set_latency(&self, latency: Duration) {
        lock(&self.state).latency = latency;
    }

    pub fn requests(&self) -> Vec<Pdu> {
        lock(&self.state).requests.clone()
    }

    pub fn exchanges(&self) -> Vec<Exchange> {
        lock(&self.state).exchanges.clone()
    }
}

/// Session attached to a [`MockDaenetBoard`]
pub struct MockSnmpAgent {
    board: MockDaenetBoard,
    next_request_id: i32,
}

#[async_trait]
impl SnmpTransport for MockSnmpAgent {
    async fn round_trip(&mut self, pdu_type: PduType, varbinds: Vec<VarBind>) -> Result<Pdu> {
        let started = Instant::now();
        let request_id = self.next_request_id;
        self.next_request_id += 1;

        let request = Pdu::request(pdu_type, request_id, varbinds);
        let latency = {
            let mut state = lock(&self.board.state);
            state.requests.push(request.clone());
            state.latency
        };

        if !latency.is_zero() {
            sleep(latency).await;
        }

        let mut state = lock(&self.board.state);
        if state.unreachable {
            return Err(RelayError::Timeout(format!(
                "No response from {} within {:?}",
                self.peer(),
                latency
            )));
        }

        let mut response = Pdu {
            pdu_type: PduType::GetResponse,
            ..request.clone()
        };

        if let Some((status, index)) = state.error_status {
            response.error_status = status;
            response.error_index = index;
        } else {
            let mut failure = None;
            for (i, binding) in response.varbinds.iter_mut().enumerate() {
                let index = i as i64 + 1;
                let Some(current) = state.values.get(&binding.oid).copied() else {
                    // noSuchName
                    failure = Some((2, index));
                    break;
                };

                if pdu_type == PduType::SetRequest {
                    let Some(v) = binding.value.as_integer() else {
                        // badValue
                        failure = Some((3, index));
                        break;
                    };
                    state.values.insert(binding.oid.clone(), v);
                } else {
                    binding.value = Value::Integer(current);
                }
            }
            if let Some((status, index)) = failure {
                response.error_status = status;
                response.error_index = index;
            }
        }

        state.exchanges.push(Exchange {
            request: format!("{:?} #{}", pdu_type, request_id),
            started,
            finished: Instant::now(),
        });
        Ok(response)
    }

    fn peer(&self) -> &str {
        "mock://daenetip2"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_udin_board_echoes_and_answers() {
        let board = MockUdinBoard::udin_8r();
        let mut device = board.connect();

        device.send_line("?").await.unwrap();
        assert_eq!(device.read_line().await.unwrap(), "?");
        assert_eq!(device.read_line().await.unwrap(), "UDIN-8R 8 x Relay V1.0");
        assert!(matches!(
            device.read_line().await,
            Err(RelayError::Timeout(_))
        ));
    }

    #[tokio::test]
    async fn test_udin_board_switches_relays() {
        let board = MockUdinBoard::udin_8r();
        let mut device = board.connect();

        for token in ["n1", "n8", "f1"] {
            device.send_line(token).await.unwrap();
            assert_eq!(device.read_line().await.unwrap(), token);
        }
        assert_eq!(board.relays(), 0x80);

        device.send_line("s0").await.unwrap();
        device.read_line().await.unwrap();
        assert_eq!(device.read_line().await.unwrap(), "128");

        device.send_line("r0").await.unwrap();
        assert_eq!(board.relays(), 0);
        assert_eq!(board.switch_commands(), vec!["n1", "n8", "f1"]);
    }

    #[tokio::test]
    async fn test_udin_state_fault_only_affects_reports() {
        let board = MockUdinBoard::udin_8r();
        board.set_state_fault(0b10);
        let mut device = board.connect();

        device.send_line("s0").await.unwrap();
        device.read_line().await.unwrap();
        assert_eq!(device.read_line().await.unwrap(), "2");
        assert_eq!(board.relays(), 0);
    }

    #[tokio::test]
    async fn test_udin_lost_reply_still_switches() {
        let board = MockUdinBoard::udin_8r();
        board.drop_replies(1);
        let mut device = board.connect();

        device.send_line("n2").await.unwrap();
        assert!(device.read_line().await.is_err());
        assert_eq!(board.relays(), 0b10);

        device.send_line("n3").await.unwrap();
        assert_eq!(device.read_line().await.unwrap(), "n3");
        assert_eq!(board.relays(), 0b110);
    }

    #[tokio::test]
    async fn test_udin_dropped_command_is_ignored() {
        let board = MockUdinBoard::udin_8r();
        board.drop_commands(1);
        let mut device = board.connect();

        device.send_line("n1").await.unwrap();
        assert!(device.read_line().await.is_err());
        assert_eq!(board.relays(), 0);
        assert_eq!(board.sent_commands(), vec!["n1"]);
    }

    #[test]
    fn test_exchanges_overlap() {
        let t0 = Instant::now();
        let ms = Duration::from_millis;
        let exchange = |start: u64, end: u64| Exchange {
            request: String::new(),
            started: t0 + ms(start),
            finished: t0 + ms(end),
        };

        assert!(!exchanges_overlap(&[exchange(0, 10), exchange(10, 20)]));
        assert!(exchanges_overlap(&[exchange(12, 30), exchange(0, 15)]));
        assert!(!exchanges_overlap(&[]));
    }

    #[tokio::test]
    async fn test_daenet_agent_unknown_oid() {
        let board = MockDaenetBoard::new();
        let mut agent = board.session();

        let pdu = agent
            .round_trip(
                PduType::GetRequest,
                vec![VarBind::null("1.3.6.1.2.1.1.1.0".parse().unwrap())],
            )
            .await
            .unwrap();
        assert_eq!(pdu.error_status, 2);
        assert_eq!(pdu.error_index, 1);
    }

    #[tokio::test]
    async fn test_daenet_agent_unreachable() {
        let board = MockDaenetBoard::new();
        board.set_unreachable(true);
        let mut agent = board.session();

        let err = agent
            .round_trip(PduType::GetRequest, vec![VarBind::null(daenet_relay_oid(0))])
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Timeout(_)));
    }
}
