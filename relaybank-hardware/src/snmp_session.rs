//! SNMPv1 session over UDP
//!
//! One request in flight at a time. Responses are matched on request-id,
//! version and community; anything else arriving on the socket is dropped
//! and the wait continues until the session timeout.

use crate::snmp_codec::{Message, Pdu, PduType, VarBind, SNMP_VERSION_1};
use async_trait::async_trait;
use relaybank_core::{DaenetIp2, RelayError, Result};
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Largest datagram we accept from an agent
const MAX_DATAGRAM: usize = 65_507;

/// Trait for SNMP transport abstraction
///
/// Lets `DaenetController` run against an in-memory agent in tests.
#[async_trait]
pub trait SnmpTransport: Send {
    /// Send one request and wait for the matching response PDU
    async fn round_trip(&mut self, pdu_type: PduType, varbinds: Vec<VarBind>) -> Result<Pdu>;

    /// Agent address, for logging
    fn peer(&self) -> &str;
}

/// Append the standard SNMP port when `peer` does not carry one
pub fn with_default_port(peer: &str) -> String {
    if peer.parse::<SocketAddr>().is_ok() {
        return peer.to_string();
    }
    match peer.parse::<IpAddr>() {
        Ok(IpAddr::V6(addr)) => return format!("[{}]:{}", addr, DaenetIp2::SNMP_PORT),
        Ok(IpAddr::V4(addr)) => return format!("{}:{}", addr, DaenetIp2::SNMP_PORT),
        Err(_) => {}
    }
    if let Some((host, port)) = peer.rsplit_once(':') {
        if !host.contains(':') && port.parse::<u16>().is_ok() {
            return peer.to_string();
        }
    }
    format!("{}:{}", peer, DaenetIp2::SNMP_PORT)
}

fn initial_request_id() -> i32 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(1);
    ((nanos & 0x3FFF_FFFF) as i32).max(1)
}

pub struct UdpSnmpSession {
    socket: UdpSocket,
    peer: String,
    community: Vec<u8>,
    timeout: Duration,
    next_request_id: i32,
    debug_wire: bool,
}

impl UdpSnmpSession {
    /// Resolve the agent and bind a connected UDP socket
    ///
    /// # Arguments
    /// * `peer` - Agent host, optionally with `:port` (default 161)
    /// * `community` - Community string sent with every request
    /// * `timeout` - How long a single request waits for its response
    /// * `debug_wire` - Log every datagram sent and received
    pub async fn open(
        peer: &str,
        community: &str,
        timeout: Duration,
        debug_wire: bool,
    ) -> Result<Self> {
        let target = with_default_port(peer);
        let addr = tokio::net::lookup_host(&target)
            .await
            .map_err(|e| RelayError::Snmp(format!("Failed to resolve {}: {}", target, e)))?
            .next()
            .ok_or_else(|| RelayError::Snmp(format!("No address found for {}", target)))?;

        let local = if addr.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(local)
            .await
            .map_err(|e| RelayError::Snmp(format!("Failed to bind UDP socket: {}", e)))?;
        socket
            .connect(addr)
            .await
            .map_err(|e| RelayError::Snmp(format!("Failed to connect to {}: {}", addr, e)))?;

        info!("SNMP session opened to {} ({})", peer, addr);

        Ok(Self {
            socket,
            peer: peer.to_string(),
            community: community.as_bytes().to_vec(),
            timeout,
            next_request_id: initial_request_id(),
            debug_wire,
        })
    }

    fn allocate_request_id(&mut self) -> i32 {
        let id = self.next_request_id;
        self.next_request_id = if id == i32::MAX { 1 } else { id + 1 };
        id
    }

    async fn receive_response(&self, request_id: i32) -> Result<Message> {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            let n = self
                .socket
                .recv(&mut buf)
                .await
                .map_err(|e| RelayError::Snmp(format!("Receive from {} failed: {}", self.peer, e)))?;

            if self.debug_wire {
                debug!("RX {} bytes: {:02X?}", n, &buf[..n]);
            }

            let message = match Message::decode(&buf[..n]) {
                Ok(message) => message,
                Err(e) => {
                    warn!("Discarding undecodable datagram from {}: {}", self.peer, e);
                    continue;
                }
            };

            if message.version != SNMP_VERSION_1
                || message.community != self.community
                || message.pdu.request_id != request_id
                || message.pdu.pdu_type != PduType::GetResponse
            {
                debug!(
                    "Discarding unrelated response (request-id {}, expected {})",
                    message.pdu.request_id, request_id
                );
                continue;
            }

            return Ok(message);
        }
    }
}

#[async_trait]
impl SnmpTransport for UdpSnmpSession {
    async fn round_trip(&mut self, pdu_type: PduType, varbinds: Vec<VarBind>) -> Result<Pdu> {
        let request_id = self.allocate_request_id();
        let request = Message {
            version: SNMP_VERSION_1,
            community: self.community.clone(),
            pdu: Pdu::request(pdu_type, request_id, varbinds),
        };
        let bytes = request.encode();

        if self.debug_wire {
            debug!("TX {} bytes: {:02X?}", bytes.len(), bytes);
        }

        self.socket
            .send(&bytes)
            .await
            .map_err(|e| RelayError::Snmp(format!("Send to {} failed: {}", self.peer, e)))?;

        let response = timeout(self.timeout, self.receive_response(request_id))
            .await
            .map_err(|_| {
                RelayError::Timeout(format!(
                    "No response from {} within {:?}",
                    self.peer, self.timeout
                ))
            })??;

        Ok(response.pdu)
    }

    fn peer(&self) -> &str {
        &self.peer
    }
}
