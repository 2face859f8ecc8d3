//! DAEnetIP2 Controller - relay control over SNMPv1
//!
//! Each relay is an INTEGER object under the vendor MIB; reads are live
//! Get requests and nothing is cached.

use crate::relay_bank::RelayBank;
use crate::snmp_codec::{error_status_name, Pdu, PduType, Value, VarBind};
use crate::snmp_session::SnmpTransport;
use async_trait::async_trait;
use relaybank_core::{
    AddressTable, DaenetIp2, DeviceConfig, DeviceKind, RelayError, RelayReading, RelayState,
    Result,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Clamp a configured relay count to what the device can address
pub fn clamp_relay_count(requested: usize) -> usize {
    if requested > DaenetIp2::MAX_RELAYS {
        warn!(
            "{} supports at most {} relays, clamping {} to {}",
            DaenetIp2::NAME,
            DaenetIp2::MAX_RELAYS,
            requested,
            DaenetIp2::MAX_RELAYS
        );
        DaenetIp2::MAX_RELAYS
    } else {
        requested
    }
}

/// DAEnetIP2 controller
///
/// The session lock is held for exactly one request/response round trip;
/// decoding the response happens after it is released.
pub struct DaenetController<S: SnmpTransport + ?Sized = dyn SnmpTransport> {
    session: Mutex<Option<Box<S>>>,
    table: AddressTable,
    peer: String,
}

impl<S: SnmpTransport + ?Sized> DaenetController<S> {
    pub fn new(session: Box<S>, relay_count: usize) -> Self {
        let relay_count = clamp_relay_count(relay_count);
        let peer = session.peer().to_string();
        info!("{} at {} with {} relays", DaenetIp2::NAME, peer, relay_count);

        Self {
            session: Mutex::new(Some(session)),
            table: AddressTable::new(relay_count),
            peer,
        }
    }

    pub fn relay_count(&self) -> usize {
        self.table.len()
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    async fn synch(&self, pdu_type: PduType, binding: VarBind) -> Result<Pdu> {
        let response = {
            let mut guard = self.session.lock().await;
            let session = guard.as_mut().ok_or(RelayError::DeviceNotFound)?;
            session.round_trip(pdu_type, vec![binding]).await?
        };

        if response.error_status != 0 {
            warn!(
                "{} rejected {:?}: {} (status {}, index {})",
                self.peer,
                pdu_type,
                error_status_name(response.error_status),
                response.error_status,
                response.error_index
            );
            return Err(RelayError::DeviceStatus {
                status: response.error_status,
                index: response.error_index,
            });
        }

        Ok(response)
    }

    /// Live read of one relay
    pub async fn get_relay(&self, channel: usize) -> Result<RelayState> {
        let oid = self.table.get(channel)?.clone();
        let response = self.synch(PduType::GetRequest, VarBind::null(oid.clone())).await?;

        let binding = response
            .varbinds
            .first()
            .ok_or_else(|| RelayError::Protocol("Empty varbind list in response".to_string()))?;
        if binding.oid != oid {
            return Err(RelayError::Protocol(format!(
                "Response for {} while querying {}",
                binding.oid, oid
            )));
        }

        let value = binding.value.as_integer().ok_or_else(|| {
            RelayError::Protocol(format!(
                "Relay {} returned a non-integer value: {:?}",
                channel + 1,
                binding.value
            ))
        })?;

        debug!("Relay {} ({}) = {}", channel + 1, oid, value);
        Ok(RelayState::from(value != 0))
    }

    /// Switch one relay by writing INTEGER 0 or 1
    pub async fn set_relay(&self, channel: usize, state: RelayState) -> Result<()> {
        let oid = self.table.get(channel)?.clone();
        let value = if state.is_on() { 1 } else { 0 };

        self.synch(
            PduType::SetRequest,
            VarBind {
                oid: oid.clone(),
                value: Value::Integer(value),
            },
        )
        .await?;

        debug!("Relay {} ({}) set to {}", channel + 1, oid, value);
        Ok(())
    }

    pub async fn close(&self) {
        if self.session.lock().await.take().is_some() {
            info!("SNMP session to {} closed", self.peer);
        }
    }
}

#[async_trait]
impl<S: SnmpTransport + ?Sized + 'static> RelayBank for DaenetController<S> {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Daenet
    }

    fn model(&self) -> String {
        format!("{} at {}", DaenetIp2::NAME, self.peer)
    }

    fn relay_count(&self) -> usize {
        DaenetController::relay_count(self)
    }

    async fn read_relay(&self, channel: usize) -> Result<RelayReading> {
        Ok(RelayReading::now(self.get_relay(channel).await?))
    }

    async fn write_relay(&self, channel: usize, state: RelayState) -> Result<()> {
        self.set_relay(channel, state).await
    }

    /// No all-off object exists, so every channel is switched individually
    async fn reset_all(&self) -> Result<()> {
        for channel in 0..self.relay_count() {
            self.set_relay(channel, RelayState::Off).await?;
        }
        info!("All {} relays switched off", self.relay_count());
        Ok(())
    }

    async fn reinitialize(&self) -> Result<usize> {
        if self.session.lock().await.is_none() {
            return Err(RelayError::DeviceNotFound);
        }
        Ok(self.relay_count())
    }

    async fn close(&self) {
        DaenetController::close(self).await
    }
}
