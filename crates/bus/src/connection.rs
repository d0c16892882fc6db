use std::fmt;

use crate::device::DeviceId;
use crate::packet::{Frequency, NetworkId, Packet, Payload};
use crate::transport::Transport;

/// Identifies one open connection. Ids are handed out in open order and
/// never reused, which doubles as the stable delivery order.
pub type ConnectionId = u32;

/// Invoked once per delivered packet. Replies and lifecycle changes go
/// through the [`Outbox`] and take effect after the current dispatch pass,
/// never during it.
pub type ReceiveCallback = Box<dyn FnMut(&Packet, &mut Outbox)>;

/// One endpoint's subscription to a (frequency, address) pair on one
/// logical network. Rebinding frequency or address requires close and
/// reopen, so the registry index can never go stale.
pub struct Connection {
    pub(crate) id: ConnectionId,
    pub(crate) device: DeviceId,
    pub(crate) network: NetworkId,
    pub(crate) frequency: Frequency,
    pub(crate) address: String,
    pub(crate) transport: Transport,
    pub(crate) receive_all: bool,
    pub(crate) open: bool,
    pub(crate) callback: ReceiveCallback,
}

impl Connection {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: ConnectionId,
        device: DeviceId,
        network: NetworkId,
        frequency: Frequency,
        address: String,
        transport: Transport,
        receive_all: bool,
        callback: ReceiveCallback,
    ) -> Self {
        Self {
            id,
            device,
            network,
            frequency,
            address,
            transport,
            receive_all,
            open: true,
            callback,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn device(&self) -> DeviceId {
        self.device
    }

    pub fn network(&self) -> NetworkId {
        self.network
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    pub fn receive_all(&self) -> bool {
        self.receive_all
    }

    pub fn is_open(&self) -> bool {
        self.open
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("device", &self.device)
            .field("network", &self.network)
            .field("frequency", &self.frequency)
            .field("address", &self.address)
            .field("transport", &self.transport)
            .field("receive_all", &self.receive_all)
            .field("open", &self.open)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct OutboundPacket {
    pub frequency: Frequency,
    pub recipient: Option<String>,
    pub payload: Payload,
}

/// Deferred actions collected while a receive callback runs. Sends land in
/// the next dispatch pass, and a requested close is applied once the
/// callback returns; callbacks never touch the registry directly.
#[derive(Debug, Default)]
pub struct Outbox {
    pub(crate) sends: Vec<OutboundPacket>,
    pub(crate) close: bool,
}

impl Outbox {
    /// Queue a unicast reply from the receiving connection.
    pub fn send(&mut self, frequency: Frequency, recipient: impl Into<String>, payload: Payload) {
        self.sends.push(OutboundPacket {
            frequency,
            recipient: Some(recipient.into()),
            payload,
        });
    }

    /// Queue a broadcast from the receiving connection.
    pub fn broadcast(&mut self, frequency: Frequency, payload: Payload) {
        self.sends.push(OutboundPacket {
            frequency,
            recipient: None,
            payload,
        });
    }

    /// Close the receiving connection once the current pass has finished
    /// delivering to it.
    pub fn close(&mut self) {
        self.close = true;
    }
}
