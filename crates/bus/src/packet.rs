use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::connection::ConnectionId;
use crate::device::DeviceId;

/// A logical, fully isolated bus. Packets never cross network ids.
pub type NetworkId = u32;

/// Channel selector within a network.
pub type Frequency = u32;

/// Reserved default/unscoped channel.
pub const DEFAULT_FREQUENCY: Frequency = 0;

pub mod net_id {
    //! Well-known network ids used by station devices.

    use super::NetworkId;

    pub const PRIVATE: NetworkId = 0;
    pub const WIRED: NetworkId = 1;
    pub const WIRELESS: NetworkId = 2;
    pub const APC: NetworkId = 3;
}

pub mod protocol {
    //! Well-known payload keys and commands shared by station devices.

    pub const COMMAND: &str = "command";
    pub const CMD_PING: &str = "ping";
    pub const CMD_PONG: &str = "pong";
    pub const CMD_SET_STATE: &str = "set_state";
    pub const CMD_UPDATED_STATE: &str = "updated_state";

    /// Metadata key carrying the sender's world position on wireless sends.
    pub const POSITION: &str = "position";
}

/// Application data carried by a packet. Insertion order is preserved so
/// debug output and snapshots stay deterministic; duplicate keys are
/// last-write-wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    entries: Vec<(String, String)>,
}

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn command(&self) -> Option<&str> {
        self.get(protocol::COMMAND)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetadataValue {
    Position(Vec2),
    Text(String),
    Number(f64),
    Flag(bool),
}

impl MetadataValue {
    pub fn as_position(&self) -> Option<Vec2> {
        match self {
            Self::Position(pos) => Some(*pos),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// Transport-specific side channel attached by the sending connection and
/// consumed by the receiving connection's filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    entries: Vec<(String, MetadataValue)>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: MetadataValue) {
        let key = key.into();
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Sender world position, when the sending transport attached one.
    pub fn position(&self) -> Option<Vec2> {
        self.get(protocol::POSITION).and_then(MetadataValue::as_position)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One message on the bus. Constructed when a send is enqueued and never
/// mutated afterwards; the dispatcher only reads it.
///
/// Invariant: `broadcast` is true exactly when `recipient_address` is
/// `None`; empty recipient strings are normalized to `None` at
/// construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Packet {
    network: NetworkId,
    frequency: Frequency,
    sender_address: String,
    recipient_address: Option<String>,
    broadcast: bool,
    payload: Payload,
    metadata: Metadata,
    sender_connection: ConnectionId,
    sender_device: DeviceId,
}

impl Packet {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        network: NetworkId,
        frequency: Frequency,
        sender_address: String,
        recipient_address: Option<String>,
        payload: Payload,
        metadata: Metadata,
        sender_connection: ConnectionId,
        sender_device: DeviceId,
    ) -> Self {
        let recipient_address = recipient_address.filter(|addr| !addr.is_empty());
        let broadcast = recipient_address.is_none();
        Self {
            network,
            frequency,
            sender_address,
            recipient_address,
            broadcast,
            payload,
            metadata,
            sender_connection,
            sender_device,
        }
    }

    pub fn network(&self) -> NetworkId {
        self.network
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    pub fn sender_address(&self) -> &str {
        &self.sender_address
    }

    pub fn recipient_address(&self) -> Option<&str> {
        self.recipient_address.as_deref()
    }

    pub fn is_broadcast(&self) -> bool {
        self.broadcast
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn sender_connection(&self) -> ConnectionId {
        self.sender_connection
    }

    pub fn sender_device(&self) -> DeviceId {
        self.sender_device
    }
}
