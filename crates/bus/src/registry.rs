use std::collections::{HashMap, HashSet};

use crate::connection::{Connection, ConnectionId};
use crate::packet::{Frequency, Packet};

/// Why a connection could not be opened.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OpenError {
    #[error("address {address:?} already occupied on frequency {frequency}")]
    AddressOccupied { frequency: Frequency, address: String },
}

/// Index of all open connections on one logical network.
///
/// Occupied-slot policy: registering on an already occupied
/// (frequency, address) slot is rejected; the prior registration stays.
#[derive(Debug, Default)]
pub struct Registry {
    connections: HashMap<ConnectionId, Connection>,
    by_address: HashMap<Frequency, HashMap<String, ConnectionId>>,
    sniffers: HashMap<Frequency, HashSet<ConnectionId>>,
    next_local_address: u32,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next unoccupied auto-generated address on this network.
    pub fn generate_address(&mut self) -> String {
        loop {
            let address = format!("d{:04}", self.next_local_address);
            self.next_local_address = self.next_local_address.wrapping_add(1);
            if !self.address_in_use(&address) {
                return address;
            }
        }
    }

    fn address_in_use(&self, address: &str) -> bool {
        self.by_address
            .values()
            .any(|slots| slots.contains_key(address))
    }

    pub fn register(&mut self, connection: Connection) -> Result<(), OpenError> {
        debug_assert!(connection.is_open());

        let slots = self.by_address.entry(connection.frequency).or_default();
        if slots.contains_key(&connection.address) {
            log::warn!(
                "rejecting connection {}: address {:?} already occupied on frequency {}",
                connection.id,
                connection.address,
                connection.frequency
            );
            return Err(OpenError::AddressOccupied {
                frequency: connection.frequency,
                address: connection.address.clone(),
            });
        }

        slots.insert(connection.address.clone(), connection.id);
        if connection.receive_all {
            self.sniffers
                .entry(connection.frequency)
                .or_default()
                .insert(connection.id);
        }
        self.connections.insert(connection.id, connection);
        Ok(())
    }

    /// Remove a connection from both indices. Idempotent: unregistering an
    /// unknown id is a no-op.
    pub fn unregister(&mut self, id: ConnectionId) -> Option<Connection> {
        let connection = self.connections.remove(&id)?;

        if let Some(slots) = self.by_address.get_mut(&connection.frequency) {
            slots.remove(&connection.address);
            if slots.is_empty() {
                self.by_address.remove(&connection.frequency);
            }
        }
        if let Some(set) = self.sniffers.get_mut(&connection.frequency) {
            set.remove(&id);
            if set.is_empty() {
                self.sniffers.remove(&connection.frequency);
            }
        }
        Some(connection)
    }

    /// Toggle sniffer status, keeping the side index in sync.
    pub fn set_receive_all(&mut self, id: ConnectionId, receive_all: bool) -> bool {
        let Some(connection) = self.connections.get_mut(&id) else {
            return false;
        };
        if connection.receive_all == receive_all {
            return true;
        }
        connection.receive_all = receive_all;

        let frequency = connection.frequency;
        if receive_all {
            self.sniffers.entry(frequency).or_default().insert(id);
        } else if let Some(set) = self.sniffers.get_mut(&frequency) {
            set.remove(&id);
            if set.is_empty() {
                self.sniffers.remove(&frequency);
            }
        }
        true
    }

    pub fn resolve_unicast(&self, frequency: Frequency, address: &str) -> Option<ConnectionId> {
        self.by_address
            .get(&frequency)
            .and_then(|slots| slots.get(address))
            .copied()
    }

    /// Every connection listening on the given frequency, any address.
    pub fn resolve_broadcast(&self, frequency: Frequency) -> Vec<ConnectionId> {
        self.by_address
            .get(&frequency)
            .map(|slots| slots.values().copied().collect())
            .unwrap_or_default()
    }

    /// Sniffers are frequency-agnostic: merged across every frequency's
    /// sniffer set, deduplicated by connection identity.
    pub fn resolve_sniffers(&self) -> Vec<ConnectionId> {
        let merged: HashSet<ConnectionId> =
            self.sniffers.values().flatten().copied().collect();
        merged.into_iter().collect()
    }

    /// Candidate recipients for a packet, in stable ascending id order
    /// (open order), deduplicated. The sender's own device is excluded
    /// later by the dispatcher.
    pub fn resolve_recipients(&self, packet: &Packet) -> Vec<ConnectionId> {
        let mut ids = match packet.recipient_address() {
            Some(address) => self
                .resolve_unicast(packet.frequency(), address)
                .into_iter()
                .collect(),
            None => self.resolve_broadcast(packet.frequency()),
        };
        ids.extend(self.resolve_sniffers());
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    pub fn is_address_present(&self, frequency: Frequency, address: &str) -> bool {
        self.resolve_unicast(frequency, address).is_some()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    pub fn get(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    pub fn get_mut(&mut self, id: ConnectionId) -> Option<&mut Connection> {
        self.connections.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
