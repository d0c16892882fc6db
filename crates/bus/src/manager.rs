use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

use crate::connection::{Connection, ConnectionId, Outbox};
use crate::device::{DeviceId, PositionMap};
use crate::dispatch::Dispatcher;
use crate::packet::{Frequency, NetworkId, Packet, Payload};
use crate::registry::{OpenError, Registry};
use crate::transport::Transport;

/// Everything needed to open a connection except the receive callback.
#[derive(Debug, Clone, Default)]
pub struct OpenParams {
    pub network: NetworkId,
    pub frequency: Frequency,
    /// None (or empty) assigns a generated address unique on the network.
    pub address: Option<String>,
    pub device: DeviceId,
    pub transport: Transport,
    pub receive_all: bool,
}

#[derive(Debug, Default)]
struct Bus {
    registry: Registry,
    dispatcher: Dispatcher,
}

/// The device network façade: one registry and dispatch queue per logical
/// network id. All operations are synchronous; `tick` is expected to be
/// called exactly once per simulation step, after the step's sends.
#[derive(Debug, Default)]
pub struct DeviceNetwork {
    buses: HashMap<NetworkId, Bus>,
    locations: HashMap<ConnectionId, NetworkId>,
    next_connection: ConnectionId,
}

impl DeviceNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a connection and register it for delivery. Fails only when the
    /// requested (frequency, address) slot is already occupied on the
    /// network.
    pub fn open<F>(&mut self, params: OpenParams, callback: F) -> Result<ConnectionId, OpenError>
    where
        F: FnMut(&Packet, &mut Outbox) + 'static,
    {
        let bus = self.buses.entry(params.network).or_default();
        let address = match params.address.filter(|a| !a.is_empty()) {
            Some(address) => address,
            None => bus.registry.generate_address(),
        };

        let id = self.next_connection;
        let connection = Connection::new(
            id,
            params.device,
            params.network,
            params.frequency,
            address.clone(),
            params.transport,
            params.receive_all,
            Box::new(callback),
        );
        bus.registry.register(connection)?;

        self.next_connection += 1;
        self.locations.insert(id, params.network);
        log::debug!(
            "connection {id} open on network {} frequency {} at {address:?}",
            params.network,
            params.frequency
        );
        Ok(id)
    }

    /// Close a connection and remove it from its registry. Safe to call
    /// multiple times; returns false when the connection is already gone.
    pub fn close(&mut self, id: ConnectionId) -> bool {
        let Some(network) = self.locations.remove(&id) else {
            return false;
        };
        let closed = self
            .buses
            .get_mut(&network)
            .and_then(|bus| bus.registry.unregister(id));
        match closed {
            Some(mut connection) => {
                connection.open = false;
                log::debug!("connection {id} closed on network {network}");
                true
            }
            None => false,
        }
    }

    pub fn is_open(&self, id: ConnectionId) -> bool {
        self.locations.contains_key(&id)
    }

    /// The address assigned at open time.
    pub fn address(&self, id: ConnectionId) -> Option<&str> {
        let network = self.locations.get(&id)?;
        self.buses
            .get(network)?
            .registry
            .get(id)
            .map(|connection| connection.address())
    }

    /// Toggle the debug sniffer override. A sniffer receives every packet
    /// on its network regardless of frequency or address match.
    pub fn set_receive_all(&mut self, id: ConnectionId, receive_all: bool) -> bool {
        let Some(network) = self.locations.get(&id) else {
            return false;
        };
        self.buses
            .get_mut(network)
            .is_some_and(|bus| bus.registry.set_receive_all(id, receive_all))
    }

    pub fn is_address_present(
        &self,
        network: NetworkId,
        frequency: Frequency,
        address: &str,
    ) -> bool {
        self.buses
            .get(&network)
            .is_some_and(|bus| bus.registry.is_address_present(frequency, address))
    }

    pub fn connection_count(&self, network: NetworkId) -> usize {
        self.buses
            .get(&network)
            .map_or(0, |bus| bus.registry.len())
    }

    /// Packets waiting for the next dispatch pass.
    pub fn pending_packets(&self, network: NetworkId) -> usize {
        self.buses
            .get(&network)
            .map_or(0, |bus| bus.dispatcher.len())
    }

    /// Unicast from an open connection. Returns false when the connection
    /// is closed or unknown; an empty recipient address turns the packet
    /// into a broadcast.
    pub fn send(
        &mut self,
        id: ConnectionId,
        frequency: Frequency,
        recipient: impl Into<String>,
        payload: Payload,
        positions: &dyn PositionMap,
    ) -> bool {
        self.enqueue_from(id, frequency, Some(recipient.into()), payload, positions)
    }

    /// Broadcast to every open connection on the frequency except the
    /// sender. Returns false when the connection is closed or unknown.
    pub fn broadcast(
        &mut self,
        id: ConnectionId,
        frequency: Frequency,
        payload: Payload,
        positions: &dyn PositionMap,
    ) -> bool {
        self.enqueue_from(id, frequency, None, payload, positions)
    }

    fn enqueue_from(
        &mut self,
        id: ConnectionId,
        frequency: Frequency,
        recipient: Option<String>,
        payload: Payload,
        positions: &dyn PositionMap,
    ) -> bool {
        let Some(&network) = self.locations.get(&id) else {
            return false;
        };
        let Some(bus) = self.buses.get_mut(&network) else {
            return false;
        };
        let Some(connection) = bus.registry.get(id) else {
            return false;
        };

        // Send intent is captured here, including transport metadata; the
        // packet is still delivered if the sender closes before dispatch.
        let metadata = connection
            .transport()
            .send_metadata(connection.device(), positions);
        let packet = Packet::new(
            network,
            frequency,
            connection.address().to_string(),
            recipient,
            payload,
            metadata,
            id,
            connection.device(),
        );
        bus.dispatcher.enqueue(packet);
        true
    }

    /// Run one dispatch pass per network, in ascending network id order.
    /// Packets enqueued by receive callbacks during this call are deferred
    /// to the next `tick`.
    pub fn tick(&mut self, positions: &dyn PositionMap) {
        let mut networks: Vec<NetworkId> = self.buses.keys().copied().collect();
        networks.sort_unstable();
        for network in networks {
            self.dispatch_network(network, positions);
        }
    }

    fn dispatch_network(&mut self, network: NetworkId, positions: &dyn PositionMap) {
        let Some(bus) = self.buses.get_mut(&network) else {
            return;
        };
        let pass = bus.dispatcher.take_pass();

        for packet in pass {
            let Some(bus) = self.buses.get_mut(&network) else {
                return;
            };
            let Bus {
                registry,
                dispatcher,
            } = bus;

            // Owned candidate snapshot; registry mutation below cannot
            // invalidate the iteration.
            let candidates = registry.resolve_recipients(&packet);
            for id in candidates {
                let Some(connection) = registry.get_mut(id) else {
                    continue;
                };
                // A device never hears itself, on any of its connections.
                if connection.device() == packet.sender_device() {
                    continue;
                }
                if !connection
                    .transport()
                    .can_receive(&packet, connection.device(), positions)
                {
                    continue;
                }

                let device = connection.device();
                let transport = connection.transport();
                let address = connection.address().to_string();

                let mut outbox = Outbox::default();
                let panicked = panic::catch_unwind(AssertUnwindSafe(|| {
                    (connection.callback)(&packet, &mut outbox)
                }))
                .is_err();
                if panicked {
                    // A panicked callback forfeits its outbox.
                    log::error!(
                        "receive callback panicked on connection {id} ({address}), continuing dispatch"
                    );
                    continue;
                }

                for send in outbox.sends {
                    let metadata = transport.send_metadata(device, positions);
                    dispatcher.enqueue(Packet::new(
                        network,
                        send.frequency,
                        address.clone(),
                        send.recipient,
                        send.payload,
                        metadata,
                        id,
                        device,
                    ));
                }
                if outbox.close {
                    registry.unregister(id);
                    self.locations.remove(&id);
                    log::debug!("connection {id} closed itself during dispatch");
                }
            }
        }
    }
}
