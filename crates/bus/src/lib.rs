//! In-game device network: a deterministic, tick-synchronous packet bus
//! for simulated station devices. Devices open connections on a logical
//! network, addressed by (frequency, address), and exchange key/value
//! payloads over wired (unconditional) or wireless (range-gated)
//! transports. Delivery happens once per tick; replies sent from receive
//! callbacks are deferred to the next tick.

pub mod connection;
pub mod device;
pub mod dispatch;
pub mod manager;
pub mod packet;
pub mod registry;
pub mod transport;

pub use connection::{Connection, ConnectionId, Outbox, ReceiveCallback};
pub use device::{DeviceId, NoPositions, PositionMap};
pub use dispatch::Dispatcher;
pub use manager::{DeviceNetwork, OpenParams};
pub use packet::{
    DEFAULT_FREQUENCY, Frequency, Metadata, MetadataValue, NetworkId, Packet, Payload, net_id,
    protocol,
};
pub use registry::{OpenError, Registry};
pub use transport::Transport;
