use serde::{Deserialize, Serialize};

use crate::device::{DeviceId, PositionMap};
use crate::packet::{Metadata, MetadataValue, Packet, protocol};

/// Transport kind for a connection. Wired delivery is unconditional once
/// the registry has matched frequency and address; wireless delivery is
/// additionally gated on the distance between sender and receiver.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum Transport {
    #[default]
    Wired,
    Wireless { range: f32 },
}

impl Transport {
    /// Wireless transport with the given reception range. Negative ranges
    /// are coerced to their absolute value.
    pub fn wireless(range: f32) -> Self {
        Self::Wireless { range: range.abs() }
    }

    pub fn is_wireless(&self) -> bool {
        matches!(self, Self::Wireless { .. })
    }

    /// Final per-connection filter, applied after registry matching.
    ///
    /// A wireless connection accepts a packet only if the sender position
    /// in the packet metadata is within `range` of the receiver (boundary
    /// inclusive). When either position is unknown the packet is accepted:
    /// range unknown means assumed in range.
    pub fn can_receive(
        &self,
        packet: &Packet,
        receiver: DeviceId,
        positions: &dyn PositionMap,
    ) -> bool {
        match *self {
            Self::Wired => true,
            Self::Wireless { range } => {
                let Some(sender_pos) = packet.metadata().position() else {
                    return true;
                };
                let Some(receiver_pos) = positions.position(receiver) else {
                    return true;
                };
                sender_pos.distance(receiver_pos) <= range
            }
        }
    }

    /// Metadata attached when a connection owned by `sender` sends a
    /// packet. Wireless transports record the sender's current world
    /// position for the receiving side's range check.
    pub fn send_metadata(&self, sender: DeviceId, positions: &dyn PositionMap) -> Metadata {
        let mut metadata = Metadata::new();
        if self.is_wireless() {
            if let Some(pos) = positions.position(sender) {
                metadata.set(protocol::POSITION, MetadataValue::Position(pos));
            }
        }
        metadata
    }
}
