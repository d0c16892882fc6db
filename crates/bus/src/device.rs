use std::collections::HashMap;

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Reference to the game entity owning a connection. The network layer
/// never polls for entity deletion; the owner's teardown path is
/// responsible for closing its connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DeviceId(pub u64);

impl DeviceId {
    pub fn id(self) -> u64 {
        self.0
    }
}

/// Read-only world position lookup, consumed by the wireless transport.
/// Called up to once per candidate per packet, so lookups must be cheap.
pub trait PositionMap {
    fn position(&self, device: DeviceId) -> Option<Vec2>;
}

impl PositionMap for HashMap<DeviceId, Vec2> {
    fn position(&self, device: DeviceId) -> Option<Vec2> {
        self.get(&device).copied()
    }
}

/// Lookup for networks whose devices have no meaningful location.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPositions;

impl PositionMap for NoPositions {
    fn position(&self, _device: DeviceId) -> Option<Vec2> {
        None
    }
}
