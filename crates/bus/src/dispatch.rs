use std::collections::VecDeque;

use crate::packet::Packet;

/// FIFO packet queue for one network, drained once per tick.
///
/// `take_pass` snapshots and clears the queue, so anything enqueued while
/// a pass is being delivered (replies from receive callbacks) lands in the
/// next pass. This is what bounds same-tick request/response ping-pong.
#[derive(Debug, Default)]
pub struct Dispatcher {
    pending: VecDeque<Packet>,
    passes: u64,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, packet: Packet) {
        self.pending.push_back(packet);
    }

    pub fn take_pass(&mut self) -> VecDeque<Packet> {
        self.passes += 1;
        std::mem::take(&mut self.pending)
    }

    /// Completed dispatch passes.
    pub fn passes(&self) -> u64 {
        self.passes
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
