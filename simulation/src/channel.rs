//! Directional, fixed-delay, order-preserving channels

use serde::Serialize;

use crate::events::EventQueue;
use crate::types::{ChannelId, Message, PeerId, Tick};

/// One direction of a connection between two peers.
///
/// Channels hold peer ids rather than peers; the simulation owns both.
#[derive(Debug, Clone, Serialize)]
pub struct Channel {
    pub id: ChannelId,
    /// Sending side
    pub local: PeerId,
    /// Receiving side
    pub remote: PeerId,
    /// Ticks between send and delivery
    pub delay: Tick,
    /// Tick of the latest delivery scheduled on this channel
    last_delivery: Option<Tick>,
}

impl Channel {
    pub fn new(id: ChannelId, local: PeerId, remote: PeerId, delay: Tick) -> Self {
        Self {
            id,
            local,
            remote,
            delay,
            last_delivery: None,
        }
    }

    /// Schedule `message` for delivery and return immediately.
    ///
    /// A delivery is never scheduled before the previous one on this channel;
    /// the queue's sequence numbers order equal ticks, so FIFO holds.
    pub fn send(&mut self, now: Tick, message: Message, queue: &mut EventQueue) -> Tick {
        let mut at = now.saturating_add(self.delay);
        if let Some(last) = self.last_delivery
            && at < last
        {
            at = last;
        }
        self.last_delivery = Some(at);
        queue.schedule(at, self.id, message);
        at
    }

    pub fn last_delivery(&self) -> Option<Tick> {
        self.last_delivery
    }
}
