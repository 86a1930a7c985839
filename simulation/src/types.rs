//! Core types for the snapshot simulation
//!
//! Models a network of named peers (A-Z) exchanging resource transfers and
//! snapshot markers over directional, fixed-delay channels.

use serde::{Deserialize, Serialize};

/// Simulated time, in ticks
pub type Tick = u64;

/// Unique identifier for a peer in the network (A-Z)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeerId(pub char);

impl PeerId {
    /// Create a new PeerId from a capital letter
    pub fn new(c: char) -> Option<Self> {
        if c.is_ascii_uppercase() {
            Some(Self(c))
        } else {
            None
        }
    }

    /// Generate all peer IDs from A to the given letter (inclusive)
    pub fn range_to(end: char) -> Vec<Self> {
        ('A'..=end).filter_map(Self::new).collect()
    }

    /// The first `count` peer IDs, starting at A
    pub fn first(count: usize) -> Vec<Self> {
        ('A'..='Z').take(count).filter_map(Self::new).collect()
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of one snapshot run, chosen by its initiator
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EpochId(pub u64);

impl std::fmt::Display for EpochId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "epoch-{}", self.0)
    }
}

/// Stable identifier of a directional channel, assigned at connect time
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub usize);

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ch{}", self.0)
    }
}

/// Payload carried by a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    /// Resources moving from sender to receiver. The sender was debited
    /// before the message left.
    ResourceTransfer { amount: i64 },
    /// Demarcates the cut for `epoch` on the channel it travels
    SnapshotMarker { epoch: EpochId },
}

impl Message {
    pub fn is_marker(&self) -> bool {
        matches!(self, Message::SnapshotMarker { .. })
    }

    /// Amount carried, zero for markers
    pub fn amount(&self) -> i64 {
        match self {
            Message::ResourceTransfer { amount } => *amount,
            Message::SnapshotMarker { .. } => 0,
        }
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Message::ResourceTransfer { amount } => write!(f, "transfer({})", amount),
            Message::SnapshotMarker { epoch } => write!(f, "marker({})", epoch),
        }
    }
}

/// Events that occur in the simulation, appended to the event log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnapshotEvent {
    /// A payment left `from`, already debited
    PaymentSent {
        from: PeerId,
        to: PeerId,
        amount: i64,
        tick: Tick,
    },
    /// A marker was put on a channel
    MarkerSent {
        from: PeerId,
        to: PeerId,
        epoch: EpochId,
        tick: Tick,
    },
    /// A message reached its receiver
    Delivered {
        channel: ChannelId,
        from: PeerId,
        to: PeerId,
        message: Message,
        tick: Tick,
    },
    /// A driver started an epoch at `peer`
    SnapshotInitiated {
        peer: PeerId,
        epoch: EpochId,
        tick: Tick,
    },
    /// `peer` captured its balance for `epoch`
    BalanceRecorded {
        peer: PeerId,
        epoch: EpochId,
        balance: i64,
        tick: Tick,
    },
    /// The inbound channel from `from` stopped recording for `epoch`
    ChannelClosed {
        peer: PeerId,
        from: PeerId,
        epoch: EpochId,
        tick: Tick,
    },
    /// A marker arrived on an already closed channel and was dropped
    MarkerDiscarded {
        peer: PeerId,
        from: PeerId,
        epoch: EpochId,
        tick: Tick,
    },
    /// Every inbound channel of `peer` closed for `epoch`
    EpochCompleted {
        peer: PeerId,
        epoch: EpochId,
        vector: Vec<i64>,
        tick: Tick,
    },
}

impl SnapshotEvent {
    pub fn tick(&self) -> Tick {
        match self {
            SnapshotEvent::PaymentSent { tick, .. }
            | SnapshotEvent::MarkerSent { tick, .. }
            | SnapshotEvent::Delivered { tick, .. }
            | SnapshotEvent::SnapshotInitiated { tick, .. }
            | SnapshotEvent::BalanceRecorded { tick, .. }
            | SnapshotEvent::ChannelClosed { tick, .. }
            | SnapshotEvent::MarkerDiscarded { tick, .. }
            | SnapshotEvent::EpochCompleted { tick, .. } => *tick,
        }
    }
}
