//! Error types for the snapshot simulation

use thiserror::Error;

use crate::types::{ChannelId, EpochId, PeerId};

/// Errors surfaced to the driver of a simulation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimError {
    #[error("Peer {0} is not part of the simulation")]
    UnknownPeer(PeerId),

    #[error("Peer {from} has no channel to receiver {to}")]
    UnknownReceiver { from: PeerId, to: PeerId },

    #[error("Peer {peer} has no inbound channel from {sender}")]
    UnknownSender { peer: PeerId, sender: PeerId },

    #[error("Channel {0} does not exist")]
    UnknownChannel(ChannelId),

    #[error("Peer {0} already exists")]
    DuplicatePeer(PeerId),

    #[error("Peer {0} cannot be connected to itself")]
    SelfConnection(PeerId),

    #[error("Peers {a} and {b} are already connected")]
    DuplicateConnection { a: PeerId, b: PeerId },

    #[error("Cannot connect {a} and {b} after traffic has started")]
    SetupOrderViolation { a: PeerId, b: PeerId },

    #[error("Moving {amount} would overflow the balance of peer {peer}")]
    BalanceOverflow { peer: PeerId, amount: i64 },

    #[error("At most 26 peers (A-Z) are supported, got {0}")]
    TooManyPeers(usize),

    #[error("Cut for {epoch} totals {actual}, expected {expected}")]
    CutMismatch {
        epoch: EpochId,
        expected: i64,
        actual: i64,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, SimError>;
