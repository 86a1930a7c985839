//! # Snapshot Simulation
//!
//! A discrete-event simulation of the Chandy-Lamport distributed snapshot
//! algorithm over a network of peers exchanging resources.
//!
//! ## Overview
//!
//! Peers hold a balance and pay each other over directional FIFO channels
//! with fixed delays. Any peer can start a snapshot epoch; markers flood the
//! network and every peer ends up with a resource vector describing its part
//! of a consistent global cut. Key features:
//!
//! - **Named peers** (A-Z): Each peer has a unique identifier
//! - **Directional channels**: Two independent channels per connection, each with its own delay
//! - **Overlapping epochs**: Any number of snapshots may run at once
//! - **Global cuts**: Per-peer reports combine into a cut that accounts for every resource
//!
//! ## Architecture
//!
//! - **Types** (`types.rs`): Identifiers, messages and trace events
//! - **Channel** (`channel.rs`) and **Events** (`events.rs`): FIFO delivery on a time-ordered queue
//! - **Peer** (`peer.rs`) and **Snapshot** (`snapshot.rs`): Balances and per-epoch recording state
//! - **Simulation** (`simulation.rs`): The engine that owns peers, channels and the clock
//! - **Topology** (`topology.rs`): Ring, mesh, line, star, random and custom networks
//! - **Cut** (`cut.rs`): Global cut assembly and verification
//! - **Scenarios** (`scenarios.rs`): Pre-built runs
//!
//! ## Example: Three-Peer Scenario
//!
//! ```rust
//! use snapshot_simulation::*;
//!
//! // Triangle: A - B, A - C, B - C
//! let mut sim = from_edges(&[('A', 'B', 1, 1), ('A', 'C', 1, 1), ('B', 'C', 3, 3)], 100).unwrap();
//!
//! // A starts a snapshot while B pays C
//! sim.initiate_snapshot(PeerId('A'), EpochId(7)).unwrap();
//! sim.initiate_payment(PeerId('B'), PeerId('C'), 35).unwrap();
//! sim.run_until_idle().unwrap();
//!
//! // The payment was in flight when the cut was taken
//! let c = sim.report(PeerId('C'), EpochId(7)).unwrap();
//! assert_eq!(c.in_transit_from(PeerId('B')), Some(35));
//!
//! let cut = GlobalCut::assemble(&sim, EpochId(7)).unwrap();
//! assert!(cut.verify(300).is_ok());
//! ```

pub mod channel;
pub mod config;
pub mod cut;
pub mod error;
pub mod events;
pub mod peer;
pub mod scenarios;
pub mod simulation;
pub mod snapshot;
pub mod topology;
pub mod types;

#[cfg(test)]
mod integration_scenarios;

// Re-export main types
pub use types::{ChannelId, EpochId, Message, PeerId, SnapshotEvent, Tick};

pub use channel::Channel;
pub use config::{ForwardPolicy, SimConfig};
pub use cut::GlobalCut;
pub use error::{Result, SimError};
pub use peer::{Link, MarkerOutcome, Peer};
pub use snapshot::{CloseOutcome, SnapshotReport, SnapshotTask};

pub use topology::{TopologyBuilder, from_edges, from_edges_with_config};

pub use simulation::{SimStats, Simulation};
