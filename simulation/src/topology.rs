//! Topology construction for snapshot simulations
//!
//! Provides builders for common shapes, each wiring peers with
//! [`Simulation::connect`] so slot order follows construction order:
//! - Ring: Each peer connected to neighbors
//! - Full mesh: Every peer connected to every other
//! - Line, star: Acyclic shapes with leaf peers
//! - Random: Seeded, connection probability per pair
//! - Custom: Build from an edge list with per-direction delays

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::SimConfig;
use crate::error::{Result, SimError};
use crate::simulation::Simulation;
use crate::types::{PeerId, Tick};

/// Builder for creating simulations over common topologies
#[derive(Debug, Clone)]
pub struct TopologyBuilder {
    peer_count: usize,
    config: SimConfig,
}

impl TopologyBuilder {
    /// Create a builder with the given number of peers (A, B, C, ...)
    pub fn new(peer_count: usize) -> Self {
        Self {
            peer_count,
            config: SimConfig::default(),
        }
    }

    /// Use a specific configuration
    pub fn config(mut self, config: SimConfig) -> Self {
        self.config = config;
        self
    }

    /// Starting balance of every peer
    pub fn balance(mut self, balance: i64) -> Self {
        self.config.initial_balance = balance;
        self
    }

    /// Delay of every channel
    pub fn delay(mut self, delay: Tick) -> Self {
        self.config.default_delay = delay;
        self
    }

    fn start(&self) -> Result<(Simulation, Vec<PeerId>)> {
        if self.peer_count > 26 {
            return Err(SimError::TooManyPeers(self.peer_count));
        }
        let mut sim = Simulation::new(self.config.clone());
        let peers = PeerId::first(self.peer_count);
        for peer in &peers {
            sim.add_peer(*peer, self.config.initial_balance)?;
        }
        Ok((sim, peers))
    }

    fn link(&self, sim: &mut Simulation, a: PeerId, b: PeerId) -> Result<()> {
        let delay = self.config.default_delay;
        sim.connect(a, b, delay, delay)
    }

    /// Build a ring topology where each peer is connected to its neighbors
    ///
    /// A - B - C - D - ... - A
    pub fn ring(self) -> Result<Simulation> {
        let (mut sim, peers) = self.start()?;
        if peers.len() == 2 {
            self.link(&mut sim, peers[0], peers[1])?;
        } else if peers.len() > 2 {
            for i in 0..peers.len() {
                let next = (i + 1) % peers.len();
                self.link(&mut sim, peers[i], peers[next])?;
            }
        }
        Ok(sim)
    }

    /// Build a full mesh where every peer is connected to every other
    pub fn full_mesh(self) -> Result<Simulation> {
        let (mut sim, peers) = self.start()?;
        for i in 0..peers.len() {
            for j in (i + 1)..peers.len() {
                self.link(&mut sim, peers[i], peers[j])?;
            }
        }
        Ok(sim)
    }

    /// Build a line topology: A - B - C - D - ...
    pub fn line(self) -> Result<Simulation> {
        let (mut sim, peers) = self.start()?;
        for pair in peers.windows(2) {
            self.link(&mut sim, pair[0], pair[1])?;
        }
        Ok(sim)
    }

    /// Build a star topology: A in center, connected to all others
    pub fn star(self) -> Result<Simulation> {
        let (mut sim, peers) = self.start()?;
        if let Some((center, rest)) = peers.split_first() {
            for peer in rest {
                self.link(&mut sim, *center, *peer)?;
            }
        }
        Ok(sim)
    }

    /// Build a random topology with the given connection probability.
    ///
    /// Per-direction delays are drawn from `1..=default_delay.max(1)`. A
    /// spanning path is added first so the graph is always connected.
    pub fn random(self, connection_probability: f64, seed: u64) -> Result<Simulation> {
        let (mut sim, peers) = self.start()?;
        let mut rng = StdRng::seed_from_u64(seed);
        let max_delay = self.config.default_delay.max(1);

        let mut order = peers.clone();
        for i in (1..order.len()).rev() {
            let j = rng.random_range(0..=i);
            order.swap(i, j);
        }
        for pair in order.windows(2) {
            let (ab, ba) = (rng.random_range(1..=max_delay), rng.random_range(1..=max_delay));
            sim.connect(pair[0], pair[1], ab, ba)?;
        }

        for i in 0..peers.len() {
            for j in (i + 1)..peers.len() {
                let (a, b) = (peers[i], peers[j]);
                let connected = sim.peer(a)?.is_connected_to(b);
                if !connected && rng.random::<f64>() < connection_probability {
                    let (ab, ba) = (rng.random_range(1..=max_delay), rng.random_range(1..=max_delay));
                    sim.connect(a, b, ab, ba)?;
                }
            }
        }
        Ok(sim)
    }
}

/// Create a custom topology from `(a, b, delay_ab, delay_ba)` edges
pub fn from_edges(edges: &[(char, char, Tick, Tick)], balance: i64) -> Result<Simulation> {
    from_edges_with_config(edges, balance, SimConfig::default())
}

/// [`from_edges`] with an explicit configuration
pub fn from_edges_with_config(
    edges: &[(char, char, Tick, Tick)],
    balance: i64,
    config: SimConfig,
) -> Result<Simulation> {
    let mut sim = Simulation::new(config);

    for (a, b, delay_ab, delay_ba) in edges {
        let peer_a = PeerId::new(*a).ok_or(SimError::Config(format!("invalid peer id '{}'", a)))?;
        let peer_b = PeerId::new(*b).ok_or(SimError::Config(format!("invalid peer id '{}'", b)))?;
        for peer in [peer_a, peer_b] {
            if sim.peer(peer).is_err() {
                sim.add_peer(peer, balance)?;
            }
        }
        sim.connect(peer_a, peer_b, *delay_ab, *delay_ba)?;
    }

    Ok(sim)
}
