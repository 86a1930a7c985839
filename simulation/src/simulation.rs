//! Simulation engine for Chandy-Lamport snapshots
//!
//! A [`Simulation`] owns every peer, every channel and the event queue.
//! Drivers wire peers with [`Simulation::connect`], then call
//! [`Simulation::initiate_payment`] and [`Simulation::initiate_snapshot`] and
//! advance the clock. Each delivery runs to completion before the next one is
//! popped, so peer state is mutated without synchronization.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::channel::Channel;
use crate::config::SimConfig;
use crate::error::{Result, SimError};
use crate::events::EventQueue;
use crate::peer::Peer;
use crate::snapshot::SnapshotReport;
use crate::types::{ChannelId, EpochId, Message, PeerId, SnapshotEvent, Tick};

/// Simulation statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SimStats {
    pub payments_sent: u64,
    pub payments_delivered: u64,
    pub amount_sent: i64,
    pub snapshots_initiated: u64,
    pub markers_sent: u64,
    pub markers_delivered: u64,
    pub markers_discarded: u64,
    /// Transfers attributed to an open channel of some epoch
    pub transfers_recorded: u64,
    /// Peer-level epoch completions
    pub epochs_completed: u64,
}

/// The simulation state
#[derive(Debug)]
pub struct Simulation {
    /// Current simulation tick
    pub tick: Tick,
    /// Configuration
    pub config: SimConfig,
    /// Global event log (all events)
    pub event_log: Vec<SnapshotEvent>,
    /// Statistics
    pub stats: SimStats,
    peers: BTreeMap<PeerId, Peer>,
    channels: Vec<Channel>,
    queue: EventQueue,
    reports: Vec<SnapshotReport>,
    traffic_started: bool,
}

impl Simulation {
    /// Create an empty simulation
    pub fn new(config: SimConfig) -> Self {
        Self {
            tick: 0,
            config,
            event_log: Vec::new(),
            stats: SimStats::default(),
            peers: BTreeMap::new(),
            channels: Vec::new(),
            queue: EventQueue::new(),
            reports: Vec::new(),
            traffic_started: false,
        }
    }

    /// Add a peer holding `balance`
    pub fn add_peer(&mut self, id: PeerId, balance: i64) -> Result<()> {
        if self.peers.contains_key(&id) {
            return Err(SimError::DuplicatePeer(id));
        }
        self.peers.insert(id, Peer::new(id, balance));
        Ok(())
    }

    /// Wire `a` and `b` with two independent channels.
    ///
    /// Each peer gets a new link appended in call order; its slot is the
    /// index used by every snapshot vector of that peer. All connections must
    /// be made before the first message is sent.
    pub fn connect(&mut self, a: PeerId, b: PeerId, delay_ab: Tick, delay_ba: Tick) -> Result<()> {
        if self.traffic_started {
            return Err(SimError::SetupOrderViolation { a, b });
        }
        if a == b {
            return Err(SimError::SelfConnection(a));
        }
        let peer_a = self.peers.get(&a).ok_or(SimError::UnknownPeer(a))?;
        if !self.peers.contains_key(&b) {
            return Err(SimError::UnknownPeer(b));
        }
        if peer_a.is_connected_to(b) {
            return Err(SimError::DuplicateConnection { a, b });
        }

        let ab = ChannelId(self.channels.len());
        self.channels.push(Channel::new(ab, a, b, delay_ab));
        let ba = ChannelId(self.channels.len());
        self.channels.push(Channel::new(ba, b, a, delay_ba));

        self.peer_mut(a)?.add_link(b, ab)?;
        self.peer_mut(b)?.add_link(a, ba)?;

        debug!("Connected {} <-> {} (delays {}/{})", a, b, delay_ab, delay_ba);
        Ok(())
    }

    /// Start snapshot `epoch` at `peer`.
    ///
    /// Handled as a marker with no sender: the peer records its balance if
    /// the epoch is new there and relays the marker on every link.
    pub fn initiate_snapshot(&mut self, peer: PeerId, epoch: EpochId) -> Result<()> {
        if !self.peers.contains_key(&peer) {
            return Err(SimError::UnknownPeer(peer));
        }
        info!("Snapshot {} initiated at {} (tick {})", epoch, peer, self.tick);
        self.stats.snapshots_initiated += 1;
        self.emit_event(SnapshotEvent::SnapshotInitiated {
            peer,
            epoch,
            tick: self.tick,
        });
        self.handle_marker(peer, epoch, None)
    }

    /// Pay `amount` from `from` to its neighbour `to`.
    ///
    /// `from` is debited now; `to` is credited when the transfer is delivered.
    /// Fails with `BalanceOverflow`, before anything changes, if the debit or
    /// the eventual credit cannot be represented.
    pub fn initiate_payment(&mut self, from: PeerId, to: PeerId, amount: i64) -> Result<()> {
        self.check_credit(to, amount)?;
        let channel = self.peer_mut(from)?.debit_for_payment(to, amount)?;
        let at = self.send_on(channel, Message::ResourceTransfer { amount })?;

        self.stats.payments_sent += 1;
        self.stats.amount_sent = self.stats.amount_sent.saturating_add(amount);
        debug!("{} pays {} to {} (arrives at tick {})", from, amount, to, at);
        self.emit_event(SnapshotEvent::PaymentSent {
            from,
            to,
            amount,
            tick: self.tick,
        });
        Ok(())
    }

    /// Deliver the earliest pending message. Returns `false` when idle.
    pub fn step(&mut self) -> Result<bool> {
        let Some(delivery) = self.queue.pop_earliest() else {
            return Ok(false);
        };
        self.tick = self.tick.max(delivery.tick);

        let channel = self.channel(delivery.channel)?;
        let (from, to) = (channel.local, channel.remote);

        self.emit_event(SnapshotEvent::Delivered {
            channel: delivery.channel,
            from,
            to,
            message: delivery.message,
            tick: self.tick,
        });

        match delivery.message {
            Message::ResourceTransfer { amount } => {
                let recorded = self.peer_mut(to)?.receive_transfer(from, amount)?;
                self.stats.payments_delivered += 1;
                self.stats.transfers_recorded += recorded as u64;
                debug!(
                    "{} received {} from {} at tick {} (recorded by {} epoch(s))",
                    to, amount, from, self.tick, recorded
                );
            }
            Message::SnapshotMarker { epoch } => {
                self.stats.markers_delivered += 1;
                self.handle_marker(to, epoch, Some(from))?;
            }
        }
        Ok(true)
    }

    /// Deliver messages until the queue drains or the clock would move more
    /// than `config.max_ticks` past the tick this call started at.
    /// Returns the tick the clock stopped at.
    pub fn run_until_idle(&mut self) -> Result<Tick> {
        let limit = self
            .config
            .max_ticks
            .map(|max| self.tick.saturating_add(max));
        while let Some(next) = self.queue.peek_tick() {
            if let Some(limit) = limit
                && next > limit
            {
                warn!(
                    "Stopping at tick {}: {} deliveries still pending past tick {}",
                    self.tick,
                    self.queue.len(),
                    limit
                );
                break;
            }
            self.step()?;
        }
        Ok(self.tick)
    }

    /// Deliver everything due at or before `tick`, then move the clock there
    pub fn run_until(&mut self, tick: Tick) -> Result<()> {
        while self.queue.peek_tick().is_some_and(|next| next <= tick) {
            self.step()?;
        }
        self.tick = self.tick.max(tick);
        Ok(())
    }

    /// Advance the clock by `ticks`, delivering whatever falls due
    pub fn run_ticks(&mut self, ticks: Tick) -> Result<()> {
        self.run_until(self.tick.saturating_add(ticks))
    }

    /// Whether `to` can absorb `amount` on top of its balance and everything
    /// already in flight towards it
    fn check_credit(&self, to: PeerId, amount: i64) -> Result<()> {
        let Some(receiver) = self.peers.get(&to) else {
            return Ok(());
        };
        let inbound = self
            .queue
            .iter()
            .filter(|d| self.channels.get(d.channel.0).is_some_and(|c| c.remote == to))
            .try_fold(receiver.balance(), |acc, d| acc.checked_add(d.message.amount()));
        match inbound.and_then(|total| total.checked_add(amount)) {
            Some(_) => Ok(()),
            None => Err(SimError::BalanceOverflow { peer: to, amount }),
        }
    }

    fn handle_marker(&mut self, peer_id: PeerId, epoch: EpochId, from: Option<PeerId>) -> Result<()> {
        let policy = self.config.forward_policy;
        let tick = self.tick;
        let peer = self
            .peers
            .get_mut(&peer_id)
            .ok_or(SimError::UnknownPeer(peer_id))?;
        let outcome = peer.receive_marker(epoch, from, policy)?;
        let balance = peer.balance();
        let report = if outcome.completed {
            peer.report(epoch, tick)
        } else {
            None
        };

        if outcome.created {
            debug!("{} recorded balance {} for {}", peer_id, balance, epoch);
            self.emit_event(SnapshotEvent::BalanceRecorded {
                peer: peer_id,
                epoch,
                balance,
                tick,
            });
        }

        if let Some(sender) = outcome.closed {
            debug!("{} closed channel from {} for {}", peer_id, sender, epoch);
            self.emit_event(SnapshotEvent::ChannelClosed {
                peer: peer_id,
                from: sender,
                epoch,
                tick,
            });
        }

        if outcome.discarded
            && let Some(sender) = from
        {
            trace!("{} discarded duplicate {} marker from {}", peer_id, epoch, sender);
            self.stats.markers_discarded += 1;
            self.emit_event(SnapshotEvent::MarkerDiscarded {
                peer: peer_id,
                from: sender,
                epoch,
                tick,
            });
        }

        if let Some(report) = report {
            info!(
                "{} completed {} at tick {}: {:?}",
                peer_id, epoch, tick, report.vector
            );
            self.stats.epochs_completed += 1;
            self.emit_event(SnapshotEvent::EpochCompleted {
                peer: peer_id,
                epoch,
                vector: report.vector.clone(),
                tick,
            });
            self.reports.push(report);
        }

        if outcome.forward {
            self.broadcast_marker(peer_id, epoch)?;
        }
        Ok(())
    }

    fn broadcast_marker(&mut self, peer_id: PeerId, epoch: EpochId) -> Result<()> {
        let links = self.peer(peer_id)?.links().to_vec();
        for link in links {
            self.send_on(link.outbound, Message::SnapshotMarker { epoch })?;
            self.stats.markers_sent += 1;
            self.emit_event(SnapshotEvent::MarkerSent {
                from: peer_id,
                to: link.remote,
                epoch,
                tick: self.tick,
            });
        }
        Ok(())
    }

    fn send_on(&mut self, id: ChannelId, message: Message) -> Result<Tick> {
        let channel = self
            .channels
            .get_mut(id.0)
            .ok_or(SimError::UnknownChannel(id))?;
        self.traffic_started = true;
        Ok(channel.send(self.tick, message, &mut self.queue))
    }

    fn emit_event(&mut self, event: SnapshotEvent) {
        if self.config.trace_events {
            trace!("Event: {:?}", event);
        }
        self.event_log.push(event);
    }

    fn peer_mut(&mut self, id: PeerId) -> Result<&mut Peer> {
        self.peers.get_mut(&id).ok_or(SimError::UnknownPeer(id))
    }

    /// Look up a peer
    pub fn peer(&self, id: PeerId) -> Result<&Peer> {
        self.peers.get(&id).ok_or(SimError::UnknownPeer(id))
    }

    /// All peers in id order
    pub fn peers(&self) -> impl Iterator<Item = &Peer> {
        self.peers.values()
    }

    pub fn peer_ids(&self) -> Vec<PeerId> {
        self.peers.keys().copied().collect()
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    pub fn channel(&self, id: ChannelId) -> Result<&Channel> {
        self.channels.get(id.0).ok_or(SimError::UnknownChannel(id))
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn balance(&self, id: PeerId) -> Result<i64> {
        self.peer(id).map(Peer::balance)
    }

    /// Sum of every peer's current balance
    pub fn total_balance(&self) -> i64 {
        self.peers.values().map(Peer::balance).sum()
    }

    /// Sum of transfers sent but not yet delivered
    pub fn in_flight_amount(&self) -> i64 {
        self.queue.iter().map(|d| d.message.amount()).sum()
    }

    /// Balances plus in-flight transfers; constant for the whole run
    pub fn total_resources(&self) -> i64 {
        self.total_balance() + self.in_flight_amount()
    }

    pub fn pending_deliveries(&self) -> usize {
        self.queue.len()
    }

    pub fn is_idle(&self) -> bool {
        self.queue.is_empty()
    }

    /// Every completed peer-level report, in completion order
    pub fn reports(&self) -> &[SnapshotReport] {
        &self.reports
    }

    pub fn reports_for(&self, epoch: EpochId) -> Vec<&SnapshotReport> {
        self.reports.iter().filter(|r| r.epoch == epoch).collect()
    }

    pub fn report(&self, peer: PeerId, epoch: EpochId) -> Option<&SnapshotReport> {
        self.reports
            .iter()
            .find(|r| r.peer == peer && r.epoch == epoch)
    }

    /// Whether every peer has reported `epoch`
    pub fn is_epoch_complete(&self, epoch: EpochId) -> bool {
        self.peers
            .keys()
            .all(|peer| self.report(*peer, epoch).is_some())
    }

    /// Get a summary of the current state
    pub fn state_summary(&self) -> String {
        let open_tasks: usize = self
            .peers
            .values()
            .flat_map(|p| p.tasks())
            .filter(|t| !t.is_complete())
            .count();

        format!(
            "Tick {}: {} pending deliveries, {} in flight, {} open snapshot task(s), {} report(s)",
            self.tick,
            self.queue.len(),
            self.in_flight_amount(),
            open_tasks,
            self.reports.len()
        )
    }

    /// Print a simple ASCII visualization of the topology
    pub fn visualize(&self) -> String {
        let mut output = String::new();
        output.push_str("Topology:\n");
        output.push_str(&format!("  Peers: {}\n", self.peers.len()));
        output.push_str(&format!("  Channels: {}\n\n", self.channels.len()));

        for peer in self.peers.values() {
            let links: Vec<String> = peer
                .links()
                .iter()
                .map(|link| {
                    let delay = self
                        .channels
                        .get(link.outbound.0)
                        .map(|c| c.delay)
                        .unwrap_or_default();
                    format!("{}({})", link.remote, delay)
                })
                .collect();
            output.push_str(&format!(
                "  {} [{}] -> [{}]\n",
                peer.id,
                peer.balance(),
                links.join(", ")
            ));
        }
        output
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}
