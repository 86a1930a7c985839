//! Peer state: balance, links and per-epoch snapshot tasks
//!
//! A peer never touches channels or the scheduler directly. Its handlers
//! update local state and return what the simulation must do next (debit
//! then send, relay a marker, publish a report).

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::ForwardPolicy;
use crate::error::{Result, SimError};
use crate::snapshot::{CloseOutcome, SnapshotReport, SnapshotTask};
use crate::types::{ChannelId, EpochId, PeerId, Tick};

/// One connection of a peer. The slot index of a link is both its outbound
/// position and the index of the inbound channel from the same remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Link {
    pub remote: PeerId,
    /// Outbound channel towards `remote`
    pub outbound: ChannelId,
}

/// What happened when a peer handled a marker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarkerOutcome {
    /// This marker started the epoch here and captured the balance
    pub created: bool,
    /// Inbound channel that stopped recording
    pub closed: Option<PeerId>,
    /// The marker arrived on an already closed channel
    pub discarded: bool,
    /// Every inbound channel is now closed
    pub completed: bool,
    /// The marker must be relayed on every outbound link
    pub forward: bool,
}

#[derive(Debug, Clone)]
pub struct Peer {
    pub id: PeerId,
    balance: i64,
    links: Vec<Link>,
    slots: BTreeMap<PeerId, usize>,
    tasks: BTreeMap<EpochId, SnapshotTask>,
}

impl Peer {
    pub fn new(id: PeerId, balance: i64) -> Self {
        Self {
            id,
            balance,
            links: Vec::new(),
            slots: BTreeMap::new(),
            tasks: BTreeMap::new(),
        }
    }

    pub fn balance(&self) -> i64 {
        self.balance
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn neighbors(&self) -> impl Iterator<Item = PeerId> + '_ {
        self.links.iter().map(|l| l.remote)
    }

    /// Slot assigned to `remote` at connect time
    pub fn slot_of(&self, remote: PeerId) -> Option<usize> {
        self.slots.get(&remote).copied()
    }

    pub fn is_connected_to(&self, remote: PeerId) -> bool {
        self.slots.contains_key(&remote)
    }

    pub fn task(&self, epoch: EpochId) -> Option<&SnapshotTask> {
        self.tasks.get(&epoch)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &SnapshotTask> {
        self.tasks.values()
    }

    /// Append a link and return its permanent slot
    pub(crate) fn add_link(&mut self, remote: PeerId, outbound: ChannelId) -> Result<usize> {
        if self.is_connected_to(remote) {
            return Err(SimError::DuplicateConnection {
                a: self.id,
                b: remote,
            });
        }
        let slot = self.links.len();
        self.links.push(Link { remote, outbound });
        self.slots.insert(remote, slot);
        Ok(slot)
    }

    /// Debit `amount` for a payment to `to` and return the channel to send on
    pub(crate) fn debit_for_payment(&mut self, to: PeerId, amount: i64) -> Result<ChannelId> {
        let slot = self.slot_of(to).ok_or(SimError::UnknownReceiver { from: self.id, to })?;
        self.balance = self
            .balance
            .checked_sub(amount)
            .ok_or(SimError::BalanceOverflow {
                peer: self.id,
                amount,
            })?;
        Ok(self.links[slot].outbound)
    }

    /// Credit a transfer from `from` and attribute it to every epoch still
    /// recording that channel. Returns how many epochs recorded it. Nothing
    /// changes if any sum would overflow.
    pub(crate) fn receive_transfer(&mut self, from: PeerId, amount: i64) -> Result<usize> {
        let slot = self.slot_of(from).ok_or(SimError::UnknownSender {
            peer: self.id,
            sender: from,
        })?;
        let overflow = SimError::BalanceOverflow {
            peer: self.id,
            amount,
        };
        let balance = self.balance.checked_add(amount).ok_or(overflow.clone())?;
        let recordable = self
            .tasks
            .values()
            .filter(|task| !task.is_closed(slot))
            .all(|task| task.in_transit(slot).checked_add(amount).is_some());
        if !recordable {
            return Err(overflow);
        }
        self.balance = balance;

        let recorded = self
            .tasks
            .values_mut()
            .map(|task| task.record_transfer(slot, amount))
            .filter(|recorded| *recorded)
            .count();
        Ok(recorded)
    }

    /// Handle a marker for `epoch`. `from` is `None` when the epoch
    /// originates here.
    pub(crate) fn receive_marker(
        &mut self,
        epoch: EpochId,
        from: Option<PeerId>,
        policy: ForwardPolicy,
    ) -> Result<MarkerOutcome> {
        let slot = match from {
            Some(sender) => Some(self.slot_of(sender).ok_or(SimError::UnknownSender {
                peer: self.id,
                sender,
            })?),
            None => None,
        };

        let channels = self.links.len();
        let balance = self.balance;
        let mut outcome = MarkerOutcome::default();
        let task = self.tasks.entry(epoch).or_insert_with(|| {
            outcome.created = true;
            SnapshotTask::new(epoch, channels, balance)
        });

        match (slot, from) {
            (Some(slot), Some(sender)) => match task.close(slot) {
                CloseOutcome::AlreadyClosed => outcome.discarded = true,
                CloseOutcome::Closed { .. } => {
                    outcome.closed = Some(sender);
                    outcome.forward = match policy {
                        ForwardPolicy::EveryClose => true,
                        ForwardPolicy::FirstReceipt => outcome.created,
                    };
                }
                CloseOutcome::Completed => {
                    outcome.closed = Some(sender);
                    outcome.completed = true;
                    // A leaf still has to hand the epoch back to its only neighbour
                    outcome.forward = outcome.created;
                }
            },
            _ => {
                // Origination closes nothing; a peer without links is done at once
                outcome.completed = outcome.created && task.is_complete();
                outcome.forward = match policy {
                    ForwardPolicy::EveryClose => true,
                    ForwardPolicy::FirstReceipt => outcome.created,
                };
            }
        }

        Ok(outcome)
    }

    /// Report for `epoch` if every inbound channel has closed
    pub fn report(&self, epoch: EpochId, completed_at: Tick) -> Option<SnapshotReport> {
        let task = self.tasks.get(&epoch).filter(|t| t.is_complete())?;
        Some(SnapshotReport {
            peer: self.id,
            epoch,
            vector: task.resource_vector().to_vec(),
            channels: self.neighbors().collect(),
            completed_at,
        })
    }
}
