//! Per-peer, per-epoch snapshot state
//!
//! A [`SnapshotTask`] moves through `absent -> open(0) -> ... -> open(n-1) ->
//! complete`. It is created when a peer first sees a marker for its epoch,
//! capturing the peer's balance at that instant. Each inbound channel records
//! arriving transfers until the epoch's marker closes it. Once every channel
//! is closed the resource vector is final.

use serde::{Deserialize, Serialize};

use crate::types::{EpochId, PeerId, Tick};

/// Result of closing an inbound channel for an epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// The channel was already closed; nothing changed
    AlreadyClosed,
    /// The channel closed and others are still recording
    Closed { remaining: usize },
    /// The channel closed and it was the last one open
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotTask {
    epoch: EpochId,
    closed: Vec<bool>,
    /// One entry per inbound channel, then the captured balance
    vector: Vec<i64>,
}

impl SnapshotTask {
    /// Start recording `epoch` over `channels` inbound channels
    pub fn new(epoch: EpochId, channels: usize, balance: i64) -> Self {
        let mut vector = vec![0; channels + 1];
        vector[channels] = balance;
        Self {
            epoch,
            closed: vec![false; channels],
            vector,
        }
    }

    pub fn epoch(&self) -> EpochId {
        self.epoch
    }

    pub fn channel_count(&self) -> usize {
        self.closed.len()
    }

    pub fn closed_count(&self) -> usize {
        self.closed.iter().filter(|c| **c).count()
    }

    /// Whether `slot` has stopped recording. Out-of-range slots count as closed.
    pub fn is_closed(&self, slot: usize) -> bool {
        self.closed.get(slot).copied().unwrap_or(true)
    }

    pub fn is_complete(&self) -> bool {
        self.closed.iter().all(|c| *c)
    }

    /// Balance captured when the task was created
    pub fn recorded_balance(&self) -> i64 {
        self.vector[self.closed.len()]
    }

    /// Amount recorded in transit on `slot`
    pub fn in_transit(&self, slot: usize) -> i64 {
        if slot < self.closed.len() {
            self.vector[slot]
        } else {
            0
        }
    }

    pub fn resource_vector(&self) -> &[i64] {
        &self.vector
    }

    /// Attribute an arriving transfer to `slot` if it is still open.
    /// Returns whether it was recorded.
    pub fn record_transfer(&mut self, slot: usize, amount: i64) -> bool {
        if self.is_closed(slot) {
            return false;
        }
        self.vector[slot] += amount;
        true
    }

    /// Stop recording on `slot`
    pub fn close(&mut self, slot: usize) -> CloseOutcome {
        match self.closed.get_mut(slot) {
            Some(closed) if !*closed => *closed = true,
            _ => return CloseOutcome::AlreadyClosed,
        }

        let remaining = self.channel_count() - self.closed_count();
        if remaining == 0 {
            CloseOutcome::Completed
        } else {
            CloseOutcome::Closed { remaining }
        }
    }
}

/// Final resource vector of one peer for one epoch.
///
/// `vector` holds one entry per inbound channel in the peer's slot order,
/// then the balance captured at epoch start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotReport {
    pub peer: PeerId,
    pub epoch: EpochId,
    pub vector: Vec<i64>,
    /// Remote peer of each inbound channel, in slot order
    pub channels: Vec<PeerId>,
    pub completed_at: Tick,
}

impl SnapshotReport {
    pub fn recorded_balance(&self) -> i64 {
        self.vector.last().copied().unwrap_or_default()
    }

    /// Sum of channel entries
    pub fn in_transit(&self) -> i64 {
        let channels = self.vector.len().saturating_sub(1);
        self.vector[..channels].iter().sum()
    }

    /// Entry recorded for the channel from `from`
    pub fn in_transit_from(&self, from: PeerId) -> Option<i64> {
        self.channels
            .iter()
            .position(|p| *p == from)
            .map(|slot| self.vector[slot])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_task_captures_balance() {
        let task = SnapshotTask::new(EpochId(1), 3, 100);
        assert_eq!(task.resource_vector(), &[0, 0, 0, 100]);
        assert_eq!(task.recorded_balance(), 100);
        assert_eq!(task.closed_count(), 0);
        assert!(!task.is_complete());
    }

    #[test]
    fn test_close_progression() {
        let mut task = SnapshotTask::new(EpochId(1), 3, 0);

        assert_eq!(task.close(1), CloseOutcome::Closed { remaining: 2 });
        assert_eq!(task.close(1), CloseOutcome::AlreadyClosed);
        assert_eq!(task.close(0), CloseOutcome::Closed { remaining: 1 });
        assert_eq!(task.close(2), CloseOutcome::Completed);
        assert!(task.is_complete());
        assert_eq!(task.close(2), CloseOutcome::AlreadyClosed);
        assert_eq!(task.closed_count(), 3);
    }

    #[test]
    fn test_transfers_only_recorded_while_open() {
        let mut task = SnapshotTask::new(EpochId(2), 2, 50);

        assert!(task.record_transfer(0, 10));
        assert!(task.record_transfer(0, 5));
        task.close(0);
        assert!(!task.record_transfer(0, 99));
        assert!(task.record_transfer(1, -3));

        assert_eq!(task.resource_vector(), &[15, -3, 50]);
        assert_eq!(task.in_transit(0), 15);
        assert_eq!(task.in_transit(7), 0);
    }

    #[test]
    fn test_zero_channel_task_is_complete() {
        let mut task = SnapshotTask::new(EpochId(3), 0, 42);
        assert!(task.is_complete());
        assert_eq!(task.close(0), CloseOutcome::AlreadyClosed);
        assert_eq!(task.resource_vector(), &[42]);
    }

    #[test]
    fn test_report_accessors() {
        let report = SnapshotReport {
            peer: PeerId('C'),
            epoch: EpochId(7),
            vector: vec![0, 35, 100],
            channels: vec![PeerId('A'), PeerId('B')],
            completed_at: 12,
        };

        assert_eq!(report.recorded_balance(), 100);
        assert_eq!(report.in_transit(), 35);
        assert_eq!(report.in_transit_from(PeerId('B')), Some(35));
        assert_eq!(report.in_transit_from(PeerId('Z')), None);
    }
}
