//! Discrete-event scheduler for channel deliveries
//!
//! Every send becomes a [`ScheduledDelivery`] on a single time-ordered queue.
//! The simulation loop pops deliveries one at a time and runs each to
//! completion, which is the only form of concurrency in the model.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::types::{ChannelId, Message, Tick};

/// A message due on a channel at a specific tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledDelivery {
    pub tick: Tick,
    pub channel: ChannelId,
    pub message: Message,
    sequence: u64, // Insertion order, breaks ties deterministically
}

impl ScheduledDelivery {
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl PartialOrd for ScheduledDelivery {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledDelivery {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max heap; earliest tick, then lowest sequence, must come out first
        other
            .tick
            .cmp(&self.tick)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// Priority queue of pending deliveries
#[derive(Debug, Default)]
pub struct EventQueue {
    heap: BinaryHeap<ScheduledDelivery>,
    next_sequence: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `message` on `channel` for `tick`
    pub fn schedule(&mut self, tick: Tick, channel: ChannelId, message: Message) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.heap.push(ScheduledDelivery {
            tick,
            channel,
            message,
            sequence,
        });
    }

    /// Removes and returns the earliest scheduled delivery
    pub fn pop_earliest(&mut self) -> Option<ScheduledDelivery> {
        self.heap.pop()
    }

    /// Tick of the earliest scheduled delivery
    pub fn peek_tick(&self) -> Option<Tick> {
        self.heap.peek().map(|d| d.tick)
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Pending deliveries in arbitrary order
    pub fn iter(&self) -> impl Iterator<Item = &ScheduledDelivery> {
        self.heap.iter()
    }

    /// Total number of deliveries ever scheduled
    pub fn scheduled_count(&self) -> u64 {
        self.next_sequence
    }
}
