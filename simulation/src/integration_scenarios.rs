//! Integration scenarios exercising the whole snapshot stack
//!
//! These scenarios combine:
//! - channels and the event queue (FIFO delivery)
//! - peer marker handling under both forwarding policies
//! - topology builders
//! - global cut assembly and verification

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{ForwardPolicy, SimConfig};
use crate::cut::GlobalCut;
use crate::simulation::Simulation;
use crate::topology::{TopologyBuilder, from_edges};
use crate::types::{ChannelId, EpochId, Message, PeerId, SnapshotEvent};

fn delivered_on(sim: &Simulation, channel: ChannelId) -> Vec<Message> {
    sim.event_log
        .iter()
        .filter_map(|event| match event {
            SnapshotEvent::Delivered {
                channel: c,
                message,
                ..
            } if *c == channel => Some(*message),
            _ => None,
        })
        .collect()
}

fn policy_config(policy: ForwardPolicy) -> SimConfig {
    SimConfig::default().with_forward_policy(policy)
}

/// Issue random payments on a random topology, starting `epochs` snapshots at
/// random peers along the way.
fn random_run(seed: u64, policy: ForwardPolicy, epochs: u64) -> Simulation {
    let mut sim = TopologyBuilder::new(7)
        .config(policy_config(policy))
        .delay(6)
        .random(0.35, seed)
        .unwrap();
    let ids = sim.peer_ids();
    let mut rng = StdRng::seed_from_u64(seed ^ 0x5eed);
    let mut next_epoch = 1;

    for i in 0..60 {
        if i % 15 == 5 && next_epoch <= epochs {
            let initiator = ids[rng.random_range(0..ids.len())];
            sim.initiate_snapshot(initiator, EpochId(next_epoch)).unwrap();
            next_epoch += 1;
        }
        let from = ids[rng.random_range(0..ids.len())];
        let neighbors: Vec<PeerId> = sim.peer(from).unwrap().neighbors().collect();
        let to = neighbors[rng.random_range(0..neighbors.len())];
        sim.initiate_payment(from, to, rng.random_range(1..=50)).unwrap();
        sim.run_ticks(rng.random_range(0..=3)).unwrap();
    }
    sim.run_until_idle().unwrap();
    sim
}

/// Messages on one channel arrive in the order they were sent
#[test]
fn test_fifo_per_channel() {
    let mut sim = from_edges(&[('A', 'B', 3, 1)], 100).unwrap();
    let ab = sim.peer(PeerId('A')).unwrap().links()[0].outbound;

    sim.initiate_payment(PeerId('A'), PeerId('B'), 1).unwrap();
    sim.run_ticks(1).unwrap();
    sim.initiate_payment(PeerId('A'), PeerId('B'), 2).unwrap();
    sim.initiate_snapshot(PeerId('A'), EpochId(1)).unwrap();
    sim.initiate_payment(PeerId('A'), PeerId('B'), 3).unwrap();
    sim.run_until_idle().unwrap();

    assert_eq!(
        delivered_on(&sim, ab),
        vec![
            Message::ResourceTransfer { amount: 1 },
            Message::ResourceTransfer { amount: 2 },
            Message::SnapshotMarker { epoch: EpochId(1) },
            Message::ResourceTransfer { amount: 3 },
        ]
    );

    // B recorded its balance before the last payment arrived
    let b = sim.report(PeerId('B'), EpochId(1)).unwrap();
    assert_eq!(b.recorded_balance(), 103);
    assert_eq!(sim.balance(PeerId('B')).unwrap(), 106);
}

/// Debit at send, credit at delivery, nothing created or lost in between
#[test]
fn test_transfer_conservation() {
    let mut sim = TopologyBuilder::new(5).delay(4).full_mesh().unwrap();
    let total = sim.total_resources();

    sim.initiate_payment(PeerId('A'), PeerId('B'), 30).unwrap();
    assert_eq!(sim.balance(PeerId('A')).unwrap(), 70);
    assert_eq!(sim.balance(PeerId('B')).unwrap(), 100);
    sim.initiate_payment(PeerId('B'), PeerId('E'), 120).unwrap();
    sim.initiate_snapshot(PeerId('C'), EpochId(3)).unwrap();
    sim.initiate_payment(PeerId('D'), PeerId('A'), 15).unwrap();

    while sim.step().unwrap() {
        assert_eq!(sim.total_resources(), total);
    }

    assert_eq!(sim.total_balance(), total);
    assert_eq!(sim.balance(PeerId('A')).unwrap(), 85);
    assert_eq!(sim.balance(PeerId('B')).unwrap(), 10);
    assert_eq!(sim.balance(PeerId('E')).unwrap(), 220);
}

/// Every peer reports exactly once per epoch with one entry per link plus balance
#[test]
fn test_snapshot_completeness() {
    for policy in [ForwardPolicy::EveryClose, ForwardPolicy::FirstReceipt] {
        for sim in [
            TopologyBuilder::new(6).config(policy_config(policy)).full_mesh(),
            TopologyBuilder::new(6).config(policy_config(policy)).line(),
            TopologyBuilder::new(6).config(policy_config(policy)).star(),
        ] {
            let mut sim = sim.unwrap();
            sim.initiate_snapshot(PeerId('C'), EpochId(1)).unwrap();
            sim.run_until_idle().unwrap();

            assert!(sim.is_epoch_complete(EpochId(1)));
            assert_eq!(sim.reports().len(), 6);
            for peer in sim.peers() {
                let report = sim.report(peer.id, EpochId(1)).unwrap();
                assert_eq!(report.vector.len(), peer.links().len() + 1);
                assert_eq!(report.channels, peer.neighbors().collect::<Vec<_>>());
            }
        }
    }
}

/// Duplicate markers are dropped without changing recorded state or relaying
#[test]
fn test_marker_idempotency() {
    let mut sim = TopologyBuilder::new(4).delay(2).full_mesh().unwrap();
    sim.initiate_snapshot(PeerId('A'), EpochId(1)).unwrap();
    sim.run_until_idle().unwrap();

    let discarded = sim.stats.markers_discarded;
    let sent = sim.stats.markers_sent;
    let reports = sim.reports().to_vec();
    assert!(discarded > 0);

    // Re-originating a finished epoch only produces more duplicates
    sim.initiate_snapshot(PeerId('B'), EpochId(1)).unwrap();
    sim.run_until_idle().unwrap();

    assert_eq!(sim.reports(), reports.as_slice());
    assert_eq!(sim.stats.markers_sent, sent + 3);
    assert_eq!(sim.stats.markers_discarded, discarded + 3);
}

/// Both policies close every channel at the same instant, so reports agree
#[test]
fn test_forward_policies_agree_on_reports() {
    let mut runs = Vec::new();
    for policy in [ForwardPolicy::EveryClose, ForwardPolicy::FirstReceipt] {
        runs.push(random_run(11, policy, 2));
    }
    let (every, first) = (&runs[0], &runs[1]);

    assert_eq!(every.reports().len(), first.reports().len());
    for report in first.reports() {
        assert_eq!(every.report(report.peer, report.epoch), Some(report));
    }

    // FirstReceipt relays once per link per epoch and never duplicates
    let links: u64 = first.peers().map(|p| p.links().len() as u64).sum();
    assert_eq!(first.stats.markers_sent, links * 2);
    assert_eq!(first.stats.markers_discarded, 0);
}

/// On a full mesh EveryClose relays again after each intermediate close
#[test]
fn test_every_close_relays_more_markers() {
    let mut counts = Vec::new();
    for policy in [ForwardPolicy::FirstReceipt, ForwardPolicy::EveryClose] {
        let mut sim = TopologyBuilder::new(4)
            .config(policy_config(policy))
            .full_mesh()
            .unwrap();
        sim.initiate_snapshot(PeerId('A'), EpochId(1)).unwrap();
        sim.run_until_idle().unwrap();
        assert!(sim.is_epoch_complete(EpochId(1)));
        counts.push((sim.stats.markers_sent, sim.stats.markers_discarded));
    }

    assert_eq!(counts[0], (12, 0));
    assert!(counts[1].0 > 12);
    assert_eq!(counts[1].0 - counts[1].1, 12);
}

/// Recorded balances plus channel entries always equal the network total
#[test]
fn test_cut_correctness_random_runs() {
    snapshot_logging::init_testing();

    for seed in 0..16 {
        for policy in [ForwardPolicy::EveryClose, ForwardPolicy::FirstReceipt] {
            let sim = random_run(seed, policy, 3);
            assert_eq!(sim.total_balance(), 700);

            for epoch in 1..=3 {
                let cut = GlobalCut::assemble(&sim, EpochId(epoch))
                    .unwrap_or_else(|| panic!("seed {} epoch {} incomplete", seed, epoch));
                cut.verify(700).unwrap();
            }
        }
    }
}

fn three_peers() -> Simulation {
    from_edges(&[('A', 'B', 1, 1), ('A', 'C', 1, 1), ('B', 'C', 3, 3)], 100).unwrap()
}

/// B pays C before it hears of the epoch: the payment is recorded in transit
#[test]
fn test_three_peers_payment_before_marker() {
    let mut sim = three_peers();
    sim.initiate_snapshot(PeerId('A'), EpochId(7)).unwrap();
    sim.initiate_payment(PeerId('B'), PeerId('C'), 35).unwrap();
    sim.run_until_idle().unwrap();

    let c = sim.report(PeerId('C'), EpochId(7)).unwrap();
    assert_eq!(c.vector, vec![0, 35, 100]);

    let b = sim.report(PeerId('B'), EpochId(7)).unwrap();
    assert_eq!(b.recorded_balance(), 65);

    let cut = GlobalCut::assemble(&sim, EpochId(7)).unwrap();
    assert_eq!(cut.in_transit(), 35);
    assert!(cut.verify(300).is_ok());
}

/// B relays the marker before paying: the payment lands after C's cut
#[test]
fn test_three_peers_marker_before_payment() {
    let mut sim = three_peers();
    sim.initiate_snapshot(PeerId('A'), EpochId(7)).unwrap();
    sim.run_until(1).unwrap();
    sim.initiate_payment(PeerId('B'), PeerId('C'), 35).unwrap();
    sim.run_until_idle().unwrap();

    let c = sim.report(PeerId('C'), EpochId(7)).unwrap();
    assert_eq!(c.vector, vec![0, 0, 100]);
    assert_eq!(sim.balance(PeerId('C')).unwrap(), 135);

    let b = sim.report(PeerId('B'), EpochId(7)).unwrap();
    assert_eq!(b.recorded_balance(), 100);

    let cut = GlobalCut::assemble(&sim, EpochId(7)).unwrap();
    assert_eq!(cut.in_transit(), 0);
    assert!(cut.verify(300).is_ok());
}

/// Two originators of distinct epochs on a cycle stay independent
#[test]
fn test_two_originators_distinct_epochs_on_ring() {
    let mut sim = TopologyBuilder::new(5).delay(3).ring().unwrap();
    sim.initiate_snapshot(PeerId('A'), EpochId(1)).unwrap();
    sim.initiate_payment(PeerId('C'), PeerId('B'), 40).unwrap();
    sim.run_ticks(1).unwrap();
    sim.initiate_snapshot(PeerId('D'), EpochId(2)).unwrap();
    sim.initiate_payment(PeerId('A'), PeerId('E'), 25).unwrap();
    sim.run_until_idle().unwrap();

    for epoch in [EpochId(1), EpochId(2)] {
        assert_eq!(sim.reports_for(epoch).len(), 5);
        GlobalCut::assemble(&sim, epoch).unwrap().verify(500).unwrap();
    }

    // Each peer holds one finished task per epoch
    for peer in sim.peers() {
        assert_eq!(peer.tasks().count(), 2);
        assert!(peer.tasks().all(|t| t.is_complete()));
    }
}

/// Two peers originating the same epoch produce a single consistent cut
#[test]
fn test_two_originators_same_epoch() {
    let mut sim = TopologyBuilder::new(4).delay(2).ring().unwrap();
    sim.initiate_payment(PeerId('B'), PeerId('C'), 10).unwrap();
    sim.initiate_snapshot(PeerId('A'), EpochId(4)).unwrap();
    sim.initiate_snapshot(PeerId('C'), EpochId(4)).unwrap();
    sim.run_until_idle().unwrap();

    assert_eq!(sim.reports_for(EpochId(4)).len(), 4);
    let cut = GlobalCut::assemble(&sim, EpochId(4)).unwrap();
    assert!(cut.verify(400).is_ok());
    assert_eq!(cut.in_transit(), 10);
}
