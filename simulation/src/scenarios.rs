//! Pre-defined snapshot scenarios
//!
//! Includes the canonical three-peer example in both orderings and larger
//! runs whose cuts are checked against the known total.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};

use crate::config::SimConfig;
use crate::cut::GlobalCut;
use crate::error::Result;
use crate::simulation::Simulation;
use crate::topology::{TopologyBuilder, from_edges_with_config};
use crate::types::{EpochId, PeerId};

/// Which event reaches B first in the three-peer scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum PaymentOrdering {
    /// B pays C before A's marker reaches B; the payment is caught in transit
    PaymentFirst,
    /// B relays A's marker before paying; the payment lands after the cut
    MarkerFirst,
}

/// Run the canonical three-peer scenario:
///
/// ```text
/// A, B and C are fully connected and hold 100 each
/// A starts epoch 7
/// B pays C 35, either before or after A's marker reaches B
/// ```
///
/// A-B and A-C take one tick, B-C takes three, so C always hears about the
/// epoch from A first. Balances and delays are fixed; `config` supplies the
/// forwarding policy and run limits.
pub fn run_three_peer_scenario(ordering: PaymentOrdering, config: SimConfig) -> Result<Simulation> {
    info!("=== Running Three-Peer Scenario ({:?}) ===", ordering);

    let mut sim = from_edges_with_config(
        &[('A', 'B', 1, 1), ('A', 'C', 1, 1), ('B', 'C', 3, 3)],
        100,
        config,
    )?;
    let total = sim.total_resources();
    let epoch = EpochId(7);

    println!("{}", sim.visualize());

    println!("\n--- Step 1: A starts {} ---", epoch);
    sim.initiate_snapshot(PeerId('A'), epoch)?;
    println!("  {}", sim.state_summary());

    match ordering {
        PaymentOrdering::PaymentFirst => {
            println!("\n--- Step 2: B pays C 35 before seeing the marker ---");
            sim.initiate_payment(PeerId('B'), PeerId('C'), 35)?;
        }
        PaymentOrdering::MarkerFirst => {
            println!("\n--- Step 2: B receives the marker and relays it ---");
            sim.run_until(1)?;
            println!("  {}", sim.state_summary());

            println!("\n--- Step 3: B pays C 35 behind its marker ---");
            sim.initiate_payment(PeerId('B'), PeerId('C'), 35)?;
        }
    }
    println!("  {}", sim.state_summary());

    println!("\n--- Running until idle ---");
    sim.run_until_idle()?;
    println!("  {}", sim.state_summary());

    print_reports(&sim, epoch);
    verify_cut(&sim, epoch, total)?;
    print_statistics(&sim);

    Ok(sim)
}

/// Scenario: Payments circulating around a ring while A takes a snapshot
pub fn run_ring_scenario(peers: usize, config: SimConfig) -> Result<Simulation> {
    info!("=== Running Ring Scenario ({} peers) ===", peers);

    let mut sim = TopologyBuilder::new(peers).config(config).delay(2).ring()?;
    let total = sim.total_resources();
    let ids = sim.peer_ids();
    let epoch = EpochId(1);

    println!("{}", sim.visualize());

    println!("\n--- Every peer pays its clockwise neighbour ---");
    if ids.len() > 1 {
        for (i, from) in ids.iter().enumerate() {
            let to = ids[(i + 1) % ids.len()];
            sim.initiate_payment(*from, to, 10 + i as i64)?;
        }
    }
    sim.run_ticks(1)?;

    println!("\n--- A starts {} ---", epoch);
    if let Some(first) = ids.first() {
        sim.initiate_snapshot(*first, epoch)?;
    }
    sim.run_until_idle()?;
    println!("  {}", sim.state_summary());

    print_reports(&sim, epoch);
    verify_cut(&sim, epoch, total)?;
    print_statistics(&sim);

    Ok(sim)
}

/// Scenario: Two initiators run overlapping epochs over the same traffic
///
/// A starts epoch 1 and C starts epoch 2 a tick later on a four-peer ring.
/// Both cuts must account for the same total.
pub fn run_concurrent_epochs_scenario(config: SimConfig) -> Result<Simulation> {
    info!("=== Running Concurrent Epochs Scenario ===");

    let mut sim = TopologyBuilder::new(4).config(config).delay(2).ring()?;
    let total = sim.total_resources();

    println!("{}", sim.visualize());

    println!("\n--- Tick 0: A pays B, A starts epoch 1 ---");
    sim.initiate_payment(PeerId('A'), PeerId('B'), 10)?;
    sim.initiate_snapshot(PeerId('A'), EpochId(1))?;
    sim.run_ticks(1)?;

    println!("\n--- Tick 1: C pays D, D pays A, C starts epoch 2 ---");
    sim.initiate_payment(PeerId('C'), PeerId('D'), 20)?;
    sim.initiate_payment(PeerId('D'), PeerId('A'), 5)?;
    sim.initiate_snapshot(PeerId('C'), EpochId(2))?;
    sim.run_ticks(1)?;

    println!("\n--- Tick 2: B pays C ---");
    sim.initiate_payment(PeerId('B'), PeerId('C'), 15)?;
    sim.run_until_idle()?;
    println!("  {}", sim.state_summary());

    for epoch in [EpochId(1), EpochId(2)] {
        print_reports(&sim, epoch);
        verify_cut(&sim, epoch, total)?;
    }
    print_statistics(&sim);

    Ok(sim)
}

/// Scenario: Random topology with random payments around one snapshot
pub fn run_random_payments_scenario(
    peers: usize,
    payments: usize,
    seed: u64,
    config: SimConfig,
) -> Result<Simulation> {
    info!(
        "=== Running Random Payments Scenario ({} peers, {} payments, seed {}) ===",
        peers, payments, seed
    );

    let mut sim = TopologyBuilder::new(peers)
        .config(config)
        .delay(5)
        .random(0.3, seed)?;
    let total = sim.total_resources();
    let ids = sim.peer_ids();
    let epoch = EpochId(1);
    let mut rng = StdRng::seed_from_u64(seed);

    println!("{}", sim.visualize());

    let snapshot_at = payments / 2;
    for i in 0..payments {
        if i == snapshot_at && !ids.is_empty() {
            let initiator = ids[rng.random_range(0..ids.len())];
            println!("\n--- Tick {}: {} starts {} ---", sim.tick, initiator, epoch);
            sim.initiate_snapshot(initiator, epoch)?;
        }

        if !ids.is_empty() {
            let from = ids[rng.random_range(0..ids.len())];
            let neighbors: Vec<PeerId> = sim.peer(from)?.neighbors().collect();
            if !neighbors.is_empty() {
                let to = neighbors[rng.random_range(0..neighbors.len())];
                sim.initiate_payment(from, to, rng.random_range(1..=20))?;
            }
        }

        sim.run_ticks(rng.random_range(0..=2))?;

        if i % 10 == 9 {
            println!("  {}", sim.state_summary());
        }
    }

    if payments <= snapshot_at && !ids.is_empty() {
        sim.initiate_snapshot(ids[0], epoch)?;
    }

    sim.run_until_idle()?;
    println!("  {}", sim.state_summary());

    print_reports(&sim, epoch);
    verify_cut(&sim, epoch, total)?;
    print_statistics(&sim);

    Ok(sim)
}

fn verify_cut(sim: &Simulation, epoch: EpochId, expected: i64) -> Result<()> {
    match GlobalCut::assemble(sim, epoch) {
        Some(cut) => {
            cut.verify(expected)?;
            info!(
                "Cut for {} verified: {} recorded + {} in transit = {}",
                epoch,
                cut.recorded_balances(),
                cut.in_transit(),
                cut.total()
            );
            Ok(())
        }
        None => {
            warn!("{} did not complete at every peer", epoch);
            Ok(())
        }
    }
}

fn print_reports(sim: &Simulation, epoch: EpochId) {
    println!("\n=== Reports for {} ===", epoch);
    for report in sim.reports_for(epoch) {
        let channels: Vec<String> = report
            .channels
            .iter()
            .zip(&report.vector)
            .map(|(peer, amount)| format!("{}:{}", peer, amount))
            .collect();
        println!(
            "  {} @ tick {}: balance {} | in transit [{}]",
            report.peer,
            report.completed_at,
            report.recorded_balance(),
            channels.join(", ")
        );
    }
}

fn print_statistics(sim: &Simulation) {
    println!("\n=== Final Statistics ===");
    println!("  Payments sent: {}", sim.stats.payments_sent);
    println!("  Payments delivered: {}", sim.stats.payments_delivered);
    println!("  Markers sent: {}", sim.stats.markers_sent);
    println!("  Markers discarded: {}", sim.stats.markers_discarded);
    println!("  Transfers recorded: {}", sim.stats.transfers_recorded);
    println!("  Epoch completions: {}", sim.stats.epochs_completed);
}
