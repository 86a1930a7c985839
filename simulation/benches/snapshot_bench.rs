//! Snapshot simulation benchmarks
//!
//! Benchmarks for:
//! - A full snapshot over a full mesh under both forwarding policies
//! - Event queue churn
//! - Random payment traffic with a snapshot in the middle
//!
//! Run with: cargo bench -p snapshot-simulation

use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use snapshot_simulation::events::EventQueue;
use snapshot_simulation::{
    ChannelId, EpochId, ForwardPolicy, GlobalCut, Message, PeerId, SimConfig, Simulation,
    TopologyBuilder,
};

// ============================================================================
// Full Mesh Snapshot Benchmarks
// ============================================================================

fn bench_full_mesh_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_mesh_snapshot");

    for (name, policy) in [
        ("every_close", ForwardPolicy::EveryClose),
        ("first_receipt", ForwardPolicy::FirstReceipt),
    ] {
        for peers in [8usize, 26] {
            let config = SimConfig::default().with_forward_policy(policy);
            group.bench_function(format!("{}_{}_peers", name, peers), |b| {
                b.iter_batched(
                    || {
                        TopologyBuilder::new(peers)
                            .config(config.clone())
                            .delay(3)
                            .full_mesh()
                            .unwrap()
                    },
                    |mut sim| {
                        sim.initiate_snapshot(PeerId('A'), EpochId(1)).unwrap();
                        sim.run_until_idle().unwrap();
                        black_box(GlobalCut::assemble(&sim, EpochId(1)))
                    },
                    BatchSize::SmallInput,
                )
            });
        }
    }

    group.finish();
}

// ============================================================================
// Event Queue Benchmarks
// ============================================================================

fn bench_event_queue(c: &mut Criterion) {
    let mut group = c.benchmark_group("event_queue");

    group.bench_function("schedule_pop_10000", |b| {
        b.iter(|| {
            let mut queue = EventQueue::new();
            for i in 0..10_000u64 {
                queue.schedule(i % 97, ChannelId((i % 13) as usize), Message::ResourceTransfer {
                    amount: i as i64,
                });
            }
            while let Some(delivery) = queue.pop_earliest() {
                black_box(delivery);
            }
        })
    });

    group.finish();
}

// ============================================================================
// Random Traffic Benchmarks
// ============================================================================

fn bench_random_payments(c: &mut Criterion) {
    let mut group = c.benchmark_group("random_payments");
    group.sample_size(20);

    group.bench_function("12_peers_200_payments", |b| {
        let mut seed = 0u64;
        b.iter_batched(
            || {
                seed += 1;
                let sim = TopologyBuilder::new(12).delay(5).random(0.3, seed).unwrap();
                (sim, StdRng::seed_from_u64(seed))
            },
            |(mut sim, mut rng)| {
                random_traffic(&mut sim, &mut rng, 200);
                black_box(GlobalCut::assemble(&sim, EpochId(1)))
            },
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

fn random_traffic(sim: &mut Simulation, rng: &mut StdRng, payments: usize) {
    let ids = sim.peer_ids();
    for i in 0..payments {
        if i == payments / 2 {
            sim.initiate_snapshot(ids[rng.random_range(0..ids.len())], EpochId(1))
                .unwrap();
        }
        let from = ids[rng.random_range(0..ids.len())];
        let neighbors: Vec<PeerId> = sim.peer(from).unwrap().neighbors().collect();
        if !neighbors.is_empty() {
            let to = neighbors[rng.random_range(0..neighbors.len())];
            sim.initiate_payment(from, to, rng.random_range(1..=20)).unwrap();
        }
        sim.run_ticks(rng.random_range(0..=2)).unwrap();
    }
    sim.run_until_idle().unwrap();
}

criterion_group!(
    benches,
    bench_full_mesh_snapshot,
    bench_event_queue,
    bench_random_payments,
);
criterion_main!(benches);
