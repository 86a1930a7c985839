//! Snapshot Simulation
//!
//! Runs Chandy-Lamport snapshot scenarios over simulated peer networks and
//! prints the resulting resource vectors.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use snapshot_logging::{FileConfig, LogConfig, SubscriberBuilder};

use snapshot_simulation::scenarios::{self, PaymentOrdering};
use snapshot_simulation::{EpochId, GlobalCut, PeerId, SimConfig, Simulation, TopologyBuilder};

#[derive(Parser)]
#[command(
    name = "snapshot-sim",
    about = "Chandy-Lamport snapshot simulation over delayed FIFO channels",
    version
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json: bool,

    /// Also write JSONL logs to snapshot.log in this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Load simulation settings from a JSON file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print every snapshot report as a JSON line when the run ends
    #[arg(long, global = true)]
    reports: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the canonical three-peer scenario
    ThreePeer {
        /// Whether B pays C before or after relaying A's marker
        #[arg(short, long, value_enum, default_value = "payment-first")]
        ordering: PaymentOrdering,
    },

    /// Run a snapshot over payments circulating a ring
    Ring {
        /// Number of peers (max 26)
        #[arg(short, long, default_value = "5")]
        peers: usize,
    },

    /// Run two overlapping epochs from different initiators
    Concurrent,

    /// Run random payments around a snapshot on a random topology
    Chaos {
        /// Number of peers (max 26)
        #[arg(short, long, default_value = "8")]
        peers: usize,

        /// Number of payments to issue
        #[arg(long, default_value = "50")]
        payments: usize,

        /// Seed for topology and payments
        #[arg(short, long, default_value = "42")]
        seed: u64,
    },

    /// Create and visualize a topology
    Topology {
        /// Shape of the network
        #[arg(short, long, value_enum, default_value = "ring")]
        kind: TopologyKind,

        /// Number of peers (max 26)
        #[arg(short, long, default_value = "6")]
        peers: usize,

        /// Connection probability for random topology
        #[arg(long, default_value = "0.4")]
        connection_prob: f64,
    },

    /// Interactive simulation mode
    Interactive {
        /// Number of peers
        #[arg(short, long, default_value = "4")]
        peers: usize,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TopologyKind {
    Ring,
    Full,
    Line,
    Star,
    Random,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing; the guard flushes the log file on exit
    let _guard = SubscriberBuilder::new()
        .with_config(log_config(&cli))
        .init()?;

    let config = match &cli.config {
        Some(path) => SimConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => SimConfig::default(),
    };

    let sim = match cli.command {
        Commands::ThreePeer { ordering } => {
            Some(scenarios::run_three_peer_scenario(ordering, config)?)
        }
        Commands::Ring { peers } => Some(scenarios::run_ring_scenario(peers, config)?),
        Commands::Concurrent => Some(scenarios::run_concurrent_epochs_scenario(config)?),
        Commands::Chaos {
            peers,
            payments,
            seed,
        } => Some(scenarios::run_random_payments_scenario(
            peers, payments, seed, config,
        )?),
        Commands::Topology {
            kind,
            peers,
            connection_prob,
        } => {
            let builder = TopologyBuilder::new(peers).config(config);
            let sim = match kind {
                TopologyKind::Ring => builder.ring()?,
                TopologyKind::Full => builder.full_mesh()?,
                TopologyKind::Line => builder.line()?,
                TopologyKind::Star => builder.star()?,
                TopologyKind::Random => builder.random(connection_prob, rand::random())?,
            };
            println!("{}", sim.visualize());
            None
        }
        Commands::Interactive { peers } => Some(run_interactive(peers, config)?),
    };

    if cli.reports
        && let Some(sim) = sim
    {
        for report in sim.reports() {
            println!("{}", serde_json::to_string(report)?);
        }
    }

    Ok(())
}

fn log_config(cli: &Cli) -> LogConfig {
    let mut config = if cli.json {
        LogConfig::jsonl()
    } else {
        LogConfig::development()
    };
    config.default_level = if cli.verbose { "debug" } else { "info" }.to_string();
    config.file = cli.log_dir.as_ref().map(|directory| FileConfig {
        directory: directory.clone(),
        ..FileConfig::default()
    });
    config
}

fn parse_peer(token: Option<&&str>) -> Option<PeerId> {
    token
        .and_then(|s| s.chars().next())
        .and_then(|c| PeerId::new(c.to_ascii_uppercase()))
}

fn run_interactive(peer_count: usize, config: SimConfig) -> anyhow::Result<Simulation> {
    use std::io::{self, Write};

    let mut sim = TopologyBuilder::new(peer_count).config(config).ring()?;
    let total = sim.total_resources();
    let mut next_epoch = 1;
    println!("{}", sim.visualize());

    println!("\nInteractive mode. Commands:");
    println!("  pay <from> <to> <amount> - Send a payment (e.g., 'pay A B 10')");
    println!("  snapshot <peer>          - Start a new epoch at a peer");
    println!("  step [n]                 - Advance n ticks (default 1)");
    println!("  run                      - Run until idle");
    println!("  status                   - Show current state");
    println!("  cut <epoch>              - Show and verify a global cut");
    println!("  stats                    - Show statistics");
    println!("  events                   - Show event log");
    println!("  quit                     - Exit");
    println!();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let parts: Vec<&str> = input.split_whitespace().collect();

        if parts.is_empty() {
            continue;
        }

        match parts[0] {
            "pay" => {
                let amount = parts.get(3).and_then(|s| s.parse::<i64>().ok());
                match (parse_peer(parts.get(1)), parse_peer(parts.get(2)), amount) {
                    (Some(from), Some(to), Some(amount)) => {
                        match sim.initiate_payment(from, to, amount) {
                            Ok(()) => println!("  {} pays {} to {}", from, amount, to),
                            Err(e) => println!("  Error: {}", e),
                        }
                    }
                    _ => println!("  Usage: pay <from> <to> <amount>"),
                }
            }
            "snapshot" => match parse_peer(parts.get(1)) {
                Some(peer) => {
                    let epoch = EpochId(next_epoch);
                    match sim.initiate_snapshot(peer, epoch) {
                        Ok(()) => {
                            next_epoch += 1;
                            println!("  {} started {}", peer, epoch);
                        }
                        Err(e) => println!("  Error: {}", e),
                    }
                }
                None => println!("  Usage: snapshot <peer>"),
            },
            "step" => {
                let n: u64 = parts.get(1).and_then(|s| s.parse().ok()).unwrap_or(1);
                sim.run_ticks(n)?;
                println!("  Advanced {} tick(s). {}", n, sim.state_summary());
            }
            "run" => {
                sim.run_until_idle()?;
                println!("  {}", sim.state_summary());
            }
            "status" => {
                println!("  {}", sim.state_summary());
                for peer in sim.peers() {
                    let open = peer.tasks().filter(|t| !t.is_complete()).count();
                    println!(
                        "    {} - balance {}, {} open epoch(s)",
                        peer.id,
                        peer.balance(),
                        open
                    );
                }
            }
            "cut" => {
                let epoch = parts.get(1).and_then(|s| s.parse().ok()).map(EpochId);
                match epoch.and_then(|e| GlobalCut::assemble(&sim, e)) {
                    Some(cut) => {
                        println!(
                            "  {}: {} recorded + {} in transit = {}",
                            cut.epoch,
                            cut.recorded_balances(),
                            cut.in_transit(),
                            cut.total()
                        );
                        match cut.verify(total) {
                            Ok(()) => println!("  Consistent with total {}", total),
                            Err(e) => println!("  {}", e),
                        }
                    }
                    None => println!("  No complete cut for that epoch yet"),
                }
            }
            "stats" => {
                println!("  Payments sent: {}", sim.stats.payments_sent);
                println!("  Payments delivered: {}", sim.stats.payments_delivered);
                println!("  Markers sent: {}", sim.stats.markers_sent);
                println!("  Markers discarded: {}", sim.stats.markers_discarded);
                println!("  Epoch completions: {}", sim.stats.epochs_completed);
            }
            "events" => {
                println!("  Event log ({} events):", sim.event_log.len());
                for event in sim.event_log.iter().rev().take(20) {
                    println!("    {:?}", event);
                }
                if sim.event_log.len() > 20 {
                    println!("    ... ({} more)", sim.event_log.len() - 20);
                }
            }
            "quit" | "exit" | "q" => {
                println!("Goodbye!");
                break;
            }
            _ => {
                println!("  Unknown command: {}", parts[0]);
            }
        }
    }

    Ok(sim)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_dir_enables_file_output() {
        let cli = Cli::parse_from(["snapshot-sim", "--log-dir", "/tmp/snapshot-logs", "concurrent"]);
        let config = log_config(&cli);

        let file = config.file.unwrap();
        assert_eq!(file.directory, PathBuf::from("/tmp/snapshot-logs"));
        assert_eq!(file.prefix, "snapshot");
        assert_eq!(config.default_level, "info");
    }

    #[test]
    fn test_log_flags_after_subcommand() {
        let cli = Cli::parse_from(["snapshot-sim", "ring", "--json", "-v"]);
        let config = log_config(&cli);

        assert!(config.file.is_none());
        assert!(!config.console.pretty);
        assert_eq!(config.default_level, "debug");
    }

    #[test]
    fn test_parse_peer_accepts_lowercase() {
        assert_eq!(parse_peer(Some(&"b")), Some(PeerId('B')));
        assert_eq!(parse_peer(Some(&"1")), None);
        assert_eq!(parse_peer(None), None);
    }
}
