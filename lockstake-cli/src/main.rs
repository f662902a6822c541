//! Lockstake CLI: scripted scenarios, soak runs and snapshot tooling.
//!
//! Commands:
//! - `run` executes a TOML scenario and optionally saves a snapshot
//! - `soak` drives a seeded random workload and checks invariants each step
//! - `inspect` summarises a saved snapshot
//! - `export` writes a snapshot's positions as CSV

mod export;
mod scenario;
mod soak;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use lockstake_core::domain::Seconds;
use lockstake_core::{Outcome, Receipt, Snapshot};

#[derive(Parser)]
#[command(
    name = "lockstake",
    about = "Lockstake CLI: time-locked staking ledger and reward engine"
)]
struct Cli {
    /// Log at debug level regardless of RUST_LOG.
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scripted scenario from a TOML file.
    Run {
        /// Path to the scenario TOML.
        #[arg(long)]
        scenario: PathBuf,

        /// Write the final engine state here as a JSON snapshot.
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },
    /// Random workload with invariant checks after every step.
    Soak {
        /// Number of commands to submit.
        #[arg(long, default_value_t = 10_000)]
        steps: usize,

        /// RNG seed; the same seed replays the same run.
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Write the final engine state here as a JSON snapshot.
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },
    /// Print a summary of a saved snapshot.
    Inspect {
        #[arg(long)]
        snapshot: PathBuf,
    },
    /// Export the positions in a snapshot as CSV.
    Export {
        #[arg(long)]
        snapshot: PathBuf,

        /// Output CSV path.
        #[arg(long, default_value = "positions.csv")]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run { scenario, snapshot } => run_scenario(&scenario, snapshot.as_deref()),
        Commands::Soak {
            steps,
            seed,
            snapshot,
        } => run_soak(steps, seed, snapshot.as_deref()),
        Commands::Inspect { snapshot } => run_inspect(&snapshot),
        Commands::Export { snapshot, out } => run_export(&snapshot, &out),
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_scenario(path: &Path, snapshot_path: Option<&Path>) -> Result<()> {
    let scenario = scenario::Scenario::load(path)?;
    let (sequencer, report) = scenario.run()?;

    println!("Scenario: {}", path.display());
    println!("{:<5} {:<34} {}", "Seq", "Operation", "Result");
    println!("{}", "-".repeat(72));
    for receipt in &report.receipts {
        println!(
            "{:<5} {:<34} {}",
            receipt.seq,
            receipt.command.name(),
            describe(receipt)
        );
    }
    println!();
    println!(
        "{} commands, {} rejected, {} setup steps",
        report.receipts.len(),
        report.rejected(),
        report.setup_steps
    );

    sequencer.with_engine(|engine| -> Result<()> {
        engine.verify_invariants()?;
        println!("Total staked: {}", engine.total_staked());
        println!("Vault balance: {}", engine.vault_balance());
        if let Some(path) = snapshot_path {
            engine.snapshot()?.save(path)?;
            println!("Snapshot saved to: {}", path.display());
        }
        Ok(())
    })
}

fn describe(receipt: &Receipt) -> String {
    match &receipt.outcome {
        Ok(Outcome::Opened(id)) => format!("opened {id}"),
        Ok(Outcome::Closed(s)) => format!(
            "closed: principal {} + rewards {} - fee {} = {}",
            s.principal, s.rewards, s.withdraw_fee, s.payout
        ),
        Ok(Outcome::Claimed(amount)) => format!("claimed {amount}"),
        Ok(Outcome::Renewed(r)) => format!(
            "renewed at {}: claimed {}, forfeited {}",
            r.multiplier, r.claimed, r.forfeited
        ),
        Ok(Outcome::ConfigVersion(v)) => format!("lock periods now at version {v}"),
        Ok(Outcome::TimeAdvanced(now)) => format!("clock at {}", format_time(*now)),
        Ok(Outcome::Done) => "ok".to_string(),
        Err(err) => format!("REJECTED ({:?}): {err}", err.kind()),
    }
}

fn run_soak(steps: usize, seed: u64, snapshot_path: Option<&Path>) -> Result<()> {
    let (sequencer, report) = soak::run(steps, seed)?;

    println!("Soak run: {} steps, seed {seed}", report.steps);
    println!("{:<34} {:>10} {:>10}", "Operation", "Accepted", "Rejected");
    println!("{}", "-".repeat(56));
    for (op, (accepted, rejected)) in &report.by_op {
        println!("{op:<34} {accepted:>10} {rejected:>10}");
    }
    println!();
    println!("Active positions: {}", report.final_positions);
    println!("Total staked: {}", report.total_staked);
    println!("All invariants held.");

    if let Some(path) = snapshot_path {
        sequencer.with_engine(|engine| engine.snapshot())?.save(path)?;
        println!("Snapshot saved to: {}", path.display());
    }
    Ok(())
}

fn run_inspect(path: &Path) -> Result<()> {
    let snapshot = Snapshot::load(path)?;
    let state = &snapshot.state;
    state
        .verify_invariants()
        .context("snapshot state fails invariant checks")?;

    let ledger = state.ledger();
    let active = ledger.active_records().count();
    let fees = state.fees();
    let collected = state.fees_collected();

    println!("Snapshot: {}", path.display());
    println!("Schema version: {}", snapshot.schema_version);
    println!("Taken at: {}", format_time(snapshot.taken_at));
    println!("Checksum: {}", snapshot.checksum);
    println!();
    println!("Positions: {} ({active} active)", ledger.len());
    println!("Distinct stakers: {}", state.total_users());
    println!("Total staked: {}", state.pool().total_staked());
    for (duration, amount) in state.pool().buckets() {
        println!("  {:>12}  {amount}", format_duration(duration));
    }
    println!("APY: {} ({} history entries)", state.apy(), state.apy_history().len());
    println!(
        "Fees: deposit {}, withdraw {}, bridge {}",
        fees.deposit_bps, fees.withdraw_bps, fees.bridge_bps
    );
    println!(
        "Fees collected: deposit {}, withdraw {}",
        collected.deposit, collected.withdraw
    );
    println!(
        "Rewards: funded {}, paid {}",
        state.rewards_funded(),
        state.rewards_paid()
    );
    println!(
        "Lock periods (version {}):",
        state.registry().version()
    );
    for entry in state.registry().entries() {
        println!(
            "  {:>12}  {}",
            format_duration(entry.duration),
            entry.multiplier_bps
        );
    }
    println!("Paused: {}", state.is_paused());
    println!("Events: {}", state.events().len());
    Ok(())
}

fn run_export(snapshot_path: &Path, out: &Path) -> Result<()> {
    let snapshot = Snapshot::load(snapshot_path)?;
    let csv = export::positions_csv(&snapshot)?;
    std::fs::write(out, csv).with_context(|| format!("failed to write {}", out.display()))?;
    println!(
        "Exported {} positions to: {}",
        snapshot.state.ledger().len(),
        out.display()
    );
    Ok(())
}

fn format_time(secs: Seconds) -> String {
    i64::try_from(secs)
        .ok()
        .and_then(|s| chrono::DateTime::from_timestamp(s, 0))
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| format!("{secs}s"))
}

fn format_duration(secs: Seconds) -> String {
    const DAY: Seconds = 86_400;
    if secs % DAY == 0 {
        format!("{}d", secs / DAY)
    } else {
        format!("{secs}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_print_in_days_when_whole() {
        assert_eq!(format_duration(30 * 86_400), "30d");
        assert_eq!(format_duration(90), "90s");
    }

    #[test]
    fn times_print_as_utc() {
        assert_eq!(format_time(0), "1970-01-01 00:00:00 UTC");
    }

    #[test]
    fn run_then_inspect_and_export() {
        let dir = tempfile::tempdir().unwrap();
        let scenario_path = dir.path().join("scenario.toml");
        std::fs::write(
            &scenario_path,
            r#"
            [engine]
            lock_periods = [{ duration = 60, multiplier_bps = 10000 }]

            [[accounts]]
            name = "alice"
            balance = 100

            [[steps]]
            op = "open"
            caller = "alice"
            amount = 100
            lock_duration = 60
            "#,
        )
        .unwrap();
        let snapshot_path = dir.path().join("out").join("state.json");
        let csv_path = dir.path().join("positions.csv");

        run_scenario(&scenario_path, Some(&snapshot_path)).unwrap();
        run_inspect(&snapshot_path).unwrap();
        run_export(&snapshot_path, &csv_path).unwrap();

        let csv = std::fs::read_to_string(&csv_path).unwrap();
        assert_eq!(csv.lines().count(), 2);
    }
}
