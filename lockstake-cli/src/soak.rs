//! Seeded random soak run.
//!
//! Drives the engine with a reproducible stream of user, admin and
//! liquidation commands and checks every accounting invariant after each
//! one. Any violation aborts the run with the offending step.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{bail, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use lockstake_core::domain::{AccountId, Amount, BasisPoints, PositionId, Seconds, SECONDS_PER_DAY};
use lockstake_core::engine::{Capability, FeeRates, LockPeriodEntry};
use lockstake_core::external::{FungibleAsset, ManualClock};
use lockstake_core::{Command, EngineConfig, Sequencer, StakingEngine};

const USERS: usize = 8;
const DURATIONS: [Seconds; 4] = [
    7 * SECONDS_PER_DAY,
    30 * SECONDS_PER_DAY,
    90 * SECONDS_PER_DAY,
    180 * SECONDS_PER_DAY,
];
const UNIT: Amount = 1_000_000;

#[derive(Debug, Default)]
pub struct SoakReport {
    pub steps: usize,
    /// Per operation name: (accepted, rejected).
    pub by_op: BTreeMap<&'static str, (usize, usize)>,
    pub final_positions: usize,
    pub total_staked: Amount,
}

fn user(i: usize) -> AccountId {
    AccountId::new(format!("user-{i}"))
}

fn build(seed: u64) -> Result<(Sequencer, ManualClock)> {
    let clock = ManualClock::new(1_700_000_000);
    let config = EngineConfig {
        asset_decimals: 6,
        min_stake: UNIT,
        initial_apy_bps: BasisPoints(1_000),
        max_positions_per_owner: 16,
        fees: FeeRates {
            deposit_bps: BasisPoints(25),
            withdraw_bps: BasisPoints(25),
            bridge_bps: BasisPoints(10),
        },
        lock_periods: DURATIONS
            .iter()
            .zip([6_000, 7_000, 8_500, 10_000])
            .map(|(&duration, bps)| LockPeriodEntry {
                duration,
                multiplier_bps: BasisPoints(bps),
            })
            .collect(),
        ..EngineConfig::default()
    };
    let mut engine = StakingEngine::in_memory(config, Arc::new(clock.clone()))?;
    let spender = engine.config().engine_account.clone();
    let admin = AccountId::new("admin");
    for capability in Capability::ALL {
        engine.grant(&admin, capability);
    }
    engine.register_lending_module(AccountId::new("lender"));

    for who in (0..USERS).map(user).chain([admin.clone()]) {
        engine.asset_mut().mint(&who, 1_000_000 * UNIT)?;
        engine.asset_mut().approve(&who, &spender, Amount::MAX);
    }
    engine.fund_rewards(&admin, 100_000 * UNIT)?;
    debug!(seed, "soak engine ready");
    Ok((Sequencer::new(engine).with_manual_clock(clock.clone()), clock))
}

fn random_command(rng: &mut StdRng, next_id: u64) -> Command {
    let caller = user(rng.gen_range(0..USERS));
    // Mostly existing ids, occasionally one that does not exist yet.
    let id = PositionId(rng.gen_range(1..=next_id.max(1)));
    match rng.gen_range(0..100) {
        0..=29 => Command::Open {
            caller,
            amount: rng.gen_range(0..5_000 * UNIT),
            lock_duration: DURATIONS[rng.gen_range(0..DURATIONS.len())],
        },
        30..=44 => Command::Close { caller, id },
        45..=59 => Command::ClaimRewards { caller, id },
        60..=67 => Command::Renew {
            caller,
            id,
            claim_first: rng.gen_bool(0.7),
            new_lock_duration: DURATIONS[rng.gen_range(0..DURATIONS.len())],
        },
        68..=74 => Command::TransferPosition {
            caller,
            id,
            to: user(rng.gen_range(0..USERS)),
        },
        75..=77 => Command::OnLiquidation {
            caller: AccountId::new("lender"),
            id,
            new_amount: rng.gen_range(0..3_000 * UNIT),
        },
        78..=79 => Command::SetApy {
            caller: AccountId::new("admin"),
            rate: BasisPoints(rng.gen_range(0..2_500)),
        },
        80 => Command::Pause {
            caller: AccountId::new("admin"),
        },
        81..=83 => Command::Unpause {
            caller: AccountId::new("admin"),
        },
        _ => Command::AdvanceTime {
            seconds: rng.gen_range(0..20 * SECONDS_PER_DAY),
        },
    }
}

pub fn run(steps: usize, seed: u64) -> Result<(Sequencer, SoakReport)> {
    let (sequencer, _clock) = build(seed)?;
    let mut rng = StdRng::seed_from_u64(seed);
    let mut report = SoakReport::default();

    for step in 1..=steps {
        let next_id = sequencer.with_engine(|engine| engine.state().ledger().next_id().value());
        let command = random_command(&mut rng, next_id);
        let receipt = sequencer.submit(command);
        let counts = report.by_op.entry(receipt.command.name()).or_default();
        if receipt.is_ok() {
            counts.0 += 1;
        } else {
            counts.1 += 1;
        }

        let check = sequencer.with_engine(|engine| -> Result<()> {
            engine.verify_invariants()?;
            let (vault, staked) = (engine.vault_balance(), engine.total_staked());
            if vault < staked {
                bail!("vault holds {vault} but {staked} is staked");
            }
            Ok(())
        });
        if let Err(err) = check {
            bail!("invariant broken at step {step} after {:?}: {err}", receipt.command);
        }
        report.steps = step;
    }

    sequencer.with_engine(|engine| {
        report.final_positions = engine.state().ledger().active_records().count();
        report.total_staked = engine.total_staked();
        info!(
            steps = report.steps,
            positions = report.final_positions,
            total_staked = report.total_staked,
            events = engine.events().len(),
            "soak run complete"
        );
    });
    Ok((sequencer, report))
}
