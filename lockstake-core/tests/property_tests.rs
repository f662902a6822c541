//! Property tests for accounting invariants.
//!
//! Uses proptest to verify, over random operation sequences:
//! 1. Pool totals: total staked and every bucket equal the sum of active principal
//! 2. All-or-nothing: a rejected operation leaves the engine state identical
//! 3. Backing: the vault always holds at least the total staked principal
//! 4. Accrual: rewards are monotone in elapsed time and linear in principal

use proptest::prelude::*;
use std::sync::Arc;

use lockstake_core::config::EngineConfig;
use lockstake_core::domain::{AccountId, Amount, BasisPoints, PositionId, Seconds};
use lockstake_core::engine::{accrued_rewards, Capability, FeeRates, LockPeriodEntry, StakingEngine};
use lockstake_core::external::{FungibleAsset, ManualClock};

const DAY: Seconds = 86_400;
const DURATIONS: [Seconds; 3] = [7 * DAY, 30 * DAY, 90 * DAY];
const USERS: [&str; 3] = ["alice", "bob", "carol"];

// ── Strategies (proptest) ────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Op {
    Open { user: usize, amount: Amount, lock: usize },
    Close { user: usize, pos: u64 },
    Claim { user: usize, pos: u64 },
    Renew { user: usize, pos: u64, claim_first: bool, lock: usize },
    Transfer { user: usize, pos: u64, to: usize },
    Liquidate { pos: u64, percent: u8 },
    SetApy { bps: u32 },
    Advance { hours: u32 },
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0..3usize, 0..2_000_000_000u128, 0..3usize)
            .prop_map(|(user, amount, lock)| Op::Open { user, amount, lock }),
        2 => (0..3usize, 1..12u64).prop_map(|(user, pos)| Op::Close { user, pos }),
        2 => (0..3usize, 1..12u64).prop_map(|(user, pos)| Op::Claim { user, pos }),
        1 => (0..3usize, 1..12u64, any::<bool>(), 0..3usize).prop_map(
            |(user, pos, claim_first, lock)| Op::Renew { user, pos, claim_first, lock }
        ),
        1 => (0..3usize, 1..12u64, 0..3usize).prop_map(|(user, pos, to)| Op::Transfer { user, pos, to }),
        1 => (1..12u64, 0..150u8).prop_map(|(pos, percent)| Op::Liquidate { pos, percent }),
        1 => (0..12_000u32).prop_map(|bps| Op::SetApy { bps }),
        3 => (0..24 * 40u32).prop_map(|hours| Op::Advance { hours }),
    ]
}

fn engine() -> (StakingEngine, ManualClock) {
    let clock = ManualClock::new(1_700_000_000);
    let config = EngineConfig {
        asset_decimals: 6,
        min_stake: 1_000,
        initial_apy_bps: BasisPoints(1_200),
        fees: FeeRates {
            deposit_bps: BasisPoints(30),
            withdraw_bps: BasisPoints(20),
            bridge_bps: BasisPoints(0),
        },
        max_positions_per_owner: 4,
        lock_periods: DURATIONS
            .iter()
            .zip([5_000, 7_500, 10_000])
            .map(|(&duration, bps)| LockPeriodEntry {
                duration,
                multiplier_bps: BasisPoints(bps),
            })
            .collect(),
        ..EngineConfig::default()
    };
    let mut engine = StakingEngine::in_memory(config, Arc::new(clock.clone())).unwrap();
    let spender = engine.config().engine_account.clone();
    let treasury = AccountId::new("treasury");
    engine.grant(&treasury, Capability::FundRewards);
    engine.grant(&treasury, Capability::ManageRates);
    engine.register_lending_module(AccountId::new("lender"));

    for name in USERS.iter().chain(["treasury"].iter()) {
        let who = AccountId::new(*name);
        engine.asset_mut().mint(&who, 50_000_000_000).unwrap();
        engine.asset_mut().approve(&who, &spender, Amount::MAX);
    }
    engine.fund_rewards(&treasury, 5_000_000_000).unwrap();
    (engine, clock)
}

fn apply(engine: &mut StakingEngine, clock: &ManualClock, op: &Op) -> bool {
    let user = |i: usize| AccountId::new(USERS[i]);
    let result = match *op {
        Op::Open { user: u, amount, lock } => engine.open(&user(u), amount, DURATIONS[lock]).map(drop),
        Op::Close { user: u, pos } => engine.close(&user(u), PositionId(pos)).map(drop),
        Op::Claim { user: u, pos } => engine.claim_rewards(&user(u), PositionId(pos)).map(drop),
        Op::Renew { user: u, pos, claim_first, lock } => engine
            .renew(&user(u), PositionId(pos), claim_first, DURATIONS[lock])
            .map(drop),
        Op::Transfer { user: u, pos, to } => {
            engine.transfer_position(&user(u), PositionId(pos), &user(to))
        }
        Op::Liquidate { pos, percent } => {
            let new_amount = engine
                .position(PositionId(pos))
                .map(|r| r.principal * Amount::from(percent) / 100)
                .unwrap_or(1);
            engine.on_liquidation(&AccountId::new("lender"), PositionId(pos), new_amount)
        }
        Op::SetApy { bps } => engine.set_apy(&AccountId::new("treasury"), BasisPoints(bps)),
        Op::Advance { hours } => {
            clock.advance(Seconds::from(hours) * 3_600);
            Ok(())
        }
    };
    result.is_ok()
}

// ── 1-3. Invariants under random sequences ───────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(96))]

    /// Pool totals match the records, and the vault stays backed, after
    /// every step of a random sequence.
    #[test]
    fn totals_match_records_after_every_step(ops in prop::collection::vec(arb_op(), 1..60)) {
        let (mut engine, clock) = engine();
        for op in &ops {
            apply(&mut engine, &clock, op);
            prop_assert!(engine.verify_invariants().is_ok(), "after {:?}: {:?}", op, engine.verify_invariants());

            let active_sum: Amount = engine
                .state()
                .ledger()
                .active_records()
                .map(|r| r.principal)
                .sum();
            prop_assert_eq!(engine.total_staked(), active_sum);
            for duration in DURATIONS {
                let bucket_sum: Amount = engine
                    .state()
                    .ledger()
                    .active_records()
                    .filter(|r| r.lock_duration == duration)
                    .map(|r| r.principal)
                    .sum();
                prop_assert_eq!(engine.bucket_total(duration), bucket_sum);
            }
            prop_assert!(engine.vault_balance() >= engine.total_staked());
        }
    }

    /// A rejected operation changes nothing: engine state and balances are
    /// identical before and after.
    #[test]
    fn rejected_operations_leave_no_trace(ops in prop::collection::vec(arb_op(), 1..60)) {
        let (mut engine, clock) = engine();
        for op in &ops {
            let state_before = engine.state().clone();
            let vault_before = engine.vault_balance();
            let users_before: Vec<Amount> = USERS
                .iter()
                .map(|u| engine.asset().balance_of(&AccountId::new(*u)))
                .collect();

            if !apply(&mut engine, &clock, op) {
                prop_assert_eq!(engine.state(), &state_before);
                prop_assert_eq!(engine.vault_balance(), vault_before);
                let users_after: Vec<Amount> = USERS
                    .iter()
                    .map(|u| engine.asset().balance_of(&AccountId::new(*u)))
                    .collect();
                prop_assert_eq!(users_after, users_before);
            }
        }
    }

    /// Position ids are never reused: every open returns a fresh id.
    #[test]
    fn position_ids_are_never_reused(ops in prop::collection::vec(arb_op(), 1..60)) {
        let (mut engine, clock) = engine();
        let mut seen = std::collections::BTreeSet::new();
        for op in &ops {
            let next = engine.state().ledger().next_id();
            apply(&mut engine, &clock, op);
            if engine.state().ledger().next_id() != next {
                prop_assert!(seen.insert(next));
            }
        }
    }
}

// ── 4. Accrual ───────────────────────────────────────────────────────

proptest! {
    /// More time never yields fewer rewards.
    #[test]
    fn accrual_is_monotone_in_time(
        principal in 0..1_000_000_000_000u128,
        apy in 0..=10_000u32,
        multiplier in 1..=10_000u32,
        a in 0..(5 * 365 * DAY),
        b in 0..(5 * 365 * DAY),
    ) {
        let (short, long) = if a <= b { (a, b) } else { (b, a) };
        let r_short = accrued_rewards(principal, BasisPoints(apy), BasisPoints(multiplier), short).unwrap();
        let r_long = accrued_rewards(principal, BasisPoints(apy), BasisPoints(multiplier), long).unwrap();
        prop_assert!(r_short <= r_long);
    }

    /// Splitting principal never yields more than staking it whole.
    #[test]
    fn accrual_is_superadditive_under_rounding(
        p1 in 0..1_000_000_000u128,
        p2 in 0..1_000_000_000u128,
        apy in 0..=10_000u32,
        elapsed in 0..(365 * DAY),
    ) {
        let rate = BasisPoints(apy);
        let whole = accrued_rewards(p1 + p2, rate, BasisPoints::ONE, elapsed).unwrap();
        let parts = accrued_rewards(p1, rate, BasisPoints::ONE, elapsed).unwrap()
            + accrued_rewards(p2, rate, BasisPoints::ONE, elapsed).unwrap();
        prop_assert!(parts <= whole);
        prop_assert!(whole - parts <= 1);
    }
}
