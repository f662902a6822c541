//! Sequential command processing.
//!
//! Every mutating operation has a [`Command`] form. A [`Sequencer`] owns the
//! engine behind a mutex and numbers submissions; the order in which
//! commands are submitted is the order in which they execute, and each runs
//! to completion before the next starts.

use crate::domain::{amount_repr, AccountId, Amount, BasisPoints, PositionId, Seconds};
use crate::engine::accounting::{Renewal, Settlement, StakingEngine};
use crate::engine::rates::FeeRates;
use crate::error::{StakingResult, StateError};
use crate::external::{AssetLedger, FungibleAsset, ManualClock, PoolVault, Vault};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    Open {
        caller: AccountId,
        #[serde(with = "amount_repr")]
        amount: Amount,
        lock_duration: Seconds,
    },
    Close {
        caller: AccountId,
        id: PositionId,
    },
    ClaimRewards {
        caller: AccountId,
        id: PositionId,
    },
    Renew {
        caller: AccountId,
        id: PositionId,
        #[serde(default)]
        claim_first: bool,
        new_lock_duration: Seconds,
    },
    TransferPosition {
        caller: AccountId,
        id: PositionId,
        to: AccountId,
    },
    ApprovePosition {
        caller: AccountId,
        id: PositionId,
        #[serde(default)]
        operator: Option<AccountId>,
    },
    SetApy {
        caller: AccountId,
        rate: BasisPoints,
    },
    SetFeeRates {
        caller: AccountId,
        rates: FeeRates,
    },
    BatchSetLockPeriodMultipliers {
        caller: AccountId,
        durations: Vec<Seconds>,
        multipliers: Vec<BasisPoints>,
    },
    RemoveLockPeriod {
        caller: AccountId,
        duration: Seconds,
    },
    Pause {
        caller: AccountId,
    },
    Unpause {
        caller: AccountId,
    },
    FundRewards {
        caller: AccountId,
        #[serde(with = "amount_repr")]
        amount: Amount,
    },
    OnLiquidation {
        caller: AccountId,
        id: PositionId,
        #[serde(with = "amount_repr")]
        new_amount: Amount,
    },
    /// Move a manual clock forward. Only meaningful for scripted runs.
    AdvanceTime {
        seconds: Seconds,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Open { .. } => "open",
            Command::Close { .. } => "close",
            Command::ClaimRewards { .. } => "claim_rewards",
            Command::Renew { .. } => "renew",
            Command::TransferPosition { .. } => "transfer_position",
            Command::ApprovePosition { .. } => "approve_position",
            Command::SetApy { .. } => "set_apy",
            Command::SetFeeRates { .. } => "set_fee_rates",
            Command::BatchSetLockPeriodMultipliers { .. } => "batch_set_lock_period_multipliers",
            Command::RemoveLockPeriod { .. } => "remove_lock_period",
            Command::Pause { .. } => "pause",
            Command::Unpause { .. } => "unpause",
            Command::FundRewards { .. } => "fund_rewards",
            Command::OnLiquidation { .. } => "on_liquidation",
            Command::AdvanceTime { .. } => "advance_time",
        }
    }

    /// Execute against `engine`. `clock` is required for `AdvanceTime`.
    pub fn apply<A: FungibleAsset, V: Vault>(
        &self,
        engine: &mut StakingEngine<A, V>,
        clock: Option<&ManualClock>,
    ) -> StakingResult<Outcome> {
        match self {
            Command::Open {
                caller,
                amount,
                lock_duration,
            } => engine
                .open(caller, *amount, *lock_duration)
                .map(Outcome::Opened),
            Command::Close { caller, id } => engine.close(caller, *id).map(Outcome::Closed),
            Command::ClaimRewards { caller, id } => {
                engine.claim_rewards(caller, *id).map(Outcome::Claimed)
            }
            Command::Renew {
                caller,
                id,
                claim_first,
                new_lock_duration,
            } => engine
                .renew(caller, *id, *claim_first, *new_lock_duration)
                .map(Outcome::Renewed),
            Command::TransferPosition { caller, id, to } => engine
                .transfer_position(caller, *id, to)
                .map(|()| Outcome::Done),
            Command::ApprovePosition {
                caller,
                id,
                operator,
            } => engine
                .approve_position(caller, *id, operator.clone())
                .map(|()| Outcome::Done),
            Command::SetApy { caller, rate } => engine.set_apy(caller, *rate).map(|()| Outcome::Done),
            Command::SetFeeRates { caller, rates } => {
                engine.set_fee_rates(caller, *rates).map(|()| Outcome::Done)
            }
            Command::BatchSetLockPeriodMultipliers {
                caller,
                durations,
                multipliers,
            } => engine
                .batch_set_lock_period_multipliers(caller, durations, multipliers)
                .map(Outcome::ConfigVersion),
            Command::RemoveLockPeriod { caller, duration } => engine
                .remove_lock_period(caller, *duration)
                .map(Outcome::ConfigVersion),
            Command::Pause { caller } => engine.pause(caller).map(|()| Outcome::Done),
            Command::Unpause { caller } => engine.unpause(caller).map(|()| Outcome::Done),
            Command::FundRewards { caller, amount } => {
                engine.fund_rewards(caller, *amount).map(|()| Outcome::Done)
            }
            Command::OnLiquidation {
                caller,
                id,
                new_amount,
            } => engine
                .on_liquidation(caller, *id, *new_amount)
                .map(|()| Outcome::Done),
            Command::AdvanceTime { seconds } => {
                let clock = clock.ok_or(StateError::ClockNotAdvanceable)?;
                clock.advance(*seconds);
                Ok(Outcome::TimeAdvanced(engine.now()))
            }
        }
    }
}

/// Successful result of a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Opened(PositionId),
    Closed(Settlement),
    Claimed(Amount),
    Renewed(Renewal),
    /// New lock-period registry version.
    ConfigVersion(u64),
    /// Clock reading after the advance.
    TimeAdvanced(Seconds),
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub seq: u64,
    pub command: Command,
    pub outcome: StakingResult<Outcome>,
}

impl Receipt {
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

struct Inner<A: FungibleAsset, V: Vault> {
    engine: StakingEngine<A, V>,
    next_seq: u64,
}

/// Single-writer front door to an engine.
pub struct Sequencer<A: FungibleAsset = AssetLedger, V: Vault = PoolVault> {
    inner: Mutex<Inner<A, V>>,
    clock: Option<ManualClock>,
}

impl<A: FungibleAsset, V: Vault> Sequencer<A, V> {
    pub fn new(engine: StakingEngine<A, V>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                engine,
                next_seq: 1,
            }),
            clock: None,
        }
    }

    /// Allow `AdvanceTime` commands to move `clock`, which should be the
    /// clock the engine was built with.
    pub fn with_manual_clock(mut self, clock: ManualClock) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn submit(&self, command: Command) -> Receipt {
        let mut inner = self.lock();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        let outcome = command.apply(&mut inner.engine, self.clock.as_ref());
        debug!(seq, op = command.name(), ok = outcome.is_ok(), "command processed");
        Receipt {
            seq,
            command,
            outcome,
        }
    }

    /// Run `f` with shared access to the engine, between submissions.
    pub fn with_engine<R>(&self, f: impl FnOnce(&StakingEngine<A, V>) -> R) -> R {
        f(&self.lock().engine)
    }

    /// Run `f` with exclusive access to the engine, between submissions.
    pub fn with_engine_mut<R>(&self, f: impl FnOnce(&mut StakingEngine<A, V>) -> R) -> R {
        f(&mut self.lock().engine)
    }

    /// Sequence number the next submission will receive.
    pub fn next_seq(&self) -> u64 {
        self.lock().next_seq
    }

    pub fn into_inner(self) -> StakingEngine<A, V> {
        self.inner
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .engine
    }

    // Poisoning is ignored; a panicking submitter does not take the engine
    // down with it.
    fn lock(&self) -> MutexGuard<'_, Inner<A, V>> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
