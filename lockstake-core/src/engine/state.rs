//! The engine's complete mutable state.
//!
//! Everything an operation can change lives here, which is what makes
//! operations all-or-nothing. [`EngineState::begin`] copies the small,
//! bounded parts and starts journals for the parts that grow with usage
//! (position records, tokens, user aggregates, the staker set), so a
//! rollback costs what the operation touched rather than the ledger size.

use super::access::AccessControl;
use super::events::EventLog;
use super::pool::PoolTotals;
use super::rates::{ApyHistory, FeeRates, FeesCollected};
use super::registry::LockPeriodRegistry;
use crate::config::EngineConfig;
use crate::domain::{AccountId, Amount, BasisPoints, Seconds, UserAggregate};
use crate::error::{StakingResult, StateError, ValidationError};
use crate::ledger::PositionLedger;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineState {
    pub(crate) ledger: PositionLedger,
    pub(crate) registry: LockPeriodRegistry,
    pub(crate) pool: PoolTotals,
    pub(crate) users: BTreeMap<AccountId, UserAggregate>,
    /// Every owner that has ever opened a position.
    pub(crate) stakers: BTreeSet<AccountId>,
    pub(crate) apy: BasisPoints,
    pub(crate) apy_history: ApyHistory,
    pub(crate) fees: FeeRates,
    pub(crate) fees_collected: FeesCollected,
    pub(crate) rewards_funded: Amount,
    pub(crate) rewards_paid: Amount,
    pub(crate) paused: bool,
    pub(crate) access: AccessControl,
    pub(crate) lending_module: Option<AccountId>,
    pub(crate) events: EventLog,
    #[serde(skip)]
    pub(crate) journal: Option<Journal>,
}

/// Before-images of user entries touched by an in-flight operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Journal {
    users: Vec<(AccountId, Option<UserAggregate>)>,
    new_stakers: Vec<AccountId>,
}

/// Copy of the bounded state taken when an operation starts.
#[derive(Debug)]
pub(crate) struct Checkpoint {
    registry: LockPeriodRegistry,
    pool: PoolTotals,
    apy: BasisPoints,
    apy_history: ApyHistory,
    fees: FeeRates,
    fees_collected: FeesCollected,
    rewards_funded: Amount,
    rewards_paid: Amount,
    paused: bool,
    access: AccessControl,
    lending_module: Option<AccountId>,
    events: usize,
}

impl EngineState {
    pub fn from_config(config: &EngineConfig, now: Seconds) -> Self {
        let mut registry = LockPeriodRegistry::new();
        if !config.lock_periods.is_empty() {
            registry.upsert(&config.lock_periods);
        }
        let mut apy_history = ApyHistory::new(config.apy_history_capacity);
        apy_history.record(now, config.initial_apy_bps);

        Self {
            ledger: PositionLedger::new(config.max_positions_per_owner),
            registry,
            pool: PoolTotals::new(),
            users: BTreeMap::new(),
            stakers: BTreeSet::new(),
            apy: config.initial_apy_bps,
            apy_history,
            fees: config.fees,
            fees_collected: FeesCollected::default(),
            rewards_funded: 0,
            rewards_paid: 0,
            paused: false,
            access: AccessControl::new(),
            lending_module: None,
            events: EventLog::new(),
            journal: None,
        }
    }

    pub fn ledger(&self) -> &PositionLedger {
        &self.ledger
    }

    pub fn registry(&self) -> &LockPeriodRegistry {
        &self.registry
    }

    pub fn pool(&self) -> &PoolTotals {
        &self.pool
    }

    pub fn user(&self, owner: &AccountId) -> UserAggregate {
        self.users.get(owner).copied().unwrap_or_default()
    }

    pub fn users(&self) -> impl Iterator<Item = (&AccountId, &UserAggregate)> {
        self.users.iter()
    }

    pub fn has_staked(&self, owner: &AccountId) -> bool {
        self.stakers.contains(owner)
    }

    pub fn total_users(&self) -> usize {
        self.stakers.len()
    }

    pub fn apy(&self) -> BasisPoints {
        self.apy
    }

    pub fn apy_history(&self) -> &ApyHistory {
        &self.apy_history
    }

    pub fn fees(&self) -> FeeRates {
        self.fees
    }

    pub fn fees_collected(&self) -> FeesCollected {
        self.fees_collected
    }

    pub fn rewards_funded(&self) -> Amount {
        self.rewards_funded
    }

    pub fn rewards_paid(&self) -> Amount {
        self.rewards_paid
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn access(&self) -> &AccessControl {
        &self.access
    }

    pub fn lending_module(&self) -> Option<&AccountId> {
        self.lending_module.as_ref()
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    // ── Checkpoints ────────────────────────────────────────────────────

    pub(crate) fn begin(&mut self) -> Checkpoint {
        self.ledger.begin();
        self.journal = Some(Journal::default());
        Checkpoint {
            registry: self.registry.clone(),
            pool: self.pool.clone(),
            apy: self.apy,
            apy_history: self.apy_history.clone(),
            fees: self.fees,
            fees_collected: self.fees_collected,
            rewards_funded: self.rewards_funded,
            rewards_paid: self.rewards_paid,
            paused: self.paused,
            access: self.access.clone(),
            lending_module: self.lending_module.clone(),
            events: self.events.len(),
        }
    }

    pub(crate) fn commit(&mut self) {
        self.ledger.commit();
        self.journal = None;
    }

    /// Put back everything changed since `checkpoint` was taken.
    pub(crate) fn rollback(&mut self, checkpoint: Checkpoint) {
        self.ledger.rollback();
        if let Some(journal) = self.journal.take() {
            for (owner, before) in journal.users.into_iter().rev() {
                match before {
                    Some(aggregate) => self.users.insert(owner, aggregate),
                    None => self.users.remove(&owner),
                };
            }
            for owner in &journal.new_stakers {
                self.stakers.remove(owner);
            }
        }
        self.registry = checkpoint.registry;
        self.pool = checkpoint.pool;
        self.apy = checkpoint.apy;
        self.apy_history = checkpoint.apy_history;
        self.fees = checkpoint.fees;
        self.fees_collected = checkpoint.fees_collected;
        self.rewards_funded = checkpoint.rewards_funded;
        self.rewards_paid = checkpoint.rewards_paid;
        self.paused = checkpoint.paused;
        self.access = checkpoint.access;
        self.lending_module = checkpoint.lending_module;
        self.events.truncate(checkpoint.events);
    }

    fn remember_user(&mut self, owner: &AccountId) {
        if let Some(journal) = self.journal.as_mut() {
            journal
                .users
                .push((owner.clone(), self.users.get(owner).copied()));
        }
    }

    /// Record `owner` as a staker. Returns whether this is their first stake.
    pub(crate) fn mark_staker(&mut self, owner: &AccountId) -> bool {
        if !self.stakers.insert(owner.clone()) {
            return false;
        }
        if let Some(journal) = self.journal.as_mut() {
            journal.new_stakers.push(owner.clone());
        }
        true
    }

    pub(crate) fn add_user_stake(
        &mut self,
        owner: &AccountId,
        amount: Amount,
        positions: usize,
    ) -> StakingResult<()> {
        self.remember_user(owner);
        let user = self.users.entry(owner.clone()).or_default();
        user.staked = user
            .staked
            .checked_add(amount)
            .ok_or(ValidationError::Overflow)?;
        user.active_positions += positions;
        Ok(())
    }

    pub(crate) fn remove_user_stake(
        &mut self,
        owner: &AccountId,
        amount: Amount,
        positions: usize,
    ) -> StakingResult<()> {
        self.remember_user(owner);
        let user = self.users.get_mut(owner).ok_or_else(|| {
            StateError::InvariantViolated(format!("{owner} has no aggregate to reduce"))
        })?;
        if user.staked < amount || user.active_positions < positions {
            return Err(StateError::InvariantViolated(format!(
                "{owner} aggregate ({} staked, {} positions) below removal of {amount}/{positions}",
                user.staked, user.active_positions
            ))
            .into());
        }
        user.staked -= amount;
        user.active_positions -= positions;
        if user.is_empty() {
            self.users.remove(owner);
        }
        Ok(())
    }

    /// Recompute every aggregate from the records and compare.
    ///
    /// Full scan; meant for tests, soak runs and snapshot restores, never for
    /// the operation path itself.
    pub fn verify_invariants(&self) -> Result<(), StateError> {
        let mut total: Amount = 0;
        let mut buckets: BTreeMap<Seconds, Amount> = BTreeMap::new();
        let mut per_owner: BTreeMap<AccountId, UserAggregate> = BTreeMap::new();

        for record in self.ledger.records() {
            let token = self.ledger.token();
            if !record.active {
                if !token.is_burned(record.id) {
                    return Err(violation(format!("inactive {} still has a live token", record.id)));
                }
                continue;
            }
            let owner = token
                .owner_of(record.id)
                .ok_or_else(|| violation(format!("active {} has no owner", record.id)))?;
            total = total
                .checked_add(record.principal)
                .ok_or_else(|| violation("total principal overflows".into()))?;
            *buckets.entry(record.lock_duration).or_default() += record.principal;
            let agg = per_owner.entry(owner.clone()).or_default();
            agg.staked += record.principal;
            agg.active_positions += 1;
        }

        if total != self.pool.total_staked() {
            return Err(violation(format!(
                "total staked {} != sum of active principal {total}",
                self.pool.total_staked()
            )));
        }
        let recorded: BTreeMap<Seconds, Amount> = self.pool.buckets().collect();
        buckets.retain(|_, amount| *amount > 0);
        if recorded != buckets {
            return Err(violation(format!(
                "bucket totals {recorded:?} != recomputed {buckets:?}"
            )));
        }
        for (owner, expected) in &per_owner {
            let actual = self.user(owner);
            if actual.staked != expected.staked
                || actual.active_positions != expected.active_positions
            {
                return Err(violation(format!(
                    "{owner} aggregate {actual:?} != recomputed {expected:?}"
                )));
            }
        }
        for (owner, agg) in &self.users {
            if !per_owner.contains_key(owner) && !agg.is_empty() {
                return Err(violation(format!("{owner} aggregate {agg:?} holds no positions")));
            }
        }
        Ok(())
    }
}

fn violation(message: String) -> StateError {
    StateError::InvariantViolated(message)
}
