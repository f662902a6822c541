//! The accounting engine: every user, admin and lending-module operation.
//!
//! Each mutating operation runs inside [`StakingEngine::atomically`], which
//! holds the reentrancy guard, checkpoints [`EngineState`] and restores it if
//! the operation fails. Inside an operation the order is fixed: validate,
//! then mutate engine state, then touch the asset or vault last.

use super::access::Capability;
use super::accrual;
use super::events::{EventRecord, StakingEvent};
use super::guard::ReentrancyGuard;
use super::pool::PoolTotals;
use super::rates::{ApyHistory, FeeRates, FeesCollected};
use super::registry::LockPeriodEntry;
use super::state::EngineState;
use crate::config::{ConfigError, EngineConfig};
use crate::domain::{
    AccountId, Amount, BasisPoints, PositionId, PositionRecord, PositionUpdate, Seconds,
    UserSummary,
};
use crate::error::{
    AuthorizationError, FundsError, StakingResult, StateError, ValidationError,
};
use crate::external::{AssetLedger, Clock, FungibleAsset, PoolVault, Vault};
use crate::store::{Snapshot, SnapshotError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What a close paid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub principal: Amount,
    pub rewards: Amount,
    pub withdraw_fee: Amount,
    pub payout: Amount,
}

/// What a renew did with the rewards pending at the time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Renewal {
    pub claimed: Amount,
    pub forfeited: Amount,
    pub multiplier: BasisPoints,
}

pub struct StakingEngine<A: FungibleAsset = AssetLedger, V: Vault = PoolVault> {
    config: EngineConfig,
    state: EngineState,
    asset: A,
    vault: V,
    clock: Arc<dyn Clock>,
    guard: ReentrancyGuard,
}

impl StakingEngine<AssetLedger, PoolVault> {
    /// Engine over a fresh in-memory asset and a vault controlled by the
    /// engine account.
    pub fn in_memory(config: EngineConfig, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        let asset = AssetLedger::new(config.asset_decimals);
        let vault = PoolVault::new(config.vault_account.clone(), config.engine_account.clone());
        Self::new(config, asset, vault, clock)
    }
}

impl<A: FungibleAsset, V: Vault> StakingEngine<A, V> {
    pub fn new(
        config: EngineConfig,
        asset: A,
        vault: V,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        Self::check_wiring(&config, &asset, &vault)?;
        let state = EngineState::from_config(&config, clock.now());
        info!(
            lock_periods = state.registry.len(),
            apy = %state.apy,
            "staking engine initialised"
        );
        Ok(Self {
            config,
            state,
            asset,
            vault,
            clock,
            guard: ReentrancyGuard::default(),
        })
    }

    /// Resume from a snapshot. The checksum, every accounting invariant,
    /// the config's limits and the vault backing are verified before the
    /// engine is handed back.
    pub fn restore(
        config: EngineConfig,
        snapshot: Snapshot,
        asset: A,
        vault: V,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SnapshotError> {
        Self::check_wiring(&config, &asset, &vault)?;
        snapshot.verify()?;
        let taken_at = snapshot.taken_at;
        let state = snapshot.state;
        state
            .verify_invariants()
            .map_err(|err| SnapshotError::Corrupt(err.to_string()))?;
        Self::check_restored_limits(&config, &state)?;
        let balance = vault.balance_of(&asset);
        let staked = state.pool.total_staked();
        if balance < staked {
            warn!(balance, staked, "snapshot restored over an underfunded vault");
            return Err(SnapshotError::Corrupt(format!(
                "vault holds {balance}, snapshot stakes {staked}"
            )));
        }
        info!(
            taken_at,
            positions = state.ledger.len(),
            "staking engine restored from snapshot"
        );
        Ok(Self {
            config,
            state,
            asset,
            vault,
            clock,
            guard: ReentrancyGuard::default(),
        })
    }

    fn check_restored_limits(config: &EngineConfig, state: &EngineState) -> Result<(), ConfigError> {
        let cap = state.ledger.max_positions_per_owner();
        if cap != config.max_positions_per_owner {
            return Err(ConfigError::Invalid(format!(
                "snapshot caps owners at {cap} positions, config says {}",
                config.max_positions_per_owner
            )));
        }
        let capacity = state.apy_history.capacity();
        if capacity != config.apy_history_capacity {
            return Err(ConfigError::Invalid(format!(
                "snapshot keeps {capacity} apy entries, config says {}",
                config.apy_history_capacity
            )));
        }
        Ok(())
    }

    fn check_wiring(config: &EngineConfig, asset: &A, vault: &V) -> Result<(), ConfigError> {
        config.validate()?;
        if vault.account() != &config.vault_account {
            return Err(ConfigError::Invalid(format!(
                "vault account {} does not match configured {}",
                vault.account(),
                config.vault_account
            )));
        }
        if asset.decimals() != config.asset_decimals {
            return Err(ConfigError::Invalid(format!(
                "asset has {} decimals, config expects {}",
                asset.decimals(),
                config.asset_decimals
            )));
        }
        Ok(())
    }

    /// Run `body` with the reentrancy guard held; roll back state on error.
    fn atomically<T>(
        &mut self,
        operation: &'static str,
        body: impl FnOnce(&mut Self, Seconds) -> StakingResult<T>,
    ) -> StakingResult<T> {
        self.guard.enter(operation)?;
        let checkpoint = self.state.begin();
        let now = self.clock.now();

        let result = body(self, now);
        match &result {
            Ok(_) => {
                self.state.commit();
                debug_assert!(
                    self.state.verify_invariants().is_ok(),
                    "{operation} broke an accounting invariant: {:?}",
                    self.state.verify_invariants()
                );
            }
            Err(err) => {
                self.state.rollback(checkpoint);
                warn!(operation, kind = ?err.kind(), error = %err, "operation rolled back");
            }
        }
        self.guard.exit();
        result
    }

    // ── Bootstrap ──────────────────────────────────────────────────────

    pub fn grant(&mut self, account: &AccountId, capability: Capability) {
        self.state.access.grant(account, capability);
        info!(account = %account, ?capability, "capability granted");
    }

    pub fn revoke(&mut self, account: &AccountId, capability: Capability) {
        self.state.access.revoke(account, capability);
        info!(account = %account, ?capability, "capability revoked");
    }

    /// Register the single account allowed to report liquidations.
    pub fn register_lending_module(&mut self, account: AccountId) {
        info!(account = %account, "lending module registered");
        self.state.lending_module = Some(account);
    }

    // ── User operations ────────────────────────────────────────────────

    /// Stake `amount` for `lock_duration` seconds. The deposit fee stays in
    /// the vault and the remainder becomes the position's principal.
    pub fn open(
        &mut self,
        caller: &AccountId,
        amount: Amount,
        lock_duration: Seconds,
    ) -> StakingResult<PositionId> {
        self.atomically("open", |engine, now| {
            engine.do_open(caller, amount, lock_duration, now)
        })
    }

    fn do_open(
        &mut self,
        caller: &AccountId,
        amount: Amount,
        lock_duration: Seconds,
        now: Seconds,
    ) -> StakingResult<PositionId> {
        self.ensure_not_paused()?;
        if amount == 0 {
            return Err(ValidationError::ZeroAmount.into());
        }
        if amount < self.config.min_stake {
            return Err(ValidationError::BelowMinimum {
                amount,
                minimum: self.config.min_stake,
            }
            .into());
        }
        let multiplier = self
            .state
            .registry
            .multiplier_for(lock_duration)
            .ok_or(ValidationError::UnsupportedLockPeriod(lock_duration))?;
        let deposit_fee = self
            .state
            .fees
            .deposit_bps
            .apply(amount)
            .ok_or(ValidationError::Overflow)?;
        let principal = amount
            .checked_sub(deposit_fee)
            .ok_or(ValidationError::Overflow)?;
        if principal == 0 {
            return Err(ValidationError::FeeConsumesDeposit { amount }.into());
        }
        self.ensure_can_pull(caller, amount)?;

        let id = self
            .state
            .ledger
            .create(caller, principal, lock_duration, multiplier, now)?;
        self.state.pool.deposit(lock_duration, principal)?;
        self.state.add_user_stake(caller, principal, 1)?;
        if self.state.mark_staker(caller) {
            debug!(owner = %caller, total_users = self.state.stakers.len(), "first stake");
        }
        self.state.fees_collected.deposit = self
            .state
            .fees_collected
            .deposit
            .checked_add(deposit_fee)
            .ok_or(ValidationError::Overflow)?;
        self.state.events.push(
            now,
            StakingEvent::PositionOpened {
                id,
                owner: caller.clone(),
                amount,
                deposit_fee,
                principal,
                lock_duration,
                multiplier,
            },
        );

        let vault = self.vault.account().clone();
        self.asset
            .transfer_from(&self.config.engine_account, caller, &vault, amount)?;
        info!(
            position_id = %id,
            owner = %caller,
            amount,
            principal,
            deposit_fee,
            lock_duration,
            "position opened"
        );
        Ok(id)
    }

    /// Close an unlocked position, paying principal plus rewards less the
    /// withdrawal fee.
    pub fn close(&mut self, caller: &AccountId, id: PositionId) -> StakingResult<Settlement> {
        self.atomically("close", |engine, now| engine.do_close(caller, id, now))
    }

    fn do_close(
        &mut self,
        caller: &AccountId,
        id: PositionId,
        now: Seconds,
    ) -> StakingResult<Settlement> {
        self.ensure_not_paused()?;
        let record = self.state.ledger.read_active(id)?.clone();
        self.ensure_owner(caller, id)?;
        ensure_unlocked(&record, now)?;

        let rewards = accrual::pending_for(&record, self.state.apy, now)?;
        let gross = record
            .principal
            .checked_add(rewards)
            .ok_or(ValidationError::Overflow)?;
        let withdraw_fee = self
            .state
            .fees
            .withdraw_bps
            .apply(gross)
            .ok_or(ValidationError::Overflow)?;
        let payout = gross
            .checked_sub(withdraw_fee)
            .ok_or(ValidationError::Overflow)?;
        let remaining = self
            .state
            .pool
            .total_staked()
            .checked_sub(record.principal)
            .ok_or_else(|| {
                StateError::InvariantViolated(format!(
                    "{id} principal exceeds total staked"
                ))
            })?;
        self.ensure_backed(payout, remaining)?;

        let owner = self.state.ledger.deactivate(id)?;
        self.state
            .pool
            .withdraw(record.lock_duration, record.principal)?;
        self.state.remove_user_stake(&owner, record.principal, 1)?;
        self.state.fees_collected.withdraw = self
            .state
            .fees_collected
            .withdraw
            .checked_add(withdraw_fee)
            .ok_or(ValidationError::Overflow)?;
        self.record_paid(rewards)?;
        self.state.events.push(
            now,
            StakingEvent::PositionClosed {
                id,
                owner: owner.clone(),
                principal: record.principal,
                rewards,
                withdraw_fee,
                payout,
            },
        );

        self.pay(caller, payout)?;
        info!(
            position_id = %id,
            owner = %owner,
            principal = record.principal,
            rewards,
            withdraw_fee,
            payout,
            "position closed"
        );
        Ok(Settlement {
            principal: record.principal,
            rewards,
            withdraw_fee,
            payout,
        })
    }

    /// Pay out rewards accrued since the last claim.
    pub fn claim_rewards(&mut self, caller: &AccountId, id: PositionId) -> StakingResult<Amount> {
        self.atomically("claim_rewards", |engine, now| {
            engine.do_claim(caller, id, now)
        })
    }

    fn do_claim(&mut self, caller: &AccountId, id: PositionId, now: Seconds) -> StakingResult<Amount> {
        self.ensure_not_paused()?;
        let record = self.state.ledger.read_active(id)?.clone();
        self.ensure_owner(caller, id)?;

        let reward = accrual::pending_for(&record, self.state.apy, now)?;
        if reward == 0 {
            return Err(ValidationError::NothingToClaim(id).into());
        }
        self.ensure_backed(reward, self.state.pool.total_staked())?;

        self.state
            .ledger
            .update(id, &PositionUpdate::claimed_at(now))?;
        self.record_paid(reward)?;
        self.state.events.push(
            now,
            StakingEvent::RewardsClaimed {
                id,
                owner: caller.clone(),
                amount: reward,
            },
        );

        self.pay(caller, reward)?;
        info!(position_id = %id, owner = %caller, reward, "rewards claimed");
        Ok(reward)
    }

    /// Re-lock an unlocked position for `new_lock_duration`, restarting its
    /// lock and accrual window at now.
    ///
    /// With `claim_first` the pending rewards are paid out; without it they
    /// are forfeited and reported as such in the returned [`Renewal`].
    pub fn renew(
        &mut self,
        caller: &AccountId,
        id: PositionId,
        claim_first: bool,
        new_lock_duration: Seconds,
    ) -> StakingResult<Renewal> {
        self.atomically("renew", |engine, now| {
            engine.do_renew(caller, id, claim_first, new_lock_duration, now)
        })
    }

    fn do_renew(
        &mut self,
        caller: &AccountId,
        id: PositionId,
        claim_first: bool,
        new_lock_duration: Seconds,
        now: Seconds,
    ) -> StakingResult<Renewal> {
        self.ensure_not_paused()?;
        let record = self.state.ledger.read_active(id)?.clone();
        self.ensure_owner(caller, id)?;
        ensure_unlocked(&record, now)?;
        let multiplier = self
            .state
            .registry
            .multiplier_for(new_lock_duration)
            .ok_or(ValidationError::UnsupportedLockPeriod(new_lock_duration))?;

        let pending = accrual::pending_for(&record, self.state.apy, now)?;
        let (claimed, forfeited) = if claim_first { (pending, 0) } else { (0, pending) };
        if claimed > 0 {
            self.ensure_backed(claimed, self.state.pool.total_staked())?;
        }

        self.state
            .pool
            .move_bucket(record.lock_duration, new_lock_duration, record.principal)?;
        self.state.ledger.update(
            id,
            &PositionUpdate {
                start_time: Some(now),
                last_claim_time: Some(now),
                lock_duration: Some(new_lock_duration),
                multiplier: Some(multiplier),
                ..PositionUpdate::default()
            },
        )?;
        self.record_paid(claimed)?;
        self.state.events.push(
            now,
            StakingEvent::PositionRenewed {
                id,
                owner: caller.clone(),
                old_lock_duration: record.lock_duration,
                new_lock_duration,
                multiplier,
                claimed,
                forfeited,
            },
        );

        self.pay(caller, claimed)?;
        if forfeited > 0 {
            warn!(position_id = %id, forfeited, "renewed without claiming; pending rewards forfeited");
        }
        info!(
            position_id = %id,
            old_lock_duration = record.lock_duration,
            new_lock_duration,
            claimed,
            "position renewed"
        );
        Ok(Renewal {
            claimed,
            forfeited,
            multiplier,
        })
    }

    /// Move the position token to `to`. Aggregates follow the token.
    pub fn transfer_position(
        &mut self,
        caller: &AccountId,
        id: PositionId,
        to: &AccountId,
    ) -> StakingResult<()> {
        self.atomically("transfer_position", |engine, now| {
            engine.ensure_not_paused()?;
            let principal = engine.state.ledger.read_active(id)?.principal;
            if engine.state.ledger.owner_of(id)? == to {
                return Err(ValidationError::SelfTransfer(id).into());
            }
            let from = engine.state.ledger.transfer(caller, id, to)?;
            engine.state.remove_user_stake(&from, principal, 1)?;
            engine.state.add_user_stake(to, principal, 1)?;
            engine.state.events.push(
                now,
                StakingEvent::PositionTransferred {
                    id,
                    from: from.clone(),
                    to: to.clone(),
                },
            );
            info!(position_id = %id, from = %from, to = %to, "position transferred");
            Ok(())
        })
    }

    /// Let `operator` transfer the position on the owner's behalf, or clear
    /// the approval with `None`.
    pub fn approve_position(
        &mut self,
        caller: &AccountId,
        id: PositionId,
        operator: Option<AccountId>,
    ) -> StakingResult<()> {
        self.atomically("approve_position", |engine, _now| {
            engine.state.ledger.approve(caller, id, operator)?;
            Ok(())
        })
    }

    // ── Admin operations ───────────────────────────────────────────────

    pub fn set_apy(&mut self, caller: &AccountId, rate: BasisPoints) -> StakingResult<()> {
        self.atomically("set_apy", |engine, now| {
            engine.state.access.require(caller, Capability::ManageRates)?;
            ensure_rate("apy", rate)?;
            let old = engine.state.apy;
            engine.state.apy = rate;
            if let Some(evicted) = engine.state.apy_history.record(now, rate) {
                debug!(timestamp = evicted.timestamp, rate = %evicted.rate, "apy history full; oldest entry dropped");
            }
            engine
                .state
                .events
                .push(now, StakingEvent::ApyUpdated { old, new: rate });
            info!(old = %old, new = %rate, "apy updated");
            Ok(())
        })
    }

    pub fn set_fee_rates(&mut self, caller: &AccountId, rates: FeeRates) -> StakingResult<()> {
        self.atomically("set_fee_rates", |engine, now| {
            engine.state.access.require(caller, Capability::ManageRates)?;
            for (name, rate) in rates.named() {
                ensure_rate(name, rate)?;
            }
            engine.state.fees = rates;
            engine
                .state
                .events
                .push(now, StakingEvent::FeeRatesUpdated { rates });
            info!(
                deposit = %rates.deposit_bps,
                withdraw = %rates.withdraw_bps,
                bridge = %rates.bridge_bps,
                "fee rates updated"
            );
            Ok(())
        })
    }

    /// Add or replace lock periods in one versioned step. Returns the new
    /// registry version. Existing positions keep the multiplier they opened
    /// or last renewed with.
    pub fn batch_set_lock_period_multipliers(
        &mut self,
        caller: &AccountId,
        durations: &[Seconds],
        multipliers: &[BasisPoints],
    ) -> StakingResult<u64> {
        self.atomically("batch_set_lock_period_multipliers", |engine, now| {
            engine
                .state
                .access
                .require(caller, Capability::ManageLockPeriods)?;
            if durations.len() != multipliers.len() {
                return Err(ValidationError::LengthMismatch {
                    durations: durations.len(),
                    multipliers: multipliers.len(),
                }
                .into());
            }
            if durations.is_empty() {
                return Err(ValidationError::EmptyBatch.into());
            }
            let max = engine.config.max_multiplier_bps;
            let entries = durations
                .iter()
                .zip(multipliers)
                .map(|(&duration, &multiplier_bps)| {
                    if duration == 0 {
                        return Err(ValidationError::ZeroLockDuration);
                    }
                    if multiplier_bps.is_zero() || multiplier_bps > max {
                        return Err(ValidationError::MultiplierOutOfBounds {
                            value: multiplier_bps,
                            max,
                        });
                    }
                    Ok(LockPeriodEntry {
                        duration,
                        multiplier_bps,
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            let version = engine.state.registry.upsert(&entries);
            info!(count = entries.len(), version, "lock periods updated");
            engine
                .state
                .events
                .push(now, StakingEvent::LockPeriodsUpdated { entries, version });
            Ok(version)
        })
    }

    /// Stop offering `duration` for new positions. Positions already locked
    /// for it are unaffected.
    pub fn remove_lock_period(&mut self, caller: &AccountId, duration: Seconds) -> StakingResult<u64> {
        self.atomically("remove_lock_period", |engine, now| {
            engine
                .state
                .access
                .require(caller, Capability::ManageLockPeriods)?;
            engine
                .state
                .registry
                .remove(duration)
                .ok_or(ValidationError::UnsupportedLockPeriod(duration))?;
            let version = engine.state.registry.version();
            engine
                .state
                .events
                .push(now, StakingEvent::LockPeriodRemoved { duration, version });
            info!(duration, version, "lock period removed");
            Ok(version)
        })
    }

    pub fn pause(&mut self, caller: &AccountId) -> StakingResult<()> {
        self.atomically("pause", |engine, now| {
            engine.state.access.require(caller, Capability::Pause)?;
            if engine.state.paused {
                return Err(StateError::AlreadyPaused.into());
            }
            engine.state.paused = true;
            engine
                .state
                .events
                .push(now, StakingEvent::Paused { by: caller.clone() });
            warn!(by = %caller, "staking paused");
            Ok(())
        })
    }

    pub fn unpause(&mut self, caller: &AccountId) -> StakingResult<()> {
        self.atomically("unpause", |engine, now| {
            engine.state.access.require(caller, Capability::Pause)?;
            if !engine.state.paused {
                return Err(StateError::NotPaused.into());
            }
            engine.state.paused = false;
            engine
                .state
                .events
                .push(now, StakingEvent::Unpaused { by: caller.clone() });
            info!(by = %caller, "staking resumed");
            Ok(())
        })
    }

    /// Pull reward funding from `caller` into the vault.
    pub fn fund_rewards(&mut self, caller: &AccountId, amount: Amount) -> StakingResult<()> {
        self.atomically("fund_rewards", |engine, now| {
            engine.state.access.require(caller, Capability::FundRewards)?;
            if amount == 0 {
                return Err(ValidationError::ZeroAmount.into());
            }
            engine.ensure_can_pull(caller, amount)?;
            engine.state.rewards_funded = engine
                .state
                .rewards_funded
                .checked_add(amount)
                .ok_or(ValidationError::Overflow)?;
            engine.state.events.push(
                now,
                StakingEvent::RewardsFunded {
                    from: caller.clone(),
                    amount,
                },
            );
            let vault = engine.vault.account().clone();
            engine
                .asset
                .transfer_from(&engine.config.engine_account, caller, &vault, amount)?;
            info!(from = %caller, amount, "rewards funded");
            Ok(())
        })
    }

    // ── Lending module ─────────────────────────────────────────────────

    /// Set a position's principal to `new_amount` after an external
    /// liquidation. Allowed while paused.
    pub fn on_liquidation(
        &mut self,
        caller: &AccountId,
        id: PositionId,
        new_amount: Amount,
    ) -> StakingResult<()> {
        self.atomically("on_liquidation", |engine, now| {
            match &engine.state.lending_module {
                Some(module) if module == caller => {}
                _ => return Err(AuthorizationError::NotLendingModule(caller.clone()).into()),
            }
            let record = engine.state.ledger.read_active(id)?.clone();
            let owner = engine.state.ledger.owner_of(id)?.clone();
            let old = record.principal;

            if new_amount > old {
                let delta = new_amount - old;
                let new_total = engine
                    .state
                    .pool
                    .total_staked()
                    .checked_add(delta)
                    .ok_or(ValidationError::Overflow)?;
                engine.ensure_backed(0, new_total)?;
                engine.state.pool.deposit(record.lock_duration, delta)?;
                engine.state.add_user_stake(&owner, delta, 0)?;
            } else if new_amount < old {
                let delta = old - new_amount;
                engine.state.pool.withdraw(record.lock_duration, delta)?;
                engine.state.remove_user_stake(&owner, delta, 0)?;
            }
            engine
                .state
                .ledger
                .update(id, &PositionUpdate::principal(new_amount))?;
            engine.state.events.push(
                now,
                StakingEvent::PositionLiquidated {
                    id,
                    old_principal: old,
                    new_principal: new_amount,
                },
            );
            warn!(position_id = %id, old_principal = old, new_principal = new_amount, "position liquidated");
            Ok(())
        })
    }

    // ── Queries ────────────────────────────────────────────────────────

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn now(&self) -> Seconds {
        self.clock.now()
    }

    pub fn position(&self, id: PositionId) -> StakingResult<&PositionRecord> {
        Ok(self.state.ledger.read(id)?)
    }

    pub fn owner_of(&self, id: PositionId) -> StakingResult<&AccountId> {
        Ok(self.state.ledger.owner_of(id)?)
    }

    /// Rewards `id` would receive if claimed now. Zero once closed.
    pub fn pending_rewards(&self, id: PositionId) -> StakingResult<Amount> {
        let record = self.state.ledger.read(id)?;
        accrual::pending_for(record, self.state.apy, self.clock.now())
    }

    pub fn user_summary(&self, owner: &AccountId) -> UserSummary {
        let aggregate = self.state.user(owner);
        UserSummary {
            owner: owner.clone(),
            staked: aggregate.staked,
            active_positions: aggregate.active_positions,
            position_ids: self.state.ledger.positions_of(owner),
            has_staked: self.state.has_staked(owner),
        }
    }

    pub fn lock_periods(&self) -> Vec<LockPeriodEntry> {
        self.state.registry.entries()
    }

    pub fn config_version(&self) -> u64 {
        self.state.registry.version()
    }

    pub fn total_staked(&self) -> Amount {
        self.state.pool.total_staked()
    }

    pub fn bucket_total(&self, lock_duration: Seconds) -> Amount {
        self.state.pool.bucket(lock_duration)
    }

    pub fn pool_totals(&self) -> &PoolTotals {
        &self.state.pool
    }

    pub fn apy(&self) -> BasisPoints {
        self.state.apy
    }

    pub fn apy_history(&self) -> &ApyHistory {
        &self.state.apy_history
    }

    pub fn fee_rates(&self) -> FeeRates {
        self.state.fees
    }

    pub fn fees_collected(&self) -> FeesCollected {
        self.state.fees_collected
    }

    pub fn total_users(&self) -> usize {
        self.state.total_users()
    }

    pub fn is_paused(&self) -> bool {
        self.state.paused
    }

    pub fn events(&self) -> &[EventRecord] {
        self.state.events.records()
    }

    pub fn vault_balance(&self) -> Amount {
        self.vault.balance_of(&self.asset)
    }

    pub fn asset(&self) -> &A {
        &self.asset
    }

    /// Direct access to the asset, for funding accounts and setting
    /// allowances outside the engine.
    pub fn asset_mut(&mut self) -> &mut A {
        &mut self.asset
    }

    pub fn vault(&self) -> &V {
        &self.vault
    }

    pub fn verify_invariants(&self) -> StakingResult<()> {
        Ok(self.state.verify_invariants()?)
    }

    pub fn snapshot(&self) -> Result<Snapshot, SnapshotError> {
        Snapshot::capture(&self.state, self.clock.now())
    }

    // ── Helpers ────────────────────────────────────────────────────────

    fn ensure_not_paused(&self) -> StakingResult<()> {
        if self.state.paused {
            return Err(StateError::Paused.into());
        }
        Ok(())
    }

    fn ensure_owner(&self, caller: &AccountId, id: PositionId) -> StakingResult<()> {
        if self.state.ledger.owner_of(id)? != caller {
            return Err(AuthorizationError::NotPositionOwner {
                id,
                caller: caller.clone(),
            }
            .into());
        }
        Ok(())
    }

    fn ensure_can_pull(&self, owner: &AccountId, amount: Amount) -> StakingResult<()> {
        let have = self.asset.balance_of(owner);
        if have < amount {
            return Err(FundsError::InsufficientBalance {
                account: owner.clone(),
                have,
                need: amount,
            }
            .into());
        }
        let spender = &self.config.engine_account;
        let allowed = self.asset.allowance(owner, spender);
        if allowed < amount {
            return Err(FundsError::InsufficientAllowance {
                owner: owner.clone(),
                spender: spender.clone(),
                have: allowed,
                need: amount,
            }
            .into());
        }
        Ok(())
    }

    /// The vault must still cover `remaining_staked` after paying `payout`.
    fn ensure_backed(&self, payout: Amount, remaining_staked: Amount) -> StakingResult<()> {
        let balance = self.vault.balance_of(&self.asset);
        let required = remaining_staked
            .checked_add(payout)
            .ok_or(ValidationError::Overflow)?;
        if balance < required {
            return Err(FundsError::VaultUnderfunded { balance, required }.into());
        }
        Ok(())
    }

    fn record_paid(&mut self, rewards: Amount) -> StakingResult<()> {
        self.state.rewards_paid = self
            .state
            .rewards_paid
            .checked_add(rewards)
            .ok_or(ValidationError::Overflow)?;
        Ok(())
    }

    fn pay(&mut self, to: &AccountId, amount: Amount) -> StakingResult<()> {
        if amount == 0 {
            return Ok(());
        }
        self.vault
            .pay_out(&self.config.engine_account, &mut self.asset, to, amount)
    }
}

fn ensure_unlocked(record: &PositionRecord, now: Seconds) -> StakingResult<()> {
    if !record.is_unlocked(now) {
        return Err(StateError::StillLocked {
            id: record.id,
            unlock_time: record.unlock_time(),
            now,
        }
        .into());
    }
    Ok(())
}

fn ensure_rate(name: &'static str, rate: BasisPoints) -> StakingResult<()> {
    if rate > BasisPoints::ONE {
        return Err(ValidationError::RateOutOfBounds {
            name,
            value: rate,
            max: BasisPoints::ONE,
        }
        .into());
    }
    Ok(())
}
