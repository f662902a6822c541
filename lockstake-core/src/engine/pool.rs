//! Pool totals: global staked principal and per-lock-duration buckets.

use crate::domain::{Amount, Seconds};
use crate::error::{StakingResult, StateError, ValidationError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregate principal of active positions.
///
/// Invariant: `total_staked == buckets.values().sum()`, and each bucket equals
/// the principal of the active positions at that lock duration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolTotals {
    total_staked: Amount,
    buckets: BTreeMap<Seconds, Amount>,
}

impl PoolTotals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_staked(&self) -> Amount {
        self.total_staked
    }

    pub fn bucket(&self, duration: Seconds) -> Amount {
        self.buckets.get(&duration).copied().unwrap_or(0)
    }

    /// Non-empty buckets in ascending duration order.
    pub fn buckets(&self) -> impl Iterator<Item = (Seconds, Amount)> + '_ {
        self.buckets.iter().map(|(&d, &a)| (d, a))
    }

    pub(crate) fn deposit(&mut self, duration: Seconds, amount: Amount) -> StakingResult<()> {
        let total = self
            .total_staked
            .checked_add(amount)
            .ok_or(ValidationError::Overflow)?;
        let bucket = self
            .bucket(duration)
            .checked_add(amount)
            .ok_or(ValidationError::Overflow)?;
        self.total_staked = total;
        self.set_bucket(duration, bucket);
        Ok(())
    }

    pub(crate) fn withdraw(&mut self, duration: Seconds, amount: Amount) -> StakingResult<()> {
        let bucket = self.bucket(duration).checked_sub(amount).ok_or_else(|| {
            StateError::InvariantViolated(format!(
                "bucket {duration}s holds {} but {amount} was withdrawn",
                self.bucket(duration)
            ))
        })?;
        let total = self.total_staked.checked_sub(amount).ok_or_else(|| {
            StateError::InvariantViolated(format!(
                "total staked {} but {amount} was withdrawn",
                self.total_staked
            ))
        })?;
        self.total_staked = total;
        self.set_bucket(duration, bucket);
        Ok(())
    }

    /// Move principal from one duration bucket to another.
    pub(crate) fn move_bucket(
        &mut self,
        from: Seconds,
        to: Seconds,
        amount: Amount,
    ) -> StakingResult<()> {
        if from == to {
            return Ok(());
        }
        self.withdraw(from, amount)?;
        self.deposit(to, amount)
    }

    fn set_bucket(&mut self, duration: Seconds, amount: Amount) {
        if amount == 0 {
            self.buckets.remove(&duration);
        } else {
            self.buckets.insert(duration, amount);
        }
    }
}
