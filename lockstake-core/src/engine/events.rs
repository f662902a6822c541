//! Audit events emitted by committed operations.
//!
//! The log lives inside the engine state, so an operation that fails leaves
//! no event behind.

use super::rates::FeeRates;
use super::registry::LockPeriodEntry;
use crate::domain::{AccountId, Amount, BasisPoints, PositionId, Seconds};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StakingEvent {
    PositionOpened {
        id: PositionId,
        owner: AccountId,
        amount: Amount,
        deposit_fee: Amount,
        principal: Amount,
        lock_duration: Seconds,
        multiplier: BasisPoints,
    },
    RewardsClaimed {
        id: PositionId,
        owner: AccountId,
        amount: Amount,
    },
    PositionRenewed {
        id: PositionId,
        owner: AccountId,
        old_lock_duration: Seconds,
        new_lock_duration: Seconds,
        multiplier: BasisPoints,
        claimed: Amount,
        forfeited: Amount,
    },
    PositionClosed {
        id: PositionId,
        owner: AccountId,
        principal: Amount,
        rewards: Amount,
        withdraw_fee: Amount,
        payout: Amount,
    },
    PositionTransferred {
        id: PositionId,
        from: AccountId,
        to: AccountId,
    },
    PositionLiquidated {
        id: PositionId,
        old_principal: Amount,
        new_principal: Amount,
    },
    ApyUpdated {
        old: BasisPoints,
        new: BasisPoints,
    },
    FeeRatesUpdated {
        rates: FeeRates,
    },
    LockPeriodsUpdated {
        entries: Vec<LockPeriodEntry>,
        version: u64,
    },
    LockPeriodRemoved {
        duration: Seconds,
        version: u64,
    },
    RewardsFunded {
        from: AccountId,
        amount: Amount,
    },
    Paused {
        by: AccountId,
    },
    Unpaused {
        by: AccountId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub seq: u64,
    pub timestamp: Seconds,
    pub event: StakingEvent,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLog {
    records: Vec<EventRecord>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, timestamp: Seconds, event: StakingEvent) -> u64 {
        let seq = self.records.len() as u64 + 1;
        self.records.push(EventRecord {
            seq,
            timestamp,
            event,
        });
        seq
    }

    /// Drop every record after the first `len`.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.records.truncate(len);
    }

    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    /// Records with a sequence number greater than `seq`.
    pub fn since(&self, seq: u64) -> &[EventRecord] {
        let start = usize::try_from(seq).unwrap_or(usize::MAX).min(self.records.len());
        &self.records[start..]
    }

    pub fn last(&self) -> Option<&EventRecord> {
        self.records.last()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
