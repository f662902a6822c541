//! Fee rates and the bounded APY audit log.

use crate::domain::{Amount, BasisPoints, Seconds};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Fee rates, each in basis points of the amount they apply to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeRates {
    /// Taken from the deposited amount on open.
    pub deposit_bps: BasisPoints,
    /// Taken from principal plus final rewards on close.
    pub withdraw_bps: BasisPoints,
    /// Charged by the bridge integration; stored and reported only.
    pub bridge_bps: BasisPoints,
}

impl FeeRates {
    pub fn named(&self) -> [(&'static str, BasisPoints); 3] {
        [
            ("deposit", self.deposit_bps),
            ("withdraw", self.withdraw_bps),
            ("bridge", self.bridge_bps),
        ]
    }
}

/// Fees retained in the pool, by origin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeesCollected {
    pub deposit: Amount,
    pub withdraw: Amount,
}

impl FeesCollected {
    pub fn total(&self) -> Amount {
        self.deposit.saturating_add(self.withdraw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApyEntry {
    pub timestamp: Seconds,
    pub rate: BasisPoints,
}

/// Append-only log of APY changes, capped at `capacity` entries.
///
/// Audit only: accrual always uses the current rate. When full, the oldest
/// entry is dropped to make room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApyHistory {
    entries: VecDeque<ApyEntry>,
    capacity: usize,
}

impl ApyHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(1_024)),
            capacity: capacity.max(1),
        }
    }

    /// Append an entry. Returns the entry evicted to stay within capacity.
    pub fn record(&mut self, timestamp: Seconds, rate: BasisPoints) -> Option<ApyEntry> {
        let evicted = if self.entries.len() >= self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(ApyEntry { timestamp, rate });
        evicted
    }

    pub fn latest(&self) -> Option<&ApyEntry> {
        self.entries.back()
    }

    pub fn entries(&self) -> impl Iterator<Item = &ApyEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_drops_oldest_when_full() {
        let mut history = ApyHistory::new(2);
        assert_eq!(history.record(1, BasisPoints(100)), None);
        assert_eq!(history.record(2, BasisPoints(200)), None);
        let evicted = history.record(3, BasisPoints(300)).unwrap();
        assert_eq!(evicted.timestamp, 1);
        let stamps: Vec<_> = history.entries().map(|e| e.timestamp).collect();
        assert_eq!(stamps, vec![2, 3]);
        assert_eq!(history.latest().unwrap().rate, BasisPoints(300));
    }

    #[test]
    fn zero_capacity_is_clamped_to_one() {
        let mut history = ApyHistory::new(0);
        history.record(1, BasisPoints(1));
        history.record(2, BasisPoints(2));
        assert_eq!(history.len(), 1);
        assert_eq!(history.capacity(), 1);
    }
}
