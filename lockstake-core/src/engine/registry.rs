//! Lock-period registry: lock duration → reward multiplier.
//!
//! A versioned configuration store. Every edit bumps the version. Positions
//! copy the multiplier into their own record when opened or renewed, so no
//! edit here ever reaches an existing position.

use crate::domain::{BasisPoints, Seconds};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One supported lock duration and its multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockPeriodEntry {
    pub duration: Seconds,
    pub multiplier_bps: BasisPoints,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockPeriodRegistry {
    multipliers: BTreeMap<Seconds, BasisPoints>,
    version: u64,
}

impl LockPeriodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn multiplier_for(&self, duration: Seconds) -> Option<BasisPoints> {
        self.multipliers.get(&duration).copied()
    }

    pub fn is_supported(&self, duration: Seconds) -> bool {
        self.multipliers.contains_key(&duration)
    }

    /// Supported durations in ascending order.
    pub fn entries(&self) -> Vec<LockPeriodEntry> {
        self.multipliers
            .iter()
            .map(|(&duration, &multiplier_bps)| LockPeriodEntry {
                duration,
                multiplier_bps,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.multipliers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.multipliers.is_empty()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Add or overwrite a batch of entries as a single edit.
    pub(crate) fn upsert(&mut self, entries: &[LockPeriodEntry]) -> u64 {
        for entry in entries {
            self.multipliers.insert(entry.duration, entry.multiplier_bps);
        }
        self.version += 1;
        self.version
    }

    /// Stop accepting new positions at `duration`.
    pub(crate) fn remove(&mut self, duration: Seconds) -> Option<BasisPoints> {
        let removed = self.multipliers.remove(&duration);
        if removed.is_some() {
            self.version += 1;
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(duration: Seconds, bps: u32) -> LockPeriodEntry {
        LockPeriodEntry {
            duration,
            multiplier_bps: BasisPoints(bps),
        }
    }

    #[test]
    fn upsert_adds_and_overwrites() {
        let mut registry = LockPeriodRegistry::new();
        assert_eq!(registry.upsert(&[entry(30, 10_000), entry(90, 8_000)]), 1);
        assert_eq!(registry.multiplier_for(90), Some(BasisPoints(8_000)));

        assert_eq!(registry.upsert(&[entry(90, 9_000)]), 2);
        assert_eq!(registry.multiplier_for(90), Some(BasisPoints(9_000)));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn remove_bumps_version_only_when_present() {
        let mut registry = LockPeriodRegistry::new();
        registry.upsert(&[entry(30, 10_000)]);
        assert_eq!(registry.remove(60), None);
        assert_eq!(registry.version(), 1);
        assert_eq!(registry.remove(30), Some(BasisPoints(10_000)));
        assert_eq!(registry.version(), 2);
        assert!(!registry.is_supported(30));
    }

    #[test]
    fn entries_are_sorted_by_duration() {
        let mut registry = LockPeriodRegistry::new();
        registry.upsert(&[entry(90, 1), entry(30, 2), entry(60, 3)]);
        let durations: Vec<_> = registry.entries().iter().map(|e| e.duration).collect();
        assert_eq!(durations, vec![30, 60, 90]);
    }
}
