//! Position record: one stake, represented by a transferable token.

use super::amount::{Amount, BasisPoints, Seconds};
use super::ids::PositionId;
use serde::{Deserialize, Serialize};

/// A staking position.
///
/// The owner is deliberately absent: it is always resolved through the
/// position token, so a token transfer moves every right attached to the
/// position without touching this record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionRecord {
    pub id: PositionId,
    pub principal: Amount,
    pub start_time: Seconds,
    pub last_claim_time: Seconds,
    pub lock_duration: Seconds,
    /// Multiplier captured from the lock-period registry when the position was
    /// opened (or last renewed). Later registry edits never change it.
    pub multiplier: BasisPoints,
    pub active: bool,
}

impl PositionRecord {
    /// Earliest time at which the principal may be withdrawn.
    pub fn unlock_time(&self) -> Seconds {
        self.start_time.saturating_add(self.lock_duration)
    }

    pub fn is_unlocked(&self, now: Seconds) -> bool {
        now.saturating_sub(self.start_time) >= self.lock_duration
    }

    /// Seconds of accrual since the last claim.
    pub fn accrual_window(&self, now: Seconds) -> Seconds {
        now.saturating_sub(self.last_claim_time)
    }
}

/// Partial update of a record's mutable fields. `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PositionUpdate {
    pub principal: Option<Amount>,
    pub start_time: Option<Seconds>,
    pub last_claim_time: Option<Seconds>,
    pub lock_duration: Option<Seconds>,
    pub multiplier: Option<BasisPoints>,
    pub active: Option<bool>,
}

impl PositionUpdate {
    pub fn claimed_at(now: Seconds) -> Self {
        Self {
            last_claim_time: Some(now),
            ..Self::default()
        }
    }

    pub fn principal(amount: Amount) -> Self {
        Self {
            principal: Some(amount),
            ..Self::default()
        }
    }

    pub(crate) fn apply_to(&self, record: &mut PositionRecord) {
        if let Some(principal) = self.principal {
            record.principal = principal;
        }
        if let Some(start) = self.start_time {
            record.start_time = start;
        }
        if let Some(last_claim) = self.last_claim_time {
            record.last_claim_time = last_claim;
        }
        if let Some(lock) = self.lock_duration {
            record.lock_duration = lock;
        }
        if let Some(multiplier) = self.multiplier {
            record.multiplier = multiplier;
        }
        if let Some(active) = self.active {
            record.active = active;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> PositionRecord {
        PositionRecord {
            id: PositionId(1),
            principal: 1_000,
            start_time: 100,
            last_claim_time: 150,
            lock_duration: 50,
            multiplier: BasisPoints::ONE,
            active: true,
        }
    }

    #[test]
    fn unlock_boundary_is_inclusive() {
        let r = record();
        assert_eq!(r.unlock_time(), 150);
        assert!(!r.is_unlocked(149));
        assert!(r.is_unlocked(150));
        assert!(r.is_unlocked(151));
    }

    #[test]
    fn accrual_window_never_negative() {
        let r = record();
        assert_eq!(r.accrual_window(100), 0);
        assert_eq!(r.accrual_window(160), 10);
    }

    #[test]
    fn partial_update_touches_only_given_fields() {
        let mut r = record();
        PositionUpdate::principal(400).apply_to(&mut r);
        assert_eq!(r.principal, 400);
        assert_eq!(r.start_time, 100);
        assert_eq!(r.last_claim_time, 150);
        assert_eq!(r.multiplier, BasisPoints::ONE);
        assert!(r.active);
    }
}
