//! Reward accrual.
//!
//! Simple, non-compounding interest on principal only:
//!
//! ```text
//! reward = principal * apy * multiplier * elapsed / (SECONDS_PER_YEAR * 10_000 * 10_000)
//! ```
//!
//! rounded down to the asset's smallest unit.

use crate::domain::{
    mul_div, Amount, BasisPoints, PositionRecord, Seconds, BPS_DENOMINATOR, SECONDS_PER_YEAR,
};
use crate::error::{StakingResult, ValidationError};

const ACCRUAL_DENOMINATOR: u128 =
    SECONDS_PER_YEAR as u128 * BPS_DENOMINATOR as u128 * BPS_DENOMINATOR as u128;

/// Rewards earned by `principal` over `elapsed` seconds.
pub fn accrued_rewards(
    principal: Amount,
    apy: BasisPoints,
    multiplier: BasisPoints,
    elapsed: Seconds,
) -> StakingResult<Amount> {
    let rate = u128::from(apy.value())
        .checked_mul(u128::from(multiplier.value()))
        .and_then(|r| r.checked_mul(u128::from(elapsed)))
        .ok_or(ValidationError::Overflow)?;
    mul_div(principal, rate, ACCRUAL_DENOMINATOR).ok_or_else(|| ValidationError::Overflow.into())
}

/// Rewards pending on a position since its last claim.
pub fn pending_for(
    record: &PositionRecord,
    apy: BasisPoints,
    now: Seconds,
) -> StakingResult<Amount> {
    if !record.active {
        return Ok(0);
    }
    accrued_rewards(
        record.principal,
        apy,
        record.multiplier,
        record.accrual_window(now),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SECONDS_PER_DAY;

    #[test]
    fn full_year_at_full_multiplier_pays_apy() {
        let reward =
            accrued_rewards(1_000_000, BasisPoints(2_000), BasisPoints::ONE, SECONDS_PER_YEAR)
                .unwrap();
        assert_eq!(reward, 200_000);
    }

    #[test]
    fn fifteen_days_at_twenty_percent() {
        // 500 tokens at 6 decimals: 500 * 0.20 * 15 / 365 ≈ 4.1095890
        let principal = 500 * 1_000_000;
        let reward = accrued_rewards(
            principal,
            BasisPoints(2_000),
            BasisPoints::ONE,
            15 * SECONDS_PER_DAY,
        )
        .unwrap();
        assert_eq!(reward, 4_109_589);
    }

    #[test]
    fn multiplier_scales_linearly() {
        let full = accrued_rewards(10_000_000, BasisPoints(1_000), BasisPoints(10_000), 86_400)
            .unwrap();
        let half = accrued_rewards(10_000_000, BasisPoints(1_000), BasisPoints(5_000), 86_400)
            .unwrap();
        assert_eq!(half, full / 2);
    }

    #[test]
    fn zero_inputs_accrue_nothing() {
        assert_eq!(accrued_rewards(0, BasisPoints(1), BasisPoints(1), 1).unwrap(), 0);
        assert_eq!(accrued_rewards(1, BasisPoints::ZERO, BasisPoints(1), 1).unwrap(), 0);
        assert_eq!(accrued_rewards(1, BasisPoints(1), BasisPoints(1), 0).unwrap(), 0);
    }

    #[test]
    fn large_principal_does_not_overflow() {
        // A trillion tokens at 18 decimals for five years.
        let principal = 1_000_000_000_000u128 * 10u128.pow(18);
        let reward = accrued_rewards(
            principal,
            BasisPoints(10_000),
            BasisPoints(10_000),
            5 * SECONDS_PER_YEAR,
        )
        .unwrap();
        assert_eq!(reward, principal * 5);
    }

    #[test]
    fn inactive_position_has_nothing_pending() {
        let record = PositionRecord {
            id: crate::domain::PositionId(1),
            principal: 1_000,
            start_time: 0,
            last_claim_time: 0,
            lock_duration: 1,
            multiplier: BasisPoints::ONE,
            active: false,
        };
        assert_eq!(pending_for(&record, BasisPoints(5_000), SECONDS_PER_YEAR).unwrap(), 0);
    }
}
