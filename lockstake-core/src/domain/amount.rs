//! Fixed-point amounts, basis points and time constants.
//!
//! Every monetary value is an integer count of the asset's smallest unit.
//! Rates and multipliers are basis points (1/10_000).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Smallest-unit integer amount of the staked asset.
pub type Amount = u128;

/// Durations and unix timestamps, in seconds.
pub type Seconds = u64;

pub const BPS_DENOMINATOR: u32 = 10_000;
pub const SECONDS_PER_DAY: Seconds = 86_400;
pub const SECONDS_PER_YEAR: Seconds = 365 * SECONDS_PER_DAY;

/// A rate or multiplier expressed in basis points.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct BasisPoints(pub u32);

impl BasisPoints {
    pub const ZERO: BasisPoints = BasisPoints(0);
    /// 100%, or a 1.0x multiplier.
    pub const ONE: BasisPoints = BasisPoints(BPS_DENOMINATOR);

    pub fn new(bps: u32) -> Self {
        Self(bps)
    }

    pub fn value(self) -> u32 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// `amount * self / 10_000`, rounded down. `None` on overflow.
    pub fn apply(self, amount: Amount) -> Option<Amount> {
        mul_div(amount, u128::from(self.0), u128::from(BPS_DENOMINATOR))
    }
}

impl fmt::Display for BasisPoints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}bps", self.0)
    }
}

/// `floor(a * b / d)` without requiring `a * b` to fit in a `u128`.
///
/// Splits `a` into `q * d + r` so the result is `q * b + r * b / d`, which is
/// exact. Returns `None` if `d` is zero or an intermediate product overflows.
pub fn mul_div(a: u128, b: u128, d: u128) -> Option<u128> {
    if d == 0 {
        return None;
    }
    let q = a / d;
    let r = a % d;
    let whole = q.checked_mul(b)?;
    let frac = r.checked_mul(b)? / d;
    whole.checked_add(frac)
}

/// Serde adapter for amounts in formats without 128-bit integers (TOML).
///
/// Reads an integer or a decimal string (underscores allowed). Writes an
/// integer when the value fits in `u64`, a string otherwise.
pub mod amount_repr {
    use super::Amount;
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(amount: &Amount, serializer: S) -> Result<S::Ok, S::Error> {
        match u64::try_from(*amount) {
            Ok(small) => serializer.serialize_u64(small),
            Err(_) => serializer.serialize_str(&amount.to_string()),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Amount, D::Error> {
        deserializer.deserialize_any(AmountVisitor)
    }

    struct AmountVisitor;

    impl<'de> Visitor<'de> for AmountVisitor {
        type Value = Amount;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a non-negative integer or decimal string")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
            Ok(Amount::from(v))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
            Amount::try_from(v).map_err(|_| E::custom(format!("negative amount {v}")))
        }

        fn visit_u128<E: de::Error>(self, v: u128) -> Result<Amount, E> {
            Ok(v)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
            v.replace('_', "")
                .parse()
                .map_err(|_| E::custom(format!("invalid amount {v:?}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_rounds_down() {
        assert_eq!(BasisPoints(100).apply(10_000), Some(100));
        assert_eq!(BasisPoints(1).apply(9_999), Some(0));
        assert_eq!(BasisPoints(2_500).apply(3), Some(0));
        assert_eq!(BasisPoints::ONE.apply(12_345), Some(12_345));
    }

    #[test]
    fn mul_div_matches_naive_for_small_values() {
        for a in [0u128, 1, 7, 999, 123_456_789] {
            for b in [0u128, 1, 3, 10_000, 86_400] {
                for d in [1u128, 7, 10_000, 31_536_000] {
                    assert_eq!(mul_div(a, b, d), Some(a * b / d), "a={a} b={b} d={d}");
                }
            }
        }
    }

    #[test]
    fn mul_div_handles_products_beyond_u128() {
        // a * b overflows u128, the quotient does not.
        let a = u128::MAX / 2;
        assert_eq!(mul_div(a, 4, 4), Some(a));
        assert_eq!(mul_div(a, 10_000, 20_000), Some(a / 2));
    }

    #[test]
    fn mul_div_rejects_zero_divisor() {
        assert_eq!(mul_div(1, 1, 0), None);
    }

    #[derive(Debug, serde::Deserialize, serde::Serialize)]
    struct Wrapped {
        #[serde(with = "amount_repr")]
        amount: Amount,
    }

    #[test]
    fn amount_repr_reads_integers_and_strings() {
        let w: Wrapped = toml::from_str("amount = 42").unwrap();
        assert_eq!(w.amount, 42);
        let w: Wrapped = toml::from_str("amount = \"1_000_000_000_000_000_000_000\"").unwrap();
        assert_eq!(w.amount, 10u128.pow(21));
        assert!(toml::from_str::<Wrapped>("amount = -1").is_err());
    }

    #[test]
    fn amount_repr_writes_large_values_as_strings() {
        let json = serde_json::to_string(&Wrapped { amount: 7 }).unwrap();
        assert_eq!(json, r#"{"amount":7}"#);
        let json = serde_json::to_string(&Wrapped { amount: u128::from(u64::MAX) + 1 }).unwrap();
        assert_eq!(json, r#"{"amount":"18446744073709551616"}"#);
    }

    #[test]
    fn seconds_per_year() {
        assert_eq!(SECONDS_PER_YEAR, 31_536_000);
    }
}
