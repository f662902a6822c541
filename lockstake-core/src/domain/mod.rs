//! Domain types for the staking ledger.

pub mod amount;
pub mod ids;
pub mod position;
pub mod user;

pub use amount::{
    amount_repr, mul_div, Amount, BasisPoints, Seconds, BPS_DENOMINATOR, SECONDS_PER_DAY,
    SECONDS_PER_YEAR,
};
pub use ids::{AccountId, PositionId};
pub use position::{PositionRecord, PositionUpdate};
pub use user::{UserAggregate, UserSummary};
