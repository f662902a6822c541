use super::amount::Amount;
use super::ids::{AccountId, PositionId};
use serde::{Deserialize, Serialize};

/// Running per-owner totals, maintained incrementally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAggregate {
    pub staked: Amount,
    pub active_positions: usize,
}

impl UserAggregate {
    pub fn is_empty(&self) -> bool {
        self.staked == 0 && self.active_positions == 0
    }
}

/// Read-only view returned by the per-user summary query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub owner: AccountId,
    pub staked: Amount,
    pub active_positions: usize,
    /// Ids of the position tokens the owner currently holds.
    pub position_ids: Vec<PositionId>,
    /// Whether this owner has ever opened a position.
    pub has_staked: bool,
}
