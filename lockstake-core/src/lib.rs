//! Lockstake Core: time-locked staking positions with yield accrual.
//!
//! - Domain types (amounts, basis points, ids, position records)
//! - Position ledger backed by a transferable position token
//! - Accounting engine: open, claim, renew, close, admin and liquidation
//! - External collaborators (asset, vault, clock) as traits
//! - Sequential command processor and schema-versioned snapshots

pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod external;
pub mod ledger;
pub mod processor;
pub mod store;

pub use config::{ConfigError, EngineConfig};
pub use engine::{Capability, StakingEngine};
pub use error::{ErrorKind, StakingError, StakingResult};
pub use processor::{Command, Outcome, Receipt, Sequencer};
pub use store::{Snapshot, SnapshotError};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: state and the default engine can cross threads.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::PositionRecord>();
        require_sync::<domain::PositionRecord>();
        require_send::<domain::AccountId>();
        require_sync::<domain::AccountId>();
        require_send::<ledger::PositionLedger>();
        require_sync::<ledger::PositionLedger>();
        require_send::<engine::EngineState>();
        require_sync::<engine::EngineState>();
        require_send::<StakingError>();
        require_sync::<StakingError>();
        require_send::<Snapshot>();
        require_sync::<Snapshot>();

        require_send::<StakingEngine>();
        require_send::<Sequencer>();
        require_sync::<Sequencer>();
    }

    /// The vault trait is object safe, so an engine can be built over any
    /// custody implementation chosen at runtime.
    #[test]
    fn vault_and_asset_traits_are_object_safe() {
        fn _takes(
            _vault: &dyn external::Vault,
            _asset: &dyn external::FungibleAsset,
            _clock: &dyn external::Clock,
        ) {
        }
    }
}
