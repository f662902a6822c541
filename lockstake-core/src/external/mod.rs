//! Collaborators outside the ledger: the staked asset, the custody vault and
//! the clock. Each is a trait with an in-memory implementation used by tests,
//! the CLI and any embedding that does not bring its own.

pub mod asset;
pub mod clock;
pub mod vault;

pub use asset::{AssetLedger, FungibleAsset};
pub use clock::{Clock, ManualClock, SystemClock};
pub use vault::{PoolVault, Vault};
