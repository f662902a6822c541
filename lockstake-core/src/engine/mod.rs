//! Accounting engine and the state it owns.

pub mod access;
pub mod accounting;
pub mod accrual;
pub mod events;
pub mod guard;
pub mod pool;
pub mod rates;
pub mod registry;
pub mod state;

pub use access::{AccessControl, Capability};
pub use accounting::{Renewal, Settlement, StakingEngine};
pub use accrual::{accrued_rewards, pending_for};
pub use events::{EventLog, EventRecord, StakingEvent};
pub use guard::ReentrancyGuard;
pub use pool::PoolTotals;
pub use rates::{ApyEntry, ApyHistory, FeeRates, FeesCollected};
pub use registry::{LockPeriodEntry, LockPeriodRegistry};
pub use state::EngineState;
