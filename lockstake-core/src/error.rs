//! Error taxonomy for every staking operation.
//!
//! Each failure belongs to exactly one category (see [`ErrorKind`]). Any error
//! aborts the whole operation; nothing it did before failing is kept.

use crate::domain::{AccountId, Amount, BasisPoints, PositionId, Seconds};
use crate::engine::access::Capability;
use thiserror::Error;

/// Category of a [`StakingError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Authorization,
    State,
    InsufficientFunds,
}

/// Top-level error returned by engine operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StakingError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("not authorized: {0}")]
    Authorization(#[from] AuthorizationError),

    #[error("invalid state: {0}")]
    State(#[from] StateError),

    #[error("insufficient funds: {0}")]
    InsufficientFunds(#[from] FundsError),
}

impl StakingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StakingError::Validation(_) => ErrorKind::Validation,
            StakingError::Authorization(_) => ErrorKind::Authorization,
            StakingError::State(_) => ErrorKind::State,
            StakingError::InsufficientFunds(_) => ErrorKind::InsufficientFunds,
        }
    }
}

/// Bad input, rejected before any state change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("amount must be greater than zero")]
    ZeroAmount,

    #[error("amount {amount} is below the minimum stake of {minimum}")]
    BelowMinimum { amount: Amount, minimum: Amount },

    #[error("deposit fee consumes the entire amount {amount}")]
    FeeConsumesDeposit { amount: Amount },

    #[error("lock duration {0}s is not supported")]
    UnsupportedLockPeriod(Seconds),

    #[error("lock duration must be greater than zero")]
    ZeroLockDuration,

    #[error("array lengths differ: {durations} durations, {multipliers} multipliers")]
    LengthMismatch { durations: usize, multipliers: usize },

    #[error("batch is empty")]
    EmptyBatch,

    #[error("{name} rate {value} exceeds the maximum of {max}")]
    RateOutOfBounds {
        name: &'static str,
        value: BasisPoints,
        max: BasisPoints,
    },

    #[error("multiplier {value} must be between 1bps and {max}")]
    MultiplierOutOfBounds { value: BasisPoints, max: BasisPoints },

    #[error("position {0} does not exist")]
    UnknownPosition(PositionId),

    #[error("position {0} has no rewards to claim")]
    NothingToClaim(PositionId),

    #[error("position {0} cannot be transferred to its current owner")]
    SelfTransfer(PositionId),

    #[error("arithmetic overflow")]
    Overflow,
}

/// The caller may not perform the operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorizationError {
    #[error("{caller} is not the owner of position {id}")]
    NotPositionOwner { id: PositionId, caller: AccountId },

    #[error("{account} lacks the {capability:?} capability")]
    MissingCapability {
        account: AccountId,
        capability: Capability,
    },

    #[error("{0} is not the registered lending module")]
    NotLendingModule(AccountId),

    #[error("{0} may not command vault payouts")]
    VaultCallerNotEngine(AccountId),
}

/// The operation is not allowed in the current state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("system is paused")]
    Paused,

    #[error("system is already paused")]
    AlreadyPaused,

    #[error("system is not paused")]
    NotPaused,

    #[error("position {id} is locked until {unlock_time} (now {now})")]
    StillLocked {
        id: PositionId,
        unlock_time: Seconds,
        now: Seconds,
    },

    #[error("position {0} is no longer active")]
    PositionInactive(PositionId),

    #[error("reentrant call while {0} is in progress")]
    ReentrantCall(&'static str),

    #[error("accounting invariant violated: {0}")]
    InvariantViolated(String),

    #[error("time can only be advanced on a manual clock")]
    ClockNotAdvanceable,
}

/// A balance, allowance, backing or capacity limit would be exceeded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FundsError {
    #[error("{account} holds {have}, needs {need}")]
    InsufficientBalance {
        account: AccountId,
        have: Amount,
        need: Amount,
    },

    #[error("{owner} allows {spender} to move {have}, needs {need}")]
    InsufficientAllowance {
        owner: AccountId,
        spender: AccountId,
        have: Amount,
        need: Amount,
    },

    #[error("vault holds {balance}, needs {required} to pay out and stay fully backed")]
    VaultUnderfunded { balance: Amount, required: Amount },

    #[error("{owner} already holds the maximum of {cap} positions")]
    PositionCapReached { owner: AccountId, cap: usize },
}

/// Result type for staking operations.
pub type StakingResult<T> = Result<T, StakingError>;

impl From<crate::ledger::LedgerError> for StakingError {
    fn from(err: crate::ledger::LedgerError) -> Self {
        use crate::ledger::LedgerError;
        match err {
            LedgerError::NotFound(id) => ValidationError::UnknownPosition(id).into(),
            LedgerError::Inactive(id) => StateError::PositionInactive(id).into(),
            LedgerError::PositionCapReached { owner, cap } => {
                FundsError::PositionCapReached { owner, cap }.into()
            }
            LedgerError::NotTokenOwner { id, caller } => {
                AuthorizationError::NotPositionOwner { id, caller }.into()
            }
        }
    }
}
