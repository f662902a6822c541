//! Schema-versioned JSON snapshots of the engine state.
//!
//! A snapshot carries a BLAKE3 checksum over the serialized state so a
//! hand-edited or truncated file is refused on load. Older schema versions
//! are migrated forward on read; snapshots are always written at
//! [`SCHEMA_VERSION`].

use crate::config::ConfigError;
use crate::domain::{AccountId, Amount, BasisPoints, Seconds, UserAggregate};
use crate::engine::access::AccessControl;
use crate::engine::events::EventLog;
use crate::engine::pool::PoolTotals;
use crate::engine::rates::{ApyHistory, FeeRates, FeesCollected};
use crate::engine::registry::LockPeriodRegistry;
use crate::engine::state::EngineState;
use crate::ledger::PositionLedger;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

pub const SCHEMA_VERSION: u32 = 2;

/// History capacity given to version-1 snapshots, which predate the log.
pub const MIGRATED_HISTORY_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("checksum mismatch: recorded {recorded}, computed {computed}")]
    ChecksumMismatch { recorded: String, computed: String },

    #[error("unsupported snapshot schema version {0}")]
    UnsupportedVersion(u32),

    #[error("snapshot state is inconsistent: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub schema_version: u32,
    pub taken_at: Seconds,
    pub checksum: String,
    pub state: EngineState,
}

#[derive(Deserialize)]
struct Header {
    schema_version: u32,
}

impl Snapshot {
    pub fn capture(state: &EngineState, taken_at: Seconds) -> Result<Self, SnapshotError> {
        let checksum = checksum_of(state)?;
        Ok(Self {
            schema_version: SCHEMA_VERSION,
            taken_at,
            checksum,
            state: state.clone(),
        })
    }

    /// Recompute the checksum and compare it with the recorded one.
    pub fn verify(&self) -> Result<(), SnapshotError> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(SnapshotError::UnsupportedVersion(self.schema_version));
        }
        let computed = checksum_of(&self.state)?;
        if computed != self.checksum {
            return Err(SnapshotError::ChecksumMismatch {
                recorded: self.checksum.clone(),
                computed,
            });
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse any supported schema version, migrating to the current one.
    pub fn from_json(text: &str) -> Result<Self, SnapshotError> {
        let header: Header = serde_json::from_str(text)?;
        let snapshot = match header.schema_version {
            1 => {
                let v1: SnapshotV1 = serde_json::from_str(text)?;
                migrate(v1)?
            }
            SCHEMA_VERSION => serde_json::from_str(text)?,
            other => return Err(SnapshotError::UnsupportedVersion(other)),
        };
        snapshot.verify()?;
        Ok(snapshot)
    }

    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        let json = self.to_json()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| io_error(parent, source))?;
        }
        fs::write(path, json).map_err(|source| io_error(path, source))?;
        info!(path = %path.display(), positions = self.state.ledger().len(), "snapshot saved");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let text = fs::read_to_string(path).map_err(|source| io_error(path, source))?;
        let snapshot = Self::from_json(&text)?;
        info!(path = %path.display(), taken_at = snapshot.taken_at, "snapshot loaded");
        Ok(snapshot)
    }
}

fn checksum_of(state: &EngineState) -> Result<String, SnapshotError> {
    let bytes = serde_json::to_vec(state)?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

fn io_error(path: &Path, source: std::io::Error) -> SnapshotError {
    SnapshotError::Io {
        path: path.display().to_string(),
        source,
    }
}

// ── Version 1 ──────────────────────────────────────────────────────────
//
// Version 1 kept a single current rate and no rate history.

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotV1 {
    schema_version: u32,
    taken_at: Seconds,
    checksum: String,
    state: EngineStateV1,
}

#[derive(Debug, Serialize, Deserialize)]
struct EngineStateV1 {
    ledger: PositionLedger,
    registry: LockPeriodRegistry,
    pool: PoolTotals,
    users: BTreeMap<AccountId, UserAggregate>,
    stakers: BTreeSet<AccountId>,
    apy_bps: BasisPoints,
    fees: FeeRates,
    fees_collected: FeesCollected,
    rewards_funded: Amount,
    rewards_paid: Amount,
    paused: bool,
    access: AccessControl,
    lending_module: Option<AccountId>,
    events: EventLog,
}

/// Upgrade a version-1 document. Its checksum is checked against the v1
/// state before the state is rewritten.
fn migrate(v1: SnapshotV1) -> Result<Snapshot, SnapshotError> {
    let bytes = serde_json::to_vec(&v1.state)?;
    let computed = blake3::hash(&bytes).to_hex().to_string();
    if computed != v1.checksum {
        return Err(SnapshotError::ChecksumMismatch {
            recorded: v1.checksum,
            computed,
        });
    }

    let old = v1.state;
    let mut apy_history = ApyHistory::new(MIGRATED_HISTORY_CAPACITY);
    apy_history.record(v1.taken_at, old.apy_bps);
    let state = EngineState {
        ledger: old.ledger,
        registry: old.registry,
        pool: old.pool,
        users: old.users,
        stakers: old.stakers,
        apy: old.apy_bps,
        apy_history,
        fees: old.fees,
        fees_collected: old.fees_collected,
        rewards_funded: old.rewards_funded,
        rewards_paid: old.rewards_paid,
        paused: old.paused,
        access: old.access,
        lending_module: old.lending_module,
        events: old.events,
        journal: None,
    };
    debug!(taken_at = v1.taken_at, "migrated snapshot from schema version 1");
    Snapshot::capture(&state, v1.taken_at)
}
