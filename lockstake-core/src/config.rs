//! Engine configuration, loadable from TOML.

use crate::domain::{AccountId, Amount, BasisPoints};
use crate::engine::rates::FeeRates;
use crate::engine::registry::LockPeriodEntry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Static parameters of one staking deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Decimal scale of the staked asset.
    pub asset_decimals: u8,
    /// Smallest amount accepted by `open`, before fees.
    #[serde(with = "crate::domain::amount_repr")]
    pub min_stake: Amount,
    pub max_positions_per_owner: usize,
    pub apy_history_capacity: usize,
    pub initial_apy_bps: BasisPoints,
    pub fees: FeeRates,
    pub lock_periods: Vec<LockPeriodEntry>,
    /// Upper bound accepted for a lock-period multiplier, at most 10_000.
    pub max_multiplier_bps: BasisPoints,
    /// Account the engine acts as towards the asset and the vault.
    pub engine_account: AccountId,
    pub vault_account: AccountId,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            asset_decimals: 18,
            min_stake: 1,
            max_positions_per_owner: 100,
            apy_history_capacity: 64,
            initial_apy_bps: BasisPoints::ZERO,
            fees: FeeRates::default(),
            lock_periods: Vec::new(),
            max_multiplier_bps: BasisPoints::ONE,
            engine_account: AccountId::new("lockstake-engine"),
            vault_account: AccountId::new("lockstake-vault"),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.asset_decimals > 30 {
            return Err(ConfigError::Invalid(format!(
                "asset_decimals {} exceeds 30",
                self.asset_decimals
            )));
        }
        if self.max_positions_per_owner == 0 {
            return Err(ConfigError::Invalid(
                "max_positions_per_owner must be at least 1".into(),
            ));
        }
        if self.apy_history_capacity == 0 {
            return Err(ConfigError::Invalid(
                "apy_history_capacity must be at least 1".into(),
            ));
        }
        if self.initial_apy_bps > BasisPoints::ONE {
            return Err(ConfigError::Invalid(format!(
                "initial_apy_bps {} exceeds {}",
                self.initial_apy_bps,
                BasisPoints::ONE
            )));
        }
        for (name, rate) in self.fees.named() {
            if rate > BasisPoints::ONE {
                return Err(ConfigError::Invalid(format!(
                    "{name} fee {rate} exceeds {}",
                    BasisPoints::ONE
                )));
            }
        }
        if self.max_multiplier_bps.is_zero() || self.max_multiplier_bps > BasisPoints::ONE {
            return Err(ConfigError::Invalid(format!(
                "max_multiplier_bps {} outside 1..={}",
                self.max_multiplier_bps,
                BasisPoints::ONE
            )));
        }
        let mut seen = BTreeSet::new();
        for entry in &self.lock_periods {
            if entry.duration == 0 {
                return Err(ConfigError::Invalid("lock period of 0s".into()));
            }
            if entry.multiplier_bps.is_zero() || entry.multiplier_bps > self.max_multiplier_bps {
                return Err(ConfigError::Invalid(format!(
                    "multiplier {} for {}s outside 1..={}",
                    entry.multiplier_bps, entry.duration, self.max_multiplier_bps
                )));
            }
            if !seen.insert(entry.duration) {
                return Err(ConfigError::Invalid(format!(
                    "lock period {}s listed twice",
                    entry.duration
                )));
            }
        }
        if self.engine_account == self.vault_account {
            return Err(ConfigError::Invalid(
                "engine_account and vault_account must differ".into(),
            ));
        }
        Ok(())
    }
}
