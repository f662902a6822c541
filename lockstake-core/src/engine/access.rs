//! Capability-style access control: an explicit permission set per account.
//!
//! Checked synchronously at the entry of each privileged operation, before any
//! mutation. Who grants capabilities is up to the embedding application.

use crate::domain::AccountId;
use crate::error::AuthorizationError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Capability {
    /// setAPY / setFeeRates.
    ManageRates,
    /// Lock-period registry edits.
    ManageLockPeriods,
    Pause,
    FundRewards,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControl {
    grants: BTreeMap<AccountId, BTreeSet<Capability>>,
}

impl AccessControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every capability granted to one account.
    pub fn with_admin(admin: &AccountId) -> Self {
        let mut access = Self::new();
        for cap in Capability::ALL {
            access.grant(admin, cap);
        }
        access
    }

    pub fn grant(&mut self, account: &AccountId, capability: Capability) {
        self.grants
            .entry(account.clone())
            .or_default()
            .insert(capability);
    }

    pub fn revoke(&mut self, account: &AccountId, capability: Capability) {
        if let Some(caps) = self.grants.get_mut(account) {
            caps.remove(&capability);
            if caps.is_empty() {
                self.grants.remove(account);
            }
        }
    }

    pub fn has(&self, account: &AccountId, capability: Capability) -> bool {
        self.grants
            .get(account)
            .is_some_and(|caps| caps.contains(&capability))
    }

    pub fn require(
        &self,
        account: &AccountId,
        capability: Capability,
    ) -> Result<(), AuthorizationError> {
        if self.has(account, capability) {
            Ok(())
        } else {
            Err(AuthorizationError::MissingCapability {
                account: account.clone(),
                capability,
            })
        }
    }

    pub fn capabilities_of(&self, account: &AccountId) -> Vec<Capability> {
        self.grants
            .get(account)
            .map(|caps| caps.iter().copied().collect())
            .unwrap_or_default()
    }
}

impl Capability {
    pub const ALL: [Capability; 4] = [
        Capability::ManageRates,
        Capability::ManageLockPeriods,
        Capability::Pause,
        Capability::FundRewards,
    ];
}
