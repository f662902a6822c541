//! Position token: a non-fungible, transferable token per position.
//!
//! The token collection is the single source of truth for ownership. Burned
//! ids stay recorded so they can never be minted again.

use super::LedgerError;
use crate::domain::{AccountId, PositionId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Everything the collection knows about one id, for rollback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TokenImage {
    owner: Option<AccountId>,
    approval: Option<AccountId>,
    burned: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionToken {
    owners: BTreeMap<PositionId, AccountId>,
    /// Per-owner enumeration of held tokens.
    holdings: BTreeMap<AccountId, BTreeSet<PositionId>>,
    /// Single-token transfer approvals, cleared on every transfer.
    approvals: BTreeMap<PositionId, AccountId>,
    burned: BTreeSet<PositionId>,
}

impl PositionToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn owner_of(&self, id: PositionId) -> Option<&AccountId> {
        self.owners.get(&id)
    }

    pub fn exists(&self, id: PositionId) -> bool {
        self.owners.contains_key(&id) || self.burned.contains(&id)
    }

    pub fn is_burned(&self, id: PositionId) -> bool {
        self.burned.contains(&id)
    }

    /// Number of live tokens held by `owner`.
    pub fn balance_of(&self, owner: &AccountId) -> usize {
        self.holdings.get(owner).map_or(0, BTreeSet::len)
    }

    pub fn tokens_of(&self, owner: &AccountId) -> Vec<PositionId> {
        self.holdings
            .get(owner)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn get_approved(&self, id: PositionId) -> Option<&AccountId> {
        self.approvals.get(&id)
    }

    /// Whether `caller` may move the token: its owner or its approved operator.
    pub fn is_authorized(&self, caller: &AccountId, id: PositionId) -> bool {
        self.owner_of(id) == Some(caller) || self.get_approved(id) == Some(caller)
    }

    pub(crate) fn mint(&mut self, to: &AccountId, id: PositionId) {
        debug_assert!(!self.exists(id), "token {id} minted twice");
        self.owners.insert(id, to.clone());
        self.holdings.entry(to.clone()).or_default().insert(id);
    }

    pub(crate) fn approve(
        &mut self,
        caller: &AccountId,
        id: PositionId,
        operator: Option<AccountId>,
    ) -> Result<(), LedgerError> {
        let owner = self.live_owner(id)?;
        if owner != caller {
            return Err(LedgerError::NotTokenOwner {
                id,
                caller: caller.clone(),
            });
        }
        match operator {
            Some(op) => self.approvals.insert(id, op),
            None => self.approvals.remove(&id),
        };
        Ok(())
    }

    /// Move the token to `to`. Returns the previous owner.
    pub(crate) fn transfer(
        &mut self,
        caller: &AccountId,
        id: PositionId,
        to: &AccountId,
    ) -> Result<AccountId, LedgerError> {
        let from = self.live_owner(id)?.clone();
        if !self.is_authorized(caller, id) {
            return Err(LedgerError::NotTokenOwner {
                id,
                caller: caller.clone(),
            });
        }
        self.detach(&from, id);
        self.owners.insert(id, to.clone());
        self.holdings.entry(to.clone()).or_default().insert(id);
        Ok(from)
    }

    /// Destroy the token. Returns the last owner.
    pub(crate) fn burn(&mut self, id: PositionId) -> Result<AccountId, LedgerError> {
        let owner = self.live_owner(id)?.clone();
        self.detach(&owner, id);
        self.owners.remove(&id);
        self.burned.insert(id);
        Ok(owner)
    }

    pub(crate) fn image(&self, id: PositionId) -> TokenImage {
        TokenImage {
            owner: self.owners.get(&id).cloned(),
            approval: self.approvals.get(&id).cloned(),
            burned: self.burned.contains(&id),
        }
    }

    /// Put `id` back exactly as `image` captured it.
    pub(crate) fn restore(&mut self, id: PositionId, image: TokenImage) {
        if let Some(current) = self.owners.remove(&id) {
            self.detach(&current, id);
        }
        self.approvals.remove(&id);
        self.burned.remove(&id);
        if let Some(owner) = image.owner {
            self.holdings.entry(owner.clone()).or_default().insert(id);
            self.owners.insert(id, owner);
        }
        if let Some(operator) = image.approval {
            self.approvals.insert(id, operator);
        }
        if image.burned {
            self.burned.insert(id);
        }
    }

    fn live_owner(&self, id: PositionId) -> Result<&AccountId, LedgerError> {
        if self.burned.contains(&id) {
            return Err(LedgerError::Inactive(id));
        }
        self.owners.get(&id).ok_or(LedgerError::NotFound(id))
    }

    fn detach(&mut self, owner: &AccountId, id: PositionId) {
        self.approvals.remove(&id);
        if let Some(ids) = self.holdings.get_mut(owner) {
            ids.remove(&id);
            if ids.is_empty() {
                self.holdings.remove(owner);
            }
        }
    }
}
