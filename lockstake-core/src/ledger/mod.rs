//! Position ledger: per-position records keyed by id, plus the position token.
//!
//! The ledger stores records and resolves ownership; it knows nothing about
//! rewards, fees or pool totals. Every mutator is crate-private so only the
//! accounting engine can reach it.
//!
//! Ownership is never cached on the record. `owner_of` always asks the token,
//! so a transfer hands every future claim/close/renew right to the new holder.

pub mod token;

pub use token::PositionToken;

use token::TokenImage;

use crate::domain::{
    AccountId, Amount, BasisPoints, PositionId, PositionRecord, PositionUpdate, Seconds,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

/// Errors from ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("position {0} not found")]
    NotFound(PositionId),

    #[error("position {0} is inactive")]
    Inactive(PositionId),

    #[error("{owner} already holds {cap} active positions")]
    PositionCapReached { owner: AccountId, cap: usize },

    #[error("{caller} does not control the token for position {id}")]
    NotTokenOwner { id: PositionId, caller: AccountId },
}

/// Before-images of the ids an in-flight operation touched.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Journal {
    next_id: u64,
    entries: Vec<(PositionId, Option<PositionRecord>, TokenImage)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionLedger {
    records: BTreeMap<PositionId, PositionRecord>,
    token: PositionToken,
    next_id: u64,
    max_positions_per_owner: usize,
    #[serde(skip)]
    journal: Option<Journal>,
}

impl PositionLedger {
    pub fn new(max_positions_per_owner: usize) -> Self {
        Self {
            records: BTreeMap::new(),
            token: PositionToken::new(),
            next_id: 1,
            max_positions_per_owner,
            journal: None,
        }
    }

    // ── Reads ──────────────────────────────────────────────────────────

    /// Look up a record, active or not.
    pub fn read(&self, id: PositionId) -> Result<&PositionRecord, LedgerError> {
        self.records.get(&id).ok_or(LedgerError::NotFound(id))
    }

    /// Look up a record that must still be active.
    pub fn read_active(&self, id: PositionId) -> Result<&PositionRecord, LedgerError> {
        let record = self.read(id)?;
        if !record.active {
            return Err(LedgerError::Inactive(id));
        }
        Ok(record)
    }

    /// Current holder of the position's token.
    pub fn owner_of(&self, id: PositionId) -> Result<&AccountId, LedgerError> {
        let record = self.read_active(id)?;
        self.token
            .owner_of(record.id)
            .ok_or(LedgerError::Inactive(id))
    }

    pub fn positions_of(&self, owner: &AccountId) -> Vec<PositionId> {
        self.token.tokens_of(owner)
    }

    pub fn active_count(&self, owner: &AccountId) -> usize {
        self.token.balance_of(owner)
    }

    pub fn token(&self) -> &PositionToken {
        &self.token
    }

    pub fn records(&self) -> impl Iterator<Item = &PositionRecord> {
        self.records.values()
    }

    pub fn active_records(&self) -> impl Iterator<Item = &PositionRecord> {
        self.records.values().filter(|r| r.active)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn max_positions_per_owner(&self) -> usize {
        self.max_positions_per_owner
    }

    /// Id the next `create` will allocate.
    pub fn next_id(&self) -> PositionId {
        PositionId(self.next_id)
    }

    // ── Journal ────────────────────────────────────────────────────────

    /// Start recording before-images so [`Self::rollback`] can undo
    /// everything up to [`Self::commit`].
    pub(crate) fn begin(&mut self) {
        self.journal = Some(Journal {
            next_id: self.next_id,
            entries: Vec::new(),
        });
    }

    pub(crate) fn commit(&mut self) {
        self.journal = None;
    }

    pub(crate) fn rollback(&mut self) {
        let Some(journal) = self.journal.take() else {
            return;
        };
        for (id, record, image) in journal.entries.into_iter().rev() {
            match record {
                Some(record) => self.records.insert(id, record),
                None => self.records.remove(&id),
            };
            self.token.restore(id, image);
        }
        self.next_id = journal.next_id;
    }

    fn remember(&mut self, id: PositionId) {
        if self.journal.is_none() {
            return;
        }
        let record = self.records.get(&id).cloned();
        let image = self.token.image(id);
        if let Some(journal) = self.journal.as_mut() {
            journal.entries.push((id, record, image));
        }
    }

    // ── Mutations (engine only) ────────────────────────────────────────

    /// Store a new active record and mint its token to `owner`.
    pub(crate) fn create(
        &mut self,
        owner: &AccountId,
        principal: Amount,
        lock_duration: Seconds,
        multiplier: BasisPoints,
        now: Seconds,
    ) -> Result<PositionId, LedgerError> {
        self.ensure_capacity(owner)?;

        let id = PositionId(self.next_id);
        self.remember(id);
        self.next_id += 1;
        self.records.insert(
            id,
            PositionRecord {
                id,
                principal,
                start_time: now,
                last_claim_time: now,
                lock_duration,
                multiplier,
                active: true,
            },
        );
        self.token.mint(owner, id);
        debug!(position_id = %id, owner = %owner, principal, lock_duration, "position created");
        Ok(id)
    }

    /// Apply a partial update to an active record.
    ///
    /// Setting `active: Some(false)` is routed through [`Self::deactivate`] so
    /// the token is burned along with the flag.
    pub(crate) fn update(
        &mut self,
        id: PositionId,
        update: &PositionUpdate,
    ) -> Result<&PositionRecord, LedgerError> {
        self.read_active(id)?;
        self.remember(id);
        if update.active == Some(false) {
            self.deactivate(id)?;
        }
        let record = self
            .records
            .get_mut(&id)
            .ok_or(LedgerError::NotFound(id))?;
        update.apply_to(record);
        Ok(record)
    }

    /// Mark a record inactive and burn its token. Returns the last owner.
    pub(crate) fn deactivate(&mut self, id: PositionId) -> Result<AccountId, LedgerError> {
        self.read_active(id)?;
        self.remember(id);
        let owner = self.token.burn(id)?;
        if let Some(record) = self.records.get_mut(&id) {
            record.active = false;
        }
        debug!(position_id = %id, owner = %owner, "position deactivated");
        Ok(owner)
    }

    /// Move the position token, enforcing the recipient's position cap.
    pub(crate) fn transfer(
        &mut self,
        caller: &AccountId,
        id: PositionId,
        to: &AccountId,
    ) -> Result<AccountId, LedgerError> {
        self.read_active(id)?;
        self.ensure_capacity(to)?;
        self.remember(id);
        self.token.transfer(caller, id, to)
    }

    pub(crate) fn approve(
        &mut self,
        caller: &AccountId,
        id: PositionId,
        operator: Option<AccountId>,
    ) -> Result<(), LedgerError> {
        self.read_active(id)?;
        self.remember(id);
        self.token.approve(caller, id, operator)
    }

    fn ensure_capacity(&self, owner: &AccountId) -> Result<(), LedgerError> {
        if self.token.balance_of(owner) >= self.max_positions_per_owner {
            return Err(LedgerError::PositionCapReached {
                owner: owner.clone(),
                cap: self.max_positions_per_owner,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> AccountId {
        AccountId::new("alice")
    }

    fn open(ledger: &mut PositionLedger, owner: &AccountId) -> PositionId {
        ledger
            .create(owner, 1_000, 30, BasisPoints::ONE, 100)
            .unwrap()
    }

    #[test]
    fn create_allocates_sequential_ids() {
        let mut ledger = PositionLedger::new(10);
        assert_eq!(open(&mut ledger, &alice()), PositionId(1));
        assert_eq!(open(&mut ledger, &alice()), PositionId(2));
        let record = ledger.read(PositionId(2)).unwrap();
        assert!(record.active);
        assert_eq!(record.start_time, 100);
        assert_eq!(record.last_claim_time, 100);
        assert_eq!(ledger.owner_of(PositionId(2)).unwrap(), &alice());
    }

    #[test]
    fn create_enforces_owner_cap() {
        let mut ledger = PositionLedger::new(2);
        open(&mut ledger, &alice());
        open(&mut ledger, &alice());
        let err = ledger
            .create(&alice(), 1, 30, BasisPoints::ONE, 0)
            .unwrap_err();
        assert!(matches!(err, LedgerError::PositionCapReached { cap: 2, .. }));
        // A different owner is unaffected.
        open(&mut ledger, &AccountId::new("bob"));
    }

    #[test]
    fn read_unknown_is_not_found() {
        let ledger = PositionLedger::new(1);
        assert_eq!(
            ledger.read(PositionId(9)).unwrap_err(),
            LedgerError::NotFound(PositionId(9))
        );
    }

    #[test]
    fn update_rejects_inactive() {
        let mut ledger = PositionLedger::new(5);
        let id = open(&mut ledger, &alice());
        ledger.deactivate(id).unwrap();
        assert_eq!(
            ledger.update(id, &PositionUpdate::principal(1)).unwrap_err(),
            LedgerError::Inactive(id)
        );
    }

    #[test]
    fn deactivated_id_is_never_reused() {
        let mut ledger = PositionLedger::new(5);
        let id = open(&mut ledger, &alice());
        ledger.deactivate(id).unwrap();
        let next = open(&mut ledger, &alice());
        assert_ne!(id, next);
        assert!(!ledger.read(id).unwrap().active);
        assert!(ledger.owner_of(id).is_err());
        assert_eq!(ledger.deactivate(id).unwrap_err(), LedgerError::Inactive(id));
    }

    #[test]
    fn deactivation_frees_a_cap_slot() {
        let mut ledger = PositionLedger::new(1);
        let id = open(&mut ledger, &alice());
        ledger.deactivate(id).unwrap();
        open(&mut ledger, &alice());
    }

    #[test]
    fn update_with_inactive_flag_burns_token() {
        let mut ledger = PositionLedger::new(5);
        let id = open(&mut ledger, &alice());
        let update = PositionUpdate {
            active: Some(false),
            ..PositionUpdate::default()
        };
        let record = ledger.update(id, &update).unwrap();
        assert!(!record.active);
        assert!(!ledger.read(id).unwrap().active);
        assert!(ledger.token().is_burned(id));
    }

    #[test]
    fn transfer_respects_recipient_cap() {
        let mut ledger = PositionLedger::new(1);
        let bob = AccountId::new("bob");
        let id = open(&mut ledger, &alice());
        open(&mut ledger, &bob);
        let err = ledger.transfer(&alice(), id, &bob).unwrap_err();
        assert!(matches!(err, LedgerError::PositionCapReached { .. }));
        assert_eq!(ledger.owner_of(id).unwrap(), &alice());
    }

    #[test]
    fn rollback_restores_every_touched_position() {
        let mut ledger = PositionLedger::new(4);
        let bob = AccountId::new("bob");
        let kept = open(&mut ledger, &alice());
        let before = ledger.clone();

        ledger.begin();
        let fresh = open(&mut ledger, &alice());
        ledger.update(kept, &PositionUpdate::principal(1)).unwrap();
        ledger.transfer(&alice(), kept, &bob).unwrap();
        ledger.deactivate(kept).unwrap();
        ledger.deactivate(fresh).unwrap();
        ledger.rollback();

        assert_eq!(ledger, before);
        assert_eq!(ledger.next_id(), fresh);
        assert_eq!(ledger.owner_of(kept).unwrap(), &alice());
    }

    #[test]
    fn commit_keeps_changes() {
        let mut ledger = PositionLedger::new(4);
        ledger.begin();
        let id = open(&mut ledger, &alice());
        ledger.commit();
        ledger.rollback();
        assert_eq!(ledger.owner_of(id).unwrap(), &alice());
    }
}
