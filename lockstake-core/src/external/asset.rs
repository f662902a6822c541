//! The underlying fungible asset: balances, allowances, transfers.

use crate::domain::{AccountId, Amount};
use crate::error::{FundsError, StakingResult, ValidationError};
use std::collections::BTreeMap;

/// Standard fungible-token semantics at a fixed decimal scale.
pub trait FungibleAsset: Send {
    fn decimals(&self) -> u8;

    fn balance_of(&self, account: &AccountId) -> Amount;

    fn allowance(&self, owner: &AccountId, spender: &AccountId) -> Amount;

    fn approve(&mut self, owner: &AccountId, spender: &AccountId, amount: Amount);

    fn transfer(&mut self, from: &AccountId, to: &AccountId, amount: Amount) -> StakingResult<()>;

    /// Move `amount` from `from` to `to`, spending `spender`'s allowance.
    fn transfer_from(
        &mut self,
        spender: &AccountId,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> StakingResult<()>;
}

/// In-memory asset ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetLedger {
    decimals: u8,
    balances: BTreeMap<AccountId, Amount>,
    allowances: BTreeMap<AccountId, BTreeMap<AccountId, Amount>>,
    total_supply: Amount,
}

impl AssetLedger {
    pub fn new(decimals: u8) -> Self {
        Self {
            decimals,
            balances: BTreeMap::new(),
            allowances: BTreeMap::new(),
            total_supply: 0,
        }
    }

    /// Create `amount` new units in `to`'s balance.
    pub fn mint(&mut self, to: &AccountId, amount: Amount) -> StakingResult<()> {
        let supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(ValidationError::Overflow)?;
        self.credit(to, amount)?;
        self.total_supply = supply;
        Ok(())
    }

    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    /// One whole token expressed in smallest units.
    pub fn unit(&self) -> Amount {
        10u128.pow(u32::from(self.decimals))
    }

    fn credit(&mut self, to: &AccountId, amount: Amount) -> StakingResult<()> {
        let balance = self.balances.entry(to.clone()).or_insert(0);
        *balance = balance
            .checked_add(amount)
            .ok_or(ValidationError::Overflow)?;
        Ok(())
    }

    fn debit(&mut self, from: &AccountId, amount: Amount) -> StakingResult<()> {
        let have = self.balance_of(from);
        if have < amount {
            return Err(FundsError::InsufficientBalance {
                account: from.clone(),
                have,
                need: amount,
            }
            .into());
        }
        self.balances.insert(from.clone(), have - amount);
        Ok(())
    }
}

impl Default for AssetLedger {
    fn default() -> Self {
        Self::new(18)
    }
}

impl FungibleAsset for AssetLedger {
    fn decimals(&self) -> u8 {
        self.decimals
    }

    fn balance_of(&self, account: &AccountId) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    fn allowance(&self, owner: &AccountId, spender: &AccountId) -> Amount {
        self.allowances
            .get(owner)
            .and_then(|spenders| spenders.get(spender))
            .copied()
            .unwrap_or(0)
    }

    fn approve(&mut self, owner: &AccountId, spender: &AccountId, amount: Amount) {
        self.allowances
            .entry(owner.clone())
            .or_default()
            .insert(spender.clone(), amount);
    }

    fn transfer(&mut self, from: &AccountId, to: &AccountId, amount: Amount) -> StakingResult<()> {
        // Check the credit side first so a failed transfer changes nothing.
        self.balance_of(to)
            .checked_add(amount)
            .ok_or(ValidationError::Overflow)?;
        self.debit(from, amount)?;
        self.credit(to, amount)
    }

    fn transfer_from(
        &mut self,
        spender: &AccountId,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> StakingResult<()> {
        let allowed = self.allowance(from, spender);
        if allowed < amount {
            return Err(FundsError::InsufficientAllowance {
                owner: from.clone(),
                spender: spender.clone(),
                have: allowed,
                need: amount,
            }
            .into());
        }
        self.transfer(from, to, amount)?;
        self.approve(from, spender, allowed - amount);
        Ok(())
    }
}
