//! Custody of pooled funds.

use super::asset::FungibleAsset;
use crate::domain::{AccountId, Amount};
use crate::error::{AuthorizationError, FundsError, StakingResult};

/// The shared pool holding every staker's funds.
///
/// Only the controller (the accounting engine) may command outbound transfers.
pub trait Vault: Send {
    /// Account under which the vault's funds are held in the asset.
    fn account(&self) -> &AccountId;

    fn balance_of(&self, asset: &dyn FungibleAsset) -> Amount {
        asset.balance_of(self.account())
    }

    fn pay_out(
        &mut self,
        caller: &AccountId,
        asset: &mut dyn FungibleAsset,
        to: &AccountId,
        amount: Amount,
    ) -> StakingResult<()>;
}

/// Vault whose holdings are a plain account in the asset ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolVault {
    account: AccountId,
    controller: AccountId,
    paid_out: Amount,
}

impl PoolVault {
    pub fn new(account: AccountId, controller: AccountId) -> Self {
        Self {
            account,
            controller,
            paid_out: 0,
        }
    }

    pub fn controller(&self) -> &AccountId {
        &self.controller
    }

    /// Sum of every payout made so far.
    pub fn total_paid_out(&self) -> Amount {
        self.paid_out
    }
}

impl Vault for PoolVault {
    fn account(&self) -> &AccountId {
        &self.account
    }

    fn pay_out(
        &mut self,
        caller: &AccountId,
        asset: &mut dyn FungibleAsset,
        to: &AccountId,
        amount: Amount,
    ) -> StakingResult<()> {
        if caller != &self.controller {
            return Err(AuthorizationError::VaultCallerNotEngine(caller.clone()).into());
        }
        let balance = asset.balance_of(&self.account);
        if balance < amount {
            return Err(FundsError::InsufficientBalance {
                account: self.account.clone(),
                have: balance,
                need: amount,
            }
            .into());
        }
        asset.transfer(&self.account, to, amount)?;
        self.paid_out = self.paid_out.saturating_add(amount);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::AssetLedger;
    use crate::error::StakingError;

    #[test]
    fn only_controller_can_pay_out() {
        let vault_acct = AccountId::new("vault");
        let engine = AccountId::new("engine");
        let mut asset = AssetLedger::new(6);
        asset.mint(&vault_acct, 500).unwrap();
        let mut vault = PoolVault::new(vault_acct, engine.clone());

        let err = vault
            .pay_out(&AccountId::new("mallory"), &mut asset, &"mallory".into(), 1)
            .unwrap_err();
        assert!(matches!(
            err,
            StakingError::Authorization(AuthorizationError::VaultCallerNotEngine(_))
        ));

        vault
            .pay_out(&engine, &mut asset, &"alice".into(), 200)
            .unwrap();
        assert_eq!(vault.balance_of(&asset), 300);
        assert_eq!(asset.balance_of(&"alice".into()), 200);
        assert_eq!(vault.total_paid_out(), 200);
    }

    #[test]
    fn payout_cannot_exceed_holdings() {
        let mut asset = AssetLedger::new(6);
        let mut vault = PoolVault::new("vault".into(), "engine".into());
        asset.mint(&"vault".into(), 5).unwrap();
        let err = vault
            .pay_out(&"engine".into(), &mut asset, &"alice".into(), 6)
            .unwrap_err();
        assert!(matches!(
            err,
            StakingError::InsufficientFunds(FundsError::InsufficientBalance { .. })
        ));
        assert_eq!(vault.total_paid_out(), 0);
    }
}
