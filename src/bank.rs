// Token transfer boundary. MOCKED for tests and the simulator; a production
// deployment implements `TokenBridge` against the host chain's token layer.
//
// Both directions are all-or-nothing: a bridge either moves the full native
// amount or returns an error, never a partial transfer.

use crate::types::{AccountId, AssetId};
use std::collections::HashMap;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("insufficient funds for {asset}: requested {requested}, available {available}")]
    InsufficientFunds {
        asset: AssetId,
        requested: u128,
        available: u128,
    },

    #[error("transfer of {asset} rejected: {reason}")]
    Rejected { asset: AssetId, reason: String },
}

pub trait TokenBridge {
    /// Pull `amount` native units of `asset` from `from` into ledger custody.
    fn transfer_in(&mut self, asset: AssetId, from: AccountId, amount: u128)
        -> Result<(), TokenError>;

    /// Push `amount` native units of `asset` from ledger custody to `to`.
    fn transfer_out(&mut self, asset: AssetId, to: AccountId, amount: u128)
        -> Result<(), TokenError>;
}

/// In-memory bank. Wallet balances per (asset, account) plus one custody
/// bucket per asset standing in for the ledger's token account.
#[derive(Debug, Clone, Default)]
pub struct MockBank {
    wallets: HashMap<(AssetId, AccountId), u128>,
    custody: HashMap<AssetId, u128>,
}

impl MockBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mint(&mut self, asset: AssetId, account: AccountId, amount: u128) {
        *self.wallets.entry((asset, account)).or_default() += amount;
    }

    pub fn wallet(&self, asset: AssetId, account: AccountId) -> u128 {
        self.wallets.get(&(asset, account)).copied().unwrap_or(0)
    }

    pub fn custody(&self, asset: AssetId) -> u128 {
        self.custody.get(&asset).copied().unwrap_or(0)
    }
}

impl TokenBridge for MockBank {
    fn transfer_in(
        &mut self,
        asset: AssetId,
        from: AccountId,
        amount: u128,
    ) -> Result<(), TokenError> {
        let wallet = self.wallets.entry((asset, from)).or_default();
        if *wallet < amount {
            return Err(TokenError::InsufficientFunds {
                asset,
                requested: amount,
                available: *wallet,
            });
        }
        *wallet -= amount;
        *self.custody.entry(asset).or_default() += amount;
        Ok(())
    }

    fn transfer_out(
        &mut self,
        asset: AssetId,
        to: AccountId,
        amount: u128,
    ) -> Result<(), TokenError> {
        let held = self.custody.entry(asset).or_default();
        if *held < amount {
            return Err(TokenError::InsufficientFunds {
                asset,
                requested: amount,
                available: *held,
            });
        }
        *held -= amount;
        *self.wallets.entry((asset, to)).or_default() += amount;
        Ok(())
    }
}
