//! Collateral ledger.
//!
//! Owns per-account, per-asset balances, the whitelist of accepted collateral
//! with risk weights and deposit caps, and the allowance table for delegated
//! withdrawal. Converts between native token decimals and internal 18-decimal
//! units and values holdings against the external price oracle at query time.
//!
//! Descriptors live in an append-only arena: an asset's index is assigned
//! once and never compacted or reused. Index 0 is always the primary
//! settlement asset, priced at 1.0 with weight 1.0 unconditionally. Balances
//! are signed; a negative primary balance is settlement-asset debt, and an
//! account carrying such debt may not withdraw any collateral at all.

use crate::access::SettlementCap;
use crate::bank::{TokenBridge, TokenError};
use crate::oracle::{OracleError, PriceOracle};
use crate::types::{AccountId, AssetId};
use crate::wad::{MathError, Wad, WAD};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Arena index of the primary settlement asset.
pub const PRIMARY_INDEX: usize = 0;

/// Risk weight bounds: [0.1, 1.0] in wad.
pub const MIN_WEIGHT: Wad = Wad::from_raw(WAD / 10);
pub const MAX_WEIGHT: Wad = Wad::from_raw(WAD);

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("{0} is already whitelisted")]
    AlreadyListed(AssetId),

    #[error("{0} is not whitelisted")]
    UnknownAsset(AssetId),

    #[error("risk weight {weight} outside [0.1, 1.0]")]
    WeightOutOfRange { weight: Wad },

    #[error("the primary settlement asset's weight is fixed at 1.0")]
    PrimaryWeightImmutable,

    #[error("zero amount")]
    ZeroAmount,

    #[error("zero beneficiary")]
    ZeroBeneficiary,

    #[error("deposit cap on {asset} exceeded: cap {cap}, would hold {would_be}")]
    DepositCapExceeded {
        asset: AssetId,
        cap: Wad,
        would_be: Wad,
    },

    #[error("account owes {debt} of the settlement asset; withdrawals are locked")]
    UaDebtOutstanding { debt: Wad },

    #[error("insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: Wad, available: Wad },

    #[error("ledger token holdings too low: requested {requested}, held {held}")]
    InsufficientHoldings { requested: Wad, held: Wad },

    #[error("insufficient allowance: requested {requested}, available {available}")]
    InsufficientAllowance { requested: Wad, available: Wad },

    #[error(transparent)]
    Math(#[from] MathError),

    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error(transparent)]
    Token(#[from] TokenError),
}

/// One whitelisted collateral asset. Append-only; the arena index is
/// permanent once assigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollateralDescriptor {
    pub asset: AssetId,
    pub decimals: u32,
    pub weight: Wad,
    /// Deposit cap in internal units.
    pub max_amount: Wad,
    /// Running total deposited, internal units.
    pub total_deposited: Wad,
}

#[derive(Debug, Clone)]
pub struct CollateralLedger {
    descriptors: Vec<CollateralDescriptor>,
    index_by_asset: HashMap<AssetId, usize>,
    /// (account, arena index) -> signed balance in internal units.
    balances: HashMap<(AccountId, usize), Wad>,
    /// (owner, spender, arena index) -> remaining delegated-withdrawal amount.
    allowances: HashMap<(AccountId, AccountId, usize), Wad>,
    /// Internal-unit mirror of the tokens the ledger itself holds, per index.
    /// Withdrawals may never exceed this (drain guard).
    holdings: Vec<Wad>,
}

impl CollateralLedger {
    /// Creates a ledger with the primary settlement asset at index 0.
    pub fn new(primary_asset: AssetId, primary_decimals: u32) -> Self {
        let primary = CollateralDescriptor {
            asset: primary_asset,
            decimals: primary_decimals,
            weight: Wad::ONE,
            max_amount: Wad::MAX,
            total_deposited: Wad::ZERO,
        };
        let mut index_by_asset = HashMap::new();
        index_by_asset.insert(primary_asset, PRIMARY_INDEX);
        Self {
            descriptors: vec![primary],
            index_by_asset,
            balances: HashMap::new(),
            allowances: HashMap::new(),
            holdings: vec![Wad::ZERO],
        }
    }

    pub fn primary_asset(&self) -> AssetId {
        self.descriptors[PRIMARY_INDEX].asset
    }

    pub fn num_collaterals(&self) -> usize {
        self.descriptors.len()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &CollateralDescriptor> {
        self.descriptors.iter()
    }

    pub fn index_of(&self, asset: AssetId) -> Result<usize, LedgerError> {
        self.index_by_asset
            .get(&asset)
            .copied()
            .ok_or(LedgerError::UnknownAsset(asset))
    }

    pub fn descriptor(&self, asset: AssetId) -> Result<&CollateralDescriptor, LedgerError> {
        Ok(&self.descriptors[self.index_of(asset)?])
    }

    pub fn descriptor_at(&self, index: usize) -> Option<&CollateralDescriptor> {
        self.descriptors.get(index)
    }

    // 3.1: whitelist management. append-only, governance-gated at the engine.

    pub fn add_collateral(
        &mut self,
        asset: AssetId,
        decimals: u32,
        weight: Wad,
        max_amount: Wad,
    ) -> Result<usize, LedgerError> {
        if self.index_by_asset.contains_key(&asset) {
            return Err(LedgerError::AlreadyListed(asset));
        }
        check_weight(weight)?;

        let index = self.descriptors.len();
        self.descriptors.push(CollateralDescriptor {
            asset,
            decimals,
            weight,
            max_amount,
            total_deposited: Wad::ZERO,
        });
        self.holdings.push(Wad::ZERO);
        self.index_by_asset.insert(asset, index);
        Ok(index)
    }

    /// Returns the previous weight.
    pub fn change_weight(&mut self, asset: AssetId, weight: Wad) -> Result<Wad, LedgerError> {
        let index = self.index_of(asset)?;
        if index == PRIMARY_INDEX {
            return Err(LedgerError::PrimaryWeightImmutable);
        }
        check_weight(weight)?;
        let old = self.descriptors[index].weight;
        self.descriptors[index].weight = weight;
        Ok(old)
    }

    /// Returns the previous cap.
    pub fn change_max_amount(
        &mut self,
        asset: AssetId,
        max_amount: Wad,
    ) -> Result<Wad, LedgerError> {
        let index = self.index_of(asset)?;
        let old = self.descriptors[index].max_amount;
        self.descriptors[index].max_amount = max_amount;
        Ok(old)
    }

    // 3.2: balances and allowances.

    pub fn balance(&self, account: AccountId, asset: AssetId) -> Result<Wad, LedgerError> {
        Ok(self.balance_at(account, self.index_of(asset)?))
    }

    pub fn balance_at(&self, account: AccountId, index: usize) -> Wad {
        self.balances
            .get(&(account, index))
            .copied()
            .unwrap_or(Wad::ZERO)
    }

    /// Sum of every account's balance for one asset. Equals the descriptor's
    /// running total at all times; exposed for audits.
    pub fn balance_sheet_total(&self, asset: AssetId) -> Result<Wad, LedgerError> {
        let index = self.index_of(asset)?;
        let mut total = Wad::ZERO;
        for ((_, i), balance) in &self.balances {
            if *i == index {
                total = total.checked_add(*balance)?;
            }
        }
        Ok(total)
    }

    pub fn holdings_of(&self, asset: AssetId) -> Result<Wad, LedgerError> {
        Ok(self.holdings[self.index_of(asset)?])
    }

    pub fn allowance(
        &self,
        owner: AccountId,
        spender: AccountId,
        asset: AssetId,
    ) -> Result<Wad, LedgerError> {
        let index = self.index_of(asset)?;
        Ok(self
            .allowances
            .get(&(owner, spender, index))
            .copied()
            .unwrap_or(Wad::ZERO))
    }

    /// Returns the new allowance.
    pub fn increase_allowance(
        &mut self,
        owner: AccountId,
        spender: AccountId,
        asset: AssetId,
        amount_native: u128,
    ) -> Result<Wad, LedgerError> {
        let index = self.index_of(asset)?;
        let amount = self.to_internal(index, amount_native)?;
        let entry = self.allowances.entry((owner, spender, index)).or_insert(Wad::ZERO);
        *entry = entry.checked_add(amount)?;
        Ok(*entry)
    }

    /// Returns the new allowance. Fails rather than clamping below zero.
    pub fn decrease_allowance(
        &mut self,
        owner: AccountId,
        spender: AccountId,
        asset: AssetId,
        amount_native: u128,
    ) -> Result<Wad, LedgerError> {
        let index = self.index_of(asset)?;
        let amount = self.to_internal(index, amount_native)?;
        let current = self
            .allowances
            .get(&(owner, spender, index))
            .copied()
            .unwrap_or(Wad::ZERO);
        if amount > current {
            return Err(LedgerError::InsufficientAllowance {
                requested: amount,
                available: current,
            });
        }
        let remaining = current.checked_sub(amount)?;
        self.allowances.insert((owner, spender, index), remaining);
        Ok(remaining)
    }

    // 3.3: deposits. settlement-capability holders only. tokens move in
    // before the internal credit so a balance never fronts tokens the
    // ledger does not hold.

    /// Returns the credited internal amount.
    pub fn deposit<B: TokenBridge>(
        &mut self,
        _cap: &SettlementCap,
        bank: &mut B,
        payer: AccountId,
        beneficiary: AccountId,
        amount_native: u128,
        asset: AssetId,
    ) -> Result<Wad, LedgerError> {
        let index = self.index_of(asset)?;
        if beneficiary.is_zero() {
            return Err(LedgerError::ZeroBeneficiary);
        }
        let amount = self.to_internal(index, amount_native)?;

        let descriptor = &self.descriptors[index];
        let would_be = descriptor.total_deposited.checked_add(amount)?;
        if would_be > descriptor.max_amount {
            return Err(LedgerError::DepositCapExceeded {
                asset,
                cap: descriptor.max_amount,
                would_be,
            });
        }

        bank.transfer_in(asset, payer, amount_native)?;

        self.credit(beneficiary, index, amount)?;
        self.descriptors[index].total_deposited = would_be;
        self.holdings[index] = self.holdings[index].checked_add(amount)?;
        Ok(amount)
    }

    // 3.4: withdrawals. internal state is debited first; the token leg runs
    // last and a rejected transfer rolls the debit back, so a call either
    // fully commits or leaves no trace.

    /// Returns the debited internal amount.
    pub fn withdraw<B: TokenBridge>(
        &mut self,
        bank: &mut B,
        account: AccountId,
        amount_native: u128,
        asset: AssetId,
    ) -> Result<Wad, LedgerError> {
        let index = self.index_of(asset)?;
        let amount = self.to_internal(index, amount_native)?;
        self.withdraw_internal(bank, account, account, amount, amount_native, index)
    }

    /// Delegated withdrawal: `spender` consumes `owner`'s allowance and
    /// receives the tokens. Allowance is decremented before anything moves
    /// and restored only if the token leg fails.
    pub fn withdraw_for<B: TokenBridge>(
        &mut self,
        bank: &mut B,
        owner: AccountId,
        spender: AccountId,
        amount_native: u128,
        asset: AssetId,
    ) -> Result<Wad, LedgerError> {
        let index = self.index_of(asset)?;
        let amount = self.to_internal(index, amount_native)?;

        let key = (owner, spender, index);
        let available = self.allowances.get(&key).copied().unwrap_or(Wad::ZERO);
        if amount > available {
            return Err(LedgerError::InsufficientAllowance {
                requested: amount,
                available,
            });
        }
        self.allowances.insert(key, available.checked_sub(amount)?);

        match self.withdraw_internal(bank, owner, spender, amount, amount_native, index) {
            Ok(debited) => Ok(debited),
            Err(err) => {
                self.allowances.insert(key, available);
                Err(err)
            }
        }
    }

    /// Withdraws the full balance. Returns (debited internal amount, native
    /// amount transferred out); for assets wider than 18 decimals the native
    /// amount is the truncating conversion of the full balance.
    pub fn withdraw_all<B: TokenBridge>(
        &mut self,
        bank: &mut B,
        account: AccountId,
        asset: AssetId,
    ) -> Result<(Wad, u128), LedgerError> {
        let index = self.index_of(asset)?;
        let amount = self.available_for_withdrawal(account, index)?;
        if amount.is_zero() {
            return Err(LedgerError::ZeroAmount);
        }
        let amount_native = amount.to_native(self.descriptors[index].decimals)?;
        let debited =
            self.withdraw_internal(bank, account, account, amount, amount_native, index)?;
        Ok((debited, amount_native))
    }

    fn withdraw_internal<B: TokenBridge>(
        &mut self,
        bank: &mut B,
        owner: AccountId,
        recipient: AccountId,
        amount: Wad,
        amount_native: u128,
        index: usize,
    ) -> Result<Wad, LedgerError> {
        let available = self.available_for_withdrawal(owner, index)?;
        if amount > available {
            return Err(LedgerError::InsufficientBalance {
                requested: amount,
                available,
            });
        }
        let held = self.holdings[index];
        if amount > held {
            return Err(LedgerError::InsufficientHoldings {
                requested: amount,
                held,
            });
        }

        self.debit(owner, index, amount)?;
        self.descriptors[index].total_deposited =
            self.descriptors[index].total_deposited.checked_sub(amount)?;
        self.holdings[index] = held.checked_sub(amount)?;

        let asset = self.descriptors[index].asset;
        if let Err(err) = bank.transfer_out(asset, recipient, amount_native) {
            self.credit(owner, index, amount)?;
            self.descriptors[index].total_deposited =
                self.descriptors[index].total_deposited.checked_add(amount)?;
            self.holdings[index] = self.holdings[index].checked_add(amount)?;
            return Err(err.into());
        }
        Ok(amount)
    }

    /// How much of one collateral the account may withdraw right now. Any
    /// outstanding settlement-asset debt locks every collateral in place.
    pub fn available_for_withdrawal(
        &self,
        account: AccountId,
        index: usize,
    ) -> Result<Wad, LedgerError> {
        let primary = self.balance_at(account, PRIMARY_INDEX);
        if primary.is_negative() {
            return Err(LedgerError::UaDebtOutstanding {
                debt: primary.checked_neg()?,
            });
        }
        Ok(self.balance_at(account, index))
    }

    // 3.5: valuation. prices are pulled from the oracle on every call; a
    // stale or missing quote fails the whole computation.

    /// USD value of everything the account holds. The primary asset is cash:
    /// price 1.0, weight 1.0, no oracle involved. `discounted` applies each
    /// asset's risk weight.
    pub fn reserve_value<O: PriceOracle>(
        &self,
        account: AccountId,
        discounted: bool,
        oracle: &O,
    ) -> Result<Wad, LedgerError> {
        let mut total = Wad::ZERO;
        for (index, descriptor) in self.descriptors.iter().enumerate() {
            let balance = self.balance_at(account, index);
            if balance.is_zero() {
                continue;
            }
            let value = if index == PRIMARY_INDEX {
                balance
            } else {
                let price = oracle.price(descriptor.asset)?;
                let undiscounted = balance.mul_wad(price)?;
                if discounted {
                    undiscounted.mul_wad(descriptor.weight)?
                } else {
                    undiscounted
                }
            };
            total = total.checked_add(value)?;
        }
        Ok(total)
    }

    /// Undiscounted USD value of all deposits, derived from the running
    /// totals rather than by walking accounts.
    pub fn total_value_locked<O: PriceOracle>(&self, oracle: &O) -> Result<Wad, LedgerError> {
        let mut total = Wad::ZERO;
        for (index, descriptor) in self.descriptors.iter().enumerate() {
            if descriptor.total_deposited.is_zero() {
                continue;
            }
            let value = if index == PRIMARY_INDEX {
                descriptor.total_deposited
            } else {
                let price = oracle.price(descriptor.asset)?;
                descriptor.total_deposited.mul_wad(price)?
            };
            total = total.checked_add(value)?;
        }
        Ok(total)
    }

    // 3.6: settlement-side mutation. capability holders only.

    /// Signed credit/debit of the primary asset from position settlement.
    /// May push the balance negative (UA debt). The running total moves with
    /// it so the balance-sheet invariant survives settlement.
    pub fn settle_pnl(
        &mut self,
        _cap: &SettlementCap,
        account: AccountId,
        delta: Wad,
    ) -> Result<Wad, LedgerError> {
        let balance = self.balance_at(account, PRIMARY_INDEX);
        let updated = balance.checked_add(delta)?;
        self.balances.insert((account, PRIMARY_INDEX), updated);
        self.descriptors[PRIMARY_INDEX].total_deposited = self.descriptors[PRIMARY_INDEX]
            .total_deposited
            .checked_add(delta)?;
        Ok(updated)
    }

    /// Moves a full collateral balance between accounts during debt seizure.
    /// Running totals are untouched; the collateral only changes hands.
    pub fn seize_transfer(
        &mut self,
        _cap: &SettlementCap,
        from: AccountId,
        to: AccountId,
        index: usize,
    ) -> Result<Wad, LedgerError> {
        let seized = self.balance_at(from, index);
        if seized.is_zero() {
            return Ok(Wad::ZERO);
        }
        self.balances.insert((from, index), Wad::ZERO);
        let receiving = self.balance_at(to, index);
        self.balances
            .insert((to, index), receiving.checked_add(seized)?);
        Ok(seized)
    }

    /// Records tokens paid directly into ledger custody (seizure payments).
    pub fn record_inflow(
        &mut self,
        _cap: &SettlementCap,
        index: usize,
        amount: Wad,
    ) -> Result<(), LedgerError> {
        self.holdings[index] = self.holdings[index].checked_add(amount)?;
        Ok(())
    }

    fn to_internal(&self, index: usize, amount_native: u128) -> Result<Wad, LedgerError> {
        if amount_native == 0 {
            return Err(LedgerError::ZeroAmount);
        }
        let amount = Wad::from_native(amount_native, self.descriptors[index].decimals)?;
        if amount.is_zero() {
            // dust below internal resolution on assets wider than 18 decimals
            return Err(LedgerError::ZeroAmount);
        }
        Ok(amount)
    }

    fn credit(&mut self, account: AccountId, index: usize, amount: Wad) -> Result<(), LedgerError> {
        let balance = self.balance_at(account, index);
        self.balances
            .insert((account, index), balance.checked_add(amount)?);
        Ok(())
    }

    fn debit(&mut self, account: AccountId, index: usize, amount: Wad) -> Result<(), LedgerError> {
        let balance = self.balance_at(account, index);
        self.balances
            .insert((account, index), balance.checked_sub(amount)?);
        Ok(())
    }
}

fn check_weight(weight: Wad) -> Result<(), LedgerError> {
    if weight < MIN_WEIGHT || weight > MAX_WEIGHT {
        return Err(LedgerError::WeightOutOfRange { weight });
    }
    Ok(())
}
