//! Deposit, withdrawal, allowance and whitelist entry points.
//!
//! Governance calls are role-gated. Deposits are restricted to the trusted
//! settlement caller. Withdrawals pass the solvency gate: the account's free
//! collateral at `min_margin`, recomputed against fresh prices and current
//! exposure, must stay non-negative after the requested amount leaves.

use super::core::Engine;
use super::results::EngineError;
use crate::access::Role;
use crate::bank::TokenBridge;
use crate::collateral::PRIMARY_INDEX;
use crate::events::{
    AllowanceChangedEvent, CollateralAddedEvent, DepositEvent, EventPayload,
    MaxAmountChangedEvent, WeightChangedEvent, WithdrawalEvent,
};
use crate::margin::{aggregate_exposure, free_collateral_by_ratio, margin_ratio};
use crate::oracle::PriceOracle;
use crate::trading::TradingVenue;
use crate::types::{AccountId, AssetId};
use crate::wad::Wad;

impl Engine {
    // whitelist management, governance-gated

    pub fn add_whitelisted_collateral(
        &mut self,
        caller: AccountId,
        asset: AssetId,
        decimals: u32,
        weight: Wad,
        max_amount: Wad,
    ) -> Result<usize, EngineError> {
        self.require_role(caller, Role::Governance)?;
        let index = self.ledger.add_collateral(asset, decimals, weight, max_amount)?;
        self.emit(EventPayload::CollateralAdded(CollateralAddedEvent {
            asset,
            index,
            weight,
            max_amount,
        }));
        Ok(index)
    }

    pub fn change_collateral_weight(
        &mut self,
        caller: AccountId,
        asset: AssetId,
        weight: Wad,
    ) -> Result<(), EngineError> {
        self.require_role(caller, Role::Governance)?;
        let old_weight = self.ledger.change_weight(asset, weight)?;
        self.emit(EventPayload::WeightChanged(WeightChangedEvent {
            asset,
            old_weight,
            new_weight: weight,
        }));
        Ok(())
    }

    pub fn change_collateral_max_amount(
        &mut self,
        caller: AccountId,
        asset: AssetId,
        max_amount: Wad,
    ) -> Result<(), EngineError> {
        self.require_role(caller, Role::Governance)?;
        let old_max_amount = self.ledger.change_max_amount(asset, max_amount)?;
        self.emit(EventPayload::MaxAmountChanged(MaxAmountChangedEvent {
            asset,
            old_max_amount,
            new_max_amount: max_amount,
        }));
        Ok(())
    }

    // deposits, settlement-caller only

    pub fn deposit<B: TokenBridge>(
        &mut self,
        caller: AccountId,
        payer: AccountId,
        beneficiary: AccountId,
        amount_native: u128,
        asset: AssetId,
        bank: &mut B,
    ) -> Result<Wad, EngineError> {
        self.require_role(caller, Role::Settlement)?;
        let amount = self
            .ledger
            .deposit(&self.cap, bank, payer, beneficiary, amount_native, asset)?;
        let new_balance = self.ledger.balance(beneficiary, asset)?;
        self.emit(EventPayload::Deposit(DepositEvent {
            payer,
            beneficiary,
            asset,
            amount,
            new_balance,
        }));
        Ok(amount)
    }

    /// Signed settlement-asset credit/debit from position settlement.
    pub fn settle_pnl(
        &mut self,
        caller: AccountId,
        account: AccountId,
        delta: Wad,
    ) -> Result<Wad, EngineError> {
        self.require_role(caller, Role::Settlement)?;
        let new_balance = self.ledger.settle_pnl(&self.cap, account, delta)?;
        self.emit(EventPayload::PnlSettled(crate::events::PnlSettledEvent {
            account,
            delta,
            new_balance,
        }));
        Ok(new_balance)
    }

    // withdrawals, margin-gated

    pub fn withdraw<B, O, V>(
        &mut self,
        account: AccountId,
        amount_native: u128,
        asset: AssetId,
        bank: &mut B,
        oracle: &O,
        venue: &V,
    ) -> Result<Wad, EngineError>
    where
        B: TokenBridge,
        O: PriceOracle,
        V: TradingVenue,
    {
        self.check_withdrawal_gate(account, amount_native, asset, oracle, venue)?;
        let amount = self.ledger.withdraw(bank, account, amount_native, asset)?;
        let new_balance = self.ledger.balance(account, asset)?;
        self.emit(EventPayload::Withdrawal(WithdrawalEvent {
            account,
            recipient: account,
            asset,
            amount,
            new_balance,
        }));
        Ok(amount)
    }

    /// Delegated withdrawal: `spender` consumes `owner`'s allowance and
    /// receives the tokens. The margin gate applies to the owner.
    pub fn withdraw_for<B, O, V>(
        &mut self,
        spender: AccountId,
        owner: AccountId,
        amount_native: u128,
        asset: AssetId,
        bank: &mut B,
        oracle: &O,
        venue: &V,
    ) -> Result<Wad, EngineError>
    where
        B: TokenBridge,
        O: PriceOracle,
        V: TradingVenue,
    {
        self.check_withdrawal_gate(owner, amount_native, asset, oracle, venue)?;
        let amount = self
            .ledger
            .withdraw_for(bank, owner, spender, amount_native, asset)?;
        let new_balance = self.ledger.balance(owner, asset)?;
        self.emit(EventPayload::Withdrawal(WithdrawalEvent {
            account: owner,
            recipient: spender,
            asset,
            amount,
            new_balance,
        }));
        Ok(amount)
    }

    pub fn withdraw_all<B, O, V>(
        &mut self,
        account: AccountId,
        asset: AssetId,
        bank: &mut B,
        oracle: &O,
        venue: &V,
    ) -> Result<(Wad, u128), EngineError>
    where
        B: TokenBridge,
        O: PriceOracle,
        V: TradingVenue,
    {
        let index = self.ledger.index_of(asset)?;
        let balance = self.ledger.balance_at(account, index);
        let amount_native = balance.to_native(self.ledger.descriptor(asset)?.decimals)?;
        self.check_withdrawal_gate(account, amount_native, asset, oracle, venue)?;

        let (amount, transferred) = self.ledger.withdraw_all(bank, account, asset)?;
        let new_balance = self.ledger.balance(account, asset)?;
        self.emit(EventPayload::Withdrawal(WithdrawalEvent {
            account,
            recipient: account,
            asset,
            amount,
            new_balance,
        }));
        Ok((amount, transferred))
    }

    // allowances

    pub fn increase_allowance(
        &mut self,
        owner: AccountId,
        spender: AccountId,
        asset: AssetId,
        amount_native: u128,
    ) -> Result<Wad, EngineError> {
        let allowance = self
            .ledger
            .increase_allowance(owner, spender, asset, amount_native)?;
        self.emit(EventPayload::AllowanceChanged(AllowanceChangedEvent {
            owner,
            spender,
            asset,
            allowance,
        }));
        Ok(allowance)
    }

    pub fn decrease_allowance(
        &mut self,
        owner: AccountId,
        spender: AccountId,
        asset: AssetId,
        amount_native: u128,
    ) -> Result<Wad, EngineError> {
        let allowance = self
            .ledger
            .decrease_allowance(owner, spender, asset, amount_native)?;
        self.emit(EventPayload::AllowanceChanged(AllowanceChangedEvent {
            owner,
            spender,
            asset,
            allowance,
        }));
        Ok(allowance)
    }

    // read-only views

    pub fn get_balance(&self, account: AccountId, asset: AssetId) -> Result<Wad, EngineError> {
        Ok(self.ledger.balance(account, asset)?)
    }

    pub fn get_reserve_value<O: PriceOracle>(
        &self,
        account: AccountId,
        discounted: bool,
        oracle: &O,
    ) -> Result<Wad, EngineError> {
        Ok(self.ledger.reserve_value(account, discounted, oracle)?)
    }

    pub fn get_total_value_locked<O: PriceOracle>(&self, oracle: &O) -> Result<Wad, EngineError> {
        Ok(self.ledger.total_value_locked(oracle)?)
    }

    /// Free collateral at an arbitrary ratio; the venue calls this with
    /// `min_margin_at_creation` before admitting new exposure.
    pub fn get_free_collateral_by_ratio<O, V>(
        &self,
        account: AccountId,
        ratio: Wad,
        oracle: &O,
        venue: &V,
    ) -> Result<Wad, EngineError>
    where
        O: PriceOracle,
        V: TradingVenue,
    {
        let reserve = self.ledger.reserve_value(account, true, oracle)?;
        let summary = aggregate_exposure(venue, account)?;
        Ok(free_collateral_by_ratio(reserve, &summary, ratio)?)
    }

    pub fn get_margin_ratio<O, V>(
        &self,
        account: AccountId,
        oracle: &O,
        venue: &V,
    ) -> Result<Wad, EngineError>
    where
        O: PriceOracle,
        V: TradingVenue,
    {
        let reserve = self.ledger.reserve_value(account, true, oracle)?;
        let summary = aggregate_exposure(venue, account)?;
        Ok(margin_ratio(reserve, &summary)?)
    }

    /// The solvency gate: free collateral at `min_margin` must remain
    /// non-negative once the withdrawal's discounted value leaves the
    /// reserve. Flat accounts pass trivially (the ledger still enforces
    /// balances and debt locks).
    fn check_withdrawal_gate<O, V>(
        &self,
        account: AccountId,
        amount_native: u128,
        asset: AssetId,
        oracle: &O,
        venue: &V,
    ) -> Result<(), EngineError>
    where
        O: PriceOracle,
        V: TradingVenue,
    {
        let summary = aggregate_exposure(venue, account)?;
        if summary.is_flat() {
            return Ok(());
        }

        let descriptor = self.ledger.descriptor(asset)?;
        let amount = Wad::from_native(amount_native, descriptor.decimals)?;
        let leaving = if self.ledger.index_of(asset)? == PRIMARY_INDEX {
            amount
        } else {
            let price = oracle.price(asset)?;
            amount.mul_wad(price)?.mul_wad(descriptor.weight)?
        };

        let reserve = self.ledger.reserve_value(account, true, oracle)?;
        let reserve_after = reserve.checked_sub(leaving)?;
        let free = free_collateral_by_ratio(reserve_after, &summary, self.config.min_margin)?;
        if free.is_negative() {
            return Err(EngineError::UnderMinMargin { account, free });
        }
        Ok(())
    }
}
