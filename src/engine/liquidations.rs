//! Liquidation and debt-seizure entry points.
//!
//! Any third party may call these. State is never stored between calls: the
//! margin ratio, the required close amount and the debt picture are all
//! recomputed from fresh prices and balances at execution time, which is why
//! the liquidator's proposed close amount is only accepted within a
//! configured tolerance of the venue's own number.

use super::core::Engine;
use super::results::{EngineError, LiquidationResult, SeizedCollateral, SeizureResult};
use crate::bank::TokenBridge;
use crate::collateral::PRIMARY_INDEX;
use crate::events::{BadDebtEvent, CollateralSeizedEvent, EventPayload, LiquidationEvent};
use crate::liquidation::{seizure_payment, split_reward, within_tolerance};
use crate::margin::{aggregate_exposure, margin_ratio};
use crate::oracle::PriceOracle;
use crate::trading::TradingVenue;
use crate::types::{AccountId, MarketId, PositionKind};
use crate::wad::Wad;

impl Engine {
    pub fn liquidate_trader<V, O>(
        &mut self,
        liquidator: AccountId,
        market: MarketId,
        account: AccountId,
        proposed_close: Wad,
        venue: &mut V,
        oracle: &O,
    ) -> Result<LiquidationResult, EngineError>
    where
        V: TradingVenue,
        O: PriceOracle,
    {
        self.liquidate(liquidator, market, account, PositionKind::Trader, proposed_close, venue, oracle)
    }

    pub fn liquidate_lp<V, O>(
        &mut self,
        liquidator: AccountId,
        market: MarketId,
        account: AccountId,
        proposed_close: Wad,
        venue: &mut V,
        oracle: &O,
    ) -> Result<LiquidationResult, EngineError>
    where
        V: TradingVenue,
        O: PriceOracle,
    {
        self.liquidate(liquidator, market, account, PositionKind::Lp, proposed_close, venue, oracle)
    }

    fn liquidate<V, O>(
        &mut self,
        liquidator: AccountId,
        market: MarketId,
        account: AccountId,
        kind: PositionKind,
        proposed_close: Wad,
        venue: &mut V,
        oracle: &O,
    ) -> Result<LiquidationResult, EngineError>
    where
        V: TradingVenue,
        O: PriceOracle,
    {
        if !venue.has_position(market, account, kind) {
            return Err(EngineError::LiquidateInvalidPosition {
                market,
                account,
                kind,
            });
        }

        let reserve = self.ledger.reserve_value(account, true, oracle)?;
        let summary = aggregate_exposure(venue, account)?;
        let ratio = margin_ratio(reserve, &summary)?;
        if ratio >= self.config.min_margin {
            return Err(EngineError::LiquidateValidMargin { margin_ratio: ratio });
        }

        // guards against under-closing to farm repeated rewards, and against
        // proposals priced off a stale market picture
        let required = venue.required_close_amount(market, account, kind);
        if !within_tolerance(proposed_close, required, self.config.liquidation.close_tolerance)? {
            return Err(EngineError::LiquidateInsufficientProposedAmount {
                proposed: proposed_close,
                required,
            });
        }

        let closed = venue.close_position(market, account, kind, proposed_close)?;
        self.ledger.settle_pnl(&self.cap, account, closed.realized_pnl)?;

        // reward comes out of the liquidated account's own reserve
        let split = split_reward(closed.closed_notional.abs()?, &self.config.liquidation)?;
        self.ledger
            .settle_pnl(&self.cap, account, split.total.checked_neg()?)?;
        self.ledger.settle_pnl(&self.cap, liquidator, split.liquidator)?;
        self.insurance.credit_reward(split.insurance)?;

        self.emit(EventPayload::Liquidation(LiquidationEvent {
            market,
            account,
            kind,
            liquidator,
            closed_notional: closed.closed_notional,
            realized_pnl: closed.realized_pnl,
            reward: split.total,
            liquidator_reward: split.liquidator,
            insurance_reward: split.insurance,
        }));

        Ok(LiquidationResult {
            market,
            account,
            kind,
            liquidator,
            closed_notional: closed.closed_notional,
            closed_size: closed.closed_size,
            realized_pnl: closed.realized_pnl,
            reward: split.total,
            liquidator_reward: split.liquidator,
            insurance_reward: split.insurance,
        })
    }

    /// Whether `account` is currently seizable. Oracle and math failures
    /// propagate; the two rejection states map to `Ok(false)`.
    pub fn can_seize_collateral<O: PriceOracle>(
        &self,
        account: AccountId,
        oracle: &O,
    ) -> Result<bool, EngineError> {
        match self.seizure_check(account, oracle) {
            Ok(_) => Ok(true),
            Err(EngineError::LiquidationDebtSizeZero { .. })
            | Err(EngineError::SufficientUserCollateral { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Seizes every non-primary collateral balance of an indebted account.
    /// The caller pays the discounted value in the primary asset per
    /// collateral and receives the seized balance in the ledger; proceeds
    /// repay the debt, and any residual is socialized into the insurance
    /// fund.
    pub fn seize_collateral<B, O>(
        &mut self,
        liquidator: AccountId,
        account: AccountId,
        bank: &mut B,
        oracle: &O,
    ) -> Result<SeizureResult, EngineError>
    where
        B: TokenBridge,
        O: PriceOracle,
    {
        let debt_before = self.seizure_check(account, oracle)?;

        let primary_asset = self.ledger.primary_asset();
        let primary_decimals = self.ledger.descriptor(primary_asset)?.decimals;
        let discount = self.config.liquidation.non_ua_coll_seizure_discount;

        // snapshot the targets before mutating balances
        let targets: Vec<(usize, crate::types::AssetId)> = self
            .ledger
            .descriptors()
            .enumerate()
            .skip(1)
            .filter(|(index, _)| self.ledger.balance_at(account, *index).is_positive())
            .map(|(index, descriptor)| (index, descriptor.asset))
            .collect();

        let mut seized = Vec::new();
        for (index, asset) in targets {
            let balance = self.ledger.balance_at(account, index);
            // seizure pays on undiscounted value; the weight only matters
            // for the seizability check
            let price = oracle.price(asset)?;
            let value = balance.mul_wad(price)?;
            let payment = seizure_payment(value, discount)?;
            let payment_native = payment.to_native(primary_decimals)?;

            // the payment leg lands before any internal credit, deposit-style
            if payment_native > 0 {
                bank.transfer_in(primary_asset, liquidator, payment_native)?;
                let payment_credited = Wad::from_native(payment_native, primary_decimals)?;
                self.ledger
                    .record_inflow(&self.cap, PRIMARY_INDEX, payment_credited)?;
                self.ledger
                    .settle_pnl(&self.cap, account, payment_credited)?;
            }

            let transferred = self.ledger.seize_transfer(&self.cap, account, liquidator, index)?;
            self.emit(EventPayload::CollateralSeized(CollateralSeizedEvent {
                account,
                liquidator,
                asset,
                seized: transferred,
                payment,
            }));
            seized.push(SeizedCollateral {
                asset,
                seized: transferred,
                payment,
            });
        }

        // whatever the proceeds could not repay is socialized
        let remaining = self.ledger.balance_at(account, PRIMARY_INDEX);
        let residual_bad_debt = if remaining.is_negative() {
            let residual = remaining.checked_neg()?;
            self.ledger.settle_pnl(&self.cap, account, residual)?;
            let uncovered = self.insurance.absorb(residual)?;
            self.emit(EventPayload::BadDebt(BadDebtEvent {
                account,
                residual,
                uncovered_by_fund: uncovered,
                system_bad_debt: self.insurance.system_bad_debt(),
            }));
            residual
        } else {
            Wad::ZERO
        };

        let debt_repaid = debt_before.checked_sub(residual_bad_debt)?;
        Ok(SeizureResult {
            account,
            liquidator,
            seized,
            debt_before,
            debt_repaid,
            residual_bad_debt,
        })
    }

    /// Returns the debt size when the account is seizable. Seizure is
    /// allowed once the debt exceeds the configured threshold, or as soon
    /// as the discounted value of the remaining non-primary collateral no
    /// longer covers the debt.
    fn seizure_check<O: PriceOracle>(
        &self,
        account: AccountId,
        oracle: &O,
    ) -> Result<Wad, EngineError> {
        let primary = self.ledger.balance_at(account, PRIMARY_INDEX);
        if !primary.is_negative() {
            return Err(EngineError::LiquidationDebtSizeZero { account });
        }
        let debt = primary.checked_neg()?;

        if debt > self.config.liquidation.ua_debt_seizure_threshold {
            return Ok(debt);
        }

        let mut discounted_collateral = Wad::ZERO;
        for (index, descriptor) in self.ledger.descriptors().enumerate().skip(1) {
            let balance = self.ledger.balance_at(account, index);
            if !balance.is_positive() {
                continue;
            }
            let price = oracle.price(descriptor.asset)?;
            let value = balance.mul_wad(price)?.mul_wad(descriptor.weight)?;
            discounted_collateral = discounted_collateral.checked_add(value)?;
        }

        if discounted_collateral >= debt {
            return Err(EngineError::SufficientUserCollateral { account });
        }
        Ok(debt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::Role;
    use crate::bank::MockBank;
    use crate::config::RiskConfig;
    use crate::oracle::TestOracle;
    use crate::trading::{MockPosition, MockVenue};
    use crate::types::AssetId;
    use crate::wad::WAD;

    const UA: AssetId = AssetId(1);
    const WETH: AssetId = AssetId(2);
    const BTC_PERP: MarketId = MarketId(1);
    const GOV: AccountId = AccountId(90);
    const CLEARING: AccountId = AccountId(91);
    const ALICE: AccountId = AccountId(1);
    const KEEPER: AccountId = AccountId(7);

    fn setup() -> (Engine, MockBank, TestOracle, MockVenue) {
        let mut engine = Engine::new(RiskConfig::default(), UA, 6);
        engine.grant_role(GOV, Role::Governance);
        engine.grant_role(CLEARING, Role::Settlement);
        engine
            .add_whitelisted_collateral(
                GOV,
                WETH,
                18,
                Wad::from_raw(8 * WAD / 10),
                Wad::from_int(1_000_000),
            )
            .unwrap();

        let mut bank = MockBank::new();
        bank.mint(UA, ALICE, 1_000_000_000_000);
        bank.mint(WETH, ALICE, 1_000 * WAD as u128);
        bank.mint(UA, KEEPER, 1_000_000_000_000);

        let mut oracle = TestOracle::new(60_000);
        oracle.set_price(WETH, Wad::from_int(2_000));

        let mut venue = MockVenue::new();
        venue.add_market(BTC_PERP, Wad::ONE);

        (engine, bank, oracle, venue)
    }

    fn open_position(venue: &mut MockVenue, kind: PositionKind, notional: i64, pnl: i64) {
        venue.set_position(
            BTC_PERP,
            ALICE,
            kind,
            MockPosition {
                open_notional: Wad::from_int(notional),
                pnl: Wad::from_int(pnl),
                size: Wad::ONE,
                required_close: Wad::from_int(notional),
            },
        );
    }

    #[test]
    fn healthy_account_cannot_be_liquidated() {
        let (mut engine, mut bank, oracle, mut venue) = setup();
        engine
            .deposit(CLEARING, ALICE, ALICE, 10_000_000_000, UA, &mut bank)
            .unwrap();
        open_position(&mut venue, PositionKind::Trader, 100_000, 0);

        // ratio = 10000/100000 = 10% >= 2.5%
        let err = engine
            .liquidate_trader(KEEPER, BTC_PERP, ALICE, Wad::from_int(100_000), &mut venue, &oracle)
            .unwrap_err();
        assert!(matches!(err, EngineError::LiquidateValidMargin { .. }));
    }

    #[test]
    fn missing_position_is_invalid() {
        let (mut engine, _bank, oracle, mut venue) = setup();
        let err = engine
            .liquidate_trader(KEEPER, BTC_PERP, ALICE, Wad::ONE, &mut venue, &oracle)
            .unwrap_err();
        assert!(matches!(err, EngineError::LiquidateInvalidPosition { .. }));
    }

    #[test]
    fn proposal_outside_tolerance_rejected() {
        let (mut engine, mut bank, oracle, mut venue) = setup();
        engine
            .deposit(CLEARING, ALICE, ALICE, 1_000_000_000, UA, &mut bank)
            .unwrap();
        // 1,000 reserve, 100,000 notional, pnl 0: ratio 1% < 2.5%
        open_position(&mut venue, PositionKind::Trader, 100_000, 0);

        // default tolerance is 5%; propose 10% under
        let err = engine
            .liquidate_trader(KEEPER, BTC_PERP, ALICE, Wad::from_int(90_000), &mut venue, &oracle)
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::LiquidateInsufficientProposedAmount { .. }
        ));
    }

    #[test]
    fn liquidation_pays_split_reward_from_account() {
        let (mut engine, mut bank, oracle, mut venue) = setup();
        engine
            .deposit(CLEARING, ALICE, ALICE, 2_000_000_000, UA, &mut bank)
            .unwrap();
        // 2,000 reserve, 100,000 notional: ratio 2% < 2.5%
        open_position(&mut venue, PositionKind::Trader, 100_000, 0);

        let result = engine
            .liquidate_trader(KEEPER, BTC_PERP, ALICE, Wad::from_int(100_000), &mut venue, &oracle)
            .unwrap();

        // 1.5% of 100,000 = 1,500, split 50/50
        assert_eq!(result.reward, Wad::from_int(1_500));
        assert_eq!(result.liquidator_reward, Wad::from_int(750));
        assert_eq!(result.insurance_reward, Wad::from_int(750));
        assert_eq!(
            result
                .liquidator_reward
                .checked_add(result.insurance_reward)
                .unwrap(),
            result.reward
        );

        // account paid the reward, keeper and fund received their legs
        assert_eq!(engine.get_balance(ALICE, UA).unwrap(), Wad::from_int(500));
        assert_eq!(engine.get_balance(KEEPER, UA).unwrap(), Wad::from_int(750));
        assert_eq!(engine.insurance_balance(), Wad::from_int(750));

        // position is gone
        assert!(!venue.has_position(BTC_PERP, ALICE, PositionKind::Trader));
    }

    #[test]
    fn trader_and_lp_liquidated_independently() {
        let (mut engine, mut bank, oracle, mut venue) = setup();
        // 1,500 against 100,000 of combined notional: 1.5% ratio, and still
        // 1.5% against the remaining 50,000 after the first close pays its
        // 750 reward
        engine
            .deposit(CLEARING, ALICE, ALICE, 1_500_000_000, UA, &mut bank)
            .unwrap();
        open_position(&mut venue, PositionKind::Trader, 50_000, 0);
        open_position(&mut venue, PositionKind::Lp, 50_000, 0);

        engine
            .liquidate_trader(KEEPER, BTC_PERP, ALICE, Wad::from_int(50_000), &mut venue, &oracle)
            .unwrap();
        assert!(venue.has_position(BTC_PERP, ALICE, PositionKind::Lp));

        engine
            .liquidate_lp(KEEPER, BTC_PERP, ALICE, Wad::from_int(50_000), &mut venue, &oracle)
            .unwrap();
        assert!(!venue.has_position(BTC_PERP, ALICE, PositionKind::Lp));
    }

    #[test]
    fn seizure_requires_debt() {
        let (engine, _bank, oracle, _venue) = setup();
        let err = engine.seizure_check(ALICE, &oracle).unwrap_err();
        assert!(matches!(err, EngineError::LiquidationDebtSizeZero { .. }));
        assert!(!engine.can_seize_collateral(ALICE, &oracle).unwrap());
    }

    #[test]
    fn small_covered_debt_is_not_seizable() {
        let (mut engine, mut bank, oracle, _venue) = setup();
        engine
            .deposit(CLEARING, ALICE, ALICE, 2 * WAD as u128, WETH, &mut bank)
            .unwrap();
        // debt 100, threshold 10,000, discounted collateral 3,200
        engine.settle_pnl(CLEARING, ALICE, Wad::from_int(-100)).unwrap();

        let err = engine.seizure_check(ALICE, &oracle).unwrap_err();
        assert!(matches!(err, EngineError::SufficientUserCollateral { .. }));
        assert!(!engine.can_seize_collateral(ALICE, &oracle).unwrap());
    }

    #[test]
    fn debt_beyond_threshold_is_seizable_despite_collateral() {
        let (mut engine, mut bank, oracle, _venue) = setup();
        engine
            .deposit(CLEARING, ALICE, ALICE, 20 * WAD as u128, WETH, &mut bank)
            .unwrap();
        // debt = threshold + 1 while collateral is worth 40,000 undiscounted
        engine
            .settle_pnl(CLEARING, ALICE, Wad::from_int(-10_001))
            .unwrap();

        assert!(engine.can_seize_collateral(ALICE, &oracle).unwrap());
    }

    #[test]
    fn seizure_clears_debt_and_pays_discounted_value() {
        let (mut engine, mut bank, oracle, _venue) = setup();
        engine
            .deposit(CLEARING, ALICE, ALICE, 20 * WAD as u128, WETH, &mut bank)
            .unwrap();
        engine
            .settle_pnl(CLEARING, ALICE, Wad::from_int(-10_001))
            .unwrap();

        let result = engine
            .seize_collateral(KEEPER, ALICE, &mut bank, &oracle)
            .unwrap();

        // 20 WETH * 2000 = 40,000; keeper pays 90% = 36,000 UA
        assert_eq!(result.seized.len(), 1);
        assert_eq!(result.seized[0].seized, Wad::from_int(20));
        assert_eq!(result.seized[0].payment, Wad::from_int(36_000));
        assert_eq!(bank.wallet(UA, KEEPER), 1_000_000_000_000 - 36_000_000_000);

        // debt fully repaid, excess proceeds stay with the account
        assert_eq!(result.residual_bad_debt, Wad::ZERO);
        assert_eq!(
            engine.get_balance(ALICE, UA).unwrap(),
            Wad::from_int(36_000 - 10_001)
        );
        assert_eq!(engine.get_balance(ALICE, WETH).unwrap(), Wad::ZERO);
        assert_eq!(engine.get_balance(KEEPER, WETH).unwrap(), Wad::from_int(20));
        assert_eq!(engine.system_bad_debt(), Wad::ZERO);
    }

    #[test]
    fn shortfall_is_socialized_as_bad_debt() {
        let (mut engine, mut bank, oracle, _venue) = setup();
        engine
            .deposit(CLEARING, ALICE, ALICE, WAD as u128, WETH, &mut bank)
            .unwrap();
        // collateral worth 2,000 (1,800 net of discount) against 12,000 debt
        engine
            .settle_pnl(CLEARING, ALICE, Wad::from_int(-12_000))
            .unwrap();

        let result = engine
            .seize_collateral(KEEPER, ALICE, &mut bank, &oracle)
            .unwrap();

        assert_eq!(result.debt_before, Wad::from_int(12_000));
        assert_eq!(result.residual_bad_debt, Wad::from_int(12_000 - 1_800));
        assert_eq!(engine.get_balance(ALICE, UA).unwrap(), Wad::ZERO);

        // no insurance funding: the whole residual is uncovered
        assert_eq!(engine.insurance_balance(), Wad::from_int(-(12_000 - 1_800)));
        assert_eq!(engine.system_bad_debt(), Wad::from_int(12_000 - 1_800));

        let bad_debt_events: Vec<_> = engine
            .events()
            .iter()
            .filter(|e| matches!(e.payload, EventPayload::BadDebt(_)))
            .collect();
        assert_eq!(bad_debt_events.len(), 1);
    }

    #[test]
    fn funded_insurance_absorbs_the_shortfall() {
        let (mut engine, mut bank, oracle, _venue) = setup();
        bank.mint(UA, GOV, 100_000_000_000);
        engine.fund_insurance(GOV, 50_000_000_000, &mut bank).unwrap();

        engine
            .deposit(CLEARING, ALICE, ALICE, WAD as u128, WETH, &mut bank)
            .unwrap();
        engine
            .settle_pnl(CLEARING, ALICE, Wad::from_int(-12_000))
            .unwrap();

        engine
            .seize_collateral(KEEPER, ALICE, &mut bank, &oracle)
            .unwrap();

        // fund had 50,000, absorbed 10,200, stays positive: no system bad debt
        assert_eq!(engine.insurance_balance(), Wad::from_int(50_000 - 10_200));
        assert_eq!(engine.system_bad_debt(), Wad::ZERO);
    }
}
