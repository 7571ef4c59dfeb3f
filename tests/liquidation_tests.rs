//! End-to-end scenarios for the liquidation and debt-seizure state machine:
//! healthy -> liquidatable -> position closed -> indebted -> seizable ->
//! collateral seized, with any shortfall socialized into the insurance fund.

use margin_core::*;

const UA: AssetId = AssetId(1); // 6 decimals
const WETH: AssetId = AssetId(2); // 18 decimals
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
    bank.mint(UA, KEEPER, 1_000_000_000_000);
    bank.mint(WETH, ALICE, 1_000 * WAD as u128);

    let mut oracle = TestOracle::new(60_000);
    oracle.set_price(WETH, Wad::from_int(2_000));

    let mut venue = MockVenue::new();
    venue.add_market(BTC_PERP, Wad::from_raw(8 * WAD / 10));

    (engine, bank, oracle, venue)
}

fn deposit_ua(engine: &mut Engine, bank: &mut MockBank, units: u64) {
    engine
        .deposit(CLEARING, ALICE, ALICE, units as u128 * 1_000_000, UA, bank)
        .unwrap();
}

#[test]
fn primary_deposit_values_at_par() {
    let (mut engine, mut bank, oracle, _venue) = setup();
    deposit_ua(&mut engine, &mut bank, 1_000);

    // price 1.0 and weight 1.0 unconditionally: both views agree
    let undiscounted = engine.get_reserve_value(ALICE, false, &oracle).unwrap();
    let discounted = engine.get_reserve_value(ALICE, true, &oracle).unwrap();
    assert_eq!(undiscounted, Wad::from_int(1_000));
    assert_eq!(discounted, Wad::from_int(1_000));
    assert_eq!(undiscounted.raw(), 1_000 * WAD);
}

#[test]
fn margin_ratio_uses_risk_weighted_notional() {
    let (mut engine, mut bank, oracle, mut venue) = setup();
    deposit_ua(&mut engine, &mut bank, 4_000);

    venue.set_position(
        BTC_PERP,
        ALICE,
        PositionKind::Trader,
        MockPosition {
            open_notional: Wad::from_int(50_000),
            pnl: Wad::ZERO,
            size: Wad::ONE,
            required_close: Wad::from_int(50_000),
        },
    );

    // R / (N * 0.8) = 4000 / 40000 = 0.1
    let ratio = engine.get_margin_ratio(ALICE, &oracle, &venue).unwrap();
    assert_eq!(ratio, Wad::from_raw(WAD / 10));
}

#[test]
fn flat_account_is_maximally_healthy() {
    let (mut engine, mut bank, oracle, venue) = setup();
    deposit_ua(&mut engine, &mut bank, 100);

    let ratio = engine.get_margin_ratio(ALICE, &oracle, &venue).unwrap();
    assert_eq!(ratio, Wad::MAX);
}

#[test]
fn state_machine_healthy_to_liquidatable_on_price_move() {
    let (mut engine, mut bank, oracle, mut venue) = setup();
    deposit_ua(&mut engine, &mut bank, 3_000);

    venue.set_position(
        BTC_PERP,
        ALICE,
        PositionKind::Trader,
        MockPosition {
            open_notional: Wad::from_int(100_000),
            pnl: Wad::ZERO,
            size: Wad::ONE,
            required_close: Wad::from_int(100_000),
        },
    );

    // healthy: 3000 / 80000 = 3.75% >= 2.5%
    let err = engine
        .liquidate_trader(KEEPER, BTC_PERP, ALICE, Wad::from_int(100_000), &mut venue, &oracle)
        .unwrap_err();
    assert!(matches!(err, EngineError::LiquidateValidMargin { .. }));

    // adverse move: -1400 of unrealized pnl drops the ratio to 2%
    venue.set_position(
        BTC_PERP,
        ALICE,
        PositionKind::Trader,
        MockPosition {
            open_notional: Wad::from_int(100_000),
            pnl: Wad::from_int(-1_400),
            size: Wad::ONE,
            required_close: Wad::from_int(100_000),
        },
    );

    let result = engine
        .liquidate_trader(KEEPER, BTC_PERP, ALICE, Wad::from_int(100_000), &mut venue, &oracle)
        .unwrap();

    // position flat afterwards
    assert!(!venue.has_position(BTC_PERP, ALICE, PositionKind::Trader));
    assert_eq!(result.closed_notional, Wad::from_int(100_000));

    // realized loss and reward both settled against the account:
    // 3000 - 1400 - 1500 = 100
    assert_eq!(engine.get_balance(ALICE, UA).unwrap(), Wad::from_int(100));
}

#[test]
fn liquidation_reward_split_settles_every_leg() {
    let (mut engine, mut bank, oracle, mut venue) = setup();
    deposit_ua(&mut engine, &mut bank, 1_500);

    venue.set_position(
        BTC_PERP,
        ALICE,
        PositionKind::Trader,
        MockPosition {
            open_notional: Wad::from_int(100_000),
            pnl: Wad::ZERO,
            size: Wad::ONE,
            required_close: Wad::from_int(100_000),
        },
    );

    let insurance_before = engine.insurance_balance();
    let keeper_before = engine.get_balance(KEEPER, UA).unwrap();

    let result = engine
        .liquidate_trader(KEEPER, BTC_PERP, ALICE, Wad::from_int(100_000), &mut venue, &oracle)
        .unwrap();

    assert_eq!(
        result
            .liquidator_reward
            .checked_add(result.insurance_reward)
            .unwrap(),
        result.reward
    );
    assert_eq!(
        engine.get_balance(KEEPER, UA).unwrap(),
        keeper_before.checked_add(result.liquidator_reward).unwrap()
    );
    assert_eq!(
        engine.insurance_balance(),
        insurance_before.checked_add(result.insurance_reward).unwrap()
    );

    // ledger stays balanced after the settlement legs
    assert_eq!(
        engine.ledger().balance_sheet_total(UA).unwrap(),
        engine.ledger().descriptor(UA).unwrap().total_deposited
    );
}

#[test]
fn liquidation_rechecks_state_at_execution_time() {
    let (mut engine, mut bank, oracle, mut venue) = setup();
    // 700 of reserve keeps the account liquidatable both before and after
    // the position shrinks (0.9% then 2.2%, both under 2.5%)
    deposit_ua(&mut engine, &mut bank, 700);

    // liquidatable at proposal time
    venue.set_position(
        BTC_PERP,
        ALICE,
        PositionKind::Trader,
        MockPosition {
            open_notional: Wad::from_int(100_000),
            pnl: Wad::ZERO,
            size: Wad::ONE,
            required_close: Wad::from_int(100_000),
        },
    );

    // between proposal and execution the position shrank; a proposal built
    // on the old size now deviates beyond tolerance and must be rejected
    venue.set_position(
        BTC_PERP,
        ALICE,
        PositionKind::Trader,
        MockPosition {
            open_notional: Wad::from_int(40_000),
            pnl: Wad::ZERO,
            size: Wad::from_raw(4 * WAD / 10),
            required_close: Wad::from_int(40_000),
        },
    );

    let err = engine
        .liquidate_trader(KEEPER, BTC_PERP, ALICE, Wad::from_int(100_000), &mut venue, &oracle)
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::LiquidateInsufficientProposedAmount { .. }
    ));

    // a proposal matching current state goes through
    assert!(engine
        .liquidate_trader(KEEPER, BTC_PERP, ALICE, Wad::from_int(40_000), &mut venue, &oracle)
        .is_ok());
}

#[test]
fn seizure_scenario_debt_fully_covered() {
    let (mut engine, mut bank, oracle, _venue) = setup();

    // secondary collateral worth well over the debt
    engine
        .deposit(CLEARING, ALICE, ALICE, 10 * WAD as u128, WETH, &mut bank)
        .unwrap();

    // drive the primary balance one unit past the seizure threshold
    let threshold = engine.config().liquidation.ua_debt_seizure_threshold;
    let debt = threshold.checked_add(Wad::from_int(1)).unwrap();
    engine
        .settle_pnl(CLEARING, ALICE, debt.checked_neg().unwrap())
        .unwrap();

    assert!(engine.can_seize_collateral(ALICE, &oracle).unwrap());

    let result = engine
        .seize_collateral(KEEPER, ALICE, &mut bank, &oracle)
        .unwrap();

    // secondary balance zeroed, primary balance non-negative, no bad debt
    assert_eq!(engine.get_balance(ALICE, WETH).unwrap(), Wad::ZERO);
    assert_eq!(result.residual_bad_debt, Wad::ZERO);
    assert!(!engine.get_balance(ALICE, UA).unwrap().is_negative());
    assert_eq!(engine.system_bad_debt(), Wad::ZERO);

    // keeper paid 90% of the collateral's undiscounted value and owns it now
    assert_eq!(engine.get_balance(KEEPER, WETH).unwrap(), Wad::from_int(10));
    assert_eq!(result.seized[0].payment, Wad::from_int(18_000));
}

#[test]
fn seizure_scenario_residual_becomes_system_bad_debt() {
    let (mut engine, mut bank, oracle, _venue) = setup();

    engine
        .deposit(CLEARING, ALICE, ALICE, WAD as u128, WETH, &mut bank)
        .unwrap();
    engine
        .settle_pnl(CLEARING, ALICE, Wad::from_int(-11_000))
        .unwrap();

    let result = engine
        .seize_collateral(KEEPER, ALICE, &mut bank, &oracle)
        .unwrap();

    // proceeds 1,800 against 11,000 of debt
    assert_eq!(result.debt_repaid, Wad::from_int(1_800));
    assert_eq!(result.residual_bad_debt, Wad::from_int(9_200));

    // account ends exactly at zero, the fund carries the loss
    assert_eq!(engine.get_balance(ALICE, UA).unwrap(), Wad::ZERO);
    assert_eq!(engine.insurance_balance(), Wad::from_int(-9_200));
    assert_eq!(engine.system_bad_debt(), Wad::from_int(9_200));
}

#[test]
fn seizure_rejected_while_collateral_covers_small_debt() {
    let (mut engine, mut bank, oracle, _venue) = setup();

    engine
        .deposit(CLEARING, ALICE, ALICE, 10 * WAD as u128, WETH, &mut bank)
        .unwrap();
    // 500 of debt against 16,000 of discounted collateral, under threshold
    engine.settle_pnl(CLEARING, ALICE, Wad::from_int(-500)).unwrap();

    assert!(!engine.can_seize_collateral(ALICE, &oracle).unwrap());
    let err = engine
        .seize_collateral(KEEPER, ALICE, &mut bank, &oracle)
        .unwrap_err();
    assert!(matches!(err, EngineError::SufficientUserCollateral { .. }));
}

#[test]
fn seizure_rejected_without_debt() {
    let (mut engine, mut bank, oracle, _venue) = setup();
    deposit_ua(&mut engine, &mut bank, 100);

    let err = engine
        .seize_collateral(KEEPER, ALICE, &mut bank, &oracle)
        .unwrap_err();
    assert!(matches!(err, EngineError::LiquidationDebtSizeZero { .. }));
}

#[test]
fn stale_oracle_fails_the_whole_call() {
    let (mut engine, mut bank, mut oracle, mut venue) = setup();
    engine
        .deposit(CLEARING, ALICE, ALICE, WAD as u128, WETH, &mut bank)
        .unwrap();
    venue.set_position(
        BTC_PERP,
        ALICE,
        PositionKind::Trader,
        MockPosition {
            open_notional: Wad::from_int(100_000),
            pnl: Wad::ZERO,
            size: Wad::ONE,
            required_close: Wad::from_int(100_000),
        },
    );

    oracle.advance(120_000);

    // valuation-dependent calls all fail rather than substituting a price
    assert!(engine.get_reserve_value(ALICE, true, &oracle).is_err());
    assert!(engine.get_margin_ratio(ALICE, &oracle, &venue).is_err());
    assert!(engine
        .liquidate_trader(KEEPER, BTC_PERP, ALICE, Wad::from_int(100_000), &mut venue, &oracle)
        .is_err());
}

#[test]
fn debt_locks_withdrawals_until_cleared() {
    let (mut engine, mut bank, oracle, venue) = setup();

    engine
        .deposit(CLEARING, ALICE, ALICE, 5 * WAD as u128, WETH, &mut bank)
        .unwrap();
    engine.settle_pnl(CLEARING, ALICE, Wad::from_int(-1)).unwrap();

    let err = engine
        .withdraw(ALICE, WAD as u128, WETH, &mut bank, &oracle, &venue)
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Ledger(LedgerError::UaDebtOutstanding { .. })
    ));

    engine.settle_pnl(CLEARING, ALICE, Wad::from_int(1)).unwrap();
    assert!(engine
        .withdraw(ALICE, WAD as u128, WETH, &mut bank, &oracle, &venue)
        .is_ok());
}
