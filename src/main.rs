//! Margin Core Simulation.
//!
//! Walks the collateral ledger and risk engine through a full lifecycle:
//! multi-asset deposits, margin-gated withdrawals, a price-shock liquidation,
//! and a debt seizure that socializes the shortfall.

use margin_core::*;

const UA: AssetId = AssetId(1); // primary settlement asset, 6 decimals
const WETH: AssetId = AssetId(2); // 18 decimals
const BTC_PERP: MarketId = MarketId(1);

const GOV: AccountId = AccountId(90);
const CLEARING: AccountId = AccountId(91);
const ALICE: AccountId = AccountId(1);
const BOB: AccountId = AccountId(2);
const KEEPER: AccountId = AccountId(7);

fn main() {
    println!("Margin Core Engine Simulation");
    println!("Multi-Collateral Ledger, Margin Gates, Liquidation, Seizure\n");

    scenario_1_deposits_and_reserve_value();
    scenario_2_gated_withdrawal();
    scenario_3_liquidation();
    scenario_4_seizure_and_bad_debt();

    println!("\nAll simulations completed successfully.");
}

fn setup() -> (Engine, MockBank, TestOracle, MockVenue) {
    let mut engine = Engine::new(RiskConfig::default(), UA, 6);
    engine.grant_role(GOV, Role::Governance);
    engine.grant_role(CLEARING, Role::Settlement);
    engine
        .add_whitelisted_collateral(
            GOV,
            WETH,
            18,
            Wad::from_raw(8 * WAD / 10), // 80% risk weight
            Wad::from_int(1_000_000),
        )
        .expect("whitelist WETH");

    let mut bank = MockBank::new();
    bank.mint(UA, ALICE, 1_000_000_000_000);
    bank.mint(UA, BOB, 1_000_000_000_000);
    bank.mint(UA, KEEPER, 1_000_000_000_000);
    bank.mint(WETH, ALICE, 1_000 * WAD as u128);

    let mut oracle = TestOracle::new(engine.config().oracle_heartbeat_ms);
    oracle.set_price(WETH, Wad::from_int(2_000));

    let mut venue = MockVenue::new();
    venue.add_market(BTC_PERP, Wad::from_raw(8 * WAD / 10));

    (engine, bank, oracle, venue)
}

/// Multi-asset deposits and discounted vs. undiscounted valuation.
fn scenario_1_deposits_and_reserve_value() {
    println!("Scenario 1: Deposits and Reserve Value\n");

    let (mut engine, mut bank, oracle, _venue) = setup();

    engine
        .deposit(CLEARING, ALICE, ALICE, 10_000_000_000, UA, &mut bank)
        .expect("deposit UA");
    engine
        .deposit(CLEARING, ALICE, ALICE, 5 * WAD as u128, WETH, &mut bank)
        .expect("deposit WETH");

    println!("  Alice deposits 10,000 UA and 5 WETH (WETH at $2,000, weight 80%)");

    let undiscounted = engine.get_reserve_value(ALICE, false, &oracle).expect("reserve");
    let discounted = engine.get_reserve_value(ALICE, true, &oracle).expect("reserve");
    let tvl = engine.get_total_value_locked(&oracle).expect("tvl");

    println!("  Undiscounted reserve: ${undiscounted}");
    println!("  Discounted reserve:   ${discounted}");
    println!("  Total value locked:   ${tvl}\n");
}

/// The min-margin gate rejects a withdrawal that would strand open exposure.
fn scenario_2_gated_withdrawal() {
    println!("Scenario 2: Margin-Gated Withdrawal\n");

    let (mut engine, mut bank, oracle, mut venue) = setup();

    engine
        .deposit(CLEARING, BOB, BOB, 5_000_000_000, UA, &mut bank)
        .expect("deposit");
    venue.set_position(
        BTC_PERP,
        BOB,
        PositionKind::Trader,
        MockPosition {
            open_notional: Wad::from_int(100_000),
            pnl: Wad::ZERO,
            size: Wad::ONE,
            required_close: Wad::from_int(100_000),
        },
    );

    println!("  Bob holds 5,000 UA against 100,000 of open notional (weight 80%)");

    match engine.withdraw(BOB, 4_000_000_000, UA, &mut bank, &oracle, &venue) {
        Err(err) => println!("  Withdrawing 4,000 UA rejected: {err}"),
        Ok(_) => println!("  Unexpected: withdrawal allowed"),
    }

    engine
        .withdraw(BOB, 2_000_000_000, UA, &mut bank, &oracle, &venue)
        .expect("withdraw within headroom");
    println!("  Withdrawing 2,000 UA succeeds; free collateral stays non-negative\n");
}

/// A keeper liquidates an undercollateralized trader at market.
fn scenario_3_liquidation() {
    println!("Scenario 3: Liquidation\n");

    let (mut engine, mut bank, oracle, mut venue) = setup();

    engine
        .deposit(CLEARING, ALICE, ALICE, 1_500_000_000, UA, &mut bank)
        .expect("deposit");
    venue.set_position(
        BTC_PERP,
        ALICE,
        PositionKind::Trader,
        MockPosition {
            open_notional: Wad::from_int(100_000),
            pnl: Wad::from_int(-400),
            size: Wad::ONE,
            required_close: Wad::from_int(100_000),
        },
    );

    let ratio = engine.get_margin_ratio(ALICE, &oracle, &venue).expect("ratio");
    println!("  Alice: 1,500 UA reserve, 100,000 notional, -400 PnL");
    println!("  Margin ratio {ratio} is below min margin {}", engine.config().min_margin);

    let result = engine
        .liquidate_trader(KEEPER, BTC_PERP, ALICE, Wad::from_int(100_000), &mut venue, &oracle)
        .expect("liquidate");

    println!("  Keeper closes {} of notional", result.closed_notional);
    println!(
        "  Reward {} split: keeper {}, insurance {}",
        result.reward, result.liquidator_reward, result.insurance_reward
    );
    println!(
        "  Alice's remaining UA balance: {}\n",
        engine.get_balance(ALICE, UA).expect("balance")
    );
}

/// Seizure of non-primary collateral against oversized debt, with the
/// residual socialized into the insurance fund.
fn scenario_4_seizure_and_bad_debt() {
    println!("Scenario 4: Debt Seizure and Bad Debt\n");

    let (mut engine, mut bank, oracle, _venue) = setup();

    engine
        .deposit(CLEARING, ALICE, ALICE, 2 * WAD as u128, WETH, &mut bank)
        .expect("deposit");
    engine
        .settle_pnl(CLEARING, ALICE, Wad::from_int(-12_000))
        .expect("settle loss");

    println!("  Alice owes 12,000 UA holding only 2 WETH ($4,000)");
    println!(
        "  Seizable: {}",
        engine.can_seize_collateral(ALICE, &oracle).expect("check")
    );

    let result = engine
        .seize_collateral(KEEPER, ALICE, &mut bank, &oracle)
        .expect("seize");

    for seizure in &result.seized {
        println!(
            "  Keeper takes {} of {} for a payment of {}",
            seizure.seized, seizure.asset, seizure.payment
        );
    }
    println!("  Debt repaid: {}", result.debt_repaid);
    println!("  Residual bad debt: {}", result.residual_bad_debt);
    println!("  Insurance balance: {}", engine.insurance_balance());
    println!("  System bad debt:   {}", engine.system_bad_debt());
}
