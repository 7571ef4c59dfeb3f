//! Margin math.
//!
//! Aggregates profit-and-loss and open-notional exposure across every market
//! and position kind an account participates in, then reduces the account to
//! two numbers: free collateral at a given ratio, and the margin ratio the
//! liquidation engine compares against `min_margin`.
//!
//! Free collateral anchors on `min(reserve, reserve + pnl)`: unrealized gains
//! never inflate what an account may withdraw or newly commit, while
//! unrealized losses always count against posted collateral.

use crate::trading::TradingVenue;
use crate::types::{AccountId, PositionKind};
use crate::wad::{MathError, Wad};

/// Cross-market exposure rollup for one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExposureSummary {
    /// Σ unrealized PnL over every market and position kind.
    pub pnl: Wad,
    /// Σ |open notional| × market risk weight.
    pub weighted_notional: Wad,
}

impl ExposureSummary {
    pub fn is_flat(&self) -> bool {
        self.weighted_notional.is_zero()
    }
}

/// Walks every market the venue quotes, both position kinds.
pub fn aggregate_exposure<V: TradingVenue>(
    venue: &V,
    account: AccountId,
) -> Result<ExposureSummary, MathError> {
    let mut summary = ExposureSummary::default();
    for market in venue.markets() {
        let weight = venue.risk_weight(market);
        for kind in PositionKind::ALL {
            if !venue.has_position(market, account, kind) {
                continue;
            }
            summary.pnl = summary.pnl.checked_add(venue.pnl(market, account, kind))?;

            let notional = venue.open_notional(market, account, kind).abs()?;
            summary.weighted_notional = summary
                .weighted_notional
                .checked_add(notional.mul_wad(weight)?)?;
        }
    }
    Ok(summary)
}

/// Margin required to hold the summarized exposure at `ratio`:
/// Σ |open notional_i| × ratio × risk weight_i.
pub fn margin_required(summary: &ExposureSummary, ratio: Wad) -> Result<Wad, MathError> {
    summary.weighted_notional.mul_wad(ratio)
}

/// Collateral headroom at `ratio`. Negative means the account is below the
/// requirement and any collateral-reducing action must fail.
pub fn free_collateral_by_ratio(
    reserve_discounted: Wad,
    summary: &ExposureSummary,
    ratio: Wad,
) -> Result<Wad, MathError> {
    let with_pnl = reserve_discounted.checked_add(summary.pnl)?;
    let anchored = reserve_discounted.min(with_pnl);
    anchored.checked_sub(margin_required(summary, ratio)?)
}

/// (reserve + pnl) / weighted notional. `Wad::MAX` when the account has no
/// open exposure: nothing to margin, maximally healthy.
pub fn margin_ratio(
    reserve_discounted: Wad,
    summary: &ExposureSummary,
) -> Result<Wad, MathError> {
    if summary.weighted_notional.is_zero() {
        return Ok(Wad::MAX);
    }
    reserve_discounted
        .checked_add(summary.pnl)?
        .div_wad(summary.weighted_notional)
}
