// Trading venue boundary.
//
// Position sizing and execution live in the external AMM/trading component.
// The risk core only needs to read exposure (open notional, PnL) and to
// force-close a position during liquidation. The venue reports the required
// close amount from *current* market state; the liquidation engine compares
// that against the liquidator's proposal before allowing the close.

use crate::types::{AccountId, MarketId, PositionKind};
use crate::wad::Wad;
use std::collections::HashMap;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum VenueError {
    #[error("no {kind} position for {account} in {market}")]
    NoPosition {
        market: MarketId,
        account: AccountId,
        kind: PositionKind,
    },

    #[error("close rejected by venue in {market}: {reason}")]
    CloseRejected { market: MarketId, reason: String },
}

/// Outcome of a forced close, as reported by the venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClosedPosition {
    /// Signed settlement-asset PnL realized by the close.
    pub realized_pnl: Wad,
    /// Absolute open notional extinguished by the close.
    pub closed_notional: Wad,
    /// Base size removed (sign follows the position's direction).
    pub closed_size: Wad,
}

pub trait TradingVenue {
    /// Markets this venue quotes, in a stable order.
    fn markets(&self) -> Vec<MarketId>;

    /// Per-market risk weight applied to open notional when computing
    /// margin requirements.
    fn risk_weight(&self, market: MarketId) -> Wad;

    fn has_position(&self, market: MarketId, account: AccountId, kind: PositionKind) -> bool;

    /// Signed open notional of the position (zero when flat).
    fn open_notional(&self, market: MarketId, account: AccountId, kind: PositionKind) -> Wad;

    /// Unrealized PnL of the position at current venue prices.
    fn pnl(&self, market: MarketId, account: AccountId, kind: PositionKind) -> Wad;

    /// The close amount a full liquidation requires under current market
    /// state. Recomputed per call; liquidator proposals are checked against
    /// this within a configured tolerance.
    fn required_close_amount(
        &self,
        market: MarketId,
        account: AccountId,
        kind: PositionKind,
    ) -> Wad;

    /// Force-close at market. The venue owns execution; the risk core owns
    /// what happens to the proceeds.
    fn close_position(
        &mut self,
        market: MarketId,
        account: AccountId,
        kind: PositionKind,
        proposed_amount: Wad,
    ) -> Result<ClosedPosition, VenueError>;
}

/// Scripted venue for tests and the simulator: exposures are pinned by hand
/// and a forced close simply removes the entry and reports its numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockPosition {
    pub open_notional: Wad,
    pub pnl: Wad,
    pub size: Wad,
    pub required_close: Wad,
}

#[derive(Debug, Clone, Default)]
pub struct MockVenue {
    weights: HashMap<MarketId, Wad>,
    positions: HashMap<(MarketId, AccountId, PositionKind), MockPosition>,
}

impl MockVenue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_market(&mut self, market: MarketId, risk_weight: Wad) {
        self.weights.insert(market, risk_weight);
    }

    pub fn set_position(
        &mut self,
        market: MarketId,
        account: AccountId,
        kind: PositionKind,
        position: MockPosition,
    ) {
        self.positions.insert((market, account, kind), position);
    }

    pub fn clear_position(&mut self, market: MarketId, account: AccountId, kind: PositionKind) {
        self.positions.remove(&(market, account, kind));
    }

    fn position(
        &self,
        market: MarketId,
        account: AccountId,
        kind: PositionKind,
    ) -> Option<&MockPosition> {
        self.positions.get(&(market, account, kind))
    }
}

impl TradingVenue for MockVenue {
    fn markets(&self) -> Vec<MarketId> {
        let mut markets: Vec<MarketId> = self.weights.keys().copied().collect();
        markets.sort_by_key(|m| m.0);
        markets
    }

    fn risk_weight(&self, market: MarketId) -> Wad {
        self.weights.get(&market).copied().unwrap_or(Wad::ONE)
    }

    fn has_position(&self, market: MarketId, account: AccountId, kind: PositionKind) -> bool {
        self.position(market, account, kind).is_some()
    }

    fn open_notional(&self, market: MarketId, account: AccountId, kind: PositionKind) -> Wad {
        self.position(market, account, kind)
            .map(|p| p.open_notional)
            .unwrap_or(Wad::ZERO)
    }

    fn pnl(&self, market: MarketId, account: AccountId, kind: PositionKind) -> Wad {
        self.position(market, account, kind)
            .map(|p| p.pnl)
            .unwrap_or(Wad::ZERO)
    }

    fn required_close_amount(
        &self,
        market: MarketId,
        account: AccountId,
        kind: PositionKind,
    ) -> Wad {
        self.position(market, account, kind)
            .map(|p| p.required_close)
            .unwrap_or(Wad::ZERO)
    }

    fn close_position(
        &mut self,
        market: MarketId,
        account: AccountId,
        kind: PositionKind,
        _proposed_amount: Wad,
    ) -> Result<ClosedPosition, VenueError> {
        let position = self
            .positions
            .remove(&(market, account, kind))
            .ok_or(VenueError::NoPosition {
                market,
                account,
                kind,
            })?;

        Ok(ClosedPosition {
            realized_pnl: position.pnl,
            closed_notional: position.open_notional,
            closed_size: position.size,
        })
    }
}
