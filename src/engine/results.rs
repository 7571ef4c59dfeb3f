// 8.0.2: result types and errors for engine operations.

use crate::access::Role;
use crate::bank::TokenError;
use crate::collateral::LedgerError;
use crate::oracle::OracleError;
use crate::trading::VenueError;
use crate::types::{AccountId, AssetId, MarketId, PositionKind};
use crate::wad::{MathError, Wad};

#[derive(Debug, Clone)]
pub struct LiquidationResult {
    pub market: MarketId,
    pub account: AccountId,
    pub kind: PositionKind,
    pub liquidator: AccountId,
    pub closed_notional: Wad,
    pub closed_size: Wad,
    pub realized_pnl: Wad,
    pub reward: Wad,
    pub liquidator_reward: Wad,
    pub insurance_reward: Wad,
}

#[derive(Debug, Clone)]
pub struct SeizedCollateral {
    pub asset: AssetId,
    pub seized: Wad,
    pub payment: Wad,
}

#[derive(Debug, Clone)]
pub struct SeizureResult {
    pub account: AccountId,
    pub liquidator: AccountId,
    pub seized: Vec<SeizedCollateral>,
    pub debt_before: Wad,
    pub debt_repaid: Wad,
    pub residual_bad_debt: Wad,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    #[error("{caller} lacks the {role:?} role")]
    MissingRole { caller: AccountId, role: Role },

    #[error("withdrawal would leave {account} under min margin: free collateral {free}")]
    UnderMinMargin { account: AccountId, free: Wad },

    #[error("no {kind} position for {account} in {market}")]
    LiquidateInvalidPosition {
        market: MarketId,
        account: AccountId,
        kind: PositionKind,
    },

    #[error("margin ratio {margin_ratio} is not below min margin; account is healthy")]
    LiquidateValidMargin { margin_ratio: Wad },

    #[error("proposed close {proposed} deviates from required {required} beyond tolerance")]
    LiquidateInsufficientProposedAmount { proposed: Wad, required: Wad },

    #[error("{account} has no settlement-asset debt to seize against")]
    LiquidationDebtSizeZero { account: AccountId },

    #[error("{account}'s collateral still covers its debt; seizure not allowed")]
    SufficientUserCollateral { account: AccountId },

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("venue error: {0}")]
    Venue(#[from] VenueError),

    #[error("oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("math error: {0}")]
    Math(#[from] MathError),

    #[error("token error: {0}")]
    Token(#[from] TokenError),
}
