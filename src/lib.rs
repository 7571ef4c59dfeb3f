// margin-core: collateral ledger and risk-enforcement core for a margin protocol.
// risk-first architecture: exact fixed-point accounting and liquidation take priority.
// all computation is deterministic with no external I/O.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: AccountId, AssetId, MarketId, PositionKind
//   2.x  wad.rs: signed 18-decimal fixed point, checked and truncating
//   3.x  collateral.rs: descriptor arena, balances, allowances, reserve value
//   4.x  margin.rs: exposure aggregation, margin ratio, free collateral
//   5.x  liquidation.rs: reward split, seizure math, insurance fund
//   6.x  oracle.rs: price oracle boundary (heartbeat freshness)
//   6.1  trading.rs: trading venue boundary (exposure reads, forced close)
//   6.2  bank.rs: token transfer boundary (mocked)
//   6.3  access.rs: roles + settlement capability
//   7.x  config.rs: margins, liquidation params, presets
//   8.x  engine/: entry points: deposits, withdrawals, liquidation, seizure
//   11.x events.rs: state transition events for audit

// core ledger modules
pub mod collateral;
pub mod events;
pub mod liquidation;
pub mod margin;
pub mod types;
pub mod wad;

// integration modules
pub mod access;
pub mod bank;
pub mod config;
pub mod engine;
pub mod oracle;
pub mod trading;

// re exports for convenience
pub use collateral::*;
pub use engine::*;
pub use events::*;
pub use liquidation::*;
pub use margin::*;
pub use types::*;
pub use wad::*;
pub use access::{AccessControl, Role, RoleTable, SettlementCap};
pub use bank::{MockBank, TokenBridge, TokenError};
pub use config::{ConfigError, RiskConfig};
pub use oracle::{OracleError, PriceOracle, TestOracle};
pub use trading::{ClosedPosition, MockPosition, MockVenue, TradingVenue, VenueError};
