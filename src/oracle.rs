// Price oracle boundary.
//
// The ledger never aggregates or caches prices itself. It consumes a narrow
// trait and re-queries on every call, so a valuation is only as old as the
// call that computed it. A quote older than the configured heartbeat is a
// hard error for the whole operation: no zero fallback, no cached substitute.

use crate::types::{AssetId, Timestamp};
use crate::wad::Wad;
use std::collections::HashMap;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum OracleError {
    #[error("no price available for {0}")]
    Missing(AssetId),

    #[error("price for {asset} is stale: age {age_ms}ms exceeds heartbeat {heartbeat_ms}ms")]
    Stale {
        asset: AssetId,
        age_ms: i64,
        heartbeat_ms: i64,
    },

    #[error("non-positive price for {0}")]
    NonPositive(AssetId),
}

/// USD price per whole unit of `asset`, in wad fixed point.
pub trait PriceOracle {
    fn price(&self, asset: AssetId) -> Result<Wad, OracleError>;
}

/// In-process oracle used by tests and the simulator. Quotes are pinned by
/// hand and age against a manually advanced clock, which makes staleness
/// paths straightforward to exercise.
#[derive(Debug, Clone)]
pub struct TestOracle {
    heartbeat_ms: i64,
    now: Timestamp,
    quotes: HashMap<AssetId, (Wad, Timestamp)>,
}

impl TestOracle {
    pub fn new(heartbeat_ms: i64) -> Self {
        Self {
            heartbeat_ms,
            now: Timestamp::from_millis(0),
            quotes: HashMap::new(),
        }
    }

    pub fn set_now(&mut self, now: Timestamp) {
        self.now = now;
    }

    pub fn advance(&mut self, millis: i64) {
        self.now = Timestamp::from_millis(self.now.as_millis() + millis);
    }

    /// Pin a quote as of the oracle's current clock.
    pub fn set_price(&mut self, asset: AssetId, price: Wad) {
        self.quotes.insert(asset, (price, self.now));
    }

    pub fn drop_price(&mut self, asset: AssetId) {
        self.quotes.remove(&asset);
    }
}

impl PriceOracle for TestOracle {
    fn price(&self, asset: AssetId) -> Result<Wad, OracleError> {
        let (price, updated_at) = self
            .quotes
            .get(&asset)
            .copied()
            .ok_or(OracleError::Missing(asset))?;

        let age_ms = self.now.as_millis() - updated_at.as_millis();
        if age_ms > self.heartbeat_ms {
            return Err(OracleError::Stale {
                asset,
                age_ms,
                heartbeat_ms: self.heartbeat_ms,
            });
        }
        if !price.is_positive() {
            return Err(OracleError::NonPositive(asset));
        }
        Ok(price)
    }
}
