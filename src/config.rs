// 7.0 config.rs: all settings in one place. margin thresholds, liquidation
// params, oracle freshness, event buffer.

use crate::liquidation::LiquidationParams;
use crate::wad::{Wad, WAD};
use serde::{Deserialize, Serialize};

// Complete configuration for the risk core
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    // Margin ratio below which a position becomes liquidatable
    pub min_margin: Wad,
    // Margin ratio required when committing new exposure
    pub min_margin_at_creation: Wad,
    // Reward, tolerance and seizure knobs
    pub liquidation: LiquidationParams,
    // Oracle quotes older than this fail every valuation depending on them
    pub oracle_heartbeat_ms: i64,
    // Event buffer cap; oldest entries are dropped past this
    pub max_events: usize,
    // Print events as they are emitted
    pub verbose: bool,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            min_margin: Wad::from_raw(25 * WAD / 1_000), // 2.5%
            min_margin_at_creation: Wad::from_raw(WAD / 10), // 10%
            liquidation: LiquidationParams::default(),
            oracle_heartbeat_ms: 60_000,
            max_events: 10_000,
            verbose: false,
        }
    }
}

impl RiskConfig {
    // Preset with wider safety margins and a tighter close-proposal window
    pub fn conservative() -> Self {
        let mut config = Self::default();
        config.min_margin = Wad::from_raw(5 * WAD / 100); // 5%
        config.min_margin_at_creation = Wad::from_raw(15 * WAD / 100); // 15%
        config.liquidation.close_tolerance = Wad::from_raw(2 * WAD / 100); // 2%
        config.oracle_heartbeat_ms = 15_000;
        config
    }

    // Validate the configuration for internal consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.min_margin.is_positive() || self.min_margin >= Wad::ONE {
            return Err(ConfigError::InvalidMargin {
                reason: "min margin must be in (0, 1)".to_string(),
            });
        }

        if self.min_margin_at_creation < self.min_margin {
            return Err(ConfigError::InvalidMargin {
                reason: "creation margin must be at least min margin".to_string(),
            });
        }

        // the reward must be payable out of the margin that triggered the
        // liquidation, or every liquidation would mint bad debt
        if self.liquidation.reward_rate >= self.min_margin {
            return Err(ConfigError::InvalidLiquidation {
                reason: "reward rate must be below min margin".to_string(),
            });
        }

        if self.liquidation.insurance_share > Wad::ONE
            || self.liquidation.insurance_share.is_negative()
        {
            return Err(ConfigError::InvalidLiquidation {
                reason: "insurance share must be in [0, 1]".to_string(),
            });
        }

        if self.liquidation.close_tolerance >= Wad::ONE
            || self.liquidation.close_tolerance.is_negative()
        {
            return Err(ConfigError::InvalidLiquidation {
                reason: "close tolerance must be in [0, 1)".to_string(),
            });
        }

        if self.liquidation.non_ua_coll_seizure_discount >= Wad::ONE
            || self.liquidation.non_ua_coll_seizure_discount.is_negative()
        {
            return Err(ConfigError::InvalidSeizure {
                reason: "seizure discount must be in [0, 1)".to_string(),
            });
        }

        if !self.liquidation.ua_debt_seizure_threshold.is_positive() {
            return Err(ConfigError::InvalidSeizure {
                reason: "debt seizure threshold must be positive".to_string(),
            });
        }

        if self.oracle_heartbeat_ms <= 0 {
            return Err(ConfigError::InvalidOracle {
                reason: "heartbeat must be positive".to_string(),
            });
        }

        Ok(())
    }
}

// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidMargin { reason: String },
    InvalidLiquidation { reason: String },
    InvalidSeizure { reason: String },
    InvalidOracle { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        assert!(RiskConfig::default().validate().is_ok());
    }

    #[test]
    fn test_conservative_config_valid() {
        let config = RiskConfig::conservative();
        assert!(config.validate().is_ok());
        assert_eq!(config.min_margin, Wad::from_raw(5 * WAD / 100));
    }

    #[test]
    fn test_invalid_margin_ordering() {
        let mut config = RiskConfig::default();
        config.min_margin_at_creation = Wad::from_raw(WAD / 100); // below min_margin

        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidMargin { .. })
        ));
    }

    #[test]
    fn test_reward_must_be_below_min_margin() {
        let mut config = RiskConfig::default();
        config.liquidation.reward_rate = config.min_margin;

        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidLiquidation { .. })
        ));
    }

    #[test]
    fn test_invalid_discount() {
        let mut config = RiskConfig::default();
        config.liquidation.non_ua_coll_seizure_discount = Wad::ONE;

        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidSeizure { .. })
        ));
    }

    #[test]
    fn test_config_serialization() {
        let config = RiskConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: RiskConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.min_margin, config.min_margin);
        assert_eq!(
            back.liquidation.ua_debt_seizure_threshold,
            config.liquidation.ua_debt_seizure_threshold
        );
    }
}
