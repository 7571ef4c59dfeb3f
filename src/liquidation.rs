//! Liquidation parameters, reward math, seizure math, and the insurance fund.
//!
//! A liquidation pays `|closed notional| × reward_rate`, split between the
//! liquidator and the insurance fund, out of the liquidated account's own
//! reserve. Seizure sells an indebted account's non-primary collateral to the
//! caller at a discount; whatever the proceeds cannot repay is absorbed by
//! the insurance fund as socialized bad debt.

use crate::wad::{MathError, Wad, WAD};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidationParams {
    /// Fraction of closed notional paid as the liquidation reward.
    pub reward_rate: Wad,
    /// Fraction of the reward routed to the insurance fund; the rest goes
    /// to the liquidator.
    pub insurance_share: Wad,
    /// Tolerated relative deviation between the liquidator's proposed close
    /// amount and the venue-computed required amount. Protocol-specific;
    /// re-derive from the venue's slippage model rather than trusting the
    /// default.
    pub close_tolerance: Wad,
    /// Primary-asset debt (positive number) beyond which non-primary
    /// collateral becomes seizable.
    pub ua_debt_seizure_threshold: Wad,
    /// Haircut on seized non-primary collateral, compensating the caller
    /// for execution risk.
    pub non_ua_coll_seizure_discount: Wad,
}

impl Default for LiquidationParams {
    fn default() -> Self {
        Self {
            reward_rate: Wad::from_raw(15 * WAD / 1_000),          // 1.5%
            insurance_share: Wad::from_raw(WAD / 2),               // 50/50 split
            close_tolerance: Wad::from_raw(5 * WAD / 100),         // 5%
            ua_debt_seizure_threshold: Wad::from_int(10_000),
            non_ua_coll_seizure_discount: Wad::from_raw(WAD / 10), // 10%
        }
    }
}

/// Reward for closing `closed_notional_abs`, split with no unit lost:
/// the insurance leg is defined as `total - liquidator`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewardSplit {
    pub total: Wad,
    pub liquidator: Wad,
    pub insurance: Wad,
}

pub fn split_reward(
    closed_notional_abs: Wad,
    params: &LiquidationParams,
) -> Result<RewardSplit, MathError> {
    let total = closed_notional_abs.mul_wad(params.reward_rate)?;
    let liquidator = total.mul_wad(Wad::ONE.checked_sub(params.insurance_share)?)?;
    let insurance = total.checked_sub(liquidator)?;
    Ok(RewardSplit {
        total,
        liquidator,
        insurance,
    })
}

/// Whether a proposed close amount is close enough to the venue-computed
/// required amount: `|proposed - required| <= |required| × tolerance`.
/// A zero required amount admits only a zero proposal.
pub fn within_tolerance(
    proposed: Wad,
    required: Wad,
    tolerance: Wad,
) -> Result<bool, MathError> {
    if required.is_zero() {
        return Ok(proposed.is_zero());
    }
    let deviation = proposed.checked_sub(required)?.abs()?;
    Ok(deviation <= required.abs()?.mul_wad(tolerance)?)
}

/// What the seizing caller pays the ledger for collateral worth
/// `undiscounted_value`: the value net of the seizure discount.
pub fn seizure_payment(undiscounted_value: Wad, discount: Wad) -> Result<Wad, MathError> {
    undiscounted_value.mul_wad(Wad::ONE.checked_sub(discount)?)
}

/// Insurance fund: a signed settlement-asset balance plus a monotone
/// system-bad-debt counter. Owned by the engine and passed by reference,
/// never ambient state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InsuranceFund {
    balance: Wad,
    system_bad_debt: Wad,
    total_funded: Wad,
    total_rewards: Wad,
}

impl InsuranceFund {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance(&self) -> Wad {
        self.balance
    }

    pub fn system_bad_debt(&self) -> Wad {
        self.system_bad_debt
    }

    pub fn total_funded(&self) -> Wad {
        self.total_funded
    }

    pub fn total_rewards(&self) -> Wad {
        self.total_rewards
    }

    /// Direct funding.
    pub fn fund(&mut self, amount: Wad) -> Result<Wad, MathError> {
        self.balance = self.balance.checked_add(amount)?;
        self.total_funded = self.total_funded.checked_add(amount)?;
        Ok(self.balance)
    }

    /// Insurance share of a liquidation reward.
    pub fn credit_reward(&mut self, amount: Wad) -> Result<Wad, MathError> {
        self.balance = self.balance.checked_add(amount)?;
        self.total_rewards = self.total_rewards.checked_add(amount)?;
        Ok(self.balance)
    }

    /// Absorbs a seizure shortfall. The full residual is debited; the
    /// system-bad-debt counter grows by the portion the fund could not
    /// back (the amount that pushed the balance below zero). Returns that
    /// uncovered portion.
    pub fn absorb(&mut self, residual: Wad) -> Result<Wad, MathError> {
        self.balance = self.balance.checked_sub(residual)?;
        let uncovered = if self.balance.is_negative() {
            residual.min(self.balance.checked_neg()?)
        } else {
            Wad::ZERO
        };
        if !uncovered.is_zero() {
            self.system_bad_debt = self.system_bad_debt.checked_add(uncovered)?;
        }
        Ok(uncovered)
    }
}
