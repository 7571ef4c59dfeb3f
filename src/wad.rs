//! Signed 18-decimal fixed-point arithmetic ("wad" units).
//!
//! Every internal balance, price, weight and rate in the ledger is a `Wad`.
//! `mul_wad(a, b) = a * b / 1e18` and `div_wad(a, b) = a * 1e18 / b`, computed
//! over 256-bit intermediates so `balance * price` cannot wrap. Every
//! operation is checked: overflow and division by zero surface as `MathError`,
//! never as silent wraparound. All rounding truncates toward zero.

use primitive_types::U256;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// One whole unit in 18-decimal fixed point.
pub const WAD: i128 = 1_000_000_000_000_000_000;

/// Magnitude of `i128::MIN`, used when re-signing unsigned intermediates.
const I128_MIN_ABS: u128 = 1u128 << 127;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum MathError {
    #[error("fixed-point overflow")]
    Overflow,

    #[error("division by zero")]
    DivisionByZero,

    #[error("negative amount where a non-negative one is required")]
    NegativeAmount,
}

// 2.0: the one numeric type. raw value is the amount scaled by 1e18.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Wad(i128);

impl Wad {
    pub const ZERO: Wad = Wad(0);
    pub const ONE: Wad = Wad(WAD);
    /// Sentinel for "no exposure": the healthiest possible margin ratio.
    pub const MAX: Wad = Wad(i128::MAX);

    pub const fn from_raw(raw: i128) -> Self {
        Self(raw)
    }

    pub fn from_int(units: i64) -> Self {
        // i64::MAX * 1e18 < i128::MAX, cannot overflow
        Self(units as i128 * WAD)
    }

    pub const fn raw(&self) -> i128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn abs(&self) -> Result<Wad, MathError> {
        self.0.checked_abs().map(Wad).ok_or(MathError::Overflow)
    }

    pub fn min(self, other: Wad) -> Wad {
        if self.0 <= other.0 {
            self
        } else {
            other
        }
    }

    pub fn max(self, other: Wad) -> Wad {
        if self.0 >= other.0 {
            self
        } else {
            other
        }
    }

    pub fn checked_add(self, rhs: Wad) -> Result<Wad, MathError> {
        self.0.checked_add(rhs.0).map(Wad).ok_or(MathError::Overflow)
    }

    pub fn checked_sub(self, rhs: Wad) -> Result<Wad, MathError> {
        self.0.checked_sub(rhs.0).map(Wad).ok_or(MathError::Overflow)
    }

    pub fn checked_neg(self) -> Result<Wad, MathError> {
        self.0.checked_neg().map(Wad).ok_or(MathError::Overflow)
    }

    /// `self * rhs / 1e18`, truncating toward zero.
    pub fn mul_wad(self, rhs: Wad) -> Result<Wad, MathError> {
        mul_div_raw(self.0, rhs.0, WAD)
    }

    /// `self * 1e18 / rhs`, truncating toward zero.
    pub fn div_wad(self, rhs: Wad) -> Result<Wad, MathError> {
        mul_div_raw(self.0, WAD, rhs.0)
    }

    /// `self * mul / div` with a 256-bit intermediate, truncating toward zero.
    pub fn mul_div(self, mul: Wad, div: Wad) -> Result<Wad, MathError> {
        mul_div_raw(self.0, mul.0, div.0)
    }

    /// Convert an amount in an asset's native decimals to internal units.
    ///
    /// Scales by `10^(18 - decimals)` for `decimals <= 18`; for wider assets
    /// the excess precision is truncated away (`amount / 10^(decimals - 18)`).
    pub fn from_native(amount: u128, decimals: u32) -> Result<Wad, MathError> {
        let scaled = if decimals <= 18 {
            let factor = 10u128
                .checked_pow(18 - decimals)
                .ok_or(MathError::Overflow)?;
            amount.checked_mul(factor).ok_or(MathError::Overflow)?
        } else {
            let divisor = 10u128
                .checked_pow(decimals - 18)
                .ok_or(MathError::Overflow)?;
            amount / divisor
        };
        if scaled > i128::MAX as u128 {
            return Err(MathError::Overflow);
        }
        Ok(Wad(scaled as i128))
    }

    /// Convert a non-negative internal amount back to native decimals,
    /// truncating any precision the asset cannot represent.
    pub fn to_native(self, decimals: u32) -> Result<u128, MathError> {
        if self.is_negative() {
            return Err(MathError::NegativeAmount);
        }
        let raw = self.0 as u128;
        if decimals <= 18 {
            let factor = 10u128
                .checked_pow(18 - decimals)
                .ok_or(MathError::Overflow)?;
            Ok(raw / factor)
        } else {
            let factor = 10u128
                .checked_pow(decimals - 18)
                .ok_or(MathError::Overflow)?;
            raw.checked_mul(factor).ok_or(MathError::Overflow)
        }
    }
}

fn mul_div_raw(a: i128, b: i128, div: i128) -> Result<Wad, MathError> {
    if div == 0 {
        return Err(MathError::DivisionByZero);
    }
    let negative = (a < 0) ^ (b < 0) ^ (div < 0);
    // magnitudes fit in u128, so the product fits in U256 with room to spare
    let wide = U256::from(a.unsigned_abs()) * U256::from(b.unsigned_abs());
    let quotient = wide / U256::from(div.unsigned_abs());
    if quotient > U256::from(u128::MAX) {
        return Err(MathError::Overflow);
    }
    let magnitude = quotient.low_u128();
    if negative {
        match magnitude.cmp(&I128_MIN_ABS) {
            std::cmp::Ordering::Greater => Err(MathError::Overflow),
            std::cmp::Ordering::Equal => Ok(Wad(i128::MIN)),
            std::cmp::Ordering::Less => Ok(Wad(-(magnitude as i128))),
        }
    } else if magnitude > i128::MAX as u128 {
        Err(MathError::Overflow)
    } else {
        Ok(Wad(magnitude as i128))
    }
}

impl fmt::Display for Wad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let magnitude = self.0.unsigned_abs();
        let whole = magnitude / WAD as u128;
        let frac = magnitude % WAD as u128;
        if frac == 0 {
            write!(f, "{sign}{whole}")
        } else {
            let frac = format!("{frac:018}");
            write!(f, "{sign}{whole}.{}", frac.trim_end_matches('0'))
        }
    }
}

// raw wads exceed JSON's u64 range, so serialize as decimal strings.
impl Serialize for Wad {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Wad {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse::<i128>()
            .map(Wad)
            .map_err(|_| D::Error::custom("expected a raw wad integer string"))
    }
}
