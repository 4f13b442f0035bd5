//! Fixed-point price and quantity arithmetic (spec §3).
//!
//! Prices and quantities are `i64` counts of `1 / SCALE` units rather than
//! floats, so matching and book ordering never hit float rounding. This
//! mirrors the teacher's `core::types::fixed_point` module.

use std::fmt;
use std::ops::{Add, Sub};

/// Implied decimal places: a `Price`/`Quantity` of `1_000_000_000` is `1.0`.
pub const SCALE: i64 = 1_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct FixedPoint(i64);

pub type Price = FixedPoint;
pub type Quantity = FixedPoint;

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum ConversionError {
    #[error("value {0} is not finite")]
    NotFinite(u64),
    #[error("value {0} overflows fixed-point range")]
    OutOfRange(f64),
}

impl FixedPoint {
    pub const ZERO: FixedPoint = FixedPoint(0);
    pub const MAX_SAFE_F64: f64 = (i64::MAX / SCALE) as f64;
    pub const MIN_SAFE_F64: f64 = (i64::MIN / SCALE) as f64;

    /// Builds a fixed-point value directly from raw scaled units.
    pub const fn from_raw(raw: i64) -> Self {
        FixedPoint(raw)
    }

    pub const fn raw(self) -> i64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Converts from a decimal `f64`, clamping silently. Prefer
    /// [`FixedPoint::from_f64_checked`] on any externally supplied value.
    pub fn from_f64(value: f64) -> Self {
        Self::from_f64_checked(value).unwrap_or(FixedPoint::ZERO)
    }

    pub fn from_f64_checked(value: f64) -> Result<Self, ConversionError> {
        if !value.is_finite() {
            return Err(ConversionError::NotFinite(value.to_bits()));
        }
        if value > Self::MAX_SAFE_F64 || value < Self::MIN_SAFE_F64 {
            return Err(ConversionError::OutOfRange(value));
        }
        Ok(FixedPoint((value * SCALE as f64).round() as i64))
    }

    pub fn to_f64(self) -> f64 {
        self.0 as f64 / SCALE as f64
    }

    pub fn checked_add(self, rhs: FixedPoint) -> Option<FixedPoint> {
        self.0.checked_add(rhs.0).map(FixedPoint)
    }

    pub fn checked_sub(self, rhs: FixedPoint) -> Option<FixedPoint> {
        self.0.checked_sub(rhs.0).map(FixedPoint)
    }

    pub fn min(self, other: FixedPoint) -> FixedPoint {
        FixedPoint(self.0.min(other.0))
    }
}

impl Add for FixedPoint {
    type Output = FixedPoint;
    fn add(self, rhs: FixedPoint) -> FixedPoint {
        FixedPoint(self.0 + rhs.0)
    }
}

impl Sub for FixedPoint {
    type Output = FixedPoint;
    fn sub(self, rhs: FixedPoint) -> FixedPoint {
        FixedPoint(self.0 - rhs.0)
    }
}

impl fmt::Display for FixedPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.9}", self.to_f64())
    }
}

impl From<i64> for FixedPoint {
    fn from(whole_units: i64) -> Self {
        FixedPoint(whole_units * SCALE)
    }
}
