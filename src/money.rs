//! Fixed-point currency amounts.
//!
//! Balances and per-period amounts are held as whole cents so that every
//! credit is exactly rounded to two decimal places. Decimal input (config
//! files, host commands, persisted strings) is rounded to the nearest cent
//! once, at the boundary.

use crate::error::{PiggyError, Result};
use serde::{Deserialize, Serialize};

/// Largest accepted decimal amount. Keeps `value * 100` well inside the
/// range where `f64` represents whole cents exactly.
const MAX_DECIMAL: f64 = 1.0e13;

/// A non-negative currency amount in hundredths.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Cents(u64);

impl Cents {
    /// Zero.
    pub const ZERO: Self = Self(0);

    /// Wrap a raw cent count.
    #[must_use]
    pub const fn new(cents: u64) -> Self {
        Self(cents)
    }

    /// Raw cent count.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Convert a decimal amount (e.g. `0.5`) to cents, rounding half away
    /// from zero.
    ///
    /// # Errors
    ///
    /// Returns [`PiggyError::Config`] for negative, non-finite, or absurdly
    /// large values.
    pub fn from_decimal(value: f64) -> Result<Self> {
        if !value.is_finite() {
            return Err(PiggyError::Config(format!(
                "amount must be a finite number, got {value}"
            )));
        }
        if value < 0.0 {
            return Err(PiggyError::Config(format!(
                "amount must not be negative, got {value}"
            )));
        }
        if value > MAX_DECIMAL {
            return Err(PiggyError::Config(format!(
                "amount {value} exceeds the supported maximum"
            )));
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let cents = (value * 100.0).round() as u64;
        Ok(Self(cents))
    }

    /// Parse a decimal string such as `"1.50"` or `"2"`.
    ///
    /// # Errors
    ///
    /// Returns [`PiggyError::Config`] when the string is not a valid
    /// non-negative decimal.
    pub fn parse(raw: &str) -> Result<Self> {
        let value: f64 = raw
            .trim()
            .parse()
            .map_err(|e| PiggyError::Config(format!("invalid amount {raw:?}: {e}")))?;
        Self::from_decimal(value)
    }

    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    /// `self` credited `periods` times.
    #[must_use]
    pub const fn saturating_mul(self, periods: u64) -> Self {
        Self(self.0.saturating_mul(periods))
    }
}

impl std::fmt::Display for Cents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}
