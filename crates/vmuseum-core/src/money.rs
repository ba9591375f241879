//! Fixed-point currency amounts.
//!
//! Amounts are held as a [`Decimal`] normalized to two decimal places and
//! persisted as integer minor units (cents). Rounding is half-up (midpoint
//! away from zero), matching how totals are rounded at purchase time.

use std::fmt;
use std::iter::Sum;
use std::ops::Add;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::types::Quantity;

/// Number of decimal places carried by every amount.
pub const MONEY_SCALE: u32 = 2;

/// A non-negative currency amount with two decimal places.
///
/// The cent count always fits in an `i64`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl Money {
    /// Zero.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// The largest amount, `i64::MAX` cents.
    pub const MAX: Self = Self(Decimal::from_parts(
        u32::MAX,
        i32::MAX as u32,
        0,
        false,
        MONEY_SCALE,
    ));

    /// Build from a decimal, rounding half-up to two places.
    ///
    /// Fails with [`CoreError::AmountOutOfRange`] when the rounded amount has
    /// more cents than an `i64` holds.
    pub fn from_decimal(value: Decimal) -> Result<Self> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(CoreError::NegativeAmount(value.to_string()));
        }
        let rounded = round_half_up(value);
        if rounded > Self::MAX.0 {
            return Err(CoreError::AmountOutOfRange(rounded.to_string()));
        }
        Ok(Self(rounded))
    }

    /// Build from integer minor units (cents).
    pub fn from_cents(cents: i64) -> Result<Self> {
        if cents < 0 {
            return Err(CoreError::NegativeAmount(cents.to_string()));
        }
        Ok(Self(Decimal::new(cents, MONEY_SCALE)))
    }

    /// The amount in minor units (cents).
    pub fn cents(&self) -> i64 {
        // Scale is fixed at 2 and the amount is capped at `MAX`, so the
        // mantissa is the cent count and always fits.
        let mut d = self.0;
        d.rescale(MONEY_SCALE);
        i64::try_from(d.mantissa()).unwrap_or(i64::MAX)
    }

    /// The underlying decimal.
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Total for `quantity` units at `unit_price`, rounded half-up to cents.
    pub fn line_total(unit_price: Money, quantity: Quantity) -> Result<Self> {
        let total = unit_price
            .0
            .checked_mul(Decimal::from(quantity.get()))
            .ok_or_else(|| CoreError::AmountOutOfRange(format!("{} x {}", unit_price, quantity)))?;
        Self::from_decimal(total)
    }

    /// Checked addition. `None` past [`Money::MAX`].
    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0
            .checked_add(other.0)
            .filter(|sum| *sum <= Self::MAX.0)
            .map(Self)
    }
}

fn round_half_up(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(MONEY_SCALE);
    rounded
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Money {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let value = Decimal::from_str(s.trim()).map_err(|_| CoreError::InvalidAmount(s.to_string()))?;
        Self::from_decimal(value)
    }
}

impl TryFrom<Decimal> for Money {
    type Error = CoreError;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::from_decimal(value)
    }
}

impl From<Money> for Decimal {
    fn from(m: Money) -> Self {
        m.0
    }
}

impl Add for Money {
    type Output = Money;

    /// Saturates at [`Money::MAX`].
    fn add(self, rhs: Money) -> Money {
        self.checked_add(rhs).unwrap_or(Self::MAX)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::ZERO, Add::add)
    }
}
