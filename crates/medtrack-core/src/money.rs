//! # Money Module
//!
//! Integer-cents money for prices, sale totals and expenses.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Price: 0.10 × 3 boxes in floating point = 0.30000000000000004         │
//! │  Price:   10 cents × 3 boxes in integers =  30 cents                    │
//! │                                                                         │
//! │  InventoryItem.price_cents ──► Sale.total_price_cents ──► Reports       │
//! │  Expense.amount_cents ─────────────────────────────────► Reports       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use medtrack_core::money::Money;
//!
//! let price = Money::from_cents(250); // 2.50
//! let line = price.multiply_quantity(4);
//! assert_eq!(line.cents(), 1000);
//! assert_eq!(line.to_string(), "10.00");
//! ```
//!
//! Arithmetic saturates at the i64 bounds instead of wrapping.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

/// A monetary value in the smallest currency unit.
///
/// Signed so that net figures (revenue minus expenses) can go negative.
/// The currency itself is a pharmacy setting and is not carried here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion (truncated toward zero).
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Zero.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies a unit price by a quantity.
    ///
    /// ```rust
    /// use medtrack_core::money::Money;
    ///
    /// let unit_price = Money::from_cents(299);
    /// assert_eq!(unit_price.multiply_quantity(3).cents(), 897);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0.saturating_mul(qty))
    }

    /// Like [`multiply_quantity`](Self::multiply_quantity) but `None` on overflow.
    #[inline]
    pub const fn checked_multiply_quantity(&self, qty: i64) -> Option<Self> {
        match self.0.checked_mul(qty) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Returns `self / whole` in basis points (10000 = 100%), rounded half up.
    ///
    /// A zero `whole` yields 0 rather than dividing by zero; reports use
    /// this for margins over periods with no revenue.
    ///
    /// ```rust
    /// use medtrack_core::money::Money;
    ///
    /// let net = Money::from_cents(2500);
    /// let revenue = Money::from_cents(10000);
    /// assert_eq!(net.ratio_bps(revenue), 2500); // 25%
    /// assert_eq!(net.ratio_bps(Money::zero()), 0);
    /// ```
    pub fn ratio_bps(&self, whole: Money) -> i64 {
        if whole.0 == 0 {
            return 0;
        }
        let scaled = self.0 as i128 * 10000;
        let whole = whole.0 as i128;
        let half = whole.abs() / 2;
        let rounded = if (scaled >= 0) == (whole > 0) {
            (scaled.abs() + half) / whole.abs()
        } else {
            -((scaled.abs() + half) / whole.abs())
        };
        rounded as i64
    }
}

/// Renders as `major.minor` with a leading `-` for negatives.
/// Currency symbols are the frontend's job.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0.saturating_add(other.0))
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_add(other.0);
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0.saturating_sub(other.0))
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_sub(other.0);
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        self.multiply_quantity(qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parts() {
        let money = Money::from_cents(1099);
        assert_eq!(money.major(), 10);
        assert_eq!(money.minor(), 99);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(1099).to_string(), "10.99");
        assert_eq!(Money::from_cents(500).to_string(), "5.00");
        assert_eq!(Money::from_cents(-550).to_string(), "-5.50");
        assert_eq!(Money::from_cents(-5).to_string(), "-0.05");
        assert_eq!(Money::zero().to_string(), "0.00");
    }

    #[test]
    fn test_arithmetic_and_sum() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!((a * 3).cents(), 3000);

        let total: Money = vec![a, b, b].into_iter().sum();
        assert_eq!(total.cents(), 2000);
    }

    #[test]
    fn test_arithmetic_saturates_instead_of_overflowing() {
        let huge = Money::from_cents(i64::MAX / 2);
        assert_eq!(huge.multiply_quantity(3).cents(), i64::MAX);
        assert_eq!(Money::from_cents(-(i64::MAX / 2)).multiply_quantity(3).cents(), i64::MIN);
        assert_eq!(huge.checked_multiply_quantity(3), None);
        assert_eq!(huge.checked_multiply_quantity(2), Some(Money::from_cents(i64::MAX - 1)));

        let total: Money = vec![huge, huge, huge].into_iter().sum();
        assert_eq!(total.cents(), i64::MAX);
        assert_eq!((Money::from_cents(i64::MIN) - Money::from_cents(1)).cents(), i64::MIN);

        let mut running = Money::from_cents(i64::MAX);
        running += Money::from_cents(100);
        assert_eq!(running.cents(), i64::MAX);
    }

    #[test]
    fn test_ratio_bps_rounding_and_sign() {
        // 1/3 = 3333.33 bps → 3333
        assert_eq!(Money::from_cents(100).ratio_bps(Money::from_cents(300)), 3333);
        // 2/3 = 6666.67 bps → 6667
        assert_eq!(Money::from_cents(200).ratio_bps(Money::from_cents(300)), 6667);
        // Loss-making period
        assert_eq!(Money::from_cents(-500).ratio_bps(Money::from_cents(1000)), -5000);
    }
}
