//! # Money Module
//!
//! Provides the `Money` type for handling prices safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │    850.00 × (1 - 15/100) in f64 = 722.4999999999999  ❌                 │
//! │                                                                         │
//! │  OUR SOLUTION: Integer cents + basis points                            │
//! │    85000 - (85000 × 1500 + 5000) / 10000 = 72250 cents = 722.50  ✅    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tariff_core::money::Money;
//!
//! let base = Money::from_major_minor(100, 0);   // 100.00
//! let discounted = base.apply_percentage_discount(1000); // 10% off
//! assert_eq!(discounted.cents(), 9_000);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

/// Basis points in 100%.
pub const BPS_SCALE: i64 = 10_000;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// Signed so that intermediate results (e.g. a fixed discount larger than
/// the base price) can be represented before [`Money::floor_zero`] clamps
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ```rust
    /// use tariff_core::money::Money;
    ///
    /// let price = Money::from_cents(72_250); // 722.50
    /// assert_eq!(price.cents(), 72_250);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units.
    ///
    /// For negative amounts only the major unit carries the sign:
    /// `from_major_minor(-5, 50)` is -5.50.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Clamps negative values to zero.
    ///
    /// Every derived final price passes through here: an aggressive markdown
    /// floors at 0, it is never rejected.
    ///
    /// ```rust
    /// use tariff_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(-500).floor_zero(), Money::zero());
    /// assert_eq!(Money::from_cents(500).floor_zero().cents(), 500);
    /// ```
    #[inline]
    pub const fn floor_zero(self) -> Self {
        if self.0 < 0 {
            Money(0)
        } else {
            self
        }
    }

    /// Adds, pinning at `i64::MIN`/`i64::MAX` cents instead of overflowing.
    #[inline]
    pub const fn saturating_add(self, other: Money) -> Money {
        Money(self.0.saturating_add(other.0))
    }

    /// Subtracts, pinning at `i64::MIN`/`i64::MAX` cents instead of overflowing.
    #[inline]
    pub const fn saturating_sub(self, other: Money) -> Money {
        Money(self.0.saturating_sub(other.0))
    }

    /// Returns `bps` basis points of this amount, rounded half-up on the cent.
    ///
    /// Computed in i128; a result beyond the i64 range saturates.
    pub fn percentage(&self, bps: i64) -> Money {
        let product = self.0 as i128 * bps as i128;
        let half = (BPS_SCALE / 2) as i128;
        let rounded = if product >= 0 {
            (product + half) / BPS_SCALE as i128
        } else {
            (product - half) / BPS_SCALE as i128
        };
        Money(saturate(rounded))
    }

    /// Subtracts a percentage (in basis points) from this amount.
    ///
    /// Not clamped at zero: callers decide whether a negative result is
    /// allowed.
    pub fn apply_percentage_discount(&self, bps: i64) -> Money {
        self.saturating_sub(self.percentage(bps))
    }

    /// Adds a percentage (in basis points) to this amount.
    ///
    /// ```rust
    /// use tariff_core::money::Money;
    ///
    /// let base = Money::from_major_minor(200, 0);
    /// assert_eq!(base.apply_percentage_markup(2000).cents(), 24_000); // 240.00
    /// ```
    pub fn apply_percentage_markup(&self, bps: i64) -> Money {
        self.saturating_add(self.percentage(bps))
    }

    /// Expresses `part` as basis points of this amount, rounded half-up.
    ///
    /// Returns `None` when this amount is not positive.
    ///
    /// ```rust
    /// use tariff_core::money::Money;
    ///
    /// let original = Money::from_cents(50_000);
    /// assert_eq!(original.bps_of(Money::from_cents(5_000)), Some(1000)); // 10%
    /// ```
    pub fn bps_of(&self, part: Money) -> Option<i64> {
        if self.0 <= 0 {
            return None;
        }
        let scaled = part.0 as i128 * BPS_SCALE as i128;
        let denom = self.0 as i128;
        let rounded = if scaled >= 0 {
            (scaled + denom / 2) / denom
        } else {
            (scaled - denom / 2) / denom
        };
        Some(saturate(rounded))
    }
}

fn saturate(value: i128) -> i64 {
    value.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Debug-oriented display; UI layers format with locale and currency.
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
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

/// Multiplication by a quantity.
impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
