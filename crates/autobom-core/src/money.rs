//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In JavaScript/floating point:                                          │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    Pricing strategies work in exact decimals (rust_decimal) and the    │
//! │    final price is rounded ONCE into whole cents.                       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use autobom_core::money::{Money, UnitPrice};
//! use rust_decimal::Decimal;
//!
//! // $50.00 for 25 kg → 0.2 cents per gram
//! let per_gram = UnitPrice::from_decimal_cents(Decimal::new(2, 1));
//! let total = per_gram.times_quantity(Decimal::from(500)).unwrap();
//! assert_eq!(total, Money::from_cents(100));
//! ```

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

/// Decimal places of a cent kept on unit prices.
pub const UNIT_PRICE_SCALE: u32 = 6;

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in the smallest currency unit (cents for USD).
///
/// ## Where Money is Used
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  BaseProduct.cost_cents ──► PricingStrategy ──► SellingUnit price      │
/// │                                                      │                  │
/// │                                                      ▼                  │
/// │                         SaleReceipt.line_total ──► tax engine (sibling) │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    ///
    /// ## Example
    /// ```rust
    /// use autobom_core::money::Money;
    ///
    /// let price = Money::from_cents(1099); // Represents $10.99
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Rounds a decimal amount of cents to whole cents.
    ///
    /// Midpoints round away from zero (1299.5 → 1300). Returns `None`
    /// when the value does not fit in an `i64`.
    ///
    /// ## Example
    /// ```rust
    /// use autobom_core::money::Money;
    /// use rust_decimal::Decimal;
    ///
    /// let price = Money::round_from_cents(Decimal::new(12995, 1)).unwrap();
    /// assert_eq!(price.cents(), 1300);
    /// ```
    pub fn round_from_cents(cents: Decimal) -> Option<Self> {
        cents
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .map(Money)
    }

    /// Returns the value in cents (smallest currency unit).
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the value in cents as an exact decimal, for strategy math.
    #[inline]
    pub fn as_decimal_cents(&self) -> Decimal {
        Decimal::from(self.0)
    }

    /// Returns the major unit (dollars) portion.
    #[inline]
    pub const fn dollars(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit (cents) portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }
}

/// Display implementation shows money in a human-readable format.
///
/// ## Note
/// This is for logs and debugging. The front end formats for display.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(
            f,
            "{}${}.{:02}",
            sign,
            self.dollars().abs(),
            self.cents_part()
        )
    }
}

impl Default for Money {
    fn default() -> Self {
        Money(0)
    }
}

// =============================================================================
// Unit Price
// =============================================================================

/// Price of ONE selling unit, in cents, below whole-cent precision.
///
/// ## Why Not Money?
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  $50.00 sack of 25 kg, sold by the gram                                 │
/// │                                                                         │
/// │  per gram = 5000¢ ÷ 25000 = 0.2¢                                        │
/// │    as Money:     0.2¢ → 0¢   → 500 g rings up at $0.00  ❌              │
/// │    as UnitPrice: 0.2¢ × 500  → 100¢ = $1.00             ✅              │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
///
/// Only the line total is rounded to whole cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct UnitPrice(#[ts(as = "String")] Decimal);

impl UnitPrice {
    /// A whole-cent unit price.
    #[inline]
    pub fn from_cents(cents: i64) -> Self {
        UnitPrice(Decimal::from(cents))
    }

    /// Keeps [`UNIT_PRICE_SCALE`] decimal places of a cent.
    pub fn from_decimal_cents(cents: Decimal) -> Self {
        UnitPrice(cents.round_dp_with_strategy(UNIT_PRICE_SCALE, RoundingStrategy::MidpointAwayFromZero))
    }

    #[inline]
    pub fn as_decimal_cents(&self) -> Decimal {
        self.0
    }

    /// Nearest whole cent, for storing a shelf price.
    pub fn rounded(&self) -> Option<Money> {
        Money::round_from_cents(self.0)
    }

    /// Line total for a (possibly fractional) quantity, rounded once.
    ///
    /// ## Example
    /// ```rust
    /// use autobom_core::money::UnitPrice;
    /// use rust_decimal::Decimal;
    ///
    /// let per_kg = UnitPrice::from_cents(299); // $2.99 per kg
    /// let line_total = per_kg.times_quantity(Decimal::new(15, 1)).unwrap(); // 1.5 kg
    /// assert_eq!(line_total.cents(), 449); // 448.5 → 449
    /// ```
    pub fn times_quantity(&self, quantity: Decimal) -> Option<Money> {
        self.0.checked_mul(quantity).and_then(Money::round_from_cents)
    }
}

impl From<Money> for UnitPrice {
    fn from(money: Money) -> Self {
        UnitPrice::from_cents(money.cents())
    }
}

/// Whole-cent prices print like [`Money`]; sub-cent prices keep their digits.
impl fmt::Display for UnitPrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dollars = (self.0 / Decimal::ONE_HUNDRED).normalize();
        if dollars.scale() <= 2 {
            write!(f, "${:.2}", dollars)
        } else {
            write!(f, "${}", dollars)
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
