//! # Units Module
//!
//! Conversion between measurement units within a category.
//!
//! ## Categories and Base Units
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Category   Base unit     Examples (factor relative to base)           │
//! │  ────────   ─────────     ──────────────────────────────────           │
//! │  weight     g             mg 0.001 · kg 1000 · lb 453.592 · oz 28.3495 │
//! │  volume     ml            l 1000 · cl 10 · gal 3785.41 · fl_oz 29.5735 │
//! │  count      each          pcs 1 · pack 1 · case 1 · dozen 12           │
//! │  length     cm            mm 0.1 · m 100 · in 2.54 · ft 30.48          │
//! │                                                                         │
//! │  result = quantity × factor(from) ÷ factor(to), rounded to 6 places    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The catalog is an explicit, immutable value. Registering a custom unit
//! produces a new catalog; nothing here is process-global.
//!
//! Count units convert freely between each other through their factors.
//! `pack`, `box` and `case` are all defined as 1, so "1 case" converts to
//! "1 pack". This is the established behavior and callers rely on it; size
//! a pack or case properly by registering a custom unit with its real factor.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};

/// Decimal places kept by every conversion.
pub const CONVERSION_SCALE: u32 = crate::QUANTITY_SCALE;

// =============================================================================
// Unit Category
// =============================================================================

/// Measurement category. Units only convert within their own category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum UnitCategory {
    Weight,
    Volume,
    Count,
    Length,
}

impl UnitCategory {
    /// The unit every factor in this category is relative to.
    pub const fn base_unit(&self) -> &'static str {
        match self {
            UnitCategory::Weight => "g",
            UnitCategory::Volume => "ml",
            UnitCategory::Count => "each",
            UnitCategory::Length => "cm",
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            UnitCategory::Weight => "weight",
            UnitCategory::Volume => "volume",
            UnitCategory::Count => "count",
            UnitCategory::Length => "length",
        }
    }
}

impl fmt::Display for UnitCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Unit Definition
// =============================================================================

/// A single unit: its category and its factor relative to the category base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct UnitDefinition {
    pub name: String,
    pub category: UnitCategory,
    #[ts(as = "String")]
    pub factor: Decimal,
}

/// Normalizes a unit token for lookup ("  KG " → "kg").
fn normalize(unit: &str) -> String {
    unit.trim().to_lowercase()
}

/// The built-in unit table: (name, category, factor mantissa, factor scale).
const STANDARD_UNITS: &[(&str, UnitCategory, i64, u32)] = &[
    // Weight (base: grams)
    ("mg", UnitCategory::Weight, 1, 3),
    ("g", UnitCategory::Weight, 1, 0),
    ("gram", UnitCategory::Weight, 1, 0),
    ("kg", UnitCategory::Weight, 1000, 0),
    ("kilogram", UnitCategory::Weight, 1000, 0),
    ("t", UnitCategory::Weight, 1000000, 0),
    ("lb", UnitCategory::Weight, 453592, 3),
    ("oz", UnitCategory::Weight, 283495, 4),
    // Volume (base: milliliters)
    ("ml", UnitCategory::Volume, 1, 0),
    ("cl", UnitCategory::Volume, 10, 0),
    ("l", UnitCategory::Volume, 1000, 0),
    ("liter", UnitCategory::Volume, 1000, 0),
    ("gal", UnitCategory::Volume, 378541, 2),
    ("fl_oz", UnitCategory::Volume, 295735, 4),
    // Count (base: each)
    ("each", UnitCategory::Count, 1, 0),
    ("pcs", UnitCategory::Count, 1, 0),
    ("piece", UnitCategory::Count, 1, 0),
    ("pack", UnitCategory::Count, 1, 0),
    ("box", UnitCategory::Count, 1, 0),
    ("case", UnitCategory::Count, 1, 0),
    ("pair", UnitCategory::Count, 2, 0),
    ("dozen", UnitCategory::Count, 12, 0),
    // Length (base: centimeters)
    ("mm", UnitCategory::Length, 1, 1),
    ("cm", UnitCategory::Length, 1, 0),
    ("m", UnitCategory::Length, 100, 0),
    ("km", UnitCategory::Length, 100000, 0),
    ("in", UnitCategory::Length, 254, 2),
    ("ft", UnitCategory::Length, 3048, 2),
    ("yd", UnitCategory::Length, 9144, 2),
];

// =============================================================================
// Unit Catalog
// =============================================================================

/// Immutable table of known units.
///
/// ## Example
/// ```rust
/// use autobom_core::units::{UnitCatalog, UnitCategory};
/// use rust_decimal::Decimal;
///
/// let catalog = UnitCatalog::standard()
///     .with_custom_unit("case_24", Decimal::from(24))
///     .unwrap();
/// assert_eq!(catalog.category_of("case_24"), Some(UnitCategory::Count));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct UnitCatalog {
    units: HashMap<String, UnitDefinition>,
}

impl UnitCatalog {
    /// The built-in weight/volume/count/length units.
    pub fn standard() -> Self {
        let units = STANDARD_UNITS
            .iter()
            .map(|(name, category, mantissa, scale)| {
                (
                    name.to_string(),
                    UnitDefinition {
                        name: name.to_string(),
                        category: *category,
                        factor: Decimal::new(*mantissa, *scale),
                    },
                )
            })
            .collect();

        UnitCatalog { units }
    }

    /// Looks up a unit definition.
    pub fn get(&self, unit: &str) -> Option<&UnitDefinition> {
        self.units.get(&normalize(unit))
    }

    pub fn contains(&self, unit: &str) -> bool {
        self.get(unit).is_some()
    }

    pub fn category_of(&self, unit: &str) -> Option<UnitCategory> {
        self.get(unit).map(|u| u.category)
    }

    pub fn factor(&self, unit: &str) -> Option<Decimal> {
        self.get(unit).map(|u| u.factor)
    }

    /// All units of a category, sorted by factor then name.
    pub fn units_in(&self, category: UnitCategory) -> Vec<&UnitDefinition> {
        let mut units: Vec<&UnitDefinition> = self
            .units
            .values()
            .filter(|u| u.category == category)
            .collect();
        units.sort_by(|a, b| a.factor.cmp(&b.factor).then_with(|| a.name.cmp(&b.name)));
        units
    }

    /// Returns a new catalog with a custom count unit (e.g. "case of 24").
    ///
    /// Re-registering an existing count unit replaces its factor, which is
    /// how admins correct a pack size. A name owned by another category is
    /// rejected so "kg" can never silently become a count unit.
    pub fn with_custom_unit(&self, name: &str, factor: Decimal) -> CoreResult<UnitCatalog> {
        let key = normalize(name);

        if key.is_empty() {
            return Err(ValidationError::required("unit name").into());
        }

        if factor <= Decimal::ZERO {
            return Err(ValidationError::must_be_positive("unit factor").into());
        }

        if let Some(existing) = self.units.get(&key) {
            if existing.category != UnitCategory::Count {
                return Err(ValidationError::Duplicate {
                    field: format!("{} unit", existing.category),
                    value: key,
                }
                .into());
            }
        }

        let mut units = self.units.clone();
        units.insert(
            key.clone(),
            UnitDefinition {
                name: key,
                category: UnitCategory::Count,
                factor,
            },
        );

        Ok(UnitCatalog { units })
    }
}

impl Default for UnitCatalog {
    fn default() -> Self {
        UnitCatalog::standard()
    }
}

// =============================================================================
// Unit Converter
// =============================================================================

/// Stateless converter over a shared, immutable catalog.
///
/// Cloning is cheap and every method takes `&self`, so one converter can be
/// used from any number of tasks at once.
#[derive(Debug, Clone, Default)]
pub struct UnitConverter {
    catalog: Arc<UnitCatalog>,
}

impl UnitConverter {
    pub fn new(catalog: UnitCatalog) -> Self {
        UnitConverter {
            catalog: Arc::new(catalog),
        }
    }

    pub fn catalog(&self) -> &UnitCatalog {
        &self.catalog
    }

    /// Converts `quantity` from one unit to another in the same category.
    ///
    /// ## Example
    /// ```rust
    /// use autobom_core::units::UnitConverter;
    /// use rust_decimal::Decimal;
    ///
    /// let converter = UnitConverter::default();
    /// let grams = converter.convert(Decimal::new(25, 1), "kg", "g").unwrap();
    /// assert_eq!(grams, Decimal::from(2500));
    ///
    /// assert!(converter.convert(Decimal::ONE, "kg", "ml").is_err());
    /// ```
    pub fn convert(&self, quantity: Decimal, from: &str, to: &str) -> CoreResult<Decimal> {
        // Same token: hand the input back untouched.
        if from == to {
            return Ok(quantity);
        }

        let from_unit = self
            .catalog
            .get(from)
            .ok_or_else(|| CoreError::UnknownUnit(from.to_string()))?;
        let to_unit = self
            .catalog
            .get(to)
            .ok_or_else(|| CoreError::UnknownUnit(to.to_string()))?;

        if from_unit.category != to_unit.category {
            return Err(CoreError::IncompatibleUnits {
                from: from.to_string(),
                to: to.to_string(),
                from_category: from_unit.category,
                to_category: to_unit.category,
            });
        }

        let base = quantity
            .checked_mul(from_unit.factor)
            .ok_or_else(|| overflow(from, to))?;
        let converted = base
            .checked_div(to_unit.factor)
            .ok_or_else(|| overflow(from, to))?;

        Ok(round_quantity(converted))
    }

    /// Whether two units share a category.
    pub fn are_compatible(&self, a: &str, b: &str) -> bool {
        match (self.catalog.category_of(a), self.catalog.category_of(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }

    /// Returns a converter over a catalog extended with a custom count unit.
    pub fn with_custom_unit(&self, name: &str, factor: Decimal) -> CoreResult<UnitConverter> {
        Ok(UnitConverter::new(self.catalog.with_custom_unit(name, factor)?))
    }
}

fn overflow(from: &str, to: &str) -> CoreError {
    ValidationError::InvalidFormat {
        field: "quantity".to_string(),
        reason: format!("too large to convert from {} to {}", from, to),
    }
    .into()
}

/// Rounds a quantity to the conversion scale (6 decimal places).
pub fn round_quantity(quantity: Decimal) -> Decimal {
    quantity
        .round_dp_with_strategy(CONVERSION_SCALE, RoundingStrategy::MidpointAwayFromZero)
        .normalize()
}

// =============================================================================
// Unit Tests
// =============================================================================
