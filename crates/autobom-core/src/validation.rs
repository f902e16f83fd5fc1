//! # Validation Module
//!
//! Input validation for Auto-BOM configuration and sale requests.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Admin UI (TypeScript)                                        │
//! │  ├── Basic format checks (empty, length)                               │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: AutoBomManager (Rust)                                        │
//! │  ├── Type validation (deserialization)                                 │
//! │  └── THIS MODULE: field rules                                          │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / CHECK constraints                                      │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Strategy completeness (a `fixed` unit without a price) is NOT checked
//! here: it surfaces when the unit is priced.
//!
//! ## Usage
//! ```rust
//! use autobom_core::validation::{validate_sku, validate_positive_quantity};
//! use rust_decimal::Decimal;
//!
//! validate_sku("RICE-25KG").unwrap();
//! validate_positive_quantity("base_quantity", Decimal::from(25)).unwrap();
//! ```

use rust_decimal::Decimal;

use crate::error::ValidationError;
use crate::pricing::PricingParams;
use crate::QUANTITY_SCALE;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Percent fields accept -100% (free) up to +10000%.
const MIN_PERCENT: Decimal = Decimal::from_parts(100, 0, 0, true, 0);
const MAX_PERCENT: Decimal = Decimal::from_parts(10_000, 0, 0, false, 0);

// =============================================================================
// String Validators
// =============================================================================

/// Validates a SKU (Stock Keeping Unit).
///
/// ## Rules
/// - Must not be empty
/// - Must be between 1 and 50 characters
/// - Should contain only alphanumeric characters, hyphens, underscores
///
/// ## Example
/// ```rust
/// use autobom_core::validation::validate_sku;
///
/// assert!(validate_sku("RICE-1KG").is_ok());
/// assert!(validate_sku("").is_err());
/// assert!(validate_sku("A".repeat(100).as_str()).is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::required("sku"));
    }

    if sku.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: 50,
        });
    }

    if !sku
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a free-text name field (product, config, selling unit).
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most 200 characters
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::required(field));
    }

    if name.len() > 200 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates an id reference such as `product_id`.
pub fn validate_required_id(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::required(field));
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a quantity that must be strictly positive.
///
/// ## Rules
/// - Must be > 0
/// - At most 6 decimal places (quantities are stored in micro-units)
///
/// ## Example
/// ```rust
/// use autobom_core::validation::validate_positive_quantity;
/// use rust_decimal::Decimal;
///
/// assert!(validate_positive_quantity("unit_quantity", Decimal::new(5, 1)).is_ok());
/// assert!(validate_positive_quantity("unit_quantity", Decimal::ZERO).is_err());
/// ```
pub fn validate_positive_quantity(field: &str, qty: Decimal) -> ValidationResult<()> {
    if qty <= Decimal::ZERO {
        return Err(ValidationError::must_be_positive(field));
    }

    if qty.normalize().scale() > QUANTITY_SCALE {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: format!("at most {} decimal places", QUANTITY_SCALE),
        });
    }

    Ok(())
}

/// Validates a price in cents.
///
/// ## Rules
/// - Must be non-negative (>= 0)
/// - Zero is allowed (free items)
///
/// ## Example
/// ```rust
/// use autobom_core::validation::validate_price_cents;
///
/// assert!(validate_price_cents("fixed_price_cents", 1099).is_ok());
/// assert!(validate_price_cents("fixed_price_cents", 0).is_ok());
/// assert!(validate_price_cents("fixed_price_cents", -100).is_err());
/// ```
pub fn validate_price_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: Decimal::ZERO,
            max: Decimal::from(i64::MAX),
        });
    }

    Ok(())
}

/// Validates a percentage (markup, margin, adjustment).
pub fn validate_percentage(field: &str, pct: Decimal) -> ValidationResult<()> {
    if pct < MIN_PERCENT || pct > MAX_PERCENT {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: MIN_PERCENT,
            max: MAX_PERCENT,
        });
    }

    Ok(())
}

// =============================================================================
// Composite Validators
// =============================================================================

/// Validates the value ranges of a selling unit's strategy parameters.
pub fn validate_pricing_params(params: &PricingParams) -> ValidationResult<()> {
    let prices = [
        ("fixed_price_cents", params.fixed_price_cents),
        ("market_price_cents", params.market_price_cents),
        ("dynamic_base_price_cents", params.dynamic_base_price_cents),
        ("hybrid_threshold_cents", params.hybrid_threshold_cents),
    ];
    for (field, cents) in prices {
        if let Some(cents) = cents {
            validate_price_cents(field, cents)?;
        }
    }

    validate_percentage("markup_percent", params.markup_percent)?;
    if let Some(margin) = params.min_profit_margin_percent {
        validate_percentage("min_profit_margin_percent", margin)?;
    }

    if params.demand_multiplier <= Decimal::ZERO {
        return Err(ValidationError::must_be_positive("demand_multiplier"));
    }

    if let Some(threshold) = params.stock_threshold {
        validate_positive_quantity("stock_threshold", threshold)?;
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_sku() {
        assert!(validate_sku("RICE-25KG").is_ok());
        assert!(validate_sku("ABC123").is_ok());
        assert!(validate_sku("bag_1kg").is_ok());

        assert!(validate_sku("").is_err());
        assert!(validate_sku("   ").is_err());
        assert!(validate_sku("has space").is_err());
        assert!(validate_sku(&"A".repeat(100)).is_err());
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("unit_name", "1kg bag").is_ok());
        assert!(matches!(
            validate_name("unit_name", "  "),
            Err(ValidationError::Required { field }) if field == "unit_name"
        ));
        assert!(validate_name("config_name", &"A".repeat(300)).is_err());
    }

    #[test]
    fn test_validate_positive_quantity() {
        assert!(validate_positive_quantity("q", Decimal::new(1, 6)).is_ok());
        assert!(validate_positive_quantity("q", Decimal::from(25)).is_ok());

        assert!(validate_positive_quantity("q", Decimal::ZERO).is_err());
        assert!(validate_positive_quantity("q", Decimal::from(-1)).is_err());
        assert!(validate_positive_quantity("q", Decimal::new(1, 7)).is_err());
    }

    #[test]
    fn test_validate_price_cents() {
        assert!(validate_price_cents("p", 0).is_ok());
        assert!(validate_price_cents("p", 1099).is_ok());
        assert!(validate_price_cents("p", -100).is_err());
    }

    #[test]
    fn test_validate_percentage() {
        assert!(validate_percentage("markup_percent", Decimal::from(25)).is_ok());
        assert!(validate_percentage("markup_percent", Decimal::from(-100)).is_ok());
        assert!(validate_percentage("markup_percent", Decimal::from(-101)).is_err());
        assert!(validate_percentage("markup_percent", Decimal::from(10_001)).is_err());
    }

    #[test]
    fn test_validate_pricing_params() {
        assert!(validate_pricing_params(&PricingParams::default()).is_ok());

        let negative_price = PricingParams {
            market_price_cents: Some(-1),
            ..Default::default()
        };
        assert!(validate_pricing_params(&negative_price).is_err());

        let zero_demand = PricingParams {
            demand_multiplier: Decimal::ZERO,
            ..Default::default()
        };
        assert!(matches!(
            validate_pricing_params(&zero_demand),
            Err(ValidationError::MustBePositive { field }) if field == "demand_multiplier"
        ));

        // Incomplete strategy config is accepted; pricing reports it later.
        let fixed_without_price = PricingParams::default();
        assert!(validate_pricing_params(&fixed_without_price).is_ok());
    }
}
