//! # Error Types
//!
//! Domain-specific error types for autobom-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  autobom-core errors (this file)                                       │
//! │  ├── CoreError        - Conversion, pricing and stock rule failures    │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  autobom-db errors (separate crate)                                    │
//! │  ├── DbError          - Database operation failures                    │
//! │  └── BomError         - What AutoBomManager callers see                │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → BomError → UI / API layer         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use rust_decimal::Decimal;
use thiserror::Error;

use crate::units::UnitCategory;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// Conversion and strategy errors are configuration problems surfaced to the
/// admin UI; they are never retried automatically.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The two units live in different categories (e.g. kg → ml).
    #[error("Cannot convert {from} ({from_category}) to {to} ({to_category})")]
    IncompatibleUnits {
        from: String,
        to: String,
        from_category: UnitCategory,
        to_category: UnitCategory,
    },

    /// The unit token is not in the catalog.
    #[error("Unknown unit: {0}")]
    UnknownUnit(String),

    /// The strategy token does not name a pricing strategy.
    #[error("Unknown pricing strategy: {0}")]
    UnknownStrategy(String),

    /// A strategy needs a parameter the selling unit does not carry.
    ///
    /// ## When This Occurs
    /// - `fixed` strategy without `fixed_price_cents`
    /// - `market_based` strategy without `market_price_cents`
    /// - `hybrid` strategy without a primary or fallback strategy
    #[error("{strategy} pricing requires {field}")]
    MissingConfiguration {
        strategy: &'static str,
        field: &'static str,
    },

    /// Not enough base stock for the requested quantity.
    ///
    /// ## User Workflow
    /// ```text
    /// Sell 3 × "5kg bag"  (needs 0.6 sacks)
    ///      │
    ///      ▼
    /// Check stock: available = 0.4 sacks
    ///      │
    ///      ▼
    /// InsufficientStock { required: 0.6, available: 0.4, shortage: 0.2 }
    ///      │
    ///      ▼
    /// UI shows: "Not enough stock"
    /// ```
    #[error("Insufficient stock: required {required}, available {available}, short by {shortage}")]
    InsufficientStock {
        required: Decimal,
        available: Decimal,
        shortage: Decimal,
    },

    /// A computed price could not be represented (overflow or negative).
    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Builds an InsufficientStock error, deriving the shortage.
    pub fn insufficient_stock(required: Decimal, available: Decimal) -> Self {
        CoreError::InsufficientStock {
            required,
            available,
            shortage: (required - available).max(Decimal::ZERO),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when configuration input doesn't meet requirements.
/// The caller must fix the input; they are never retried.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange {
        field: String,
        min: Decimal,
        max: Decimal,
    },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid unit token).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Duplicate value (e.g., unit name already used by another category).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

impl ValidationError {
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }

    pub fn must_be_positive(field: impl Into<String>) -> Self {
        ValidationError::MustBePositive {
            field: field.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
