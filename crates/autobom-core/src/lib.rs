//! # autobom-core: Pure Business Logic for Auto-BOM
//!
//! Auto-BOM lets one stocked "base" product be sold under several derived
//! selling units (a 25 kg sack sold as 1 kg and 5 kg bags), each priced by
//! its own strategy. This crate holds the I/O-free half of that engine.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Auto-BOM Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              POS / Admin UI (selling-unit picker)               │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │          autobom-db: AutoBomManager (transactions, SQL)         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ autobom-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   units   │  │  pricing  │  │   types   │  │ validation│  │   │
//! │  │   │ Converter │  │ Strategy  │  │  Config   │  │   rules   │  │   │
//! │  │   │  Catalog  │  │  Factory  │  │ SellingU. │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`units`] - Unit catalog and category-checked conversion
//! - [`pricing`] - Pricing strategies and the strategy factory
//! - [`types`] - Domain types (BaseProduct, AutoBomConfig, SellingUnit, ...)
//! - [`money`] - Integer-cent `Money` and sub-cent `UnitPrice` (no floating point!)
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: converters and strategies are deterministic
//! 2. **No I/O**: database, network and file system access is FORBIDDEN here
//! 3. **Integer Money**: totals are cents (i64); unit prices and strategy math are `Decimal`
//! 4. **Explicit Errors**: all errors are typed, never strings or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use autobom_core::units::UnitConverter;
//! use rust_decimal::Decimal;
//!
//! let converter = UnitConverter::default();
//! let grams = converter.convert(Decimal::new(25, 1), "kg", "g").unwrap();
//! assert_eq!(grams, Decimal::from(2500));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod pricing;
pub mod types;
pub mod units;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{Money, UnitPrice};
pub use pricing::{PricingContext, PricingParams, PricingStrategy, PricingStrategyFactory};
pub use types::*;
pub use units::{UnitCatalog, UnitCategory, UnitConverter};

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Decimal places kept for every quantity (stock, unit and base quantities).
///
/// The database stores quantities as integer micro-units at this scale.
pub const QUANTITY_SCALE: u32 = 6;

/// Actor recorded on history rows when the caller does not name one.
pub const DEFAULT_ACTOR: &str = "system";
