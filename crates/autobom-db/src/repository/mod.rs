//! # Repository Module
//!
//! Database repository implementations for Auto-BOM.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  AutoBomManager                                                        │
//! │       │                                                                 │
//! │       │  reads:  db.auto_bom().get_unit(id)         (pool)             │
//! │       │  writes: ProductRepository::deduct_stock(&mut *tx, ..)         │
//! │       ▼                                                                 │
//! │  ProductRepository / AutoBomRepository / SaleLogRepository /           │
//! │  PriceHistoryRepository                                                │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Reads go through the repository's pool. Writes that must be part of a
//! larger transaction are associated functions taking `&mut SqliteConnection`,
//! so the caller passes `&mut *tx`.
//!
//! ## Stored Representations
//! - Quantities: INTEGER micro-units (`*_micros`), 6 decimal places
//! - Percentages and multipliers: TEXT decimals
//! - Strategy tokens: TEXT, resolved through `PricingStrategyFactory`
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - Base products and stock
//! - [`AutoBomRepository`](auto_bom::AutoBomRepository) - Configs and selling units
//! - [`SaleLogRepository`](sale_log::SaleLogRepository) - Auto-BOM sale log
//! - [`PriceHistoryRepository`](price_history::PriceHistoryRepository) - Price changes

pub mod auto_bom;
pub mod price_history;
pub mod product;
pub mod sale_log;

use std::str::FromStr;

use autobom_core::units::round_quantity;
use autobom_core::QUANTITY_SCALE;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{DbError, DbResult};

const MICROS_PER_UNIT: i64 = 1_000_000;

/// Converts a quantity to stored micro-units.
pub(crate) fn to_micros(quantity: Decimal) -> DbResult<i64> {
    round_quantity(quantity)
        .checked_mul(Decimal::from(MICROS_PER_UNIT))
        .and_then(|micros| micros.to_i64())
        .ok_or_else(|| DbError::InvalidData(format!("quantity {} out of range", quantity)))
}

/// Converts stored micro-units back to a quantity.
pub(crate) fn from_micros(micros: i64) -> Decimal {
    Decimal::new(micros, QUANTITY_SCALE).normalize()
}

/// Parses a TEXT decimal column.
pub(crate) fn parse_decimal(column: &str, text: &str) -> DbResult<Decimal> {
    Decimal::from_str(text)
        .map_err(|e| DbError::InvalidData(format!("{} = '{}': {}", column, text, e)))
}

/// Generates a new row ID.
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================
