//! # Domain Types
//!
//! Core domain types of the Auto-BOM engine.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  BaseProduct    │◄──│  AutoBomConfig  │◄──│  SellingUnit    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  cost_cents     │   │  base_unit "kg" │   │  unit_quantity  │       │
//! │  │  quantity       │   │  base_quantity  │   │  strategy       │       │
//! │  │  (stocked item) │   │  25 (sack)      │   │  PricingParams  │       │
//! │  └─────────────────┘   └─────────────────┘   └────────┬────────┘       │
//! │                                                       │                 │
//! │                          ┌────────────────────────────┼──────────┐      │
//! │                          ▼                            ▼          │      │
//! │                 ┌─────────────────┐        ┌─────────────────┐   │      │
//! │                 │ PriceHistory    │        │  SaleLogEntry   │   │      │
//! │                 │ (append-only)   │        │  (append-only)  │   │      │
//! │                 └─────────────────┘        └─────────────────┘   │      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quantities
//! Every quantity is a `Decimal`. The base product's `quantity` counts
//! base-product records (0.4 = 40% of a 25 kg sack left).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::{Money, UnitPrice};
use crate::pricing::{PricingContext, PricingParams, PricingStrategy, SellingUnitPricing};

// =============================================================================
// Base Product
// =============================================================================

/// The physically stocked item whose quantity every Auto-BOM sale draws down.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BaseProduct {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Stock Keeping Unit - business identifier.
    pub sku: String,

    /// Display name.
    pub name: String,

    /// Cost of one base-product record, in cents.
    pub cost_cents: i64,

    /// Shelf price of one base-product record, in cents.
    pub price_cents: i64,

    /// Current stock, in base-product records.
    #[ts(as = "String")]
    pub quantity: Decimal,

    /// Set once an Auto-BOM configuration points at this product.
    pub is_auto_bom_enabled: bool,

    /// Whether product is active (soft delete).
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl BaseProduct {
    /// Returns the cost as a Money type.
    #[inline]
    pub fn cost(&self) -> Money {
        Money::from_cents(self.cost_cents)
    }

    /// Returns the price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

/// Input for inserting a product (seeding, tests, inventory imports).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewBaseProduct {
    pub sku: String,
    pub name: String,
    pub cost_cents: i64,
    pub price_cents: i64,
    #[ts(as = "String")]
    pub quantity: Decimal,
}

// =============================================================================
// Unit Status
// =============================================================================

/// Whether a selling unit can be sold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    Active,
    Inactive,
}

impl Default for UnitStatus {
    fn default() -> Self {
        UnitStatus::Active
    }
}

impl UnitStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            UnitStatus::Active => "active",
            UnitStatus::Inactive => "inactive",
        }
    }
}

// =============================================================================
// Auto-BOM Configuration
// =============================================================================

/// Links a sellable parent product to the base product it draws stock from.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AutoBomConfig {
    pub id: String,

    /// The sellable "parent" product; may equal `base_product_id`.
    pub product_id: String,

    /// The stocked product that is decremented on sale.
    pub base_product_id: String,

    pub config_name: String,

    /// Unit token the base product is measured in (e.g. "kg").
    pub base_unit: String,

    /// How much of `base_unit` one base-product record holds. Always > 0.
    #[ts(as = "String")]
    pub base_quantity: Decimal,

    pub description: Option<String>,

    /// Configs are deactivated, never deleted.
    pub is_active: bool,

    pub created_by: String,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Selling Unit
// =============================================================================

/// A derived unit a base product is sold under (e.g. "1kg bag").
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SellingUnit {
    pub id: String,

    /// Owning configuration; the unit is deleted with it.
    pub config_id: String,

    pub unit_name: String,

    /// Quantity of the config's base unit in one selling unit. Always > 0.
    #[ts(as = "String")]
    pub unit_quantity: Decimal,

    /// Unit `unit_quantity` is written in, when it differs from the
    /// config's base unit (e.g. "g" under a "kg" config).
    pub unit_of_measure: Option<String>,

    pub sku: Option<String>,
    pub barcode: Option<String>,

    pub pricing_strategy: PricingStrategy,
    pub pricing: PricingParams,

    pub status: UnitStatus,

    /// Higher sorts first in availability lists.
    pub priority: i64,

    #[ts(as = "Option<String>")]
    pub max_quantity_per_sale: Option<Decimal>,

    /// Last persisted price (batch repricing or manual edit).
    pub current_price_cents: Option<i64>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl SellingUnit {
    #[inline]
    pub fn is_active(&self) -> bool {
        self.status == UnitStatus::Active
    }

    #[inline]
    pub fn current_price(&self) -> Option<Money> {
        self.current_price_cents.map(Money::from_cents)
    }

    /// Strategy input for this unit under a config's base quantity.
    ///
    /// `unit_quantity` must already be expressed in the config's base unit.
    pub fn pricing_input(&self, unit_quantity: Decimal, base_quantity: Decimal) -> SellingUnitPricing<'_> {
        SellingUnitPricing {
            params: &self.pricing,
            unit_quantity,
            base_quantity,
        }
    }
}

/// A selling unit together with its parent configuration.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SellingUnitWithConfig {
    pub unit: SellingUnit,
    pub config: AutoBomConfig,
}

// =============================================================================
// Configuration Inputs
// =============================================================================

/// Input for creating a selling unit.
///
/// Optional fields take the defaults: markup 0, demand multiplier 1.0,
/// priority 0, status active.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewSellingUnit {
    pub unit_name: String,

    #[ts(as = "String")]
    pub unit_quantity: Decimal,

    #[serde(default)]
    pub unit_of_measure: Option<String>,

    #[serde(default)]
    pub sku: Option<String>,

    #[serde(default)]
    pub barcode: Option<String>,

    /// Strategy token, resolved by `PricingStrategyFactory`.
    pub pricing_strategy: String,

    #[serde(default)]
    pub pricing: PricingParams,

    #[serde(default)]
    pub status: Option<UnitStatus>,

    #[serde(default)]
    pub priority: Option<i64>,

    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub max_quantity_per_sale: Option<Decimal>,
}

/// Input for creating a configuration, optionally with its selling units.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewAutoBomConfig {
    pub product_id: String,
    pub base_product_id: String,
    pub config_name: String,
    pub base_unit: String,

    #[ts(as = "String")]
    pub base_quantity: Decimal,

    #[serde(default)]
    pub description: Option<String>,

    /// Falls back to the engine's default actor.
    #[serde(default)]
    pub created_by: Option<String>,

    #[serde(default)]
    pub selling_units: Vec<NewSellingUnit>,
}

// =============================================================================
// Append-Only Logs
// =============================================================================

/// One stored price change. Never mutated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PriceHistoryEntry {
    pub id: String,
    pub selling_unit_id: String,
    pub old_price_cents: Option<i64>,
    pub new_price_cents: i64,
    pub reason: String,
    pub changed_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// One Auto-BOM sale. Never mutated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleLogEntry {
    pub id: String,
    pub selling_unit_id: String,
    pub base_product_id: String,

    /// Selling units sold.
    #[ts(as = "String")]
    pub quantity: Decimal,

    /// Price of one selling unit, below whole-cent precision.
    pub unit_price: UnitPrice,

    /// `unit_price × quantity`, rounded to whole cents.
    pub line_total_cents: i64,

    /// Base-product records removed from stock.
    #[ts(as = "String")]
    pub base_quantity_deducted: Decimal,

    pub sold_by: String,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Stock & Sale Results
// =============================================================================

/// Result of an availability check, in base-product records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockCheck {
    pub base_product_id: String,
    #[ts(as = "String")]
    pub required: Decimal,
    #[ts(as = "String")]
    pub available: Decimal,
    /// `required - available`, never below zero.
    #[ts(as = "String")]
    pub shortage: Decimal,
    pub sufficient: bool,
}

impl StockCheck {
    pub fn new(base_product_id: impl Into<String>, required: Decimal, available: Decimal) -> Self {
        StockCheck {
            base_product_id: base_product_id.into(),
            required,
            available,
            shortage: (required - available).max(Decimal::ZERO),
            sufficient: available >= required,
        }
    }
}

/// A sale request from the POS.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleRequest {
    pub selling_unit_id: String,
    #[ts(as = "String")]
    pub quantity: Decimal,
    /// Explicit unit price; skips strategy pricing when set.
    #[serde(default)]
    pub unit_price_override_cents: Option<i64>,
    #[serde(default)]
    pub sold_by: Option<String>,
    /// Market adjustment, hybrid comparison value or stock override
    /// for this sale's strategy price.
    #[serde(default)]
    pub pricing: Option<PricingContext>,
}

/// A sale that passed the read-only checks, ready to be committed.
///
/// The stock check inside is advisory; committing re-asserts it.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SalePlan {
    pub selling_unit_id: String,
    pub config_id: String,
    pub base_product_id: String,
    #[ts(as = "String")]
    pub quantity: Decimal,
    pub unit_price: UnitPrice,
    pub stock: StockCheck,
    pub sold_by: String,
}

impl SalePlan {
    /// Base-product records this sale removes.
    #[inline]
    pub fn base_quantity(&self) -> Decimal {
        self.stock.required
    }
}

/// Hand-off data for the tax engine and receipt renderer.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleReceipt {
    pub sale_id: String,
    pub selling_unit_id: String,
    #[ts(as = "String")]
    pub quantity: Decimal,
    pub unit_price: UnitPrice,
    /// `unit_price × quantity`, before tax, rounded once.
    pub line_total: Money,
    #[ts(as = "String")]
    pub base_quantity_deducted: Decimal,
    /// Base stock left after this sale.
    #[ts(as = "String")]
    pub remaining_base_quantity: Decimal,
}

// =============================================================================
// Batch Repricing
// =============================================================================

/// A unit the batch could not reprice.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RepriceFailure {
    pub selling_unit_id: String,
    pub error: String,
}

/// Outcome of repricing every unit under one configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RepriceReport {
    pub config_id: String,
    /// Units whose stored price changed.
    pub updated: Vec<String>,
    /// Units already at the computed price.
    pub unchanged: Vec<String>,
    pub failed: Vec<RepriceFailure>,
}

impl RepriceReport {
    pub fn new(config_id: impl Into<String>) -> Self {
        RepriceReport {
            config_id: config_id.into(),
            ..Default::default()
        }
    }

    #[inline]
    pub fn attempted(&self) -> usize {
        self.updated.len() + self.unchanged.len() + self.failed.len()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
