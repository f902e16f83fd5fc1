//! # Pricing Module
//!
//! Prices a selling unit from its configuration and the base product cost.
//!
//! ## Strategies
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  token          price                                                   │
//! │  ─────────────  ─────────────────────────────────────────────────────   │
//! │  fixed          configured fixed price                                  │
//! │  cost_based     unit cost × (1 + markup%), floored at the min margin    │
//! │  market_based   market price × (1 + adjustment%)                        │
//! │  dynamic        base × demand, ±10% swing from stock vs threshold       │
//! │  hybrid         primary → fallback → cost_based                         │
//! │                                                                         │
//! │  unit cost = base cost ÷ base quantity × unit quantity                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `PricingStrategy` is a closed enum dispatched by one `match`; every
//! strategy is a pure function of its inputs. Prices come back as
//! [`UnitPrice`], so a gram cut from a kilo-priced sack keeps its
//! fraction of a cent until the line total is rounded.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::{Money, UnitPrice};

/// Largest stock-driven swing applied by the dynamic strategy (10%).
pub const DYNAMIC_ADJUSTMENT_BAND: Decimal = Decimal::from_parts(10, 0, 0, false, 2);

/// Stock ratio (stock ÷ threshold) is capped at 200% of the threshold.
pub const DYNAMIC_STOCK_RATIO_CAP: Decimal = Decimal::TWO;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

// =============================================================================
// Strategy Parameters
// =============================================================================

/// Strategy-specific parameters stored on a selling unit.
///
/// Only the fields the chosen strategy reads matter; the rest stay at
/// their defaults (markup 0, demand multiplier 1.0).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(default)]
pub struct PricingParams {
    /// `fixed`: the price.
    pub fixed_price_cents: Option<i64>,

    /// `cost_based`: markup over unit cost, in percent.
    #[ts(as = "String")]
    pub markup_percent: Decimal,

    /// `cost_based`: price never drops below unit cost × (1 + this%).
    #[ts(as = "Option<String>")]
    pub min_profit_margin_percent: Option<Decimal>,

    /// `market_based`: the reference market price.
    pub market_price_cents: Option<i64>,

    /// `dynamic`: starting price; the base cost is used when absent.
    pub dynamic_base_price_cents: Option<i64>,

    /// `dynamic`: demand multiplier applied to the starting price.
    #[ts(as = "String")]
    pub demand_multiplier: Decimal,

    /// `dynamic`: stock level (base-product units) considered "normal".
    #[ts(as = "Option<String>")]
    pub stock_threshold: Option<Decimal>,

    /// `hybrid`: strategy tried first.
    pub hybrid_primary: Option<PricingStrategy>,

    /// `hybrid`: strategy used when the primary fails or misses the threshold.
    pub hybrid_fallback: Option<PricingStrategy>,

    /// `hybrid`: threshold the primary price is checked against.
    pub hybrid_threshold_cents: Option<i64>,
}

impl Default for PricingParams {
    fn default() -> Self {
        PricingParams {
            fixed_price_cents: None,
            markup_percent: Decimal::ZERO,
            min_profit_margin_percent: None,
            market_price_cents: None,
            dynamic_base_price_cents: None,
            demand_multiplier: Decimal::ONE,
            stock_threshold: None,
            hybrid_primary: None,
            hybrid_fallback: None,
            hybrid_threshold_cents: None,
        }
    }
}

/// Everything a strategy knows about the unit being priced.
#[derive(Debug, Clone, Copy)]
pub struct SellingUnitPricing<'a> {
    pub params: &'a PricingParams,
    /// Quantity of the config's base unit in one selling unit.
    pub unit_quantity: Decimal,
    /// Quantity of the base unit one base-product record represents.
    pub base_quantity: Decimal,
}

/// Contextual inputs that change between calls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PricingContext {
    /// Current base-product stock, used by `dynamic`.
    #[ts(as = "Option<String>")]
    pub current_stock: Option<Decimal>,

    /// Percentage applied on top of the market price, used by `market_based`.
    #[ts(as = "Option<String>")]
    pub market_adjustment_percent: Option<Decimal>,

    /// Overrides the configured hybrid threshold for this call.
    pub comparison_value: Option<Money>,
}

// =============================================================================
// Pricing Strategy
// =============================================================================

/// The closed set of pricing strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PricingStrategy {
    #[serde(rename = "fixed")]
    FixedPrice,
    CostBased,
    MarketBased,
    Dynamic,
    Hybrid,
}

impl PricingStrategy {
    pub const ALL: [PricingStrategy; 5] = [
        PricingStrategy::FixedPrice,
        PricingStrategy::CostBased,
        PricingStrategy::MarketBased,
        PricingStrategy::Dynamic,
        PricingStrategy::Hybrid,
    ];

    /// The token stored in the database and sent by the admin UI.
    pub const fn as_str(&self) -> &'static str {
        match self {
            PricingStrategy::FixedPrice => "fixed",
            PricingStrategy::CostBased => "cost_based",
            PricingStrategy::MarketBased => "market_based",
            PricingStrategy::Dynamic => "dynamic",
            PricingStrategy::Hybrid => "hybrid",
        }
    }

    /// Computes the price of one selling unit.
    ///
    /// ## Example
    /// ```rust
    /// use autobom_core::money::{Money, UnitPrice};
    /// use autobom_core::pricing::{PricingContext, PricingParams, PricingStrategy, SellingUnitPricing};
    /// use rust_decimal::Decimal;
    ///
    /// let params = PricingParams { markup_percent: Decimal::from(20), ..Default::default() };
    /// let unit = SellingUnitPricing {
    ///     params: &params,
    ///     unit_quantity: Decimal::ONE,      // 1 kg bag
    ///     base_quantity: Decimal::from(25), // 25 kg sack
    /// };
    ///
    /// // Sack costs $50.00 → 1 kg costs $2.00 → +20% = $2.40
    /// let price = PricingStrategy::CostBased
    ///     .calculate_price(&unit, Money::from_cents(5000), &PricingContext::default())
    ///     .unwrap();
    /// assert_eq!(price, UnitPrice::from_cents(240));
    /// ```
    pub fn calculate_price(
        &self,
        unit: &SellingUnitPricing<'_>,
        base_cost: Money,
        extra: &PricingContext,
    ) -> CoreResult<UnitPrice> {
        let cents = match self {
            PricingStrategy::FixedPrice => fixed_price(unit)?,
            PricingStrategy::CostBased => cost_based(unit, base_cost)?,
            PricingStrategy::MarketBased => market_based(unit, extra)?,
            PricingStrategy::Dynamic => dynamic(unit, base_cost, extra)?,
            PricingStrategy::Hybrid => return hybrid(unit, base_cost, extra),
        };

        to_price(cents)
    }
}

impl fmt::Display for PricingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PricingStrategy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fixed" | "fixed_price" => Ok(PricingStrategy::FixedPrice),
            "cost_based" => Ok(PricingStrategy::CostBased),
            "market_based" => Ok(PricingStrategy::MarketBased),
            "dynamic" => Ok(PricingStrategy::Dynamic),
            "hybrid" => Ok(PricingStrategy::Hybrid),
            _ => Err(CoreError::UnknownStrategy(s.to_string())),
        }
    }
}

// =============================================================================
// Factory
// =============================================================================

/// Maps strategy tokens to strategies.
///
/// Stateless; strategies are `Copy`, so the same value can be shared freely.
#[derive(Debug, Clone, Copy, Default)]
pub struct PricingStrategyFactory;

impl PricingStrategyFactory {
    /// Resolves a token such as `"cost_based"`.
    pub fn create(name: &str) -> CoreResult<PricingStrategy> {
        name.parse()
    }

    /// Tokens accepted by [`PricingStrategyFactory::create`].
    pub fn available() -> Vec<&'static str> {
        PricingStrategy::ALL.iter().map(|s| s.as_str()).collect()
    }
}

// =============================================================================
// Strategy Implementations
// =============================================================================

fn fixed_price(unit: &SellingUnitPricing<'_>) -> CoreResult<Decimal> {
    unit.params
        .fixed_price_cents
        .map(Decimal::from)
        .ok_or(CoreError::MissingConfiguration {
            strategy: "fixed",
            field: "fixed_price_cents",
        })
}

/// Base cost scaled to one selling unit, in cents.
fn unit_cost(unit: &SellingUnitPricing<'_>, base_cost: Money) -> CoreResult<Decimal> {
    if unit.base_quantity <= Decimal::ZERO {
        return Err(ValidationError::must_be_positive("base_quantity").into());
    }
    if unit.unit_quantity <= Decimal::ZERO {
        return Err(ValidationError::must_be_positive("unit_quantity").into());
    }
    if base_cost.is_negative() {
        return Err(CoreError::InvalidPrice(format!("base cost {} is negative", base_cost)));
    }

    base_cost
        .as_decimal_cents()
        .checked_div(unit.base_quantity)
        .and_then(|per_base| per_base.checked_mul(unit.unit_quantity))
        .ok_or_else(|| CoreError::InvalidPrice("unit cost overflow".to_string()))
}

/// `value × (1 + percent / 100)`, or `InvalidPrice` on overflow.
fn apply_percent(value: Decimal, percent: Decimal, what: &str) -> CoreResult<Decimal> {
    Decimal::ONE
        .checked_add(percent / HUNDRED)
        .and_then(|factor| value.checked_mul(factor))
        .ok_or_else(|| CoreError::InvalidPrice(format!("{} overflows", what)))
}

fn cost_based(unit: &SellingUnitPricing<'_>, base_cost: Money) -> CoreResult<Decimal> {
    let cost = unit_cost(unit, base_cost)?;
    let price = apply_percent(cost, unit.params.markup_percent, "markup")?;

    match unit.params.min_profit_margin_percent {
        Some(margin) => {
            let floor = apply_percent(cost, margin, "profit margin floor")?;
            Ok(price.max(floor))
        }
        None => Ok(price),
    }
}

fn market_based(unit: &SellingUnitPricing<'_>, extra: &PricingContext) -> CoreResult<Decimal> {
    let market = unit
        .params
        .market_price_cents
        .map(Decimal::from)
        .ok_or(CoreError::MissingConfiguration {
            strategy: "market_based",
            field: "market_price_cents",
        })?;

    match extra.market_adjustment_percent {
        Some(adjustment) => apply_percent(market, adjustment, "market adjustment"),
        None => Ok(market),
    }
}

fn dynamic(
    unit: &SellingUnitPricing<'_>,
    base_cost: Money,
    extra: &PricingContext,
) -> CoreResult<Decimal> {
    let start = unit
        .params
        .dynamic_base_price_cents
        .map(Decimal::from)
        .unwrap_or_else(|| base_cost.as_decimal_cents());

    let price = start
        .checked_mul(unit.params.demand_multiplier)
        .ok_or_else(|| CoreError::InvalidPrice("demand multiplier overflows".to_string()))?;

    let (stock, threshold) = match (extra.current_stock, unit.params.stock_threshold) {
        (Some(stock), Some(threshold)) if threshold > Decimal::ZERO => (stock, threshold),
        _ => return Ok(price),
    };

    // Stock so large the division overflows is past the cap anyway.
    let ratio = stock
        .checked_div(threshold)
        .unwrap_or(DYNAMIC_STOCK_RATIO_CAP)
        .max(Decimal::ZERO)
        .min(DYNAMIC_STOCK_RATIO_CAP);

    let factor = if ratio < Decimal::ONE {
        // Scarce: up to +10% as stock approaches zero.
        Decimal::ONE + (Decimal::ONE - ratio) * DYNAMIC_ADJUSTMENT_BAND
    } else {
        // Plentiful: falls at half rate, at most -5% at the cap.
        Decimal::ONE - (ratio - Decimal::ONE) * DYNAMIC_ADJUSTMENT_BAND / Decimal::TWO
    };

    price
        .checked_mul(factor)
        .ok_or_else(|| CoreError::InvalidPrice("dynamic price overflows".to_string()))
}

/// Resolves a hybrid component; a hybrid may not nest another hybrid.
fn hybrid_component(
    strategy: Option<PricingStrategy>,
    field: &'static str,
) -> CoreResult<PricingStrategy> {
    match strategy {
        None => Err(CoreError::MissingConfiguration {
            strategy: "hybrid",
            field,
        }),
        Some(PricingStrategy::Hybrid) => Err(ValidationError::NotAllowed {
            field: field.to_string(),
            allowed: PricingStrategy::ALL
                .iter()
                .filter(|s| **s != PricingStrategy::Hybrid)
                .map(|s| s.as_str().to_string())
                .collect(),
        }
        .into()),
        Some(strategy) => Ok(strategy),
    }
}

/// Whether a primary price passes the directional threshold check.
fn passes_threshold(primary: PricingStrategy, price: UnitPrice, threshold: Option<Money>) -> bool {
    let threshold = threshold.map(UnitPrice::from);
    match (primary, threshold) {
        (PricingStrategy::CostBased, Some(threshold)) => price >= threshold,
        (PricingStrategy::MarketBased, Some(threshold)) => price <= threshold,
        _ => true,
    }
}

fn hybrid(
    unit: &SellingUnitPricing<'_>,
    base_cost: Money,
    extra: &PricingContext,
) -> CoreResult<UnitPrice> {
    let threshold = extra
        .comparison_value
        .or_else(|| unit.params.hybrid_threshold_cents.map(Money::from_cents));

    let primary = hybrid_component(unit.params.hybrid_primary, "hybrid_primary").and_then(
        |strategy| {
            strategy
                .calculate_price(unit, base_cost, extra)
                .map(|price| (strategy, price))
        },
    );

    if let Ok((strategy, price)) = primary {
        if passes_threshold(strategy, price, threshold) {
            return Ok(price);
        }
    }

    hybrid_component(unit.params.hybrid_fallback, "hybrid_fallback")
        .and_then(|strategy| strategy.calculate_price(unit, base_cost, extra))
        .or_else(|_| PricingStrategy::CostBased.calculate_price(unit, base_cost, extra))
}

fn to_price(cents: Decimal) -> CoreResult<UnitPrice> {
    if cents.is_sign_negative() && !cents.is_zero() {
        return Err(CoreError::InvalidPrice(format!(
            "computed price {} cents is negative",
            cents
        )));
    }

    let price = UnitPrice::from_decimal_cents(cents);
    // The shelf price is stored in whole cents.
    if price.rounded().is_none() {
        return Err(CoreError::InvalidPrice(format!(
            "computed price {} cents overflows",
            cents
        )));
    }

    Ok(price)
}

// =============================================================================
// Unit Tests
// =============================================================================
