//! # Auto-BOM Manager
//!
//! Orchestrates configuration, pricing, stock checks and the sale path.
//!
//! ## Sale Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         sell_selling_unit                               │
//! │                                                                         │
//! │  prepare_sale (read-only, may race)                                    │
//! │  ┌──────────┐   ┌──────────────┐   ┌──────────┐                        │
//! │  │  Load    │──►│  StockCheck  │──►│  Price   │──► SalePlan            │
//! │  │ unit +   │   │ qty × unit   │   │ override │                        │
//! │  │ config   │   │ ÷ base_qty   │   │ or       │                        │
//! │  └──────────┘   └──────────────┘   │ strategy │                        │
//! │                                    └──────────┘                        │
//! │                                                                         │
//! │  execute_sale (one transaction)                                        │
//! │  ┌──────────────────────────┐   ┌──────────────┐   ┌──────────┐        │
//! │  │ Deduct                   │──►│ Log sale     │──►│ Commit   │        │
//! │  │ WHERE quantity >= needed │   │ auto_bom_    │   │          │        │
//! │  │ 0 rows → InventoryDeduct │   │ sales        │   │          │        │
//! │  └──────────────────────────┘   └──────────────┘   └──────────┘        │
//! │        any error: transaction dropped → rolled back                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Transaction Boundaries
//! - Config creation: one transaction (config, units, product flag)
//! - Sale: one transaction (deduct, log)
//! - Batch repricing: one small transaction per unit; failures are
//!   collected in the report and the batch carries on

use rust_decimal::Decimal;
use sqlx::{Sqlite, Transaction};
use tracing::{debug, info, warn};

use crate::config::{EngineConfig, PricingSettings};
use crate::error::{BomError, BomResult};
use crate::history::FallbackPriceHistory;
use crate::pool::{Database, DbConfig};
use crate::repository::auto_bom::AutoBomRepository;
use crate::repository::generate_id;
use crate::repository::product::ProductRepository;
use crate::repository::sale_log::SaleLogRepository;
use autobom_core::units::round_quantity;
use autobom_core::validation::{
    validate_name, validate_positive_quantity, validate_price_cents, validate_pricing_params,
    validate_required_id, validate_sku,
};
use autobom_core::{
    AutoBomConfig, BaseProduct, CoreError, NewAutoBomConfig, NewSellingUnit,
    PriceHistoryEntry, PricingContext, PricingStrategyFactory, RepriceFailure, RepriceReport,
    SaleLogEntry, SalePlan, SaleReceipt, SaleRequest, SellingUnit, SellingUnitWithConfig,
    StockCheck, UnitCatalog, UnitConverter, UnitPrice, ValidationError,
};

/// Coordinates Auto-BOM configuration, pricing and sales.
///
/// Cloning is cheap: the pool and the unit catalog are shared.
///
/// ## Usage
/// ```rust,ignore
/// let manager = AutoBomManager::from_config(&EngineConfig::load(None)?).await?;
///
/// let receipt = manager
///     .sell_selling_unit(&SaleRequest {
///         selling_unit_id: bag_id,
///         quantity: Decimal::from(2),
///         unit_price_override_cents: None,
///         sold_by: Some("cashier-1".into()),
///         pricing: None,
///     })
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct AutoBomManager {
    db: Database,
    converter: UnitConverter,
    history: FallbackPriceHistory,
    settings: PricingSettings,
}

impl AutoBomManager {
    pub fn new(db: Database, converter: UnitConverter, settings: PricingSettings) -> Self {
        AutoBomManager {
            db,
            converter,
            history: FallbackPriceHistory::standard(),
            settings,
        }
    }

    /// Opens the database and builds the catalog described by `config`.
    pub async fn from_config(config: &EngineConfig) -> BomResult<Self> {
        let catalog = config.unit_catalog()?;
        let db = Database::new(DbConfig::from(&config.database)).await?;

        Ok(Self::new(
            db,
            UnitConverter::new(catalog),
            config.pricing.clone(),
        ))
    }

    /// Replaces the price history recorder.
    pub fn with_history(mut self, history: FallbackPriceHistory) -> Self {
        self.history = history;
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn converter(&self) -> &UnitConverter {
        &self.converter
    }

    /// Adds a custom count unit and returns the resulting catalog.
    ///
    /// Converters already handed out keep the catalog they were built with.
    pub fn register_custom_unit(&mut self, name: &str, factor: Decimal) -> BomResult<&UnitCatalog> {
        self.converter = self.converter.with_custom_unit(name, factor)?;
        info!(unit = %name, factor = %factor, "Registered custom unit");
        Ok(self.converter.catalog())
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Creates a configuration and its selling units, and flags the parent
    /// product as Auto-BOM enabled.
    ///
    /// All or nothing: if any unit is rejected, no config row survives and
    /// the product is left unflagged.
    pub async fn create_auto_bom_config(
        &self,
        input: &NewAutoBomConfig,
    ) -> BomResult<(AutoBomConfig, Vec<SellingUnit>)> {
        validate_required_id("product_id", &input.product_id)?;
        validate_required_id("base_product_id", &input.base_product_id)?;
        validate_name("config_name", &input.config_name)?;
        validate_required_id("base_unit", &input.base_unit)?;
        validate_positive_quantity("base_quantity", input.base_quantity)?;

        let base_unit = input.base_unit.trim().to_lowercase();
        if !self.converter.catalog().contains(&base_unit) {
            return Err(CoreError::UnknownUnit(input.base_unit.clone()).into());
        }

        let mut tx = self.begin().await?;

        for id in [&input.product_id, &input.base_product_id] {
            if ProductRepository::find_in(&mut *tx, id).await?.is_none() {
                return Err(BomError::not_found("Product", id.as_str()));
            }
        }

        let now = chrono::Utc::now();
        let config = AutoBomConfig {
            id: generate_id(),
            product_id: input.product_id.clone(),
            base_product_id: input.base_product_id.clone(),
            config_name: input.config_name.trim().to_string(),
            base_unit,
            base_quantity: input.base_quantity,
            description: input.description.clone(),
            is_active: true,
            created_by: self.actor(input.created_by.as_deref()),
            created_at: now,
            updated_at: now,
        };

        AutoBomRepository::insert_config(&mut *tx, &config).await?;

        let mut units = Vec::with_capacity(input.selling_units.len());
        for new_unit in &input.selling_units {
            let unit = self.build_selling_unit(&config, new_unit)?;
            AutoBomRepository::insert_unit(&mut *tx, &unit).await?;
            units.push(unit);
        }

        ProductRepository::mark_auto_bom_enabled(&mut *tx, &config.product_id).await?;

        self.commit(tx).await?;

        info!(
            config_id = %config.id,
            product_id = %config.product_id,
            base_product_id = %config.base_product_id,
            units = units.len(),
            "Auto-BOM config created"
        );

        Ok((config, units))
    }

    /// Adds a selling unit to an existing configuration.
    pub async fn create_selling_unit(
        &self,
        config_id: &str,
        input: &NewSellingUnit,
    ) -> BomResult<SellingUnit> {
        let mut tx = self.begin().await?;

        let config = AutoBomRepository::find_config_in(&mut *tx, config_id)
            .await?
            .ok_or_else(|| BomError::not_found("Auto-BOM config", config_id))?;

        let unit = self.build_selling_unit(&config, input)?;
        AutoBomRepository::insert_unit(&mut *tx, &unit).await?;

        self.commit(tx).await?;

        info!(
            unit_id = %unit.id,
            config_id = %config_id,
            name = %unit.unit_name,
            strategy = %unit.pricing_strategy,
            "Selling unit created"
        );

        Ok(unit)
    }

    /// Soft-deactivates a configuration. Its units can no longer be sold.
    pub async fn deactivate_config(&self, config_id: &str) -> BomResult<()> {
        self.db.auto_bom().deactivate_config(config_id).await?;
        info!(config_id = %config_id, "Auto-BOM config deactivated");
        Ok(())
    }

    /// Validates input and fills in defaults.
    fn build_selling_unit(
        &self,
        config: &AutoBomConfig,
        input: &NewSellingUnit,
    ) -> BomResult<SellingUnit> {
        validate_name("unit_name", &input.unit_name)?;
        validate_positive_quantity("unit_quantity", input.unit_quantity)?;

        let strategy = PricingStrategyFactory::create(&input.pricing_strategy)?;
        validate_pricing_params(&input.pricing)?;

        if let Some(sku) = &input.sku {
            validate_sku(sku)?;
        }

        if let Some(max) = input.max_quantity_per_sale {
            validate_positive_quantity("max_quantity_per_sale", max)?;
        }

        let unit_of_measure = match &input.unit_of_measure {
            Some(uom) => {
                let uom = uom.trim().to_lowercase();
                // Rejects unknown and cross-category units up front.
                self.converter
                    .convert(Decimal::ONE, &uom, &config.base_unit)?;
                Some(uom)
            }
            None => None,
        };

        let now = chrono::Utc::now();
        Ok(SellingUnit {
            id: generate_id(),
            config_id: config.id.clone(),
            unit_name: input.unit_name.trim().to_string(),
            unit_quantity: input.unit_quantity,
            unit_of_measure,
            sku: input.sku.clone(),
            barcode: input.barcode.clone(),
            pricing_strategy: strategy,
            pricing: input.pricing.clone(),
            status: input.status.unwrap_or_default(),
            priority: input.priority.unwrap_or(0),
            max_quantity_per_sale: input.max_quantity_per_sale,
            current_price_cents: None,
            created_at: now,
            updated_at: now,
        })
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Active units of active configs drawing from a base product.
    ///
    /// Ordered by priority (highest first), then by size in the config's
    /// base unit, then by name.
    pub async fn get_available_selling_units(
        &self,
        base_product_id: &str,
    ) -> BomResult<Vec<SellingUnitWithConfig>> {
        let repo = self.db.auto_bom();
        let mut available = Vec::new();

        for config in repo.list_active_configs_for_base(base_product_id).await? {
            for unit in repo.list_units(&config.id).await? {
                if unit.is_active() {
                    available.push(SellingUnitWithConfig {
                        unit,
                        config: config.clone(),
                    });
                }
            }
        }

        available.sort_by(|a, b| {
            b.unit
                .priority
                .cmp(&a.unit.priority)
                .then_with(|| self.size_key(a).cmp(&self.size_key(b)))
                .then_with(|| a.unit.unit_name.cmp(&b.unit.unit_name))
        });

        debug!(
            base_product_id = %base_product_id,
            count = available.len(),
            "Listed available selling units"
        );

        Ok(available)
    }

    fn size_key(&self, entry: &SellingUnitWithConfig) -> Decimal {
        self.unit_quantity_in_base_unit(&entry.unit, &entry.config)
            .unwrap_or(entry.unit.unit_quantity)
    }

    async fn load_unit(&self, selling_unit_id: &str) -> BomResult<SellingUnitWithConfig> {
        self.db
            .auto_bom()
            .get_unit_with_config(selling_unit_id)
            .await?
            .ok_or_else(|| BomError::not_found("Selling unit", selling_unit_id))
    }

    async fn load_product(&self, product_id: &str) -> BomResult<BaseProduct> {
        self.db
            .products()
            .get_by_id(product_id)
            .await?
            .ok_or_else(|| BomError::not_found("Product", product_id))
    }

    // =========================================================================
    // Conversion & Stock
    // =========================================================================

    /// One selling unit expressed in the config's base unit.
    fn unit_quantity_in_base_unit(
        &self,
        unit: &SellingUnit,
        config: &AutoBomConfig,
    ) -> BomResult<Decimal> {
        match &unit.unit_of_measure {
            Some(uom) => Ok(self
                .converter
                .convert(unit.unit_quantity, uom, &config.base_unit)?),
            None => Ok(unit.unit_quantity),
        }
    }

    /// Base-product records consumed by `quantity` selling units.
    fn base_quantity_for(
        &self,
        unit: &SellingUnit,
        config: &AutoBomConfig,
        quantity: Decimal,
    ) -> BomResult<Decimal> {
        let per_unit = self.unit_quantity_in_base_unit(unit, config)?;

        let required = quantity
            .checked_mul(per_unit)
            .and_then(|total| total.checked_div(config.base_quantity))
            .map(round_quantity)
            .ok_or_else(|| ValidationError::InvalidFormat {
                field: "quantity".to_string(),
                reason: "too large to convert".to_string(),
            })?;

        if required <= Decimal::ZERO {
            return Err(ValidationError::InvalidFormat {
                field: "quantity".to_string(),
                reason: "too small to deduct from stock".to_string(),
            }
            .into());
        }

        Ok(required)
    }

    /// Converts a selling-unit quantity into base-product records.
    ///
    /// ## Example
    /// 3 × "500 g pouch" under a 25 kg sack config:
    /// 3 × 500 g = 1.5 kg, 1.5 / 25 = 0.06 sacks.
    pub async fn convert_to_base_quantity(
        &self,
        selling_unit_id: &str,
        quantity: Decimal,
    ) -> BomResult<Decimal> {
        validate_positive_quantity("quantity", quantity)?;
        let SellingUnitWithConfig { unit, config } = self.load_unit(selling_unit_id).await?;
        self.base_quantity_for(&unit, &config, quantity)
    }

    /// Read-only availability check, in base-product records.
    ///
    /// With a selling unit, `quantity` counts selling units. Without one,
    /// `quantity` is in the config's base unit and is divided by its base
    /// quantity; a product without an active config is checked as-is.
    pub async fn check_base_stock_availability(
        &self,
        product_id: &str,
        quantity: Decimal,
        selling_unit_id: Option<&str>,
    ) -> BomResult<StockCheck> {
        validate_required_id("product_id", product_id)?;
        validate_positive_quantity("quantity", quantity)?;

        let (base_product_id, required) = match selling_unit_id {
            Some(unit_id) => {
                let SellingUnitWithConfig { unit, config } = self.load_unit(unit_id).await?;
                if config.product_id != product_id && config.base_product_id != product_id {
                    return Err(ValidationError::InvalidFormat {
                        field: "selling_unit_id".to_string(),
                        reason: format!("does not belong to product {}", product_id),
                    }
                    .into());
                }
                let required = self.base_quantity_for(&unit, &config, quantity)?;
                (config.base_product_id, required)
            }
            None => match self
                .db
                .auto_bom()
                .find_active_config_for_product(product_id)
                .await?
            {
                Some(config) => {
                    let required = quantity
                        .checked_div(config.base_quantity)
                        .map(round_quantity)
                        .ok_or_else(|| ValidationError::InvalidFormat {
                            field: "quantity".to_string(),
                            reason: "too large to convert".to_string(),
                        })?;
                    (config.base_product_id, required)
                }
                None => (product_id.to_string(), quantity),
            },
        };

        let product = self.load_product(&base_product_id).await?;
        let check = StockCheck::new(base_product_id, required, product.quantity);

        debug!(
            product_id = %check.base_product_id,
            required = %check.required,
            available = %check.available,
            sufficient = check.sufficient,
            "Checked base stock"
        );

        Ok(check)
    }

    // =========================================================================
    // Pricing
    // =========================================================================

    fn price_unit(
        &self,
        unit: &SellingUnit,
        config: &AutoBomConfig,
        product: &BaseProduct,
        extra: &PricingContext,
    ) -> BomResult<UnitPrice> {
        let unit_quantity = self.unit_quantity_in_base_unit(unit, config)?;
        let input = unit.pricing_input(unit_quantity, config.base_quantity);

        let mut extra = extra.clone();
        if extra.current_stock.is_none() {
            extra.current_stock = Some(product.quantity);
        }

        Ok(unit
            .pricing_strategy
            .calculate_price(&input, product.cost(), &extra)?)
    }

    /// Prices one selling unit with the current base cost and stock.
    ///
    /// A `current_stock` in `extra` takes precedence over the stored stock.
    pub async fn calculate_selling_unit_price(
        &self,
        selling_unit_id: &str,
        extra: &PricingContext,
    ) -> BomResult<UnitPrice> {
        let SellingUnitWithConfig { unit, config } = self.load_unit(selling_unit_id).await?;
        let product = self.load_product(&config.base_product_id).await?;

        let price = self.price_unit(&unit, &config, &product, extra)?;

        debug!(
            unit_id = %selling_unit_id,
            strategy = %unit.pricing_strategy,
            price = %price,
            "Calculated selling unit price"
        );

        Ok(price)
    }

    // =========================================================================
    // Sale Path
    // =========================================================================

    /// Loads, checks stock and prices a sale without writing anything.
    pub async fn prepare_sale(&self, request: &SaleRequest) -> BomResult<SalePlan> {
        validate_positive_quantity("quantity", request.quantity)?;

        let SellingUnitWithConfig { unit, config } =
            self.load_unit(&request.selling_unit_id).await?;

        if !unit.is_active() {
            return Err(BomError::not_found("Selling unit", unit.id));
        }
        if !config.is_active {
            return Err(BomError::not_found("Auto-BOM config", config.id));
        }

        if let Some(max) = unit.max_quantity_per_sale {
            if request.quantity > max {
                return Err(ValidationError::OutOfRange {
                    field: "quantity".to_string(),
                    min: Decimal::ZERO,
                    max,
                }
                .into());
            }
        }

        let product = self.load_product(&config.base_product_id).await?;

        let required = self.base_quantity_for(&unit, &config, request.quantity)?;
        let stock = StockCheck::new(&product.id, required, product.quantity);
        if !stock.sufficient {
            return Err(CoreError::insufficient_stock(stock.required, stock.available).into());
        }

        let unit_price = match request.unit_price_override_cents {
            Some(cents) => {
                validate_price_cents("unit_price_override_cents", cents)?;
                UnitPrice::from_cents(cents)
            }
            None => {
                let extra = request.pricing.clone().unwrap_or_default();
                self.price_unit(&unit, &config, &product, &extra)?
            }
        };

        Ok(SalePlan {
            selling_unit_id: unit.id,
            config_id: config.id,
            base_product_id: product.id,
            quantity: request.quantity,
            unit_price,
            stock,
            sold_by: self.actor(request.sold_by.as_deref()),
        })
    }

    /// Commits a prepared sale: guarded deduction plus sale log, atomically.
    ///
    /// ## Returns
    /// * `Err(BomError::InventoryDeduction)` - stock changed since the plan
    ///   was made; nothing was written
    pub async fn execute_sale(&self, plan: &SalePlan) -> BomResult<SaleReceipt> {
        let base_quantity = plan.base_quantity();
        let line_total = plan
            .unit_price
            .times_quantity(plan.quantity)
            .ok_or_else(|| CoreError::InvalidPrice("line total overflows".to_string()))?;

        let mut tx = self.begin().await?;

        let deducted =
            ProductRepository::deduct_stock(&mut *tx, &plan.base_product_id, base_quantity).await?;
        if !deducted {
            warn!(
                product_id = %plan.base_product_id,
                required = %base_quantity,
                unit_id = %plan.selling_unit_id,
                "Stock changed before deduction"
            );
            return Err(BomError::InventoryDeduction {
                product_id: plan.base_product_id.clone(),
                required: base_quantity,
            });
        }

        let entry = SaleLogEntry {
            id: generate_id(),
            selling_unit_id: plan.selling_unit_id.clone(),
            base_product_id: plan.base_product_id.clone(),
            quantity: plan.quantity,
            unit_price: plan.unit_price,
            line_total_cents: line_total.cents(),
            base_quantity_deducted: base_quantity,
            sold_by: plan.sold_by.clone(),
            created_at: chrono::Utc::now(),
        };
        SaleLogRepository::insert(&mut *tx, &entry).await?;

        let remaining = ProductRepository::stock_in(&mut *tx, &plan.base_product_id).await?;

        self.commit(tx).await?;

        info!(
            sale_id = %entry.id,
            unit_id = %plan.selling_unit_id,
            quantity = %plan.quantity,
            unit_price = %plan.unit_price,
            deducted = %base_quantity,
            remaining = %remaining,
            "Auto-BOM sale committed"
        );

        Ok(SaleReceipt {
            sale_id: entry.id,
            selling_unit_id: entry.selling_unit_id,
            quantity: plan.quantity,
            unit_price: plan.unit_price,
            line_total,
            base_quantity_deducted: base_quantity,
            remaining_base_quantity: remaining,
        })
    }

    /// Prepares and commits a sale.
    pub async fn sell_selling_unit(&self, request: &SaleRequest) -> BomResult<SaleReceipt> {
        let plan = self.prepare_sale(request).await?;
        self.execute_sale(&plan).await
    }

    pub async fn sales_for_unit(&self, selling_unit_id: &str) -> BomResult<Vec<SaleLogEntry>> {
        Ok(self.db.sale_log().list_for_unit(selling_unit_id).await?)
    }

    // =========================================================================
    // Repricing
    // =========================================================================

    /// Recomputes and stores the price of every unit under a configuration.
    ///
    /// Stored shelf prices are whole cents; sales reprice at full precision.
    ///
    /// A unit that fails to price is logged and reported; the rest are
    /// still repriced. Each stored change is its own transaction.
    pub async fn update_prices_based_on_strategy(
        &self,
        config_id: &str,
        changed_by: Option<&str>,
    ) -> BomResult<RepriceReport> {
        let config = self
            .db
            .auto_bom()
            .get_config(config_id)
            .await?
            .ok_or_else(|| BomError::not_found("Auto-BOM config", config_id))?;
        let product = self.load_product(&config.base_product_id).await?;
        let units = self.db.auto_bom().list_units(config_id).await?;
        let actor = self.actor(changed_by);

        let mut report = RepriceReport::new(config_id);

        for unit in &units {
            match self.reprice_unit(unit, &config, &product, &actor).await {
                Ok(true) => report.updated.push(unit.id.clone()),
                Ok(false) => report.unchanged.push(unit.id.clone()),
                Err(e) => {
                    warn!(
                        unit_id = %unit.id,
                        strategy = %unit.pricing_strategy,
                        error = %e,
                        "Repricing failed for selling unit"
                    );
                    report.failed.push(RepriceFailure {
                        selling_unit_id: unit.id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            config_id = %config_id,
            updated = report.updated.len(),
            unchanged = report.unchanged.len(),
            failed = report.failed.len(),
            "Batch repricing finished"
        );

        Ok(report)
    }

    /// Returns whether the stored price changed.
    async fn reprice_unit(
        &self,
        unit: &SellingUnit,
        config: &AutoBomConfig,
        product: &BaseProduct,
        actor: &str,
    ) -> BomResult<bool> {
        let price = self
            .price_unit(unit, config, product, &PricingContext::default())?
            .rounded()
            .ok_or_else(|| CoreError::InvalidPrice("price does not fit in cents".to_string()))?;

        if unit.current_price_cents == Some(price.cents()) {
            return Ok(false);
        }

        self.write_price(&unit.id, price.cents(), &self.settings.reprice_reason, actor)
            .await?;
        Ok(true)
    }

    /// Sets a unit's price by hand, recording the change.
    pub async fn update_selling_unit_price(
        &self,
        selling_unit_id: &str,
        price_cents: i64,
        reason: &str,
        changed_by: Option<&str>,
    ) -> BomResult<PriceHistoryEntry> {
        validate_price_cents("price_cents", price_cents)?;
        validate_name("reason", reason)?;

        let actor = self.actor(changed_by);
        self.write_price(selling_unit_id, price_cents, reason.trim(), &actor)
            .await
    }

    async fn write_price(
        &self,
        selling_unit_id: &str,
        new_price_cents: i64,
        reason: &str,
        changed_by: &str,
    ) -> BomResult<PriceHistoryEntry> {
        let mut tx = self.begin().await?;

        let unit = AutoBomRepository::find_unit_in(&mut *tx, selling_unit_id)
            .await?
            .ok_or_else(|| BomError::not_found("Selling unit", selling_unit_id))?;

        AutoBomRepository::set_unit_price(&mut *tx, selling_unit_id, new_price_cents).await?;

        let entry = PriceHistoryEntry {
            id: generate_id(),
            selling_unit_id: selling_unit_id.to_string(),
            old_price_cents: unit.current_price_cents,
            new_price_cents,
            reason: reason.to_string(),
            changed_by: changed_by.to_string(),
            created_at: chrono::Utc::now(),
        };
        let outcome = self.history.record(&mut *tx, &entry).await;

        self.commit(tx).await?;

        debug!(
            unit_id = %selling_unit_id,
            old = ?entry.old_price_cents,
            new = new_price_cents,
            history = ?outcome,
            "Selling unit price stored"
        );

        Ok(entry)
    }

    /// Price changes of a unit, newest first.
    pub async fn price_history(&self, selling_unit_id: &str) -> BomResult<Vec<PriceHistoryEntry>> {
        Ok(self.db.price_history().list_for_unit(selling_unit_id).await?)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn actor(&self, given: Option<&str>) -> String {
        given
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .unwrap_or(self.settings.default_actor.as_str())
            .to_string()
    }

    async fn begin(&self) -> BomResult<Transaction<'static, Sqlite>> {
        self.db
            .pool()
            .begin()
            .await
            .map_err(|e| BomError::Transaction(e.to_string()))
    }

    async fn commit(&self, tx: Transaction<'static, Sqlite>) -> BomResult<()> {
        tx.commit()
            .await
            .map_err(|e| BomError::Transaction(e.to_string()))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::history::SELLING_UNIT_ENTITY;
    use autobom_core::{NewBaseProduct, PricingParams, PricingStrategy, UnitStatus};
    use std::time::Duration;
    use tempfile::TempDir;

    async fn manager() -> AutoBomManager {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        AutoBomManager::new(db, UnitConverter::default(), PricingSettings::default())
    }

    /// A file database with a real multi-connection pool.
    async fn file_manager(dir: &TempDir, busy_timeout: Duration) -> AutoBomManager {
        let config = DbConfig::new(dir.path().join("autobom.db"))
            .max_connections(4)
            .busy_timeout(busy_timeout);
        let db = Database::new(config).await.unwrap();
        AutoBomManager::new(db, UnitConverter::default(), PricingSettings::default())
    }

    /// A 25 kg rice sack: $50.00 cost, 4 in stock.
    async fn rice(manager: &AutoBomManager) -> BaseProduct {
        manager
            .database()
            .products()
            .insert(&NewBaseProduct {
                sku: "RICE-25KG".into(),
                name: "Rice 25kg sack".into(),
                cost_cents: 5000,
                price_cents: 6500,
                quantity: Decimal::from(4),
            })
            .await
            .unwrap()
    }

    fn cost_unit(name: &str, qty: i64, markup: i64) -> NewSellingUnit {
        NewSellingUnit {
            unit_name: name.into(),
            unit_quantity: Decimal::from(qty),
            pricing_strategy: "cost_based".into(),
            pricing: PricingParams {
                markup_percent: Decimal::from(markup),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn fixed_unit(name: &str, qty: i64, uom: Option<&str>, price: Option<i64>) -> NewSellingUnit {
        NewSellingUnit {
            unit_name: name.into(),
            unit_quantity: Decimal::from(qty),
            unit_of_measure: uom.map(String::from),
            pricing_strategy: "fixed".into(),
            pricing: PricingParams {
                fixed_price_cents: price,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn rice_config(product: &BaseProduct, units: Vec<NewSellingUnit>) -> NewAutoBomConfig {
        NewAutoBomConfig {
            product_id: product.id.clone(),
            base_product_id: product.id.clone(),
            config_name: "Rice by weight".into(),
            base_unit: "kg".into(),
            base_quantity: Decimal::from(25),
            created_by: Some("admin".into()),
            selling_units: units,
            ..Default::default()
        }
    }

    /// 1 kg bag (+20%), 5 kg bag (+10%), 500 g pouch ($1.50 fixed).
    async fn setup() -> (AutoBomManager, BaseProduct, AutoBomConfig, Vec<SellingUnit>) {
        setup_on(manager().await).await
    }

    async fn setup_on(
        manager: AutoBomManager,
    ) -> (AutoBomManager, BaseProduct, AutoBomConfig, Vec<SellingUnit>) {
        let product = rice(&manager).await;
        let (config, units) = manager
            .create_auto_bom_config(&rice_config(
                &product,
                vec![
                    cost_unit("1kg bag", 1, 20),
                    cost_unit("5kg bag", 5, 10),
                    fixed_unit("500g pouch", 500, Some("g"), Some(150)),
                ],
            ))
            .await
            .unwrap();
        (manager, product, config, units)
    }

    fn sale(unit_id: &str, qty: i64) -> SaleRequest {
        SaleRequest {
            selling_unit_id: unit_id.to_string(),
            quantity: Decimal::from(qty),
            unit_price_override_cents: None,
            sold_by: Some("cashier-1".into()),
            pricing: None,
        }
    }

    async fn stock(manager: &AutoBomManager, product_id: &str) -> Decimal {
        manager
            .database()
            .products()
            .get_by_id(product_id)
            .await
            .unwrap()
            .unwrap()
            .quantity
    }

    // -------------------------------------------------------------------------
    // Configuration
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_create_config_flags_product_and_defaults_units() {
        let (manager, product, config, units) = setup().await;

        assert_eq!(config.created_by, "admin");
        assert_eq!(units.len(), 3);

        let product = manager
            .database()
            .products()
            .get_by_id(&product.id)
            .await
            .unwrap()
            .unwrap();
        assert!(product.is_auto_bom_enabled);

        let stored = manager.database().auto_bom().list_units(&config.id).await.unwrap();
        assert_eq!(stored.len(), 3);
        for unit in &stored {
            assert_eq!(unit.priority, 0);
            assert_eq!(unit.status, UnitStatus::Active);
            assert_eq!(unit.pricing.demand_multiplier, Decimal::ONE);
        }
    }

    #[tokio::test]
    async fn test_create_config_rolls_back_when_a_unit_fails() {
        let manager = manager().await;
        let product = rice(&manager).await;

        let err = manager
            .create_auto_bom_config(&rice_config(
                &product,
                vec![cost_unit("1kg bag", 1, 20), cost_unit("empty bag", 0, 20)],
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, BomError::Validation(_)));

        let configs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM auto_bom_configs")
            .fetch_one(manager.database().pool())
            .await
            .unwrap();
        assert_eq!(configs, 0);

        let units: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM selling_units")
            .fetch_one(manager.database().pool())
            .await
            .unwrap();
        assert_eq!(units, 0);

        let product = manager
            .database()
            .products()
            .get_by_id(&product.id)
            .await
            .unwrap()
            .unwrap();
        assert!(!product.is_auto_bom_enabled);
    }

    #[tokio::test]
    async fn test_create_config_validation() {
        let manager = manager().await;
        let product = rice(&manager).await;

        let mut input = rice_config(&product, vec![]);
        input.base_quantity = Decimal::ZERO;
        let err = manager.create_auto_bom_config(&input).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);

        let mut input = rice_config(&product, vec![]);
        input.config_name = "  ".into();
        let err = manager.create_auto_bom_config(&input).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);

        let mut input = rice_config(&product, vec![]);
        input.base_unit = "bushel".into();
        let err = manager.create_auto_bom_config(&input).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnknownUnit);

        let mut input = rice_config(&product, vec![]);
        input.base_product_id = "missing".into();
        let err = manager.create_auto_bom_config(&input).await.unwrap_err();
        assert!(matches!(err, BomError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_create_selling_unit_rejects_bad_strategy_and_units() {
        let (manager, _, config, _) = setup().await;

        let mut unknown = cost_unit("mystery", 1, 0);
        unknown.pricing_strategy = "auction".into();
        let err = manager.create_selling_unit(&config.id, &unknown).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnknownStrategy);

        let liquid = fixed_unit("1l bottle", 1, Some("l"), Some(100));
        let err = manager.create_selling_unit(&config.id, &liquid).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::IncompatibleUnits);

        let err = manager
            .create_selling_unit("missing", &cost_unit("1kg bag", 1, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, BomError::NotFound { .. }));

        let unit = manager
            .create_selling_unit(&config.id, &cost_unit("10kg bag", 10, 5))
            .await
            .unwrap();
        assert_eq!(unit.pricing_strategy, PricingStrategy::CostBased);
    }

    // -------------------------------------------------------------------------
    // Conversion, stock, pricing
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_convert_to_base_quantity() {
        let (manager, _, _, units) = setup().await;

        let bags = manager
            .convert_to_base_quantity(&units[0].id, Decimal::from(5))
            .await
            .unwrap();
        assert_eq!(bags, Decimal::new(2, 1));

        // 3 × 500 g = 1.5 kg of a 25 kg sack
        let pouches = manager
            .convert_to_base_quantity(&units[2].id, Decimal::from(3))
            .await
            .unwrap();
        assert_eq!(pouches, Decimal::new(6, 2));
    }

    #[tokio::test]
    async fn test_check_stock_without_selling_unit() {
        let (manager, product, _, _) = setup().await;

        let check = manager
            .check_base_stock_availability(&product.id, Decimal::from(50), None)
            .await
            .unwrap();
        assert_eq!(check.required, Decimal::from(2));
        assert!(check.sufficient);

        let check = manager
            .check_base_stock_availability(&product.id, Decimal::from(125), None)
            .await
            .unwrap();
        assert!(!check.sufficient);
        assert_eq!(check.shortage, Decimal::ONE);
    }

    #[tokio::test]
    async fn test_check_stock_with_selling_unit() {
        let (manager, product, _, units) = setup().await;

        let check = manager
            .check_base_stock_availability(&product.id, Decimal::from(21), Some(&units[1].id))
            .await
            .unwrap();
        assert_eq!(check.required, Decimal::new(42, 1));
        assert_eq!(check.shortage, Decimal::new(2, 1));

        let other = manager
            .database()
            .products()
            .insert(&NewBaseProduct {
                sku: "SUGAR-1KG".into(),
                name: "Sugar".into(),
                cost_cents: 100,
                price_cents: 150,
                quantity: Decimal::from(10),
            })
            .await
            .unwrap();
        let err = manager
            .check_base_stock_availability(&other.id, Decimal::ONE, Some(&units[0].id))
            .await
            .unwrap_err();
        assert!(matches!(err, BomError::Validation(_)));

        // No config: quantity is already in base-product records
        let check = manager
            .check_base_stock_availability(&other.id, Decimal::from(3), None)
            .await
            .unwrap();
        assert_eq!(check.required, Decimal::from(3));
        assert!(check.sufficient);
    }

    #[tokio::test]
    async fn test_calculate_selling_unit_price() {
        let (manager, _, _, units) = setup().await;
        let ctx = PricingContext::default();

        let one_kg = manager.calculate_selling_unit_price(&units[0].id, &ctx).await.unwrap();
        let five_kg = manager.calculate_selling_unit_price(&units[1].id, &ctx).await.unwrap();
        let pouch = manager.calculate_selling_unit_price(&units[2].id, &ctx).await.unwrap();

        // $50 / 25 kg = $2.00 per kg
        assert_eq!(one_kg, UnitPrice::from_cents(240));
        assert_eq!(five_kg, UnitPrice::from_cents(1100));
        assert_eq!(pouch, UnitPrice::from_cents(150));
    }

    #[tokio::test]
    async fn test_price_uses_converted_unit_quantity() {
        let (manager, _, config, _) = setup().await;

        let mut grams = cost_unit("250g scoop", 250, 0);
        grams.unit_of_measure = Some("g".into());
        let unit = manager.create_selling_unit(&config.id, &grams).await.unwrap();

        // 0.25 kg × $2.00
        let price = manager
            .calculate_selling_unit_price(&unit.id, &PricingContext::default())
            .await
            .unwrap();
        assert_eq!(price, UnitPrice::from_cents(50));
    }

    #[tokio::test]
    async fn test_available_units_ordering() {
        let (manager, product, config, _) = setup().await;

        let mut promo = cost_unit("promo 2kg", 2, 0);
        promo.priority = Some(10);
        manager.create_selling_unit(&config.id, &promo).await.unwrap();

        let mut hidden = cost_unit("hidden", 3, 0);
        hidden.status = Some(UnitStatus::Inactive);
        manager.create_selling_unit(&config.id, &hidden).await.unwrap();

        let names: Vec<String> = manager
            .get_available_selling_units(&product.id)
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.unit.unit_name)
            .collect();
        assert_eq!(names, vec!["promo 2kg", "500g pouch", "1kg bag", "5kg bag"]);

        manager.deactivate_config(&config.id).await.unwrap();
        assert!(manager
            .get_available_selling_units(&product.id)
            .await
            .unwrap()
            .is_empty());
    }

    // -------------------------------------------------------------------------
    // Sale path
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_sell_deducts_and_logs() {
        let (manager, product, _, units) = setup().await;

        let receipt = manager.sell_selling_unit(&sale(&units[1].id, 5)).await.unwrap();

        assert_eq!(receipt.unit_price, UnitPrice::from_cents(1100));
        assert_eq!(receipt.line_total.cents(), 5500);
        assert_eq!(receipt.base_quantity_deducted, Decimal::ONE);
        assert_eq!(receipt.remaining_base_quantity, Decimal::from(3));
        assert_eq!(stock(&manager, &product.id).await, Decimal::from(3));

        let sales = manager.sales_for_unit(&units[1].id).await.unwrap();
        assert_eq!(sales.len(), 1);
        assert_eq!(sales[0].sold_by, "cashier-1");
        assert_eq!(sales[0].base_quantity_deducted, Decimal::ONE);
    }

    #[tokio::test]
    async fn test_sell_with_price_override_and_default_actor() {
        let (manager, _, _, units) = setup().await;

        let mut request = sale(&units[0].id, 2);
        request.unit_price_override_cents = Some(199);
        request.sold_by = None;

        let receipt = manager.sell_selling_unit(&request).await.unwrap();
        assert_eq!(receipt.unit_price, UnitPrice::from_cents(199));
        assert_eq!(receipt.line_total.cents(), 398);

        let sales = manager.sales_for_unit(&units[0].id).await.unwrap();
        assert_eq!(sales[0].sold_by, "system");

        request.unit_price_override_cents = Some(-1);
        let err = manager.sell_selling_unit(&request).await.unwrap_err();
        assert!(matches!(err, BomError::Validation(_)));
    }

    #[tokio::test]
    async fn test_sell_insufficient_stock_writes_nothing() {
        let (manager, product, _, units) = setup().await;

        let err = manager.sell_selling_unit(&sale(&units[1].id, 21)).await.unwrap_err();
        match err {
            BomError::InsufficientStock {
                required,
                available,
                shortage,
            } => {
                assert_eq!(required, Decimal::new(42, 1));
                assert_eq!(available, Decimal::from(4));
                assert_eq!(shortage, Decimal::new(2, 1));
            }
            other => panic!("expected InsufficientStock, got {:?}", other),
        }

        assert_eq!(stock(&manager, &product.id).await, Decimal::from(4));
        assert!(manager.sales_for_unit(&units[1].id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_max_quantity_per_sale() {
        let (manager, _, config, _) = setup().await;

        let mut limited = cost_unit("limited 1kg", 1, 0);
        limited.max_quantity_per_sale = Some(Decimal::from(2));
        let unit = manager.create_selling_unit(&config.id, &limited).await.unwrap();

        assert!(manager.sell_selling_unit(&sale(&unit.id, 2)).await.is_ok());
        let err = manager.sell_selling_unit(&sale(&unit.id, 3)).await.unwrap_err();
        assert!(matches!(err, BomError::Validation(_)));
    }

    #[tokio::test]
    async fn test_inactive_units_and_configs_cannot_be_sold() {
        let (manager, _, config, units) = setup().await;

        let mut hidden = cost_unit("hidden", 1, 0);
        hidden.status = Some(UnitStatus::Inactive);
        let hidden = manager.create_selling_unit(&config.id, &hidden).await.unwrap();

        let err = manager.sell_selling_unit(&sale(&hidden.id, 1)).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);

        manager.deactivate_config(&config.id).await.unwrap();
        let err = manager.sell_selling_unit(&sale(&units[0].id, 1)).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);

        let err = manager.sell_selling_unit(&sale("missing", 1)).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_concurrent_sales_for_last_stock() {
        let (manager, product, config, _) = setup().await;

        // 100 × 1 kg = 4 sacks, the whole stock
        let unit = manager
            .create_selling_unit(&config.id, &cost_unit("loose kg", 1, 0))
            .await
            .unwrap();

        let first = manager.prepare_sale(&sale(&unit.id, 100)).await.unwrap();
        let second = manager.prepare_sale(&sale(&unit.id, 100)).await.unwrap();
        assert!(first.stock.sufficient && second.stock.sufficient);

        let (a, b) = tokio::join!(manager.execute_sale(&first), manager.execute_sale(&second));

        let (ok, err) = match (a, b) {
            (Ok(receipt), Err(e)) | (Err(e), Ok(receipt)) => (receipt, e),
            (a, b) => panic!("expected exactly one success, got {:?} / {:?}", a, b),
        };

        assert_eq!(ok.remaining_base_quantity, Decimal::ZERO);
        assert!(matches!(err, BomError::InventoryDeduction { .. }));
        assert!(err.is_retryable());
        assert_eq!(err.user_message(), "Stock changed, please retry");

        assert_eq!(stock(&manager, &product.id).await, Decimal::ZERO);
        assert_eq!(manager.sales_for_unit(&unit.id).await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_parallel_sales_on_file_database() {
        let dir = TempDir::new().unwrap();
        let (manager, product, config, _) =
            setup_on(file_manager(&dir, Duration::from_secs(5)).await).await;
        let unit = manager
            .create_selling_unit(&config.id, &cost_unit("loose kg", 1, 0))
            .await
            .unwrap();

        // Both plans see 4 sacks; only one can take them.
        let first = manager.prepare_sale(&sale(&unit.id, 100)).await.unwrap();
        let second = manager.prepare_sale(&sale(&unit.id, 100)).await.unwrap();

        let a = tokio::spawn({
            let manager = manager.clone();
            async move { manager.execute_sale(&first).await }
        });
        let b = tokio::spawn({
            let manager = manager.clone();
            async move { manager.execute_sale(&second).await }
        });
        let (a, b) = (a.await.unwrap(), b.await.unwrap());

        let err = match (a, b) {
            (Ok(_), Err(e)) | (Err(e), Ok(_)) => e,
            (a, b) => panic!("expected exactly one success, got {:?} / {:?}", a, b),
        };
        assert!(matches!(err, BomError::InventoryDeduction { .. }), "{:?}", err);
        assert!(err.is_retryable());

        assert_eq!(stock(&manager, &product.id).await, Decimal::ZERO);
        assert_eq!(manager.sales_for_unit(&unit.id).await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_racing_full_sales_on_file_database() {
        let dir = TempDir::new().unwrap();
        let (manager, product, config, _) =
            setup_on(file_manager(&dir, Duration::from_secs(5)).await).await;
        let unit = manager
            .create_selling_unit(&config.id, &cost_unit("loose kg", 1, 0))
            .await
            .unwrap();

        let a = tokio::spawn({
            let manager = manager.clone();
            let request = sale(&unit.id, 100);
            async move { manager.sell_selling_unit(&request).await }
        });
        let b = tokio::spawn({
            let manager = manager.clone();
            let request = sale(&unit.id, 100);
            async move { manager.sell_selling_unit(&request).await }
        });
        let (a, b) = (a.await.unwrap(), b.await.unwrap());

        // The loser fails at the guarded decrement or, if it started
        // after the winner committed, at the stock check.
        let err = match (a, b) {
            (Ok(_), Err(e)) | (Err(e), Ok(_)) => e,
            (a, b) => panic!("expected exactly one success, got {:?} / {:?}", a, b),
        };
        assert!(
            matches!(
                err,
                BomError::InventoryDeduction { .. } | BomError::InsufficientStock { .. }
            ),
            "{:?}",
            err
        );

        assert_eq!(stock(&manager, &product.id).await, Decimal::ZERO);
        assert_eq!(manager.sales_for_unit(&unit.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_locked_database_is_a_retryable_transaction_error() {
        let dir = TempDir::new().unwrap();
        let (manager, product, _, units) =
            setup_on(file_manager(&dir, Duration::from_millis(100)).await).await;

        // Another terminal holds the write lock.
        let mut holder = manager.database().pool().acquire().await.unwrap();
        sqlx::query("BEGIN IMMEDIATE")
            .execute(&mut *holder)
            .await
            .unwrap();

        let err = manager.sell_selling_unit(&sale(&units[0].id, 1)).await.unwrap_err();
        assert!(matches!(err, BomError::Transaction(_)), "{:?}", err);
        assert_eq!(err.code(), ErrorCode::TransactionError);
        assert!(err.is_retryable());
        assert_eq!(err.user_message(), "The sale could not be saved, please retry");

        sqlx::query("ROLLBACK").execute(&mut *holder).await.unwrap();
        drop(holder);

        assert_eq!(stock(&manager, &product.id).await, Decimal::from(4));
        assert!(manager.sell_selling_unit(&sale(&units[0].id, 1)).await.is_ok());
    }

    #[tokio::test]
    async fn test_gram_unit_keeps_sub_cent_price_through_the_sale() {
        let (manager, product, config, _) = setup().await;

        let mut gram = cost_unit("1 g", 1, 0);
        gram.unit_of_measure = Some("g".into());
        let gram = manager.create_selling_unit(&config.id, &gram).await.unwrap();

        // $50.00 / 25 000 g = 0.2¢ per gram
        let price = manager
            .calculate_selling_unit_price(&gram.id, &PricingContext::default())
            .await
            .unwrap();
        assert_eq!(price.as_decimal_cents(), Decimal::new(2, 1));

        let receipt = manager.sell_selling_unit(&sale(&gram.id, 500)).await.unwrap();
        assert_eq!(receipt.unit_price, price);
        assert_eq!(receipt.line_total.cents(), 100);
        assert_eq!(receipt.base_quantity_deducted, Decimal::new(2, 2));
        assert_eq!(stock(&manager, &product.id).await, Decimal::new(398, 2));

        let sales = manager.sales_for_unit(&gram.id).await.unwrap();
        assert_eq!(sales[0].unit_price, price);
        assert_eq!(sales[0].line_total_cents, 100);
    }

    #[tokio::test]
    async fn test_sale_pricing_context_reaches_the_strategy() {
        let (manager, _, config, _) = setup().await;

        let market = NewSellingUnit {
            unit_name: "market 1kg".into(),
            unit_quantity: Decimal::ONE,
            pricing_strategy: "market_based".into(),
            pricing: PricingParams {
                market_price_cents: Some(300),
                ..Default::default()
            },
            ..Default::default()
        };
        let unit = manager.create_selling_unit(&config.id, &market).await.unwrap();

        let plain = manager.sell_selling_unit(&sale(&unit.id, 1)).await.unwrap();
        assert_eq!(plain.unit_price, UnitPrice::from_cents(300));

        let mut request = sale(&unit.id, 2);
        request.pricing = Some(PricingContext {
            market_adjustment_percent: Some(Decimal::from(-10)),
            ..Default::default()
        });
        let discounted = manager.sell_selling_unit(&request).await.unwrap();
        assert_eq!(discounted.unit_price, UnitPrice::from_cents(270));
        assert_eq!(discounted.line_total.cents(), 540);
    }

    // -------------------------------------------------------------------------
    // Repricing & history
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_batch_repricing_survives_a_broken_unit() {
        let manager = manager().await;
        let product = rice(&manager).await;
        let (config, units) = manager
            .create_auto_bom_config(&rice_config(
                &product,
                vec![
                    cost_unit("1kg bag", 1, 20),
                    fixed_unit("unpriced 2kg", 2, None, None),
                    cost_unit("5kg bag", 5, 10),
                ],
            ))
            .await
            .unwrap();

        let report = manager
            .update_prices_based_on_strategy(&config.id, Some("pricing-bot"))
            .await
            .unwrap();

        assert_eq!(report.attempted(), 3);
        assert_eq!(report.updated.len(), 2);
        assert!(report.updated.contains(&units[0].id));
        assert!(report.updated.contains(&units[2].id));
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].selling_unit_id, units[1].id);

        let repo = manager.database().auto_bom();
        let one_kg = repo.get_unit(&units[0].id).await.unwrap().unwrap();
        let five_kg = repo.get_unit(&units[2].id).await.unwrap().unwrap();
        assert_eq!(one_kg.current_price_cents, Some(240));
        assert_eq!(five_kg.current_price_cents, Some(1100));

        let history = manager.price_history(&units[0].id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].old_price_cents, None);
        assert_eq!(history[0].changed_by, "pricing-bot");
        assert_eq!(history[0].reason, "strategy repricing");

        // Second run: nothing moved
        let report = manager
            .update_prices_based_on_strategy(&config.id, None)
            .await
            .unwrap();
        assert_eq!(report.unchanged.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(manager.price_history(&units[0].id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_repricing_falls_back_to_audit_log() {
        let (manager, _, config, units) = setup().await;

        sqlx::query("DROP TABLE price_history")
            .execute(manager.database().pool())
            .await
            .unwrap();

        let report = manager
            .update_prices_based_on_strategy(&config.id, None)
            .await
            .unwrap();
        assert_eq!(report.updated.len(), 3);
        assert!(report.failed.is_empty());

        let unit = manager
            .database()
            .auto_bom()
            .get_unit(&units[0].id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(unit.current_price_cents, Some(240));

        let audit = manager
            .database()
            .price_history()
            .audit_for(SELLING_UNIT_ENTITY, &units[0].id)
            .await
            .unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].actor, "system");
    }

    #[tokio::test]
    async fn test_manual_price_update_records_history() {
        let (manager, _, _, units) = setup().await;

        let first = manager
            .update_selling_unit_price(&units[0].id, 260, "promo", Some("manager"))
            .await
            .unwrap();
        assert_eq!(first.old_price_cents, None);

        let second = manager
            .update_selling_unit_price(&units[0].id, 280, "promo over", None)
            .await
            .unwrap();
        assert_eq!(second.old_price_cents, Some(260));
        assert_eq!(second.changed_by, "system");

        let history = manager.price_history(&units[0].id).await.unwrap();
        let prices: Vec<i64> = history.iter().map(|h| h.new_price_cents).collect();
        assert_eq!(prices, vec![280, 260]);

        let err = manager
            .update_selling_unit_price(&units[0].id, 300, " ", None)
            .await
            .unwrap_err();
        assert!(matches!(err, BomError::Validation(_)));

        let err = manager
            .update_selling_unit_price("missing", 300, "promo", None)
            .await
            .unwrap_err();
        assert!(matches!(err, BomError::NotFound { .. }));
    }

    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_register_custom_unit() {
        let mut manager = manager().await;
        let before = manager.converter().clone();

        let catalog = manager
            .register_custom_unit("case_24", Decimal::from(24))
            .unwrap();
        assert_eq!(catalog.factor("case_24"), Some(Decimal::from(24)));

        let eaches = manager
            .converter()
            .convert(Decimal::from(2), "case_24", "each")
            .unwrap();
        assert_eq!(eaches, Decimal::from(48));
        assert!(!before.catalog().contains("case_24"));

        let err = manager
            .register_custom_unit("kg", Decimal::from(2))
            .unwrap_err();
        assert!(matches!(err, BomError::Validation(_)));
    }

    #[tokio::test]
    async fn test_from_config() {
        let config = EngineConfig::from_toml(
            r#"
            [database]
            path = ":memory:"

            [pricing]
            default_actor = "backoffice"

            [[units.custom]]
            name = "case_12"
            factor = 12
            "#,
        )
        .unwrap();

        let manager = AutoBomManager::from_config(&config).await.unwrap();
        assert!(manager.database().health_check().await);
        assert!(manager.converter().catalog().contains("case_12"));
        assert_eq!(manager.actor(None), "backoffice");
        assert_eq!(manager.actor(Some("cashier-2")), "cashier-2");
    }
}
