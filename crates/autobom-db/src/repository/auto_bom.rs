//! # Auto-BOM Repository
//!
//! Database operations for Auto-BOM configurations and their selling units.
//!
//! ## Ownership
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  auto_bom_configs (1) ──────────────► (N) selling_units                 │
//! │        │                                   ON DELETE CASCADE            │
//! │        │ is_active = 0 (soft)                                           │
//! │        ▼                                                                │
//! │  never deleted: sale log and price history keep pointing at units      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::{from_micros, parse_decimal, to_micros};
use autobom_core::{
    AutoBomConfig, PricingParams, PricingStrategy, PricingStrategyFactory, SellingUnit,
    SellingUnitWithConfig, UnitStatus,
};

const CONFIG_COLUMNS: &str = r#"
    id, product_id, base_product_id, config_name, base_unit, base_quantity_micros,
    description, is_active, created_by, created_at, updated_at
"#;

const UNIT_COLUMNS: &str = r#"
    id, config_id, unit_name, unit_quantity_micros, unit_of_measure, sku, barcode,
    pricing_strategy, fixed_price_cents, markup_percent, min_profit_margin_percent,
    market_price_cents, dynamic_base_price_cents, demand_multiplier, stock_threshold_micros,
    hybrid_primary, hybrid_fallback, hybrid_threshold_cents, status, priority,
    max_quantity_per_sale_micros, current_price_cents, created_at, updated_at
"#;

// =============================================================================
// Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ConfigRow {
    id: String,
    product_id: String,
    base_product_id: String,
    config_name: String,
    base_unit: String,
    base_quantity_micros: i64,
    description: Option<String>,
    is_active: bool,
    created_by: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ConfigRow> for AutoBomConfig {
    fn from(row: ConfigRow) -> Self {
        AutoBomConfig {
            id: row.id,
            product_id: row.product_id,
            base_product_id: row.base_product_id,
            config_name: row.config_name,
            base_unit: row.base_unit,
            base_quantity: from_micros(row.base_quantity_micros),
            description: row.description,
            is_active: row.is_active,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UnitRow {
    id: String,
    config_id: String,
    unit_name: String,
    unit_quantity_micros: i64,
    unit_of_measure: Option<String>,
    sku: Option<String>,
    barcode: Option<String>,
    pricing_strategy: String,
    fixed_price_cents: Option<i64>,
    markup_percent: String,
    min_profit_margin_percent: Option<String>,
    market_price_cents: Option<i64>,
    dynamic_base_price_cents: Option<i64>,
    demand_multiplier: String,
    stock_threshold_micros: Option<i64>,
    hybrid_primary: Option<String>,
    hybrid_fallback: Option<String>,
    hybrid_threshold_cents: Option<i64>,
    status: UnitStatus,
    priority: i64,
    max_quantity_per_sale_micros: Option<i64>,
    current_price_cents: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn parse_strategy(column: &str, token: &str) -> DbResult<PricingStrategy> {
    PricingStrategyFactory::create(token)
        .map_err(|e| DbError::InvalidData(format!("{}: {}", column, e)))
}

impl TryFrom<UnitRow> for SellingUnit {
    type Error = DbError;

    fn try_from(row: UnitRow) -> DbResult<Self> {
        let pricing = PricingParams {
            fixed_price_cents: row.fixed_price_cents,
            markup_percent: parse_decimal("markup_percent", &row.markup_percent)?,
            min_profit_margin_percent: row
                .min_profit_margin_percent
                .as_deref()
                .map(|v| parse_decimal("min_profit_margin_percent", v))
                .transpose()?,
            market_price_cents: row.market_price_cents,
            dynamic_base_price_cents: row.dynamic_base_price_cents,
            demand_multiplier: parse_decimal("demand_multiplier", &row.demand_multiplier)?,
            stock_threshold: row.stock_threshold_micros.map(from_micros),
            hybrid_primary: row
                .hybrid_primary
                .as_deref()
                .map(|t| parse_strategy("hybrid_primary", t))
                .transpose()?,
            hybrid_fallback: row
                .hybrid_fallback
                .as_deref()
                .map(|t| parse_strategy("hybrid_fallback", t))
                .transpose()?,
            hybrid_threshold_cents: row.hybrid_threshold_cents,
        };

        Ok(SellingUnit {
            pricing_strategy: parse_strategy("pricing_strategy", &row.pricing_strategy)?,
            id: row.id,
            config_id: row.config_id,
            unit_name: row.unit_name,
            unit_quantity: from_micros(row.unit_quantity_micros),
            unit_of_measure: row.unit_of_measure,
            sku: row.sku,
            barcode: row.barcode,
            pricing,
            status: row.status,
            priority: row.priority,
            max_quantity_per_sale: row.max_quantity_per_sale_micros.map(from_micros),
            current_price_cents: row.current_price_cents,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

async fn fetch_config<'e, E>(executor: E, id: &str) -> DbResult<Option<AutoBomConfig>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {} FROM auto_bom_configs WHERE id = ?1", CONFIG_COLUMNS);

    let row = sqlx::query_as::<_, ConfigRow>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?;

    Ok(row.map(AutoBomConfig::from))
}

async fn fetch_unit<'e, E>(executor: E, id: &str) -> DbResult<Option<SellingUnit>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {} FROM selling_units WHERE id = ?1", UNIT_COLUMNS);

    let row = sqlx::query_as::<_, UnitRow>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?;

    row.map(SellingUnit::try_from).transpose()
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for Auto-BOM configurations and selling units.
#[derive(Debug, Clone)]
pub struct AutoBomRepository {
    pool: SqlitePool,
}

impl AutoBomRepository {
    /// Creates a new AutoBomRepository.
    pub fn new(pool: SqlitePool) -> Self {
        AutoBomRepository { pool }
    }

    // -------------------------------------------------------------------------
    // Configurations
    // -------------------------------------------------------------------------

    /// Inserts a configuration row inside a caller's transaction.
    pub async fn insert_config(conn: &mut SqliteConnection, config: &AutoBomConfig) -> DbResult<()> {
        debug!(id = %config.id, name = %config.config_name, "Inserting Auto-BOM config");

        sqlx::query(
            r#"
            INSERT INTO auto_bom_configs (
                id, product_id, base_product_id, config_name, base_unit,
                base_quantity_micros, description, is_active, created_by,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&config.id)
        .bind(&config.product_id)
        .bind(&config.base_product_id)
        .bind(&config.config_name)
        .bind(&config.base_unit)
        .bind(to_micros(config.base_quantity)?)
        .bind(&config.description)
        .bind(config.is_active)
        .bind(&config.created_by)
        .bind(config.created_at)
        .bind(config.updated_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Gets a configuration by ID (active or not).
    pub async fn get_config(&self, id: &str) -> DbResult<Option<AutoBomConfig>> {
        fetch_config(&self.pool, id).await
    }

    /// Gets a configuration by ID inside a caller's transaction.
    pub async fn find_config_in(
        conn: &mut SqliteConnection,
        id: &str,
    ) -> DbResult<Option<AutoBomConfig>> {
        fetch_config(conn, id).await
    }

    /// Oldest active configuration whose parent or base product is `product_id`.
    pub async fn find_active_config_for_product(
        &self,
        product_id: &str,
    ) -> DbResult<Option<AutoBomConfig>> {
        let sql = format!(
            r#"
            SELECT {} FROM auto_bom_configs
            WHERE is_active = 1 AND (product_id = ?1 OR base_product_id = ?1)
            ORDER BY created_at, id
            LIMIT 1
            "#,
            CONFIG_COLUMNS
        );

        let row = sqlx::query_as::<_, ConfigRow>(&sql)
            .bind(product_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(AutoBomConfig::from))
    }

    /// Active configurations drawing from a base product.
    pub async fn list_active_configs_for_base(
        &self,
        base_product_id: &str,
    ) -> DbResult<Vec<AutoBomConfig>> {
        let sql = format!(
            r#"
            SELECT {} FROM auto_bom_configs
            WHERE is_active = 1 AND base_product_id = ?1
            ORDER BY created_at, id
            "#,
            CONFIG_COLUMNS
        );

        let rows = sqlx::query_as::<_, ConfigRow>(&sql)
            .bind(base_product_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(AutoBomConfig::from).collect())
    }

    /// Soft-deactivates a configuration. Deactivating twice is harmless.
    pub async fn deactivate_config(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deactivating Auto-BOM config");

        let result = sqlx::query(
            "UPDATE auto_bom_configs SET is_active = 0, updated_at = ?2 WHERE id = ?1",
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Auto-BOM config", id));
        }

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Selling Units
    // -------------------------------------------------------------------------

    /// Inserts a selling unit inside a caller's transaction.
    pub async fn insert_unit(conn: &mut SqliteConnection, unit: &SellingUnit) -> DbResult<()> {
        debug!(
            id = %unit.id,
            config_id = %unit.config_id,
            name = %unit.unit_name,
            strategy = %unit.pricing_strategy,
            "Inserting selling unit"
        );

        let p = &unit.pricing;

        sqlx::query(
            r#"
            INSERT INTO selling_units (
                id, config_id, unit_name, unit_quantity_micros, unit_of_measure, sku, barcode,
                pricing_strategy, fixed_price_cents, markup_percent, min_profit_margin_percent,
                market_price_cents, dynamic_base_price_cents, demand_multiplier,
                stock_threshold_micros, hybrid_primary, hybrid_fallback, hybrid_threshold_cents,
                status, priority, max_quantity_per_sale_micros, current_price_cents,
                created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7,
                ?8, ?9, ?10, ?11,
                ?12, ?13, ?14,
                ?15, ?16, ?17, ?18,
                ?19, ?20, ?21, ?22,
                ?23, ?24
            )
            "#,
        )
        .bind(&unit.id)
        .bind(&unit.config_id)
        .bind(&unit.unit_name)
        .bind(to_micros(unit.unit_quantity)?)
        .bind(&unit.unit_of_measure)
        .bind(&unit.sku)
        .bind(&unit.barcode)
        .bind(unit.pricing_strategy.as_str())
        .bind(p.fixed_price_cents)
        .bind(p.markup_percent.to_string())
        .bind(p.min_profit_margin_percent.map(|v| v.to_string()))
        .bind(p.market_price_cents)
        .bind(p.dynamic_base_price_cents)
        .bind(p.demand_multiplier.to_string())
        .bind(p.stock_threshold.map(to_micros).transpose()?)
        .bind(p.hybrid_primary.map(|s| s.as_str()))
        .bind(p.hybrid_fallback.map(|s| s.as_str()))
        .bind(p.hybrid_threshold_cents)
        .bind(unit.status)
        .bind(unit.priority)
        .bind(unit.max_quantity_per_sale.map(to_micros).transpose()?)
        .bind(unit.current_price_cents)
        .bind(unit.created_at)
        .bind(unit.updated_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Gets a selling unit by ID (active or not).
    pub async fn get_unit(&self, id: &str) -> DbResult<Option<SellingUnit>> {
        fetch_unit(&self.pool, id).await
    }

    /// Gets a selling unit by ID inside a caller's transaction.
    pub async fn find_unit_in(
        conn: &mut SqliteConnection,
        id: &str,
    ) -> DbResult<Option<SellingUnit>> {
        fetch_unit(conn, id).await
    }

    /// Gets a selling unit together with its parent configuration.
    pub async fn get_unit_with_config(&self, id: &str) -> DbResult<Option<SellingUnitWithConfig>> {
        let unit = match self.get_unit(id).await? {
            Some(unit) => unit,
            None => return Ok(None),
        };

        let config = self
            .get_config(&unit.config_id)
            .await?
            .ok_or_else(|| DbError::not_found("Auto-BOM config", &unit.config_id))?;

        Ok(Some(SellingUnitWithConfig { unit, config }))
    }

    /// All selling units of a configuration, by priority (desc) then size.
    pub async fn list_units(&self, config_id: &str) -> DbResult<Vec<SellingUnit>> {
        let sql = format!(
            r#"
            SELECT {} FROM selling_units
            WHERE config_id = ?1
            ORDER BY priority DESC, unit_quantity_micros, unit_name
            "#,
            UNIT_COLUMNS
        );

        let rows = sqlx::query_as::<_, UnitRow>(&sql)
            .bind(config_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(SellingUnit::try_from).collect()
    }

    /// Stores a unit's price inside a caller's transaction.
    pub async fn set_unit_price(
        conn: &mut SqliteConnection,
        id: &str,
        price_cents: i64,
    ) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE selling_units SET current_price_cents = ?2, updated_at = ?3 WHERE id = ?1",
        )
        .bind(id)
        .bind(price_cents)
        .bind(Utc::now())
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Selling unit", id));
        }

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::generate_id;
    use autobom_core::NewBaseProduct;
    use rust_decimal::Decimal;

    async fn setup() -> (Database, AutoBomConfig) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let rice = db
            .products()
            .insert(&NewBaseProduct {
                sku: "RICE-25KG".into(),
                name: "Rice 25kg sack".into(),
                cost_cents: 5000,
                price_cents: 6500,
                quantity: Decimal::from(4),
            })
            .await
            .unwrap();

        let now = Utc::now();
        let config = AutoBomConfig {
            id: generate_id(),
            product_id: rice.id.clone(),
            base_product_id: rice.id.clone(),
            config_name: "Rice by weight".into(),
            base_unit: "kg".into(),
            base_quantity: Decimal::from(25),
            description: None,
            is_active: true,
            created_by: "admin".into(),
            created_at: now,
            updated_at: now,
        };

        let mut conn = db.pool().acquire().await.unwrap();
        AutoBomRepository::insert_config(&mut conn, &config).await.unwrap();
        drop(conn);

        (db, config)
    }

    fn unit(config_id: &str, name: &str, qty: i64, priority: i64) -> SellingUnit {
        let now = Utc::now();
        SellingUnit {
            id: generate_id(),
            config_id: config_id.to_string(),
            unit_name: name.to_string(),
            unit_quantity: Decimal::from(qty),
            unit_of_measure: None,
            sku: None,
            barcode: None,
            pricing_strategy: PricingStrategy::Hybrid,
            pricing: PricingParams {
                markup_percent: Decimal::new(125, 1),
                min_profit_margin_percent: Some(Decimal::from(5)),
                stock_threshold: Some(Decimal::new(15, 1)),
                hybrid_primary: Some(PricingStrategy::MarketBased),
                hybrid_fallback: Some(PricingStrategy::CostBased),
                ..Default::default()
            },
            status: UnitStatus::Active,
            priority,
            max_quantity_per_sale: Some(Decimal::from(10)),
            current_price_cents: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_config_round_trip() {
        let (db, config) = setup().await;

        let loaded = db.auto_bom().get_config(&config.id).await.unwrap().unwrap();
        assert_eq!(loaded.base_quantity, Decimal::from(25));
        assert_eq!(loaded.base_unit, "kg");
        assert!(loaded.is_active);
    }

    #[tokio::test]
    async fn test_unit_params_survive_storage() {
        let (db, config) = setup().await;
        let stored = unit(&config.id, "1kg bag", 1, 0);

        let mut conn = db.pool().acquire().await.unwrap();
        AutoBomRepository::insert_unit(&mut conn, &stored).await.unwrap();
        drop(conn);

        let loaded = db.auto_bom().get_unit(&stored.id).await.unwrap().unwrap();
        assert_eq!(loaded.pricing, stored.pricing);
        assert_eq!(loaded.pricing_strategy, PricingStrategy::Hybrid);
        assert_eq!(loaded.max_quantity_per_sale, Some(Decimal::from(10)));
        assert_eq!(loaded.status, UnitStatus::Active);
    }

    #[tokio::test]
    async fn test_units_ordered_by_priority_then_size() {
        let (db, config) = setup().await;

        let mut conn = db.pool().acquire().await.unwrap();
        for u in [
            unit(&config.id, "5kg bag", 5, 0),
            unit(&config.id, "1kg bag", 1, 0),
            unit(&config.id, "promo 2kg", 2, 10),
        ] {
            AutoBomRepository::insert_unit(&mut conn, &u).await.unwrap();
        }
        drop(conn);

        let names: Vec<String> = db
            .auto_bom()
            .list_units(&config.id)
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.unit_name)
            .collect();
        assert_eq!(names, vec!["promo 2kg", "1kg bag", "5kg bag"]);
    }

    #[tokio::test]
    async fn test_deactivated_config_not_found_for_product() {
        let (db, config) = setup().await;
        let repo = db.auto_bom();

        assert!(repo
            .find_active_config_for_product(&config.base_product_id)
            .await
            .unwrap()
            .is_some());

        repo.deactivate_config(&config.id).await.unwrap();
        repo.deactivate_config(&config.id).await.unwrap();

        assert!(repo
            .find_active_config_for_product(&config.base_product_id)
            .await
            .unwrap()
            .is_none());
        assert!(!repo.get_config(&config.id).await.unwrap().unwrap().is_active);
    }

    #[tokio::test]
    async fn test_unit_requires_existing_config() {
        let (db, _) = setup().await;
        let orphan = unit("no-such-config", "1kg bag", 1, 0);

        let mut conn = db.pool().acquire().await.unwrap();
        let err = AutoBomRepository::insert_unit(&mut conn, &orphan)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
    }

    #[tokio::test]
    async fn test_units_cascade_with_config() {
        let (db, config) = setup().await;
        let u = unit(&config.id, "1kg bag", 1, 0);

        let mut conn = db.pool().acquire().await.unwrap();
        AutoBomRepository::insert_unit(&mut conn, &u).await.unwrap();
        sqlx::query("DELETE FROM auto_bom_configs WHERE id = ?1")
            .bind(&config.id)
            .execute(&mut *conn)
            .await
            .unwrap();
        drop(conn);

        assert!(db.auto_bom().get_unit(&u.id).await.unwrap().is_none());
    }
}
