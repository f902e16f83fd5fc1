//! # Product Repository
//!
//! Database operations for base products.
//!
//! ## Key Operations
//! - Lookup by id / SKU
//! - Guarded stock decrement used by the sale path
//! - Restocking and cost updates
//!
//! ## Guarded Decrement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Stock Update Strategy                                │
//! │                                                                         │
//! │  ❌ WRONG: check, then write (two cashiers both pass the check)        │
//! │     SELECT quantity ...;  -- 1.0 left, need 1.0                         │
//! │     UPDATE products SET quantity = 0.0 ...                              │
//! │                                                                         │
//! │  ✅ CORRECT: the guard lives in the write                              │
//! │     UPDATE products SET quantity_micros = quantity_micros - ?2         │
//! │     WHERE id = ?1 AND quantity_micros >= ?2                             │
//! │                                                                         │
//! │  Terminal A: 1 row  → sale proceeds                                    │
//! │  Terminal B: 0 rows → lost the race, nothing written                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::{from_micros, generate_id, to_micros};
use autobom_core::{BaseProduct, NewBaseProduct};

const PRODUCT_COLUMNS: &str = r#"
    id, sku, name, cost_cents, price_cents, quantity_micros,
    is_auto_bom_enabled, is_active, created_at, updated_at
"#;

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: String,
    sku: String,
    name: String,
    cost_cents: i64,
    price_cents: i64,
    quantity_micros: i64,
    is_auto_bom_enabled: bool,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for BaseProduct {
    fn from(row: ProductRow) -> Self {
        BaseProduct {
            id: row.id,
            sku: row.sku,
            name: row.name,
            cost_cents: row.cost_cents,
            price_cents: row.price_cents,
            quantity: from_micros(row.quantity_micros),
            is_auto_bom_enabled: row.is_auto_bom_enabled,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

async fn fetch_by<'e, E>(executor: E, column: &str, value: &str) -> DbResult<Option<BaseProduct>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {} FROM products WHERE {} = ?1", PRODUCT_COLUMNS, column);

    let row = sqlx::query_as::<_, ProductRow>(&sql)
        .bind(value)
        .fetch_optional(executor)
        .await?;

    Ok(row.map(BaseProduct::from))
}

/// Repository for base product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = ProductRepository::new(pool);
///
/// let rice = repo.get_by_sku("RICE-25KG").await?;
///
/// let mut tx = pool.begin().await?;
/// let deducted = ProductRepository::deduct_stock(&mut tx, &rice.id, Decimal::new(4, 2)).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(BaseProduct))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<BaseProduct>> {
        fetch_by(&self.pool, "id", id).await
    }

    /// Gets a product by its SKU (e.g., "RICE-25KG").
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<BaseProduct>> {
        fetch_by(&self.pool, "sku", sku).await
    }

    /// Gets a product by ID inside a caller's transaction.
    pub async fn find_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<BaseProduct>> {
        fetch_by(conn, "id", id).await
    }

    /// Inserts a new product.
    ///
    /// ## Returns
    /// * `Ok(BaseProduct)` - Inserted product with generated id and timestamps
    /// * `Err(DbError::UniqueViolation)` - SKU already exists
    pub async fn insert(&self, product: &NewBaseProduct) -> DbResult<BaseProduct> {
        debug!(sku = %product.sku, "Inserting product");

        let id = generate_id();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, name, cost_cents, price_cents, quantity_micros,
                is_auto_bom_enabled, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, 1, ?7, ?7)
            "#,
        )
        .bind(&id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(product.cost_cents)
        .bind(product.price_cents)
        .bind(to_micros(product.quantity)?)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::UniqueViolation {
                field,
                value: product.sku.clone(),
            },
            other => other,
        })?;

        self.get_by_id(&id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", &id))
    }

    /// Marks a product as having an Auto-BOM configuration.
    pub async fn mark_auto_bom_enabled(conn: &mut SqliteConnection, id: &str) -> DbResult<()> {
        debug!(id = %id, "Flagging product as Auto-BOM enabled");

        let result = sqlx::query(
            "UPDATE products SET is_auto_bom_enabled = 1, updated_at = ?2 WHERE id = ?1",
        )
        .bind(id)
        .bind(Utc::now())
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Decrements stock only if enough is left.
    ///
    /// ## Returns
    /// * `Ok(true)` - Stock deducted
    /// * `Ok(false)` - Not enough stock at write time (or no such product);
    ///   nothing was written
    pub async fn deduct_stock(
        conn: &mut SqliteConnection,
        id: &str,
        quantity: Decimal,
    ) -> DbResult<bool> {
        let micros = to_micros(quantity)?;
        debug!(id = %id, quantity = %quantity, "Deducting stock");

        let result = sqlx::query(
            r#"
            UPDATE products
            SET
                quantity_micros = quantity_micros - ?2,
                updated_at = ?3
            WHERE id = ?1 AND quantity_micros >= ?2
            "#,
        )
        .bind(id)
        .bind(micros)
        .bind(Utc::now())
        .execute(conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Reads current stock inside a caller's transaction.
    pub async fn stock_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Decimal> {
        let micros: Option<i64> =
            sqlx::query_scalar("SELECT quantity_micros FROM products WHERE id = ?1")
                .bind(id)
                .fetch_optional(conn)
                .await?;

        micros
            .map(from_micros)
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Adds (or, with a negative delta, removes) stock.
    ///
    /// A removal below zero fails the `quantity_micros >= 0` CHECK.
    pub async fn adjust_stock(&self, id: &str, delta: Decimal) -> DbResult<()> {
        debug!(id = %id, delta = %delta, "Adjusting stock");

        let result = sqlx::query(
            r#"
            UPDATE products
            SET
                quantity_micros = quantity_micros + ?2,
                updated_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(to_micros(delta)?)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Updates the cost of one base-product record.
    pub async fn update_cost(&self, id: &str, cost_cents: i64) -> DbResult<()> {
        debug!(id = %id, cost_cents, "Updating product cost");

        let result = sqlx::query("UPDATE products SET cost_cents = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(cost_cents)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
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

    async fn setup() -> (Database, BaseProduct) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let rice = db
            .products()
            .insert(&NewBaseProduct {
                sku: "RICE-25KG".into(),
                name: "Rice 25kg sack".into(),
                cost_cents: 5000,
                price_cents: 6500,
                quantity: Decimal::from(2),
            })
            .await
            .unwrap();
        (db, rice)
    }

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let (db, rice) = setup().await;

        assert_eq!(rice.quantity, Decimal::from(2));
        assert!(!rice.is_auto_bom_enabled);

        let by_sku = db.products().get_by_sku("RICE-25KG").await.unwrap().unwrap();
        assert_eq!(by_sku.id, rice.id);
        assert!(db.products().get_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_sku() {
        let (db, _) = setup().await;

        let err = db
            .products()
            .insert(&NewBaseProduct {
                sku: "RICE-25KG".into(),
                name: "Again".into(),
                cost_cents: 1,
                price_cents: 1,
                quantity: Decimal::ONE,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { value, .. } if value == "RICE-25KG"));
    }

    #[tokio::test]
    async fn test_deduct_stock_guard() {
        let (db, rice) = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();

        assert!(ProductRepository::deduct_stock(&mut conn, &rice.id, Decimal::new(15, 1))
            .await
            .unwrap());
        // 0.5 left; asking for 0.6 touches nothing
        assert!(!ProductRepository::deduct_stock(&mut conn, &rice.id, Decimal::new(6, 1))
            .await
            .unwrap());

        let left = ProductRepository::stock_in(&mut conn, &rice.id).await.unwrap();
        assert_eq!(left, Decimal::new(5, 1));
    }

    #[tokio::test]
    async fn test_adjust_stock_cannot_go_negative() {
        let (db, rice) = setup().await;

        db.products().adjust_stock(&rice.id, Decimal::ONE).await.unwrap();
        let err = db
            .products()
            .adjust_stock(&rice.id, Decimal::from(-10))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::QueryFailed(_)));

        let rice = db.products().get_by_id(&rice.id).await.unwrap().unwrap();
        assert_eq!(rice.quantity, Decimal::from(3));
    }

    #[tokio::test]
    async fn test_mark_auto_bom_enabled() {
        let (db, rice) = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();

        ProductRepository::mark_auto_bom_enabled(&mut conn, &rice.id).await.unwrap();
        drop(conn);

        let rice = db.products().get_by_id(&rice.id).await.unwrap().unwrap();
        assert!(rice.is_auto_bom_enabled);
    }
}
