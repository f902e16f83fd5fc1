//! # Sale Log Repository
//!
//! Append-only log of Auto-BOM sales. Rows are written by the sale
//! transaction together with the stock decrement and are never updated.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::{from_micros, parse_decimal, to_micros};
use autobom_core::{SaleLogEntry, UnitPrice};

#[derive(Debug, sqlx::FromRow)]
struct SaleRow {
    id: String,
    selling_unit_id: String,
    base_product_id: String,
    quantity_micros: i64,
    unit_price: String,
    line_total_cents: i64,
    base_quantity_deducted_micros: i64,
    sold_by: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<SaleRow> for SaleLogEntry {
    type Error = DbError;

    fn try_from(row: SaleRow) -> DbResult<Self> {
        Ok(SaleLogEntry {
            unit_price: UnitPrice::from_decimal_cents(parse_decimal("unit_price", &row.unit_price)?),
            id: row.id,
            selling_unit_id: row.selling_unit_id,
            base_product_id: row.base_product_id,
            quantity: from_micros(row.quantity_micros),
            line_total_cents: row.line_total_cents,
            base_quantity_deducted: from_micros(row.base_quantity_deducted_micros),
            sold_by: row.sold_by,
            created_at: row.created_at,
        })
    }
}

/// Repository for the Auto-BOM sale log.
#[derive(Debug, Clone)]
pub struct SaleLogRepository {
    pool: SqlitePool,
}

impl SaleLogRepository {
    /// Creates a new SaleLogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleLogRepository { pool }
    }

    /// Appends a sale inside the sale transaction.
    pub async fn insert(conn: &mut SqliteConnection, entry: &SaleLogEntry) -> DbResult<()> {
        debug!(
            id = %entry.id,
            selling_unit_id = %entry.selling_unit_id,
            quantity = %entry.quantity,
            "Appending sale log entry"
        );

        sqlx::query(
            r#"
            INSERT INTO auto_bom_sales (
                id, selling_unit_id, base_product_id, quantity_micros,
                unit_price, line_total_cents, base_quantity_deducted_micros,
                sold_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.selling_unit_id)
        .bind(&entry.base_product_id)
        .bind(to_micros(entry.quantity)?)
        .bind(entry.unit_price.as_decimal_cents().normalize().to_string())
        .bind(entry.line_total_cents)
        .bind(to_micros(entry.base_quantity_deducted)?)
        .bind(&entry.sold_by)
        .bind(entry.created_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Sales of one selling unit, newest first.
    pub async fn list_for_unit(&self, selling_unit_id: &str) -> DbResult<Vec<SaleLogEntry>> {
        let rows = sqlx::query_as::<_, SaleRow>(
            r#"
            SELECT
                id, selling_unit_id, base_product_id, quantity_micros,
                unit_price, line_total_cents, base_quantity_deducted_micros,
                sold_by, created_at
            FROM auto_bom_sales
            WHERE selling_unit_id = ?1
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .bind(selling_unit_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(SaleLogEntry::try_from).collect()
    }

    /// Total base quantity removed by Auto-BOM sales of a base product.
    pub async fn total_deducted(&self, base_product_id: &str) -> DbResult<Decimal> {
        let micros: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(base_quantity_deducted_micros), 0) FROM auto_bom_sales WHERE base_product_id = ?1",
        )
        .bind(base_product_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(from_micros(micros))
    }
}
