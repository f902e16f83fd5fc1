//! # Price History Repository
//!
//! Append-only price change log, plus the generic audit log it falls back to.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use crate::repository::generate_id;
use autobom_core::PriceHistoryEntry;

#[derive(Debug, sqlx::FromRow)]
struct PriceHistoryRow {
    id: String,
    selling_unit_id: String,
    old_price_cents: Option<i64>,
    new_price_cents: i64,
    reason: String,
    changed_by: String,
    created_at: DateTime<Utc>,
}

impl From<PriceHistoryRow> for PriceHistoryEntry {
    fn from(row: PriceHistoryRow) -> Self {
        PriceHistoryEntry {
            id: row.id,
            selling_unit_id: row.selling_unit_id,
            old_price_cents: row.old_price_cents,
            new_price_cents: row.new_price_cents,
            reason: row.reason,
            changed_by: row.changed_by,
            created_at: row.created_at,
        }
    }
}

/// One generic audit log row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AuditRecord {
    pub id: String,
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    /// JSON document.
    pub payload: String,
    pub actor: String,
    pub created_at: DateTime<Utc>,
}

/// Repository for price history and the audit log.
#[derive(Debug, Clone)]
pub struct PriceHistoryRepository {
    pool: SqlitePool,
}

impl PriceHistoryRepository {
    /// Creates a new PriceHistoryRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PriceHistoryRepository { pool }
    }

    /// Appends a price change.
    pub async fn insert(conn: &mut SqliteConnection, entry: &PriceHistoryEntry) -> DbResult<()> {
        debug!(
            selling_unit_id = %entry.selling_unit_id,
            old = ?entry.old_price_cents,
            new = entry.new_price_cents,
            "Appending price history"
        );

        sqlx::query(
            r#"
            INSERT INTO price_history (
                id, selling_unit_id, old_price_cents, new_price_cents,
                reason, changed_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.selling_unit_id)
        .bind(entry.old_price_cents)
        .bind(entry.new_price_cents)
        .bind(&entry.reason)
        .bind(&entry.changed_by)
        .bind(entry.created_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Price changes of one selling unit, newest first.
    pub async fn list_for_unit(&self, selling_unit_id: &str) -> DbResult<Vec<PriceHistoryEntry>> {
        let rows = sqlx::query_as::<_, PriceHistoryRow>(
            r#"
            SELECT
                id, selling_unit_id, old_price_cents, new_price_cents,
                reason, changed_by, created_at
            FROM price_history
            WHERE selling_unit_id = ?1
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .bind(selling_unit_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(PriceHistoryEntry::from).collect())
    }

    /// Appends a generic audit log row.
    pub async fn insert_audit(
        conn: &mut SqliteConnection,
        action: &str,
        entity_type: &str,
        entity_id: &str,
        payload: &serde_json::Value,
        actor: &str,
    ) -> DbResult<()> {
        debug!(action = %action, entity_id = %entity_id, "Appending audit log");

        sqlx::query(
            r#"
            INSERT INTO audit_log (id, action, entity_type, entity_id, payload, actor, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(generate_id())
        .bind(action)
        .bind(entity_type)
        .bind(entity_id)
        .bind(payload.to_string())
        .bind(actor)
        .bind(Utc::now())
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Audit rows for one entity, newest first.
    pub async fn audit_for(&self, entity_type: &str, entity_id: &str) -> DbResult<Vec<AuditRecord>> {
        let rows = sqlx::query_as::<_, AuditRecord>(
            r#"
            SELECT id, action, entity_type, entity_id, payload, actor, created_at
            FROM audit_log
            WHERE entity_type = ?1 AND entity_id = ?2
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .bind(entity_type)
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
