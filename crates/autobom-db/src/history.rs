//! # Price History Sinks
//!
//! Where price changes are recorded, and what happens when that fails.
//!
//! ## Fallback Chain
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  price change                                                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  primary: PriceHistoryTable ──ok──► HistoryOutcome::Primary             │
//! │       │ err (table missing, locked, ...)                                │
//! │       ▼                                                                 │
//! │  fallback: AuditLogSink ──────ok──► HistoryOutcome::Fallback            │
//! │       │ err                                                             │
//! │       ▼                                                                 │
//! │  HistoryOutcome::Lost (logged at error level)                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each attempt runs in its own savepoint, so a failed write leaves the
//! caller's transaction untouched. Recording never returns an error: the
//! price change that triggered it always proceeds.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{Connection, SqliteConnection};
use tracing::{error, warn};

use crate::error::{DbError, DbResult};
use crate::repository::price_history::PriceHistoryRepository;
use autobom_core::PriceHistoryEntry;

/// Audit log action written by [`AuditLogSink`].
pub const PRICE_CHANGE_ACTION: &str = "price_change";

/// Audit log entity type for selling units.
pub const SELLING_UNIT_ENTITY: &str = "selling_unit";

// =============================================================================
// Sink Trait
// =============================================================================

/// A store that accepts price history entries.
#[async_trait]
pub trait PriceHistorySink: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    async fn record(&self, conn: &mut SqliteConnection, entry: &PriceHistoryEntry) -> DbResult<()>;
}

/// The dedicated `price_history` table.
#[derive(Debug, Clone, Copy, Default)]
pub struct PriceHistoryTable;

#[async_trait]
impl PriceHistorySink for PriceHistoryTable {
    fn name(&self) -> &'static str {
        "price_history"
    }

    async fn record(&self, conn: &mut SqliteConnection, entry: &PriceHistoryEntry) -> DbResult<()> {
        PriceHistoryRepository::insert(conn, entry).await
    }
}

/// The generic `audit_log`, carrying the entry as a JSON payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuditLogSink;

#[async_trait]
impl PriceHistorySink for AuditLogSink {
    fn name(&self) -> &'static str {
        "audit_log"
    }

    async fn record(&self, conn: &mut SqliteConnection, entry: &PriceHistoryEntry) -> DbResult<()> {
        let payload =
            serde_json::to_value(entry).map_err(|e| DbError::Internal(e.to_string()))?;

        PriceHistoryRepository::insert_audit(
            conn,
            PRICE_CHANGE_ACTION,
            SELLING_UNIT_ENTITY,
            &entry.selling_unit_id,
            &payload,
            &entry.changed_by,
        )
        .await
    }
}

// =============================================================================
// Fallback Recorder
// =============================================================================

/// Which sink ended up holding the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryOutcome {
    Primary,
    Fallback,
    Lost,
}

/// Records to the primary sink, falling back to the secondary one.
#[derive(Clone)]
pub struct FallbackPriceHistory {
    primary: Arc<dyn PriceHistorySink>,
    fallback: Arc<dyn PriceHistorySink>,
}

impl FallbackPriceHistory {
    pub fn new(primary: Arc<dyn PriceHistorySink>, fallback: Arc<dyn PriceHistorySink>) -> Self {
        FallbackPriceHistory { primary, fallback }
    }

    /// `price_history` first, `audit_log` second.
    pub fn standard() -> Self {
        Self::new(Arc::new(PriceHistoryTable), Arc::new(AuditLogSink))
    }

    pub async fn record(
        &self,
        conn: &mut SqliteConnection,
        entry: &PriceHistoryEntry,
    ) -> HistoryOutcome {
        let primary_err = match attempt(self.primary.as_ref(), conn, entry).await {
            Ok(()) => return HistoryOutcome::Primary,
            Err(e) => e,
        };

        warn!(
            selling_unit_id = %entry.selling_unit_id,
            sink = self.primary.name(),
            fallback = self.fallback.name(),
            error = %primary_err,
            "Price history write failed, using fallback"
        );

        match attempt(self.fallback.as_ref(), conn, entry).await {
            Ok(()) => HistoryOutcome::Fallback,
            Err(e) => {
                error!(
                    selling_unit_id = %entry.selling_unit_id,
                    old_price_cents = ?entry.old_price_cents,
                    new_price_cents = entry.new_price_cents,
                    error = %e,
                    "Price history lost: every sink failed"
                );
                HistoryOutcome::Lost
            }
        }
    }
}

impl Default for FallbackPriceHistory {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Debug for FallbackPriceHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackPriceHistory")
            .field("primary", &self.primary.name())
            .field("fallback", &self.fallback.name())
            .finish()
    }
}

/// Runs one sink inside a savepoint.
async fn attempt(
    sink: &dyn PriceHistorySink,
    conn: &mut SqliteConnection,
    entry: &PriceHistoryEntry,
) -> DbResult<()> {
    let mut savepoint = conn.begin().await?;
    sink.record(&mut *savepoint, entry).await?;
    savepoint.commit().await?;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
