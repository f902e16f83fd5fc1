//! # Error Types
//!
//! Error types for database operations and for the Auto-BOM manager.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)          CoreError (autobom-core)          │
//! │       │                                   │                             │
//! │       ▼                                   │                             │
//! │  DbError ← categorization                 │                             │
//! │       │                                   │                             │
//! │       └──────────────┬────────────────────┘                             │
//! │                      ▼                                                  │
//! │  BomError ← what AutoBomManager callers see                            │
//! │       │     code() / is_retryable() / user_message()                    │
//! │       ▼                                                                 │
//! │  POS / admin UI                                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use autobom_core::{CoreError, ValidationError};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

// =============================================================================
// Database Error
// =============================================================================

/// Database operation errors.
///
/// These errors wrap sqlx errors and provide additional context
/// for debugging and user feedback.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    ///
    /// ## When This Occurs
    /// - `fetch_one` returns no rows
    /// - ID doesn't exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Inserting a duplicate product SKU
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    ///
    /// ## When This Occurs
    /// - A config referencing a non-existent product
    /// - A selling unit referencing a non-existent config
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// Database connection failed.
    ///
    /// ## When This Occurs
    /// - Database file doesn't exist and can't be created
    /// - File permissions issue
    /// - Disk full
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed (also covers CHECK constraint failures).
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Transaction failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// A stored value could not be turned back into a domain value
    /// (unparseable decimal, unknown strategy token).
    #[error("Invalid stored data: {0}")]
    InvalidData(String),

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// SQLITE_BUSY / SQLITE_LOCKED → DbError::TransactionFailed (retryable)
/// sqlx::Error::Database       → Analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) if is_lock_contention(&*db_err) => {
                DbError::TransactionFailed(db_err.message().to_string())
            }

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // UNIQUE constraint: "UNIQUE constraint failed: <table>.<column>"
                // FK constraint: "FOREIGN KEY constraint failed"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

/// SQLITE_BUSY (5) or SQLITE_LOCKED (6), extended codes included:
/// another connection held the write lock past the busy timeout.
fn is_lock_contention(err: &dyn sqlx::error::DatabaseError) -> bool {
    let primary = err
        .code()
        .and_then(|code| code.parse::<i32>().ok())
        .map(|code| code & 0xff);

    matches!(primary, Some(5) | Some(6)) || err.message().contains("database is locked")
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Manager Error
// =============================================================================

/// Machine-readable error codes for the POS front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationError,
    NotFound,
    IncompatibleUnits,
    UnknownUnit,
    UnknownStrategy,
    MissingConfiguration,
    InvalidPrice,
    InsufficientStock,
    InventoryDeduction,
    TransactionError,
    DatabaseError,
}

/// Errors returned by `AutoBomManager`.
///
/// ## Retrying
/// ```text
/// InventoryDeduction  lost the race for the last units → redo the sale
/// Transaction         storage timeout / commit failure → redo the sale
/// everything else     fix the input or the configuration
/// ```
#[derive(Debug, Error)]
pub enum BomError {
    /// Missing or malformed input.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A referenced product, config or selling unit does not exist
    /// (or is inactive where an active one is required).
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Conversion or pricing failure.
    #[error(transparent)]
    Core(CoreError),

    /// Advisory stock check failed.
    #[error("Insufficient stock: required {required}, available {available}, short by {shortage}")]
    InsufficientStock {
        required: Decimal,
        available: Decimal,
        shortage: Decimal,
    },

    /// The guarded decrement touched no rows: stock changed since the check.
    #[error("Inventory deduction failed for product {product_id} (needed {required})")]
    InventoryDeduction { product_id: String, required: Decimal },

    /// Begin/commit failed or the storage layer timed out.
    #[error("Transaction failed: {0}")]
    Transaction(String),

    /// Any other storage failure.
    #[error("Database error: {0}")]
    Database(DbError),
}

impl BomError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        BomError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            BomError::Validation(_) => ErrorCode::ValidationError,
            BomError::NotFound { .. } => ErrorCode::NotFound,
            BomError::Core(core) => match core {
                CoreError::IncompatibleUnits { .. } => ErrorCode::IncompatibleUnits,
                CoreError::UnknownUnit(_) => ErrorCode::UnknownUnit,
                CoreError::UnknownStrategy(_) => ErrorCode::UnknownStrategy,
                CoreError::MissingConfiguration { .. } => ErrorCode::MissingConfiguration,
                CoreError::InvalidPrice(_) => ErrorCode::InvalidPrice,
                CoreError::InsufficientStock { .. } => ErrorCode::InsufficientStock,
                CoreError::Validation(_) => ErrorCode::ValidationError,
            },
            BomError::InsufficientStock { .. } => ErrorCode::InsufficientStock,
            BomError::InventoryDeduction { .. } => ErrorCode::InventoryDeduction,
            BomError::Transaction(_) => ErrorCode::TransactionError,
            BomError::Database(_) => ErrorCode::DatabaseError,
        }
    }

    /// True when redoing the whole sale from the stock check may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BomError::InventoryDeduction { .. } | BomError::Transaction(_)
        )
    }

    /// Text safe to show a cashier or admin.
    pub fn user_message(&self) -> String {
        match self {
            BomError::Validation(e) => e.to_string(),
            BomError::NotFound { entity, .. } => format!("{} not found", entity),
            BomError::Core(e) => e.to_string(),
            BomError::InsufficientStock { available, .. } => {
                format!("Not enough stock ({} available)", available)
            }
            BomError::InventoryDeduction { .. } => "Stock changed, please retry".to_string(),
            BomError::Transaction(_) => "The sale could not be saved, please retry".to_string(),
            BomError::Database(e) => {
                tracing::error!(error = %e, "Database error surfaced to user");
                "Database operation failed".to_string()
            }
        }
    }
}

impl From<CoreError> for BomError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(e) => BomError::Validation(e),
            CoreError::InsufficientStock {
                required,
                available,
                shortage,
            } => BomError::InsufficientStock {
                required,
                available,
                shortage,
            },
            other => BomError::Core(other),
        }
    }
}

impl From<DbError> for BomError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => BomError::NotFound { entity, id },
            DbError::PoolExhausted => BomError::Transaction("connection pool exhausted".to_string()),
            DbError::TransactionFailed(e) => BomError::Transaction(e),
            other => BomError::Database(other),
        }
    }
}

impl From<sqlx::Error> for BomError {
    fn from(err: sqlx::Error) -> Self {
        BomError::from(DbError::from(err))
    }
}

/// Result type for manager operations.
pub type BomResult<T> = Result<T, BomError>;

// =============================================================================
// Unit Tests
// =============================================================================
