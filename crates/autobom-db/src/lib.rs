//! # autobom-db: Storage and Orchestration for Auto-BOM
//!
//! This crate persists Auto-BOM configurations in SQLite (via sqlx) and
//! runs the operations that must be transactional: config creation, the
//! sale path and repricing.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Auto-BOM Data Flow                               │
//! │                                                                         │
//! │  POS / admin UI ("sell 2 × 1kg bag")                                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   autobom-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │ AutoBomManager│    │  Repositories │    │  Migrations  │  │   │
//! │  │   │ (manager.rs)  │───►│ product       │    │  (embedded)  │  │   │
//! │  │   │               │    │ auto_bom      │    │ 001_products │  │   │
//! │  │   │ UnitConverter │    │ sale_log      │    │ 002_auto_bom │  │   │
//! │  │   │ PriceHistory  │    │ price_history │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │           │                    │                               │   │
//! │  │           ▼                    ▼                               │   │
//! │  │   autobom-core          Database (pool.rs)                     │   │
//! │  │   (pricing, units)      SqlitePool                             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  │   autobom.db (path from autobom.toml / AUTOBOM_DB_PATH)         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - `EngineConfig` (file + environment)
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - `DbError` (storage) and `BomError` (manager)
//! - [`repository`] - Repository implementations
//! - [`history`] - Price history sinks with audit-log fallback
//! - [`manager`] - `AutoBomManager`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use autobom_db::{AutoBomManager, EngineConfig};
//!
//! let manager = AutoBomManager::from_config(&EngineConfig::load(None)?).await?;
//!
//! let units = manager.get_available_selling_units(&rice_id).await?;
//! let receipt = manager.sell_selling_unit(&request).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod history;
pub mod manager;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{ConfigError, EngineConfig};
pub use error::{BomError, BomResult, DbError, DbResult, ErrorCode};
pub use history::{FallbackPriceHistory, HistoryOutcome, PriceHistorySink};
pub use manager::AutoBomManager;
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::auto_bom::AutoBomRepository;
pub use repository::price_history::PriceHistoryRepository;
pub use repository::product::ProductRepository;
pub use repository::sale_log::SaleLogRepository;
