//! # Engine Configuration
//!
//! Configuration management for the Auto-BOM engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     AUTOBOM_DB_PATH=/var/lib/autobom/autobom.db                        │
//! │     AUTOBOM_MAX_CONNECTIONS=8                                          │
//! │     AUTOBOM_ACTOR=backoffice                                           │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ./autobom.toml, or an explicit path                                │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     autobom.db, 5 connections, actor "system"                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # autobom.toml
//! [database]
//! path = "data/autobom.db"
//! max_connections = 5
//! run_migrations = true
//!
//! [pricing]
//! default_actor = "system"
//! reprice_reason = "strategy repricing"
//!
//! [[units.custom]]
//! name = "case_24"
//! factor = 24
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use autobom_core::{CoreError, CoreResult, UnitCatalog, DEFAULT_ACTOR};

/// File looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "autobom.toml";

// =============================================================================
// Errors
// =============================================================================

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Invalid custom unit: {0}")]
    CustomUnit(#[from] CoreError),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Database Settings
// =============================================================================

/// Where the database lives and how the pool is sized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file path; `":memory:"` for a private in-memory database.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Apply embedded migrations on connect.
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("autobom.db")
}

fn default_max_connections() -> u32 {
    5
}

fn default_true() -> bool {
    true
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
            run_migrations: true,
        }
    }
}

// =============================================================================
// Pricing Settings
// =============================================================================

/// Defaults recorded on price history rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingSettings {
    /// Actor used when a caller does not name one.
    #[serde(default = "default_actor")]
    pub default_actor: String,

    /// Reason written by batch repricing.
    #[serde(default = "default_reprice_reason")]
    pub reprice_reason: String,
}

fn default_actor() -> String {
    DEFAULT_ACTOR.to_string()
}

fn default_reprice_reason() -> String {
    "strategy repricing".to_string()
}

impl Default for PricingSettings {
    fn default() -> Self {
        PricingSettings {
            default_actor: default_actor(),
            reprice_reason: default_reprice_reason(),
        }
    }
}

// =============================================================================
// Unit Settings
// =============================================================================

/// A count unit added to the standard catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomUnit {
    pub name: String,
    /// How many "each" one of this unit holds.
    pub factor: Decimal,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnitSettings {
    #[serde(default)]
    pub custom: Vec<CustomUnit>,
}

// =============================================================================
// Engine Configuration
// =============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub pricing: PricingSettings,

    #[serde(default)]
    pub units: UnitSettings,
}

impl EngineConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (`autobom.toml` unless a path is given)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let path = config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        let mut config = if path.exists() {
            info!(?path, "Loading engine config from file");
            Self::from_file(&path)?
        } else {
            debug!(?path, "Config file not found, using defaults");
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Parses a TOML file without applying overrides.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("database.path must not be empty".into()));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        if self.pricing.default_actor.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "pricing.default_actor must not be empty".into(),
            ));
        }

        if self.pricing.reprice_reason.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "pricing.reprice_reason must not be empty".into(),
            ));
        }

        self.unit_catalog()?;

        Ok(())
    }

    /// The standard catalog extended with the configured custom units.
    pub fn unit_catalog(&self) -> CoreResult<UnitCatalog> {
        let mut catalog = UnitCatalog::standard();
        for unit in &self.units.custom {
            catalog = catalog.with_custom_unit(&unit.name, unit.factor)?;
        }
        Ok(catalog)
    }

    /// Applies `AUTOBOM_*` overrides read through `lookup`.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("AUTOBOM_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(max) = lookup("AUTOBOM_MAX_CONNECTIONS") {
            match max.parse::<u32>() {
                Ok(n) => self.database.max_connections = n,
                Err(_) => warn!(value = %max, "Ignoring invalid AUTOBOM_MAX_CONNECTIONS"),
            }
        }

        if let Some(actor) = lookup("AUTOBOM_ACTOR") {
            self.pricing.default_actor = actor;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.pricing.default_actor, "system");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_file_contents() {
        let config = EngineConfig::from_toml(
            r#"
            [database]
            path = "data/autobom.db"

            [pricing]
            default_actor = "backoffice"

            [[units.custom]]
            name = "case_24"
            factor = 24
            "#,
        )
        .unwrap();

        assert_eq!(config.database.path, PathBuf::from("data/autobom.db"));
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.pricing.default_actor, "backoffice");
        assert_eq!(config.pricing.reprice_reason, "strategy repricing");

        let catalog = config.unit_catalog().unwrap();
        assert_eq!(catalog.factor("case_24"), Some(Decimal::from(24)));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("AUTOBOM_DB_PATH", ":memory:"),
            ("AUTOBOM_MAX_CONNECTIONS", "not-a-number"),
            ("AUTOBOM_ACTOR", "night-shift"),
        ]
        .into_iter()
        .collect();

        let mut config = EngineConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.database.path, PathBuf::from(":memory:"));
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.pricing.default_actor, "night-shift");
    }

    #[test]
    fn test_validation() {
        let mut config = EngineConfig::default();
        config.database.max_connections = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = EngineConfig::default();
        config.units.custom.push(CustomUnit {
            name: "kg".into(),
            factor: Decimal::from(2),
        });
        assert!(matches!(config.validate(), Err(ConfigError::CustomUnit(_))));
    }

    #[test]
    fn test_toml_serialization() {
        let toml_str = toml::to_string_pretty(&EngineConfig::default()).unwrap();
        assert!(toml_str.contains("[database]"));
        assert!(toml_str.contains("[pricing]"));
    }
}
