//! # Pricing Configuration
//!
//! Configuration for the database and the pricing engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     TARIFF_DB_PATH=/var/lib/tariff/pricing.db                          │
//! │     TARIFF_BATCH_CAP=250                                               │
//! │     TARIFF_DEFAULT_ACTOR=importer                                      │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/tariff/pricing.toml (Linux)                              │
//! │     ~/Library/Application Support/com.tariff.pricing/pricing.toml      │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     batch_cap = 500, default_actor = "system"                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # pricing.toml
//! [database]
//! path = "pricing.db"
//! max_connections = 5
//!
//! [engine]
//! batch_cap = 500
//! default_actor = "system"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::pool::DbConfig;
use tariff_core::{DEFAULT_BATCH_CAP, SYSTEM_ACTOR};

// =============================================================================
// Database Settings
// =============================================================================

/// Where the pricing database lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// Path to the SQLite file.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    /// Maximum number of pooled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("pricing.db")
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

// =============================================================================
// Engine Settings
// =============================================================================

/// Pricing engine behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Maximum writes per atomic transaction.
    ///
    /// Imports are split into sub-batches of this size; bulk updates above
    /// it are rejected.
    #[serde(default = "default_batch_cap")]
    pub batch_cap: usize,

    /// Actor stamped on writes when the caller does not name one.
    #[serde(default = "default_actor")]
    pub default_actor: String,
}

fn default_batch_cap() -> usize {
    DEFAULT_BATCH_CAP
}

fn default_actor() -> String {
    SYSTEM_ACTOR.to_string()
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            batch_cap: default_batch_cap(),
            default_actor: default_actor(),
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete pricing configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PricingConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub engine: EngineSettings,
}

impl PricingConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (pricing.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> DbResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading pricing config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = Self::from_toml(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Parses a TOML document. Missing sections fall back to defaults.
    pub fn from_toml(contents: &str) -> DbResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> DbResult<()> {
        if self.engine.batch_cap == 0 {
            return Err(DbError::InvalidConfig(
                "batch_cap must be greater than 0".into(),
            ));
        }

        if self.engine.default_actor.trim().is_empty() {
            return Err(DbError::InvalidConfig(
                "default_actor must not be empty".into(),
            ));
        }

        if self.database.max_connections == 0 {
            return Err(DbError::InvalidConfig(
                "max_connections must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Pool configuration for [`crate::Database::new`].
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database.path).max_connections(self.database.max_connections)
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("TARIFF_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Ok(cap) = std::env::var("TARIFF_BATCH_CAP") {
            match cap.parse::<usize>() {
                Ok(c) => {
                    debug!(batch_cap = c, "Overriding batch cap from environment");
                    self.engine.batch_cap = c;
                }
                Err(_) => warn!(value = %cap, "Ignoring unparseable TARIFF_BATCH_CAP"),
            }
        }

        if let Ok(actor) = std::env::var("TARIFF_DEFAULT_ACTOR") {
            self.engine.default_actor = actor;
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "tariff", "pricing")
            .map(|dirs| dirs.config_dir().join("pricing.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PricingConfig::default();
        assert_eq!(config.engine.batch_cap, 500);
        assert_eq!(config.engine.default_actor, "system");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = PricingConfig::from_toml(
            r#"
            [engine]
            batch_cap = 100
            "#,
        )
        .unwrap();
        assert_eq!(config.engine.batch_cap, 100);
        assert_eq!(config.engine.default_actor, "system");
        assert_eq!(config.database.max_connections, 5);
    }

    #[test]
    fn test_zero_cap_is_invalid() {
        let mut config = PricingConfig::default();
        config.engine.batch_cap = 0;
        assert!(matches!(config.validate(), Err(DbError::InvalidConfig(_))));
    }

    #[test]
    fn test_malformed_toml_is_load_failure() {
        let result = PricingConfig::from_toml("[engine\nbatch_cap = ");
        assert!(matches!(result, Err(DbError::ConfigLoadFailed(_))));
    }

    #[test]
    fn test_load_from_explicit_file() {
        let dir = std::env::temp_dir().join(format!("tariff-config-{}", tariff_core::new_id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("pricing.toml");
        std::fs::write(&path, "[database]\npath = \"custom.db\"\n").unwrap();

        let config = PricingConfig::load(Some(path)).unwrap();
        // TARIFF_DB_PATH may be set in the environment running the tests
        if std::env::var("TARIFF_DB_PATH").is_err() {
            assert_eq!(config.database.path, PathBuf::from("custom.db"));
        }

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
