//! # Database Error Types
//!
//! Error types for storage and engine operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)        ValidationError (tariff-core)       │
//! │       │                                  │                              │
//! │       ▼                                  ▼                              │
//! │  DbError (this module) ← Adds context and categorization               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Caller (order entry, import screen, bulk editor)                      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Partial import failures are NOT errors: they are reported in
//! [`tariff_core::ImportSummary::failed_batches`].

use tariff_core::{CoreError, ValidationError};
use thiserror::Error;

/// Storage and engine errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found.
    ///
    /// ## When This Occurs
    /// - Unknown product or client id
    /// - Deactivating a pair with no active rule
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Input rejected before any write.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Persistence is unreachable. Nothing was committed; retry is safe.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Two transactions both create the first active rule for one key
    /// - Any other UNIQUE index violation
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Another connection held the write lock past the busy timeout.
    /// Nothing was committed; retry is safe.
    #[error("Database busy: {0}")]
    Busy(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Transaction failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Configuration is present but unusable.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be read or parsed.
    #[error("Failed to load configuration: {0}")]
    ConfigLoadFailed(String),

    /// Internal error.
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

    /// True if the whole operation can be retried unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DbError::StoreUnavailable(_) | DbError::Busy(_))
    }

    /// True if the error is a unique-index race on an active-rule key.
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, DbError::UniqueViolation { .. })
    }
}

impl From<CoreError> for DbError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ProductNotFound(id) => DbError::not_found("Product", id),
            CoreError::ClientNotFound(id) => DbError::not_found("Client", id),
            CoreError::Validation(e) => DbError::Validation(e),
        }
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → UNIQUE → UniqueViolation
///                                BUSY / LOCKED → Busy
///                                else QueryFailed
/// sqlx::Error::PoolTimedOut   → DbError::StoreUnavailable
/// sqlx::Error::PoolClosed     → DbError::StoreUnavailable
/// sqlx::Error::Io             → DbError::StoreUnavailable
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // Extended codes keep the primary code in the low byte:
                // SQLITE_BUSY (5, 517 busy_snapshot), SQLITE_LOCKED (6)
                let primary = db_err
                    .code()
                    .and_then(|code| code.parse::<i32>().ok())
                    .map(|code| code & 0xff);
                if matches!(primary, Some(5) | Some(6)) {
                    return DbError::Busy(msg.to_string());
                }

                // "UNIQUE constraint failed: <table>.<column>, ..."
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
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::StoreUnavailable("connection pool timed out".into()),

            sqlx::Error::PoolClosed => DbError::StoreUnavailable("pool is closed".into()),

            sqlx::Error::Io(e) => DbError::StoreUnavailable(e.to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<std::io::Error> for DbError {
    fn from(err: std::io::Error) -> Self {
        DbError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for DbError {
    fn from(err: toml::de::Error) -> Self {
        DbError::ConfigLoadFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(DbError::StoreUnavailable("down".into()).is_retryable());
        assert!(DbError::Busy("database is locked".into()).is_retryable());
        assert!(!DbError::QueryFailed("syntax error".into()).is_retryable());
        assert!(!DbError::not_found("Product", "P1").is_retryable());
        assert!(!DbError::duplicate("key", "x").is_retryable());
    }

    #[test]
    fn test_core_error_mapping() {
        let err: DbError = CoreError::ClientNotFound("C9".into()).into();
        assert!(matches!(err, DbError::NotFound { ref entity, ref id } if entity == "Client" && id == "C9"));

        let err: DbError = CoreError::Validation(ValidationError::required("product_id")).into();
        assert!(matches!(err, DbError::Validation(_)));
    }

    #[test]
    fn test_pool_closed_is_store_unavailable() {
        let err: DbError = sqlx::Error::PoolClosed.into();
        assert!(err.is_retryable());
    }
}
