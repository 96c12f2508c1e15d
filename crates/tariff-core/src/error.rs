//! # Error Types
//!
//! Domain-specific error types for tariff-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tariff-core errors (this file)                                        │
//! │  ├── CoreError        - Missing catalog entities, wrapped validation    │
//! │  └── ValidationError  - Input rejected before any write                │
//! │                                                                         │
//! │  tariff-db errors (separate crate)                                     │
//! │  └── DbError          - Storage failures, NotFound, StoreUnavailable   │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → caller                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Computed prices below zero are NOT errors: they are clamped to zero.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core pricing errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product is not in the catalog.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Client is not in the client registry.
    #[error("Client not found: {0}")]
    ClientNotFound(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any write is staged; nothing is persisted when one occurs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Value must be strictly positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must be zero or greater.
    #[error("{field} must not be negative")]
    MustBeNonNegative { field: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// A start/end pair is inverted.
    #[error("{field} ends before it starts")]
    InvalidRange { field: String },

    /// Too many writes for one atomic transaction.
    #[error("batch of {size} exceeds the cap of {cap}; split it and invoke sequentially")]
    BatchTooLarge { size: usize, cap: usize },
}

impl ValidationError {
    /// Shorthand for [`ValidationError::Required`].
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }

    /// Shorthand for [`ValidationError::MustBeNonNegative`].
    pub fn negative(field: impl Into<String>) -> Self {
        ValidationError::MustBeNonNegative {
            field: field.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_messages() {
        assert_eq!(
            ValidationError::required("client_id").to_string(),
            "client_id is required"
        );
        assert_eq!(
            ValidationError::negative("discount_value").to_string(),
            "discount_value must not be negative"
        );
        let err = ValidationError::BatchTooLarge { size: 501, cap: 500 };
        assert!(err.to_string().contains("501"));
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let core_err: CoreError = ValidationError::required("product_id").into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
