//! # Validation Module
//!
//! Input validation for pricing operations.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Import adapter / form                                        │
//! │  └── Parsing, formats, required columns                                │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  └── Business rules, checked before anything is staged                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (final_price_cents >= 0), CHECK (min_quantity >= 1)         │
//! │  └── Partial UNIQUE indexes on the active-rule keys                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{Adjustment, ClientPricing, PriceRecord};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Identifiers
// =============================================================================

/// Validates that an identifier is present.
///
/// ```rust
/// use tariff_core::validation::validate_id;
///
/// assert!(validate_id("product_id", "P1").is_ok());
/// assert!(validate_id("product_id", "  ").is_err());
/// ```
pub fn validate_id(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::required(field));
    }
    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates an order or sale quantity (must be at least 1).
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty < 1 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }
    Ok(())
}

/// Validates a client rule minimum quantity (must be at least 1).
pub fn validate_min_quantity(min_quantity: i64) -> ValidationResult<()> {
    if min_quantity < 1 {
        return Err(ValidationError::OutOfRange {
            field: "min_quantity".to_string(),
            min: 1,
            max: i64::MAX,
        });
    }
    Ok(())
}

/// Validates a price that must not be negative.
pub fn validate_price(field: &str, price: Money) -> ValidationResult<()> {
    if price.is_negative() {
        return Err(ValidationError::negative(field));
    }
    Ok(())
}

/// Validates a discount or markup value.
///
/// Percentages above 100% are allowed; the resulting price is floored.
///
/// ```rust
/// use tariff_core::types::Adjustment;
/// use tariff_core::validation::validate_adjustment;
///
/// assert!(validate_adjustment("discount_value", &Adjustment::percentage_bps(15_000)).is_ok());
/// assert!(validate_adjustment("discount_value", &Adjustment::percentage_bps(-1)).is_err());
/// ```
pub fn validate_adjustment(field: &str, adjustment: &Adjustment) -> ValidationResult<()> {
    if adjustment.value < 0 {
        return Err(ValidationError::negative(field));
    }
    Ok(())
}

/// Validates a client pricing formula.
pub fn validate_client_pricing(pricing: &ClientPricing) -> ValidationResult<()> {
    match pricing {
        ClientPricing::Fixed { price } => validate_price("fixed_price", *price),
        ClientPricing::Markup { base, markup } => {
            validate_price("base_price", *base)?;
            validate_adjustment("markup_value", markup)
        }
    }
}

// =============================================================================
// Dates
// =============================================================================

/// Validates that an optional inclusive end date is not before the start.
pub fn validate_validity_window(
    valid_from: NaiveDate,
    valid_until: Option<NaiveDate>,
) -> ValidationResult<()> {
    if let Some(until) = valid_until {
        if until < valid_from {
            return Err(ValidationError::InvalidRange {
                field: "validity window".to_string(),
            });
        }
    }
    Ok(())
}

// =============================================================================
// Collections
// =============================================================================

/// Validates that a staged set fits in one atomic transaction.
pub fn validate_batch_size(size: usize, cap: usize) -> ValidationResult<()> {
    if size > cap {
        return Err(ValidationError::BatchTooLarge { size, cap });
    }
    Ok(())
}

/// Structural checks on an imported record.
///
/// A failure here invalidates the record's whole sub-batch. Unknown products
/// and non-positive prices are NOT structural: those records are skipped
/// one at a time by the import processor.
pub fn validate_price_record(record: &PriceRecord) -> ValidationResult<()> {
    validate_id("product_id", &record.product_id)?;
    validate_quantity(record.quantity)?;
    if let Some(original) = record.original_price {
        validate_price("original_price", original)?;
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-3).is_err());
    }

    #[test]
    fn test_validate_min_quantity() {
        assert!(validate_min_quantity(1).is_ok());
        assert!(matches!(
            validate_min_quantity(0),
            Err(ValidationError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_validate_client_pricing() {
        let ok = ClientPricing::Markup {
            base: Money::from_cents(100),
            markup: Adjustment::percentage_bps(0),
        };
        assert!(validate_client_pricing(&ok).is_ok());

        let negative_markup = ClientPricing::Markup {
            base: Money::from_cents(100),
            markup: Adjustment::percentage_bps(-10),
        };
        assert!(validate_client_pricing(&negative_markup).is_err());

        let negative_price = ClientPricing::Fixed {
            price: Money::from_cents(-1),
        };
        assert!(validate_client_pricing(&negative_price).is_err());
    }

    #[test]
    fn test_validate_validity_window() {
        let jan = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let feb = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();
        assert!(validate_validity_window(jan, None).is_ok());
        assert!(validate_validity_window(jan, Some(jan)).is_ok());
        assert!(validate_validity_window(feb, Some(jan)).is_err());
    }

    #[test]
    fn test_validate_batch_size() {
        assert!(validate_batch_size(500, 500).is_ok());
        assert_eq!(
            validate_batch_size(501, 500),
            Err(ValidationError::BatchTooLarge { size: 501, cap: 500 })
        );
    }

    #[test]
    fn test_validate_price_record() {
        let day = NaiveDate::from_ymd_opt(2025, 1, 5).unwrap();
        let ok = PriceRecord::new("P2", Money::from_cents(50_000), 1, day);
        assert!(validate_price_record(&ok).is_ok());

        // Non-positive price is not structural
        let free = PriceRecord::new("P2", Money::zero(), 1, day);
        assert!(validate_price_record(&free).is_ok());

        let no_qty = PriceRecord::new("P2", Money::from_cents(1), 0, day);
        assert!(validate_price_record(&no_qty).is_err());

        let no_product = PriceRecord::new("", Money::from_cents(1), 1, day);
        assert!(validate_price_record(&no_product).is_err());
    }
}
