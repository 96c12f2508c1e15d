//! # tariff-core: Pure Pricing Logic for Tariff
//!
//! This crate is the **heart** of the pricing engine. It decides what a unit
//! price is, but never reads or writes anything to get there.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tariff Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │           Callers (order entry, UI previews, importers)         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │        tariff-db engine: RuleService, PriceResolver,            │   │
//! │  │        HistoricalImportProcessor, BulkTierUpdater               │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tariff-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌──────────┐ ┌───────┐ ┌──────────┐  │   │
//! │  │   │  types  │ │  money  │ │ pricing  │ │ index │ │resolution│  │   │
//! │  │   │  rules  │ │  Money  │ │ formulas │ │ keys  │ │ decision │  │   │
//! │  │   └─────────┘ └─────────┘ └──────────┘ └───────┘ └──────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Catalog entities, pricing rules, ledger records, keys
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`pricing`] - `compute_final_price`, the single final-price formula
//! - [`resolution`] - The precedence decision (client → tier → catalog)
//! - [`index`] - Composite-key index over active rules
//! - [`draft`] - Validated, unsaved rules with their computed final price
//! - [`history`] - Ledger record derivation for historical sales
//! - [`validation`] - Input validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use tariff_core::money::Money;
//! use tariff_core::pricing::{compute_final_price, PriceSpec};
//! use tariff_core::types::Adjustment;
//!
//! let spec = PriceSpec::TierDiscount {
//!     base: Money::from_cents(85_000),
//!     discount: Adjustment::percentage_bps(1500),
//! };
//!
//! // 850.00 less 15% = 722.50
//! assert_eq!(compute_final_price(&spec).cents(), 72_250);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod draft;
pub mod error;
pub mod history;
pub mod index;
pub mod money;
pub mod pricing;
pub mod resolution;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use draft::{ClientRuleDraft, ClientRuleTerms, DraftOrigin, TierRuleDraft};
pub use error::{CoreError, ValidationError};
pub use index::RuleIndex;
pub use money::Money;
pub use pricing::{compute_final_price, PriceSpec};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum number of writes committed in one transaction.
///
/// ## Business Reason
/// Imports larger than this are split into sequential sub-batches; bulk
/// updates larger than this are rejected and must be invoked repeatedly.
pub const DEFAULT_BATCH_CAP: usize = 500;

/// Minimum order quantity applied when a client rule does not specify one.
pub const DEFAULT_MIN_QUANTITY: i64 = 1;

/// Priority stamped on manually negotiated client rules.
///
/// Audit metadata only: resolution never branches on it.
pub const PRIORITY_MANUAL: i32 = 1;

/// Priority stamped on client rules synthesized from historical sales.
pub const PRIORITY_HISTORICAL: i32 = 2;

/// Actor recorded when a caller does not name one.
pub const SYSTEM_ACTOR: &str = "system";

/// Generates a new identifier for a rule or ledger record.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
