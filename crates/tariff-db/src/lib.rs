//! # tariff-db: Storage and Engine Layer for Tariff
//!
//! Persists pricing rules and the sale ledger in SQLite and runs the
//! pricing operations on top of them.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tariff Data Flow                                 │
//! │                                                                         │
//! │  Caller (order entry, rule editor, import adapter)                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     tariff-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │ PricingEngine │    │ PricingStore  │    │  Migrations  │  │   │
//! │  │   │ (engine/)     │───►│ (store/)      │    │  (embedded)  │  │   │
//! │  │   │               │    │ Sqlite/Memory │    │              │  │   │
//! │  │   │ rules         │    ├───────────────┤    │ 001_pricing_ │  │   │
//! │  │   │ resolver      │───►│ Catalog       │    │   schema.sql │  │   │
//! │  │   │ import, bulk  │    │ (catalog/)    │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`config`] - `pricing.toml` and environment settings
//! - [`error`] - Database error types
//! - [`store`] - Rule and ledger persistence behind [`PricingStore`]
//! - [`catalog`] - Product and client lookups behind [`Catalog`]
//! - [`engine`] - Rule service, resolver, historical import, bulk updates
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tariff_db::{Database, PricingConfig, PricingEngine, PriceQuery};
//!
//! let config = PricingConfig::load(None)?;
//! let db = Database::new(config.db_config()).await?;
//! let engine = PricingEngine::new(
//!     Arc::new(db.pricing_store()),
//!     Arc::new(db.catalog()),
//!     config.engine.clone(),
//! );
//!
//! let price = engine
//!     .resolver()
//!     .resolve(&PriceQuery::new("P1", 20).for_client("C1"))
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{DatabaseSettings, EngineSettings, PricingConfig};
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use catalog::{Catalog, MemoryCatalog, SqliteCatalog};
pub use store::{
    MemoryPricingStore, PricingStore, SqlitePricingStore, StagedWrite, WriteBatch, WriteOutcome,
};

pub use engine::{
    BulkTierUpdater, ClientPricingInput, ClientRuleInput, HistoricalImportProcessor,
    ImportContext, PriceQuery, PriceResolver, PricingEngine, RuleService, TierRuleInput,
};
