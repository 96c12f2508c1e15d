//! # Catalog Access
//!
//! Read-only view of the product catalog and client registry. Both are
//! owned by other systems; the engine only looks things up.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::error::DbResult;
use tariff_core::{Client, Product, ProductFilter};

pub use memory::MemoryCatalog;
pub use sqlite::SqliteCatalog;

/// Product and client lookups.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// A product by id.
    async fn product(&self, id: &str) -> DbResult<Option<Product>>;

    /// Products passing `filter`, ordered by id.
    async fn list_products(&self, filter: &ProductFilter) -> DbResult<Vec<Product>>;

    /// A client by id.
    async fn client(&self, id: &str) -> DbResult<Option<Client>>;
}
