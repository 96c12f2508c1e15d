//! In-memory [`Catalog`] for tests.

use async_trait::async_trait;
use std::collections::BTreeMap;

use super::Catalog;
use crate::error::DbResult;
use tariff_core::{Client, Product, ProductFilter};

#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    products: BTreeMap<String, Product>,
    clients: BTreeMap<String, Client>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_product(mut self, product: Product) -> Self {
        self.products.insert(product.id.clone(), product);
        self
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.clients.insert(client.id.clone(), client);
        self
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn product(&self, id: &str) -> DbResult<Option<Product>> {
        Ok(self.products.get(id).cloned())
    }

    async fn list_products(&self, filter: &ProductFilter) -> DbResult<Vec<Product>> {
        Ok(self
            .products
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect())
    }

    async fn client(&self, id: &str) -> DbResult<Option<Client>> {
        Ok(self.clients.get(id).cloned())
    }
}
