//! # SQLite Catalog
//!
//! Reads the `products` and `clients` tables. The insert methods exist for
//! seeding and tests; the pricing engine never calls them.

use async_trait::async_trait;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use super::Catalog;
use crate::error::DbResult;
use tariff_core::{Client, Product, ProductFilter};

/// Catalog backed by SQLite.
///
/// ## Usage
/// ```rust,ignore
/// let catalog = db.catalog();
/// let switches = catalog.list_products(&ProductFilter::category("network")).await?;
/// ```
#[derive(Debug, Clone)]
pub struct SqliteCatalog {
    pool: SqlitePool,
}

impl SqliteCatalog {
    pub fn new(pool: SqlitePool) -> Self {
        SqliteCatalog { pool }
    }

    /// Inserts a product.
    pub async fn insert_product(&self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (id, name, category, base_price_cents)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.category)
        .bind(product.base_price_cents)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Inserts a client.
    pub async fn insert_client(&self, client: &Client) -> DbResult<()> {
        debug!(id = %client.id, "Inserting client");

        sqlx::query(
            r#"
            INSERT INTO clients (id, name, default_tier_id)
            VALUES (?1, ?2, ?3)
            "#,
        )
        .bind(&client.id)
        .bind(&client.name)
        .bind(&client.default_tier_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl Catalog for SqliteCatalog {
    async fn product(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            "SELECT id, name, category, base_price_cents FROM products WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    async fn list_products(&self, filter: &ProductFilter) -> DbResult<Vec<Product>> {
        if matches!(filter.product_ids, Some(ref ids) if ids.is_empty()) {
            return Ok(Vec::new());
        }

        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT id, name, category, base_price_cents FROM products WHERE 1 = 1");

        if let Some(ref category) = filter.category {
            query.push(" AND category = ").push_bind(category);
        }

        if let Some(ref ids) = filter.product_ids {
            query.push(" AND id IN (");
            let mut separated = query.separated(", ");
            for id in ids {
                separated.push_bind(id);
            }
            separated.push_unseparated(")");
        }

        query.push(" ORDER BY id");

        let products = query
            .build_query_as::<Product>()
            .fetch_all(&self.pool)
            .await?;

        debug!(count = products.len(), ?filter, "Listed products");
        Ok(products)
    }

    async fn client(&self, id: &str) -> DbResult<Option<Client>> {
        let client = sqlx::query_as::<_, Client>(
            "SELECT id, name, default_tier_id FROM clients WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::pool::{Database, DbConfig};

    fn product(id: &str, category: &str, cents: i64) -> Product {
        Product {
            id: id.into(),
            name: format!("Product {}", id),
            category: category.into(),
            base_price_cents: cents,
        }
    }

    async fn seeded() -> SqliteCatalog {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let catalog = db.catalog();
        catalog.insert_product(&product("P1", "network", 85_000)).await.unwrap();
        catalog.insert_product(&product("P2", "network", 50_000)).await.unwrap();
        catalog.insert_product(&product("P3", "storage", 20_000)).await.unwrap();
        catalog
    }

    #[tokio::test]
    async fn test_product_lookup() {
        let catalog = seeded().await;
        let p1 = catalog.product("P1").await.unwrap().unwrap();
        assert_eq!(p1.base_price_cents, 85_000);
        assert!(catalog.product("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_products_filters() {
        let catalog = seeded().await;

        let all = catalog.list_products(&ProductFilter::default()).await.unwrap();
        assert_eq!(all.len(), 3);

        let network = catalog
            .list_products(&ProductFilter::category("network"))
            .await
            .unwrap();
        assert_eq!(network.len(), 2);

        let both = ProductFilter {
            category: Some("network".into()),
            product_ids: Some(vec!["P2".into(), "P3".into()]),
        };
        let ids: Vec<String> = catalog
            .list_products(&both)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec!["P2".to_string()]);

        let none = catalog
            .list_products(&ProductFilter::ids(Vec::<String>::new()))
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_product_is_unique_violation() {
        let catalog = seeded().await;
        let err = catalog
            .insert_product(&product("P1", "network", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_client_lookup() {
        let catalog = seeded().await;
        catalog
            .insert_client(&Client {
                id: "C1".into(),
                name: "Acme".into(),
                default_tier_id: "tier_1".into(),
            })
            .await
            .unwrap();
        let client = catalog.client("C1").await.unwrap().unwrap();
        assert_eq!(client.default_tier_id, "tier_1");
    }
}
