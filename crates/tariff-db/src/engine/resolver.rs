//! # Price Resolver
//!
//! Authoritative unit price for one order line.
//!
//! ```text
//! PriceQuery ──► validate quantity ──► catalog: product, client?
//!                                          │
//!                          store: active client rule (client, product)
//!                          store: active tier rule   (product, tier)
//!                                          │
//!                                          ▼
//!                          tariff_core::resolution::decide_price
//! ```
//!
//! The tier consulted is the query's `tier_id` if given, else the client's
//! default tier. Resolution only reads committed state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::catalog::Catalog;
use crate::error::{DbError, DbResult};
use crate::store::PricingStore;
use tariff_core::resolution::{decide_price, ResolutionInput};
use tariff_core::validation::{validate_id, validate_quantity};
use tariff_core::{
    Client, ClientPriceRule, ClientRuleKey, Product, ResolvedPrice, RuleIndex, TierPriceRule,
    TierRuleKey,
};

/// One order line to price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuery {
    pub product_id: String,
    pub quantity: i64,
    pub client_id: Option<String>,
    /// Overrides the client's default tier.
    pub tier_id: Option<String>,
}

impl PriceQuery {
    /// An anonymous query: no client, no tier.
    pub fn new(product_id: impl Into<String>, quantity: i64) -> Self {
        PriceQuery {
            product_id: product_id.into(),
            quantity,
            client_id: None,
            tier_id: None,
        }
    }

    pub fn for_client(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn in_tier(mut self, tier_id: impl Into<String>) -> Self {
        self.tier_id = Some(tier_id.into());
        self
    }
}

/// Resolves prices against committed rules and the catalog.
#[derive(Clone)]
pub struct PriceResolver {
    store: Arc<dyn PricingStore>,
    catalog: Arc<dyn Catalog>,
}

impl PriceResolver {
    pub fn new(store: Arc<dyn PricingStore>, catalog: Arc<dyn Catalog>) -> Self {
        PriceResolver { store, catalog }
    }

    /// Resolves a line as of now.
    pub async fn resolve(&self, query: &PriceQuery) -> DbResult<ResolvedPrice> {
        self.resolve_at(query, Utc::now()).await
    }

    /// Resolves a line as of `now`. Validity windows compare calendar days.
    pub async fn resolve_at(&self, query: &PriceQuery, now: DateTime<Utc>) -> DbResult<ResolvedPrice> {
        let (product, client) = self.lookup(query).await?;

        let client_rule = match client {
            Some(ref c) => {
                self.store
                    .active_client_rule(&ClientRuleKey::new(&c.id, &product.id))
                    .await?
            }
            None => None,
        };

        let tier_id = effective_tier(query, client.as_ref());
        let tier_rule = match tier_id {
            Some(tier) => {
                self.store
                    .active_tier_rule(&TierRuleKey::new(&product.id, tier))
                    .await?
            }
            None => None,
        };

        let resolved = decide_price(ResolutionInput {
            product: &product,
            quantity: query.quantity,
            on: now.date_naive(),
            client_rule: client_rule.as_ref(),
            tier_id,
            tier_rule: tier_rule.as_ref(),
        });

        debug!(
            product_id = %product.id,
            quantity = query.quantity,
            client_id = ?query.client_id,
            source = %resolved.source,
            unit_price = %resolved.unit_price,
            "Price resolved"
        );
        Ok(resolved)
    }

    /// Resolves several lines against one snapshot of the active rules.
    ///
    /// Every line sees the same committed state. Fails on the first line
    /// that does not validate or names an unknown product or client.
    pub async fn resolve_many(
        &self,
        queries: &[PriceQuery],
        now: DateTime<Utc>,
    ) -> DbResult<Vec<ResolvedPrice>> {
        let index = self.store.load_index().await?;
        let on = now.date_naive();
        let mut products: HashMap<String, Product> = HashMap::new();
        let mut clients: HashMap<String, Client> = HashMap::new();
        let mut resolved = Vec::with_capacity(queries.len());

        for query in queries {
            validate_query(query)?;

            if !products.contains_key(&query.product_id) {
                let product = self.require_product(&query.product_id).await?;
                products.insert(product.id.clone(), product);
            }
            if let Some(ref client_id) = query.client_id {
                if !clients.contains_key(client_id) {
                    let client = self.require_client(client_id).await?;
                    clients.insert(client.id.clone(), client);
                }
            }

            let product = products
                .get(&query.product_id)
                .ok_or_else(|| DbError::not_found("Product", &query.product_id))?;
            let client = query.client_id.as_ref().and_then(|id| clients.get(id));
            let (client_rule, tier_id, tier_rule) = snapshot_rules(&index, query, client);

            resolved.push(decide_price(ResolutionInput {
                product,
                quantity: query.quantity,
                on,
                client_rule,
                tier_id,
                tier_rule,
            }));
        }

        debug!(lines = resolved.len(), "Prices resolved from snapshot");
        Ok(resolved)
    }

    async fn lookup(&self, query: &PriceQuery) -> DbResult<(Product, Option<Client>)> {
        validate_query(query)?;
        let product = self.require_product(&query.product_id).await?;
        let client = match query.client_id {
            Some(ref id) => Some(self.require_client(id).await?),
            None => None,
        };
        Ok((product, client))
    }

    async fn require_product(&self, id: &str) -> DbResult<Product> {
        self.catalog
            .product(id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    async fn require_client(&self, id: &str) -> DbResult<Client> {
        self.catalog
            .client(id)
            .await?
            .ok_or_else(|| DbError::not_found("Client", id))
    }
}

fn validate_query(query: &PriceQuery) -> DbResult<()> {
    validate_id("product_id", &query.product_id)?;
    if let Some(ref client_id) = query.client_id {
        validate_id("client_id", client_id)?;
    }
    validate_quantity(query.quantity)?;
    Ok(())
}

fn effective_tier<'a>(query: &'a PriceQuery, client: Option<&'a Client>) -> Option<&'a str> {
    query
        .tier_id
        .as_deref()
        .or_else(|| client.map(|c| c.default_tier_id.as_str()))
}

fn snapshot_rules<'a>(
    index: &'a RuleIndex,
    query: &'a PriceQuery,
    client: Option<&'a Client>,
) -> (Option<&'a ClientPriceRule>, Option<&'a str>, Option<&'a TierPriceRule>) {
    let client_rule =
        client.and_then(|c| index.client_rule(&ClientRuleKey::new(&c.id, &query.product_id)));
    let tier_id = effective_tier(query, client);
    let tier_rule =
        tier_id.and_then(|tier| index.tier_rule(&TierRuleKey::new(&query.product_id, tier)));
    (client_rule, tier_id, tier_rule)
}
