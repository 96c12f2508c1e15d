//! # Pricing Engine
//!
//! The four pricing operations, wired to a [`PricingStore`] and a
//! [`Catalog`] chosen by the caller.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          PricingEngine                                  │
//! │                                                                         │
//! │   ┌──────────────┐ ┌──────────────┐ ┌─────────────────┐ ┌────────────┐ │
//! │   │ RuleService  │ │PriceResolver │ │ HistoricalImport│ │ BulkTier   │ │
//! │   │ upsert/retire│ │ client→tier→ │ │ Processor       │ │ Updater    │ │
//! │   │ preview      │ │ catalog      │ │ ledger + rules  │ │ one tx     │ │
//! │   └──────┬───────┘ └──────┬───────┘ └────────┬────────┘ └─────┬──────┘ │
//! │          │                │                  │                │        │
//! │   ┌──────▼────────────────▼──────────────────▼────────────────▼──────┐ │
//! │   │        Arc<dyn PricingStore>          Arc<dyn Catalog>           │ │
//! │   └──────────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod bulk;
pub mod import;
pub mod resolver;
pub mod rules;

use std::sync::Arc;

use crate::catalog::Catalog;
use crate::config::EngineSettings;
use crate::store::PricingStore;

pub use bulk::BulkTierUpdater;
pub use import::{HistoricalImportProcessor, ImportContext};
pub use resolver::{PriceQuery, PriceResolver};
pub use rules::{ClientPricingInput, ClientRuleInput, RuleService, TierRuleInput};

/// Hands out engine components sharing one store and catalog.
#[derive(Clone)]
pub struct PricingEngine {
    store: Arc<dyn PricingStore>,
    catalog: Arc<dyn Catalog>,
    settings: EngineSettings,
}

impl PricingEngine {
    pub fn new(
        store: Arc<dyn PricingStore>,
        catalog: Arc<dyn Catalog>,
        settings: EngineSettings,
    ) -> Self {
        PricingEngine {
            store,
            catalog,
            settings,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn rules(&self) -> RuleService {
        RuleService::new(
            self.store.clone(),
            self.catalog.clone(),
            self.settings.default_actor.clone(),
        )
    }

    pub fn resolver(&self) -> PriceResolver {
        PriceResolver::new(self.store.clone(), self.catalog.clone())
    }

    pub fn importer(&self) -> HistoricalImportProcessor {
        HistoricalImportProcessor::new(
            self.store.clone(),
            self.catalog.clone(),
            self.settings.batch_cap,
        )
    }

    pub fn bulk(&self) -> BulkTierUpdater {
        BulkTierUpdater::new(self.store.clone(), self.catalog.clone(), self.settings.batch_cap)
    }

    /// Import context stamped with the configured default actor and today's date.
    pub fn import_context(&self) -> ImportContext {
        ImportContext::new(self.settings.default_actor.clone())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::sync::Arc;

    use crate::catalog::MemoryCatalog;
    use crate::store::MemoryPricingStore;
    use tariff_core::{Client, Product};

    pub fn product(id: &str, category: &str, cents: i64) -> Product {
        Product {
            id: id.into(),
            name: format!("Product {}", id),
            category: category.into(),
            base_price_cents: cents,
        }
    }

    pub fn client(id: &str, tier: &str) -> Client {
        Client {
            id: id.into(),
            name: format!("Client {}", id),
            default_tier_id: tier.into(),
        }
    }

    /// P1 850.00 and P2 500.00 (network), P3 200.00 (storage); clients C1, C2 on tier_1.
    pub fn catalog() -> Arc<MemoryCatalog> {
        Arc::new(
            MemoryCatalog::new()
                .with_product(product("P1", "network", 85_000))
                .with_product(product("P2", "network", 50_000))
                .with_product(product("P3", "storage", 20_000))
                .with_client(client("C1", "tier_1"))
                .with_client(client("C2", "tier_1")),
        )
    }

    pub fn store() -> Arc<MemoryPricingStore> {
        Arc::new(MemoryPricingStore::new())
    }
}
