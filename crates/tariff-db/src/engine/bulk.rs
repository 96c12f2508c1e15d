//! # Bulk Tier Updater
//!
//! One discount applied to many products of a tier in a single transaction.
//!
//! ```text
//! filter ──► catalog.list_products ──► targets (≤ cap, else BatchTooLarge)
//!                                         │
//!                      one TierRuleDraft per target, base = catalog price
//!                                         │
//!                                         ▼
//!                          WriteBatch ── drop ──► nothing written
//!                                         │
//!                                         └── store.commit ──► all or none
//! ```
//!
//! A discount large enough to push a price below zero floors it at zero.

use std::sync::Arc;
use tracing::{debug, info};

use crate::catalog::Catalog;
use crate::error::DbResult;
use crate::store::{PricingStore, WriteBatch};
use tariff_core::validation::{validate_adjustment, validate_batch_size, validate_id};
use tariff_core::{Adjustment, BulkUpdateSummary, ProductFilter, TierRuleDraft, TierRuleKey};

/// Applies tier discounts across a filtered product set.
#[derive(Clone)]
pub struct BulkTierUpdater {
    store: Arc<dyn PricingStore>,
    catalog: Arc<dyn Catalog>,
    batch_cap: usize,
}

impl BulkTierUpdater {
    pub fn new(store: Arc<dyn PricingStore>, catalog: Arc<dyn Catalog>, batch_cap: usize) -> Self {
        BulkTierUpdater {
            store,
            catalog,
            batch_cap,
        }
    }

    /// Stages one tier upsert per matching product without writing.
    ///
    /// Dropping the returned batch discards the operation.
    pub async fn stage_bulk_discount(
        &self,
        tier_id: &str,
        discount: Adjustment,
        filter: &ProductFilter,
        actor: &str,
    ) -> DbResult<WriteBatch> {
        validate_id("tier_id", tier_id)?;
        validate_adjustment("discount_value", &discount)?;

        let targets = self.catalog.list_products(filter).await?;
        validate_batch_size(targets.len(), self.batch_cap)?;

        let mut batch = WriteBatch::with_capacity(targets.len());
        for product in &targets {
            batch.upsert_tier(TierRuleDraft::new(
                TierRuleKey::new(&product.id, tier_id),
                product.base_price(),
                discount,
                actor,
            )?);
        }

        debug!(tier_id, targets = batch.len(), ?filter, "Bulk discount staged");
        Ok(batch)
    }

    /// Stages and commits a bulk discount as one transaction.
    pub async fn apply_bulk_discount(
        &self,
        tier_id: &str,
        discount: Adjustment,
        filter: &ProductFilter,
        actor: &str,
    ) -> DbResult<BulkUpdateSummary> {
        let batch = self
            .stage_bulk_discount(tier_id, discount, filter, actor)
            .await?;
        if batch.is_empty() {
            debug!(tier_id, ?filter, "Bulk discount matched no products");
            return Ok(BulkUpdateSummary::default());
        }

        let outcomes = self.store.commit(batch).await?;
        let product_ids: Vec<String> = outcomes
            .iter()
            .filter_map(|o| o.tier_rule())
            .map(|r| r.product_id.clone())
            .collect();

        info!(
            tier_id,
            updated = product_ids.len(),
            kind = ?discount.kind,
            value = discount.value,
            actor,
            "Bulk tier discount applied"
        );
        Ok(BulkUpdateSummary {
            updated_count: product_ids.len(),
            product_ids,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fixtures;
    use crate::engine::rules::{RuleService, TierRuleInput};
    use crate::error::DbError;
    use crate::store::{MemoryPricingStore, StagedWrite};
    use tariff_core::{ValidationError, DEFAULT_BATCH_CAP};

    fn updater(cap: usize) -> (Arc<MemoryPricingStore>, BulkTierUpdater) {
        let store = fixtures::store();
        let updater = BulkTierUpdater::new(store.clone(), fixtures::catalog(), cap);
        (store, updater)
    }

    #[tokio::test]
    async fn test_completed_update_changes_exactly_the_targets() {
        let (store, updater) = updater(DEFAULT_BATCH_CAP);
        let summary = updater
            .apply_bulk_discount(
                "tier_2",
                Adjustment::percentage_bps(1000),
                &ProductFilter::category("network"),
                "ops",
            )
            .await
            .unwrap();

        assert_eq!(summary.updated_count, 2);
        assert_eq!(summary.product_ids, vec!["P1".to_string(), "P2".to_string()]);

        let rules = store.tier_rules_for_tier("tier_2").await.unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].final_price_cents, 76_500);
        assert_eq!(rules[1].final_price_cents, 45_000);
        assert!(rules.iter().all(|r| r.modified_by == "ops"));
    }

    #[tokio::test]
    async fn test_existing_rules_are_updated_in_place() {
        let (store, updater) = updater(DEFAULT_BATCH_CAP);
        let rules = RuleService::new(store.clone(), fixtures::catalog(), "tester");
        let before = rules
            .upsert_tier_rule(
                &TierRuleKey::new("P3", "tier_1"),
                TierRuleInput::discount(Adjustment::percentage_bps(500)),
                None,
            )
            .await
            .unwrap();

        updater
            .apply_bulk_discount(
                "tier_1",
                Adjustment::percentage_bps(2500),
                &ProductFilter::default(),
                "ops",
            )
            .await
            .unwrap();

        let after = store
            .active_tier_rule(&TierRuleKey::new("P3", "tier_1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after.id, before.id);
        assert_eq!(after.final_price_cents, 15_000);
        assert_eq!(store.tier_rules_for_tier("tier_1").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_interrupted_update_changes_nothing() {
        let (store, updater) = updater(DEFAULT_BATCH_CAP);
        store.fail_write_at(1);

        let result = updater
            .apply_bulk_discount(
                "tier_2",
                Adjustment::percentage_bps(1000),
                &ProductFilter::default(),
                "ops",
            )
            .await;

        assert!(matches!(result, Err(DbError::TransactionFailed(_))));
        assert!(store.tier_rules_for_tier("tier_2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_over_cap_is_rejected_before_writing() {
        let (store, updater) = updater(2);
        let result = updater
            .apply_bulk_discount(
                "tier_2",
                Adjustment::percentage_bps(1000),
                &ProductFilter::default(),
                "ops",
            )
            .await;

        assert!(matches!(
            result,
            Err(DbError::Validation(ValidationError::BatchTooLarge { size: 3, cap: 2 }))
        ));
        assert!(store.tier_rules_for_tier("tier_2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_target_set() {
        let (_, updater) = updater(DEFAULT_BATCH_CAP);
        let summary = updater
            .apply_bulk_discount(
                "tier_2",
                Adjustment::percentage_bps(1000),
                &ProductFilter::category("software"),
                "ops",
            )
            .await
            .unwrap();
        assert_eq!(summary.updated_count, 0);
        assert!(summary.product_ids.is_empty());
    }

    #[tokio::test]
    async fn test_aggressive_markdown_floors_at_zero() {
        let (store, updater) = updater(DEFAULT_BATCH_CAP);
        updater
            .apply_bulk_discount(
                "clearance",
                Adjustment::percentage_bps(15_000),
                &ProductFilter::ids(["P2", "P3"]),
                "ops",
            )
            .await
            .unwrap();

        let rules = store.tier_rules_for_tier("clearance").await.unwrap();
        assert_eq!(rules.len(), 2);
        assert!(rules.iter().all(|r| r.final_price_cents == 0));
    }

    #[tokio::test]
    async fn test_staged_batch_can_be_discarded() {
        let (store, updater) = updater(DEFAULT_BATCH_CAP);
        let batch = updater
            .stage_bulk_discount(
                "tier_2",
                Adjustment::fixed(tariff_core::Money::from_cents(1_000)),
                &ProductFilter::category("network"),
                "ops",
            )
            .await
            .unwrap();

        assert_eq!(batch.len(), 2);
        assert!(batch
            .writes()
            .iter()
            .all(|w| matches!(w, StagedWrite::UpsertTier(_))));
        drop(batch);
        assert!(store.tier_rules_for_tier("tier_2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_negative_discount_is_rejected() {
        let (_, updater) = updater(DEFAULT_BATCH_CAP);
        let result = updater
            .apply_bulk_discount(
                "tier_2",
                Adjustment::percentage_bps(-100),
                &ProductFilter::default(),
                "ops",
            )
            .await;
        assert!(matches!(result, Err(DbError::Validation(_))));
    }
}
