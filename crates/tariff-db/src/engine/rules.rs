//! # Rule Service
//!
//! Update-or-create for tier and client rules, retirement of client rules,
//! and final-price previews.
//!
//! ## Upsert Flow
//! ```text
//! input ──► validate ──► catalog lookup ──► Draft (final price computed)
//!                                              │
//!                     preview_* stops here ◄───┤
//!                                              ▼
//!                          WriteBatch[Upsert*] ──► store.commit
//!                                                    │
//!                          existing active rule? ────┤
//!                            yes → same id, new values
//!                            no  → new id
//! ```
//!
//! Preview and upsert both go through the draft constructors, which own the
//! single call to [`tariff_core::compute_final_price`].

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::catalog::Catalog;
use crate::error::{DbError, DbResult};
use crate::store::{PricingStore, WriteBatch, WriteOutcome};
use tariff_core::validation::{validate_adjustment, validate_id};
use tariff_core::{
    Adjustment, ClientPriceRule, ClientPricing, ClientRuleDraft, ClientRuleKey, ClientRuleTerms,
    DraftOrigin, Money, Product, TierPriceRule, TierRuleDraft, TierRuleKey,
    DEFAULT_MIN_QUANTITY,
};

// =============================================================================
// Inputs
// =============================================================================

/// Caller-supplied fields of a tier rule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierRuleInput {
    /// Defaults to the catalog base price.
    pub base_price: Option<Money>,
    pub discount: Adjustment,
}

impl TierRuleInput {
    /// A discount off the catalog base price.
    pub fn discount(discount: Adjustment) -> Self {
        TierRuleInput {
            base_price: None,
            discount,
        }
    }
}

/// Client pricing as entered; the markup base may be left to the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientPricingInput {
    Fixed { price: Money },
    Markup { base: Option<Money>, markup: Adjustment },
}

/// Caller-supplied fields of a client rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientRuleInput {
    pub pricing: ClientPricingInput,
    pub agreement_ref: String,
    /// Defaults to today.
    pub valid_from: Option<NaiveDate>,
    /// Inclusive; `None` is open-ended.
    pub valid_until: Option<NaiveDate>,
    /// Defaults to 1.
    pub min_quantity: Option<i64>,
    pub notes: Option<String>,
}

impl ClientRuleInput {
    /// A negotiated fixed price, valid from today, minimum quantity 1.
    pub fn fixed(price: Money, agreement_ref: impl Into<String>) -> Self {
        ClientRuleInput {
            pricing: ClientPricingInput::Fixed { price },
            agreement_ref: agreement_ref.into(),
            valid_from: None,
            valid_until: None,
            min_quantity: None,
            notes: None,
        }
    }

    /// A markup over `base` (or the catalog base price).
    pub fn markup(base: Option<Money>, markup: Adjustment, agreement_ref: impl Into<String>) -> Self {
        ClientRuleInput {
            pricing: ClientPricingInput::Markup { base, markup },
            ..Self::fixed(Money::zero(), agreement_ref)
        }
    }
}

// =============================================================================
// Rule Service
// =============================================================================

/// Writes and previews pricing rules.
#[derive(Clone)]
pub struct RuleService {
    store: Arc<dyn PricingStore>,
    catalog: Arc<dyn Catalog>,
    default_actor: String,
}

impl RuleService {
    pub fn new(
        store: Arc<dyn PricingStore>,
        catalog: Arc<dyn Catalog>,
        default_actor: impl Into<String>,
    ) -> Self {
        RuleService {
            store,
            catalog,
            default_actor: default_actor.into(),
        }
    }

    fn actor<'a>(&'a self, actor: Option<&'a str>) -> &'a str {
        actor.unwrap_or(&self.default_actor)
    }

    async fn require_product(&self, id: &str) -> DbResult<Product> {
        self.catalog
            .product(id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    // =========================================================================
    // Tier Rules
    // =========================================================================

    /// Validates a tier rule and computes its final price without writing.
    pub async fn stage_tier_rule(
        &self,
        key: &TierRuleKey,
        input: TierRuleInput,
        actor: Option<&str>,
    ) -> DbResult<TierRuleDraft> {
        validate_id("product_id", &key.product_id)?;
        validate_id("tier_id", &key.tier_id)?;
        validate_adjustment("discount_value", &input.discount)?;

        let product = self.require_product(&key.product_id).await?;
        let base = input.base_price.unwrap_or_else(|| product.base_price());

        Ok(TierRuleDraft::new(
            key.clone(),
            base,
            input.discount,
            self.actor(actor),
        )?)
    }

    /// The final price an upsert would store.
    pub async fn preview_tier_price(&self, key: &TierRuleKey, input: TierRuleInput) -> DbResult<Money> {
        Ok(self.stage_tier_rule(key, input, None).await?.final_price())
    }

    /// Overwrites the active tier rule for `key` in place, or creates one.
    pub async fn upsert_tier_rule(
        &self,
        key: &TierRuleKey,
        input: TierRuleInput,
        actor: Option<&str>,
    ) -> DbResult<TierPriceRule> {
        let draft = self.stage_tier_rule(key, input, actor).await?;
        let mut batch = WriteBatch::with_capacity(1);
        batch.upsert_tier(draft);

        let outcome = single_outcome(self.store.commit(batch).await?)?;
        let created = matches!(outcome, WriteOutcome::TierCreated(_));
        let rule = outcome
            .tier_rule()
            .cloned()
            .ok_or_else(|| DbError::Internal("tier upsert produced no rule".into()))?;

        info!(
            id = %rule.id,
            %key,
            final_price = %rule.final_price(),
            created,
            "Tier rule upserted"
        );
        Ok(rule)
    }

    // =========================================================================
    // Client Rules
    // =========================================================================

    /// Validates a client rule and computes its final price without writing.
    pub async fn stage_client_rule(
        &self,
        key: &ClientRuleKey,
        input: ClientRuleInput,
        actor: Option<&str>,
    ) -> DbResult<ClientRuleDraft> {
        validate_id("client_id", &key.client_id)?;
        validate_id("product_id", &key.product_id)?;
        if let ClientPricingInput::Markup { ref markup, .. } = input.pricing {
            validate_adjustment("markup_value", markup)?;
        }

        self.catalog
            .client(&key.client_id)
            .await?
            .ok_or_else(|| DbError::not_found("Client", &key.client_id))?;
        let product = self.require_product(&key.product_id).await?;

        let pricing = match input.pricing {
            ClientPricingInput::Fixed { price } => ClientPricing::Fixed { price },
            ClientPricingInput::Markup { base, markup } => ClientPricing::Markup {
                base: base.unwrap_or_else(|| product.base_price()),
                markup,
            },
        };

        let terms = ClientRuleTerms {
            agreement_ref: input.agreement_ref,
            valid_from: input.valid_from.unwrap_or_else(|| Utc::now().date_naive()),
            valid_until: input.valid_until,
            min_quantity: input.min_quantity.unwrap_or(DEFAULT_MIN_QUANTITY),
            notes: input.notes,
        };

        debug!(%key, ?pricing, "Client rule staged");
        Ok(ClientRuleDraft::new(
            key.clone(),
            pricing,
            terms,
            DraftOrigin::Manual,
            self.actor(actor),
        )?)
    }

    /// The final price an upsert would store.
    pub async fn preview_client_price(
        &self,
        key: &ClientRuleKey,
        input: ClientRuleInput,
    ) -> DbResult<Money> {
        Ok(self.stage_client_rule(key, input, None).await?.final_price())
    }

    /// Overwrites the active client rule for `key` in place, or creates one.
    ///
    /// Stamps priority 1 (manual). Historical rules are created only by the
    /// import processor.
    pub async fn upsert_client_rule(
        &self,
        key: &ClientRuleKey,
        input: ClientRuleInput,
        actor: Option<&str>,
    ) -> DbResult<ClientPriceRule> {
        let draft = self.stage_client_rule(key, input, actor).await?;
        let mut batch = WriteBatch::with_capacity(1);
        batch.upsert_client(draft);

        let outcome = single_outcome(self.store.commit(batch).await?)?;
        let created = outcome.is_client_created();
        let rule = outcome
            .client_rule()
            .cloned()
            .ok_or_else(|| DbError::Internal("client upsert produced no rule".into()))?;

        info!(
            id = %rule.id,
            %key,
            final_price = %rule.final_price(),
            created,
            "Client rule upserted"
        );
        Ok(rule)
    }

    /// Retires the active client rule for `key`. The record is kept.
    pub async fn deactivate_client_rule(
        &self,
        key: &ClientRuleKey,
        actor: Option<&str>,
    ) -> DbResult<ClientPriceRule> {
        validate_id("client_id", &key.client_id)?;
        validate_id("product_id", &key.product_id)?;

        let mut batch = WriteBatch::with_capacity(1);
        batch.deactivate_client(key.clone(), self.actor(actor));

        let outcome = single_outcome(self.store.commit(batch).await?)?;
        let rule = outcome
            .client_rule()
            .cloned()
            .ok_or_else(|| DbError::Internal("deactivation produced no rule".into()))?;

        info!(id = %rule.id, %key, "Client rule deactivated");
        Ok(rule)
    }
}

fn single_outcome(outcomes: Vec<WriteOutcome>) -> DbResult<WriteOutcome> {
    outcomes
        .into_iter()
        .next()
        .ok_or_else(|| DbError::Internal("commit returned no outcome".into()))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fixtures;
    use crate::store::MemoryPricingStore;
    use tariff_core::{PriceSource, PricingType, ValidationError, PRIORITY_MANUAL};

    fn service() -> (Arc<MemoryPricingStore>, RuleService) {
        let store = fixtures::store();
        let service = RuleService::new(store.clone(), fixtures::catalog(), "system");
        (store, service)
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_upsert_tier_twice_yields_one_rule() {
        let (store, service) = service();
        let key = TierRuleKey::new("P1", "tier_1");
        let input = TierRuleInput {
            base_price: Some(Money::from_cents(10_000)),
            discount: Adjustment::percentage_bps(1000),
        };

        let first = service.upsert_tier_rule(&key, input, Some("alice")).await.unwrap();
        let second = service.upsert_tier_rule(&key, input, Some("alice")).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.final_price_cents, 9_000);
        assert!(second.last_modified >= first.last_modified);
        assert_eq!(store.tier_rules_for_tier("tier_1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_tier_base_price_defaults_to_catalog() {
        let (_, service) = service();
        let rule = service
            .upsert_tier_rule(
                &TierRuleKey::new("P1", "tier_1"),
                TierRuleInput::discount(Adjustment::percentage_bps(1500)),
                None,
            )
            .await
            .unwrap();
        assert_eq!(rule.base_price_cents, 85_000);
        assert_eq!(rule.final_price_cents, 72_250);
        assert_eq!(rule.modified_by, "system");
    }

    #[tokio::test]
    async fn test_fixed_discount_and_floor() {
        let (_, service) = service();
        let key = TierRuleKey::new("P1", "tier_2");

        let fixed = TierRuleInput {
            base_price: Some(Money::from_cents(10_000)),
            discount: Adjustment::fixed(Money::from_cents(1_500)),
        };
        assert_eq!(service.preview_tier_price(&key, fixed).await.unwrap().cents(), 8_500);

        let aggressive = TierRuleInput {
            base_price: Some(Money::from_cents(10_000)),
            discount: Adjustment::percentage_bps(15_000),
        };
        let rule = service.upsert_tier_rule(&key, aggressive, None).await.unwrap();
        assert_eq!(rule.final_price_cents, 0);
    }

    #[tokio::test]
    async fn test_negative_discount_writes_nothing() {
        let (store, service) = service();
        let result = service
            .upsert_tier_rule(
                &TierRuleKey::new("P1", "tier_1"),
                TierRuleInput::discount(Adjustment::percentage_bps(-500)),
                None,
            )
            .await;

        assert!(matches!(
            result,
            Err(DbError::Validation(ValidationError::MustBeNonNegative { .. }))
        ));
        assert!(store.tier_rules_for_tier("tier_1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_product_is_not_found() {
        let (_, service) = service();
        let result = service
            .upsert_tier_rule(
                &TierRuleKey::new("P404", "tier_1"),
                TierRuleInput::discount(Adjustment::percentage_bps(0)),
                None,
            )
            .await;
        assert!(matches!(result, Err(DbError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_client_markup_uses_catalog_base() {
        let (_, service) = service();
        let key = ClientRuleKey::new("C1", "P3");

        let preview = service
            .preview_client_price(
                &key,
                ClientRuleInput::markup(None, Adjustment::percentage_bps(2000), "AGR-9"),
            )
            .await
            .unwrap();
        assert_eq!(preview.cents(), 24_000);

        let rule = service
            .upsert_client_rule(
                &key,
                ClientRuleInput::markup(None, Adjustment::percentage_bps(2000), "AGR-9"),
                Some("alice"),
            )
            .await
            .unwrap();
        assert_eq!(rule.pricing_type, PricingType::Markup);
        assert_eq!(rule.final_price_cents, preview.cents());
        assert_eq!(rule.priority, PRIORITY_MANUAL);
        assert_eq!(rule.price_source, PriceSource::Manual);
        assert_eq!(rule.valid_from, Utc::now().date_naive());
    }

    #[tokio::test]
    async fn test_extreme_markup_saturates() {
        let (_, service) = service();
        let key = ClientRuleKey::new("C1", "P1");

        let fixed = service
            .preview_client_price(
                &key,
                ClientRuleInput::markup(None, Adjustment::fixed(Money::from_cents(i64::MAX)), "AGR-X"),
            )
            .await
            .unwrap();
        assert_eq!(fixed.cents(), i64::MAX);

        let percentage = service
            .preview_client_price(
                &key,
                ClientRuleInput::markup(None, Adjustment::percentage_bps(i64::MAX), "AGR-X"),
            )
            .await
            .unwrap();
        assert_eq!(percentage.cents(), i64::MAX);
    }

    #[tokio::test]
    async fn test_client_upsert_overwrites_in_place() {
        let (store, service) = service();
        let key = ClientRuleKey::new("C1", "P1");

        let first = service
            .upsert_client_rule(&key, ClientRuleInput::fixed(Money::from_cents(70_000), "AGR-1"), None)
            .await
            .unwrap();
        let mut input = ClientRuleInput::fixed(Money::from_cents(68_000), "AGR-2");
        input.min_quantity = Some(10);
        let second = service.upsert_client_rule(&key, input, Some("bob")).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.final_price_cents, 68_000);
        assert_eq!(second.min_quantity, 10);
        assert_eq!(second.created_by, "system");
        assert_eq!(second.modified_by, "bob");
        assert_eq!(store.client_rules_for_client("C1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_client_rule_validation() {
        let (_, service) = service();
        let key = ClientRuleKey::new("C1", "P1");

        let mut inverted = ClientRuleInput::fixed(Money::from_cents(1), "AGR");
        inverted.valid_from = Some(day(2025, 3, 1));
        inverted.valid_until = Some(day(2025, 2, 1));
        assert!(matches!(
            service.upsert_client_rule(&key, inverted, None).await,
            Err(DbError::Validation(ValidationError::InvalidRange { .. }))
        ));

        let mut zero_qty = ClientRuleInput::fixed(Money::from_cents(1), "AGR");
        zero_qty.min_quantity = Some(0);
        assert!(service.upsert_client_rule(&key, zero_qty, None).await.is_err());

        let unknown_client = ClientRuleKey::new("C404", "P1");
        assert!(matches!(
            service
                .upsert_client_rule(&unknown_client, ClientRuleInput::fixed(Money::from_cents(1), "AGR"), None)
                .await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_deactivate_never_resurrects() {
        let (store, service) = service();
        let key = ClientRuleKey::new("C1", "P1");

        let original = service
            .upsert_client_rule(&key, ClientRuleInput::fixed(Money::from_cents(70_000), "AGR-1"), None)
            .await
            .unwrap();
        let retired = service.deactivate_client_rule(&key, Some("carol")).await.unwrap();
        assert_eq!(retired.id, original.id);
        assert!(!retired.is_active);

        let replacement = service
            .upsert_client_rule(&key, ClientRuleInput::fixed(Money::from_cents(71_000), "AGR-3"), None)
            .await
            .unwrap();
        assert_ne!(replacement.id, original.id);

        let still_retired = store.client_rule(&original.id).await.unwrap().unwrap();
        assert!(!still_retired.is_active);
        assert_eq!(still_retired.final_price_cents, 70_000);
    }

    #[tokio::test]
    async fn test_deactivate_missing_rule_is_not_found() {
        let (_, service) = service();
        let result = service
            .deactivate_client_rule(&ClientRuleKey::new("C1", "P2"), None)
            .await;
        assert!(matches!(result, Err(DbError::NotFound { .. })));
    }
}
