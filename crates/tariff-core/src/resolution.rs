//! # Price Resolution
//!
//! The precedence decision, as a pure function of already-fetched rules.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. Client rule                                                         │
//! │     active ∧ quantity ≥ min_quantity ∧ valid_from ≤ today ≤ valid_until │
//! │       └── yes ─► finalPrice, source = client                            │
//! │  2. Tier rule for (product, tier_id ?? client.default_tier_id)          │
//! │       └── yes ─► finalPrice, source = tier                              │
//! │  3. Product.basePrice, source = catalog_default                         │
//! │                                                                         │
//! │  First match wins. Rule priority is never consulted.                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;

use crate::types::{ClientPriceRule, Product, ResolutionSource, ResolvedPrice, TierPriceRule};

/// Everything the decision needs, gathered by the caller.
#[derive(Debug, Clone, Copy)]
pub struct ResolutionInput<'a> {
    pub product: &'a Product,
    pub quantity: i64,
    /// The day the order is priced for.
    pub on: NaiveDate,
    /// Active client rule for (client, product), if a client was named.
    pub client_rule: Option<&'a ClientPriceRule>,
    /// Tier consulted at step 2.
    pub tier_id: Option<&'a str>,
    /// Active tier rule for (product, tier_id), if any.
    pub tier_rule: Option<&'a TierPriceRule>,
}

/// Picks the authoritative unit price.
pub fn decide_price(input: ResolutionInput<'_>) -> ResolvedPrice {
    let tier_id = input.tier_id.map(str::to_string);

    if let Some(rule) = input.client_rule {
        if rule.applies_to(input.quantity, input.on) {
            return ResolvedPrice {
                unit_price: rule.final_price(),
                source: ResolutionSource::Client,
                rule_id: Some(rule.id.clone()),
                tier_id,
            };
        }
    }

    if let Some(rule) = input.tier_rule.filter(|r| r.is_active) {
        return ResolvedPrice {
            unit_price: rule.final_price(),
            source: ResolutionSource::Tier,
            rule_id: Some(rule.id.clone()),
            tier_id,
        };
    }

    ResolvedPrice {
        unit_price: input.product.base_price(),
        source: ResolutionSource::CatalogDefault,
        rule_id: None,
        tier_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;
    use crate::types::{AdjustmentKind, PriceSource, PricingType};
    use chrono::Utc;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn product() -> Product {
        Product {
            id: "P1".into(),
            name: "Managed switch".into(),
            category: "network".into(),
            base_price_cents: 85_000,
        }
    }

    fn tier_rule() -> TierPriceRule {
        let now = Utc::now();
        TierPriceRule {
            id: "tier-rule".into(),
            product_id: "P1".into(),
            tier_id: "tier_1".into(),
            base_price_cents: 85_000,
            discount_type: AdjustmentKind::Percentage,
            discount_value: 1500,
            final_price_cents: 72_250,
            is_active: true,
            created_at: now,
            last_modified: now,
            modified_by: "tester".into(),
        }
    }

    fn client_rule(valid_until: Option<NaiveDate>) -> ClientPriceRule {
        let now = Utc::now();
        ClientPriceRule {
            id: "client-rule".into(),
            client_id: "C1".into(),
            product_id: "P1".into(),
            pricing_type: PricingType::Fixed,
            fixed_price_cents: Some(70_000),
            base_price_cents: None,
            markup_type: None,
            markup_value: None,
            final_price_cents: 70_000,
            agreement_ref: "AGR-1".into(),
            valid_from: date(2025, 1, 1),
            valid_until,
            min_quantity: 10,
            priority: 2,
            price_source: PriceSource::Historical,
            based_on_history_id: None,
            notes: None,
            is_active: true,
            created_at: now,
            created_by: "tester".into(),
            last_modified: now,
            modified_by: "tester".into(),
        }
    }

    fn input<'a>(
        product: &'a Product,
        quantity: i64,
        on: NaiveDate,
        client_rule: Option<&'a ClientPriceRule>,
        tier_rule: Option<&'a TierPriceRule>,
    ) -> ResolutionInput<'a> {
        ResolutionInput {
            product,
            quantity,
            on,
            client_rule,
            tier_id: Some("tier_1"),
            tier_rule,
        }
    }

    #[test]
    fn test_client_rule_wins_regardless_of_priority() {
        let (p, c, t) = (product(), client_rule(None), tier_rule());
        let resolved = decide_price(input(&p, 20, date(2025, 2, 1), Some(&c), Some(&t)));
        assert_eq!(resolved.source, ResolutionSource::Client);
        assert_eq!(resolved.unit_price, Money::from_cents(70_000));
        assert_eq!(resolved.rule_id.as_deref(), Some("client-rule"));
    }

    #[test]
    fn test_below_min_quantity_falls_back_to_tier() {
        let (p, c, t) = (product(), client_rule(None), tier_rule());
        let resolved = decide_price(input(&p, 5, date(2025, 2, 1), Some(&c), Some(&t)));
        assert_eq!(resolved.source, ResolutionSource::Tier);
        assert_eq!(resolved.unit_price, Money::from_cents(72_250));
    }

    #[test]
    fn test_expired_client_rule_falls_back_to_tier() {
        let (p, c, t) = (product(), client_rule(Some(date(2025, 1, 31))), tier_rule());
        let resolved = decide_price(input(&p, 20, date(2025, 2, 1), Some(&c), Some(&t)));
        assert_eq!(resolved.source, ResolutionSource::Tier);
    }

    #[test]
    fn test_not_yet_valid_client_rule_is_ignored() {
        let (p, c, t) = (product(), client_rule(None), tier_rule());
        let resolved = decide_price(input(&p, 20, date(2024, 12, 31), Some(&c), Some(&t)));
        assert_eq!(resolved.source, ResolutionSource::Tier);
    }

    #[test]
    fn test_catalog_default_when_no_rules() {
        let p = product();
        let resolved = decide_price(input(&p, 1, date(2025, 2, 1), None, None));
        assert_eq!(resolved.source, ResolutionSource::CatalogDefault);
        assert_eq!(resolved.unit_price, Money::from_cents(85_000));
        assert!(resolved.rule_id.is_none());
    }

    #[test]
    fn test_retired_tier_rule_is_ignored() {
        let p = product();
        let mut t = tier_rule();
        t.is_active = false;
        let resolved = decide_price(input(&p, 1, date(2025, 2, 1), None, Some(&t)));
        assert_eq!(resolved.source, ResolutionSource::CatalogDefault);
    }
}
