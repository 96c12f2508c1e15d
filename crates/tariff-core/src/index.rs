//! # Active Rule Index
//!
//! O(1) composite-key lookup over the active pricing rules.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  persisted rules (active + retired)                                     │
//! │       │                                                                 │
//! │       ▼  RuleIndex::rebuild                                             │
//! │  ┌──────────────────────────────┐   ┌──────────────────────────────┐   │
//! │  │ TierRuleKey → TierPriceRule  │   │ ClientRuleKey → ClientRule   │   │
//! │  │ (product_id, tier_id)        │   │ (client_id, product_id)      │   │
//! │  └──────────────────────────────┘   └──────────────────────────────┘   │
//! │                                                                         │
//! │  Only is_active = true rules enter the index.                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use tracing::warn;

use crate::types::{ClientPriceRule, ClientRuleKey, TierPriceRule, TierRuleKey};

/// Active tier and client rules keyed by their composite identity.
#[derive(Debug, Clone, Default)]
pub struct RuleIndex {
    tier: HashMap<TierRuleKey, TierPriceRule>,
    client: HashMap<ClientRuleKey, ClientPriceRule>,
}

impl RuleIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an index from persisted rules.
    ///
    /// Retired rules are ignored. If storage ever holds two active rules for
    /// one key, the most recently modified one is kept.
    pub fn rebuild<T, C>(tier_rules: T, client_rules: C) -> Self
    where
        T: IntoIterator<Item = TierPriceRule>,
        C: IntoIterator<Item = ClientPriceRule>,
    {
        let mut index = RuleIndex::new();

        for rule in tier_rules.into_iter().filter(|r| r.is_active) {
            let key = rule.key();
            match index.tier.get(&key) {
                Some(existing) if existing.last_modified >= rule.last_modified => {
                    warn!(%key, kept = %existing.id, dropped = %rule.id, "Duplicate active tier rule");
                }
                Some(existing) => {
                    warn!(%key, kept = %rule.id, dropped = %existing.id, "Duplicate active tier rule");
                    index.tier.insert(key, rule);
                }
                None => {
                    index.tier.insert(key, rule);
                }
            }
        }

        for rule in client_rules.into_iter().filter(|r| r.is_active) {
            let key = rule.key();
            match index.client.get(&key) {
                Some(existing) if existing.last_modified >= rule.last_modified => {
                    warn!(%key, kept = %existing.id, dropped = %rule.id, "Duplicate active client rule");
                }
                Some(existing) => {
                    warn!(%key, kept = %rule.id, dropped = %existing.id, "Duplicate active client rule");
                    index.client.insert(key, rule);
                }
                None => {
                    index.client.insert(key, rule);
                }
            }
        }

        index
    }

    #[inline]
    pub fn tier_rule(&self, key: &TierRuleKey) -> Option<&TierPriceRule> {
        self.tier.get(key)
    }

    #[inline]
    pub fn client_rule(&self, key: &ClientRuleKey) -> Option<&ClientPriceRule> {
        self.client.get(key)
    }

    /// Stores an active tier rule, replacing whatever held its key.
    pub fn put_tier(&mut self, rule: TierPriceRule) -> Option<TierPriceRule> {
        self.tier.insert(rule.key(), rule)
    }

    /// Stores an active client rule, replacing whatever held its key.
    pub fn put_client(&mut self, rule: ClientPriceRule) -> Option<ClientPriceRule> {
        self.client.insert(rule.key(), rule)
    }

    /// Removes a client rule from the active set.
    pub fn remove_client(&mut self, key: &ClientRuleKey) -> Option<ClientPriceRule> {
        self.client.remove(key)
    }

    pub fn tier_rules(&self) -> impl Iterator<Item = &TierPriceRule> {
        self.tier.values()
    }

    pub fn client_rules(&self) -> impl Iterator<Item = &ClientPriceRule> {
        self.client.values()
    }

    pub fn tier_len(&self) -> usize {
        self.tier.len()
    }

    pub fn client_len(&self) -> usize {
        self.client.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AdjustmentKind;
    use chrono::{Duration, Utc};

    fn tier_rule(id: &str, product: &str, tier: &str, active: bool, age_secs: i64) -> TierPriceRule {
        let at = Utc::now() - Duration::seconds(age_secs);
        TierPriceRule {
            id: id.into(),
            product_id: product.into(),
            tier_id: tier.into(),
            base_price_cents: 1000,
            discount_type: AdjustmentKind::Percentage,
            discount_value: 0,
            final_price_cents: 1000,
            is_active: active,
            created_at: at,
            last_modified: at,
            modified_by: "tester".into(),
        }
    }

    #[test]
    fn test_rebuild_skips_retired_rules() {
        let index = RuleIndex::rebuild(
            vec![
                tier_rule("old", "P1", "t1", false, 100),
                tier_rule("new", "P1", "t1", true, 10),
            ],
            Vec::new(),
        );
        assert_eq!(index.tier_len(), 1);
        let rule = index.tier_rule(&TierRuleKey::new("P1", "t1")).unwrap();
        assert_eq!(rule.id, "new");
    }

    #[test]
    fn test_rebuild_keeps_most_recent_duplicate() {
        let index = RuleIndex::rebuild(
            vec![
                tier_rule("stale", "P1", "t1", true, 100),
                tier_rule("fresh", "P1", "t1", true, 1),
                tier_rule("also-stale", "P1", "t1", true, 50),
            ],
            Vec::new(),
        );
        assert_eq!(index.tier_rule(&TierRuleKey::new("P1", "t1")).unwrap().id, "fresh");
    }

    #[test]
    fn test_separator_in_ids_does_not_collide() {
        let index = RuleIndex::rebuild(
            vec![
                tier_rule("a", "x_y", "z", true, 1),
                tier_rule("b", "x", "y_z", true, 1),
            ],
            Vec::new(),
        );
        assert_eq!(index.tier_len(), 2);
        assert_eq!(index.tier_rule(&TierRuleKey::new("x", "y_z")).unwrap().id, "b");
    }

    #[test]
    fn test_put_replaces_by_key() {
        let mut index = RuleIndex::new();
        assert!(index.put_tier(tier_rule("a", "P1", "t1", true, 1)).is_none());
        let replaced = index.put_tier(tier_rule("a", "P1", "t1", true, 0));
        assert!(replaced.is_some());
        assert_eq!(index.tier_len(), 1);
    }
}
