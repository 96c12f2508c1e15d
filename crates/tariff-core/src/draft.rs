//! # Rule Drafts
//!
//! A draft is a validated rule that has not been written yet (the DRAFT
//! lifecycle state). Its final price is computed on construction through
//! [`compute_final_price`], so a draft cannot carry a price the formula
//! would not produce.
//!
//! Storage turns a draft into a persisted rule in one of two ways:
//! - [`TierRuleDraft::create`] / [`ClientRuleDraft::create`] mint a new rule
//! - [`TierRuleDraft::supersede`] / [`ClientRuleDraft::supersede`] rewrite an
//!   existing active rule in place, keeping its id and creation stamp

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::money::Money;
use crate::pricing::{compute_final_price, PriceSpec};
use crate::types::{
    Adjustment, ClientPriceRule, ClientPricing, ClientRuleKey, PriceSource, TierPriceRule,
    TierRuleKey,
};
use crate::validation::{
    validate_adjustment, validate_client_pricing, validate_id, validate_min_quantity,
    validate_price, validate_validity_window, ValidationResult,
};
use crate::{DEFAULT_MIN_QUANTITY, PRIORITY_HISTORICAL, PRIORITY_MANUAL};

// =============================================================================
// Tier Rule Draft
// =============================================================================

/// An unsaved tier rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierRuleDraft {
    key: TierRuleKey,
    base_price: Money,
    discount: Adjustment,
    final_price: Money,
    actor: String,
}

impl TierRuleDraft {
    /// Validates the inputs and computes the final price.
    pub fn new(
        key: TierRuleKey,
        base_price: Money,
        discount: Adjustment,
        actor: impl Into<String>,
    ) -> ValidationResult<Self> {
        validate_id("product_id", &key.product_id)?;
        validate_id("tier_id", &key.tier_id)?;
        validate_price("base_price", base_price)?;
        validate_adjustment("discount_value", &discount)?;

        let final_price = compute_final_price(&PriceSpec::TierDiscount {
            base: base_price,
            discount,
        });

        Ok(TierRuleDraft {
            key,
            base_price,
            discount,
            final_price,
            actor: actor.into(),
        })
    }

    pub fn key(&self) -> &TierRuleKey {
        &self.key
    }

    pub fn final_price(&self) -> Money {
        self.final_price
    }

    /// Mints a new active rule.
    pub fn create(&self, id: String, now: DateTime<Utc>) -> TierPriceRule {
        TierPriceRule {
            id,
            product_id: self.key.product_id.clone(),
            tier_id: self.key.tier_id.clone(),
            base_price_cents: self.base_price.cents(),
            discount_type: self.discount.kind,
            discount_value: self.discount.value,
            final_price_cents: self.final_price.cents(),
            is_active: true,
            created_at: now,
            last_modified: now,
            modified_by: self.actor.clone(),
        }
    }

    /// Rewrites `existing` in place (SUPERSEDED): same id, new values.
    pub fn supersede(&self, existing: &TierPriceRule, now: DateTime<Utc>) -> TierPriceRule {
        let mut rule = self.create(existing.id.clone(), now);
        rule.created_at = existing.created_at;
        rule
    }
}

// =============================================================================
// Client Rule Draft
// =============================================================================

/// Commercial terms of a client rule, separate from its price formula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientRuleTerms {
    pub agreement_ref: String,
    pub valid_from: NaiveDate,
    pub valid_until: Option<NaiveDate>,
    pub min_quantity: i64,
    pub notes: Option<String>,
}

impl ClientRuleTerms {
    /// Open-ended terms starting on `valid_from`, minimum quantity 1.
    pub fn starting(agreement_ref: impl Into<String>, valid_from: NaiveDate) -> Self {
        ClientRuleTerms {
            agreement_ref: agreement_ref.into(),
            valid_from,
            valid_until: None,
            min_quantity: DEFAULT_MIN_QUANTITY,
            notes: None,
        }
    }
}

/// Provenance of a client rule draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DraftOrigin {
    /// Entered by a person; priority 1.
    Manual,
    /// Synthesized from a ledger record; priority 2.
    Historical { history_id: String },
}

/// An unsaved client rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientRuleDraft {
    key: ClientRuleKey,
    pricing: ClientPricing,
    terms: ClientRuleTerms,
    origin: DraftOrigin,
    final_price: Money,
    actor: String,
}

impl ClientRuleDraft {
    /// Validates the inputs and computes the final price.
    pub fn new(
        key: ClientRuleKey,
        pricing: ClientPricing,
        terms: ClientRuleTerms,
        origin: DraftOrigin,
        actor: impl Into<String>,
    ) -> ValidationResult<Self> {
        validate_id("client_id", &key.client_id)?;
        validate_id("product_id", &key.product_id)?;
        validate_client_pricing(&pricing)?;
        validate_min_quantity(terms.min_quantity)?;
        validate_validity_window(terms.valid_from, terms.valid_until)?;
        if let DraftOrigin::Historical { ref history_id } = origin {
            if history_id.trim().is_empty() {
                return Err(ValidationError::required("based_on_history_id"));
            }
        }

        let final_price = compute_final_price(&pricing.into());

        Ok(ClientRuleDraft {
            key,
            pricing,
            terms,
            origin,
            final_price,
            actor: actor.into(),
        })
    }

    pub fn key(&self) -> &ClientRuleKey {
        &self.key
    }

    pub fn final_price(&self) -> Money {
        self.final_price
    }

    pub fn origin(&self) -> &DraftOrigin {
        &self.origin
    }

    /// Mints a new active rule.
    pub fn create(&self, id: String, now: DateTime<Utc>) -> ClientPriceRule {
        let (fixed_price, base_price, markup_type, markup_value) = match self.pricing {
            ClientPricing::Fixed { price } => (Some(price.cents()), None, None, None),
            ClientPricing::Markup { base, markup } => {
                (None, Some(base.cents()), Some(markup.kind), Some(markup.value))
            }
        };
        let (priority, price_source, based_on_history_id) = match self.origin {
            DraftOrigin::Manual => (PRIORITY_MANUAL, PriceSource::Manual, None),
            DraftOrigin::Historical { ref history_id } => (
                PRIORITY_HISTORICAL,
                PriceSource::Historical,
                Some(history_id.clone()),
            ),
        };

        ClientPriceRule {
            id,
            client_id: self.key.client_id.clone(),
            product_id: self.key.product_id.clone(),
            pricing_type: self.pricing.pricing_type(),
            fixed_price_cents: fixed_price,
            base_price_cents: base_price,
            markup_type,
            markup_value,
            final_price_cents: self.final_price.cents(),
            agreement_ref: self.terms.agreement_ref.clone(),
            valid_from: self.terms.valid_from,
            valid_until: self.terms.valid_until,
            min_quantity: self.terms.min_quantity,
            priority,
            price_source,
            based_on_history_id,
            notes: self.terms.notes.clone(),
            is_active: true,
            created_at: now,
            created_by: self.actor.clone(),
            last_modified: now,
            modified_by: self.actor.clone(),
        }
    }

    /// Rewrites `existing` in place (SUPERSEDED): same id and creation stamp.
    pub fn supersede(&self, existing: &ClientPriceRule, now: DateTime<Utc>) -> ClientPriceRule {
        let mut rule = self.create(existing.id.clone(), now);
        rule.created_at = existing.created_at;
        rule.created_by = existing.created_by.clone();
        rule
    }
}
