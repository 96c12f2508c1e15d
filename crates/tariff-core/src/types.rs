//! # Domain Types
//!
//! Core domain types used throughout Tariff.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  External (read-only)      Pricing rules              Ledger            │
//! │  ┌──────────────┐   ┌──────────────────────┐   ┌────────────────────┐  │
//! │  │ Product      │   │ TierPriceRule        │   │ PriceHistoryRecord │  │
//! │  │  base price  │   │  key: product + tier │   │  append-only       │  │
//! │  │  category    │   │  discount            │   │  never deduped     │  │
//! │  ├──────────────┤   ├──────────────────────┤   └────────────────────┘  │
//! │  │ Client       │   │ ClientPriceRule      │                            │
//! │  │  default tier│   │  key: client+product │                            │
//! │  └──────────────┘   │  fixed | markup      │                            │
//! │                     │  validity window     │                            │
//! │                     └──────────────────────┘                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Composite Keys
//! Rules are identified for upsert purposes by structured keys
//! ([`TierRuleKey`], [`ClientRuleKey`]), never by concatenated strings, so a
//! product id containing `_` cannot collide with another pair.
//!
//! ## Client Rule Lifecycle
//! ```text
//! DRAFT (preview only) ──► ACTIVE ──► SUPERSEDED (same id, new values)
//!                            │
//!                            └──► RETIRED (is_active = false, terminal)
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Adjustments
// =============================================================================

/// How an adjustment value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentKind {
    /// Value is in basis points (1500 = 15%).
    Percentage,
    /// Value is in cents.
    Fixed,
}

/// A discount or markup: a kind plus an integer value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Adjustment {
    pub kind: AdjustmentKind,
    /// Basis points for `Percentage`, cents for `Fixed`.
    pub value: i64,
}

impl Adjustment {
    /// A percentage adjustment in basis points.
    pub const fn percentage_bps(bps: i64) -> Self {
        Adjustment {
            kind: AdjustmentKind::Percentage,
            value: bps,
        }
    }

    /// A fixed-amount adjustment.
    pub const fn fixed(amount: Money) -> Self {
        Adjustment {
            kind: AdjustmentKind::Fixed,
            value: amount.cents(),
        }
    }

    /// Applies this adjustment as a discount. Not clamped at zero; saturates
    /// at the ends of the i64 range.
    pub fn discount(&self, base: Money) -> Money {
        match self.kind {
            AdjustmentKind::Percentage => base.apply_percentage_discount(self.value),
            AdjustmentKind::Fixed => base.saturating_sub(Money::from_cents(self.value)),
        }
    }

    /// Applies this adjustment as a markup. Saturates at `i64::MAX` cents.
    pub fn markup(&self, base: Money) -> Money {
        match self.kind {
            AdjustmentKind::Percentage => base.apply_percentage_markup(self.value),
            AdjustmentKind::Fixed => base.saturating_add(Money::from_cents(self.value)),
        }
    }
}

// =============================================================================
// Enumerations
// =============================================================================

/// How a client rule derives its price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PricingType {
    Fixed,
    Markup,
}

/// Where a client rule came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    /// Negotiated and entered by a person.
    #[default]
    Manual,
    /// Synthesized from an imported historical sale.
    Historical,
}

/// How a ledger record entered the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum HistorySource {
    /// Bulk file import through the import adapter.
    #[default]
    Import,
    /// Keyed in one sale at a time.
    ManualEntry,
}

/// Which layer of the precedence produced a resolved price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    Client,
    Tier,
    CatalogDefault,
}

impl std::fmt::Display for ResolutionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolutionSource::Client => write!(f, "client"),
            ResolutionSource::Tier => write!(f, "tier"),
            ResolutionSource::CatalogDefault => write!(f, "catalog_default"),
        }
    }
}

// =============================================================================
// Catalog Entities (external, read-only)
// =============================================================================

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub category: String,
    /// List price in cents.
    pub base_price_cents: i64,
}

impl Product {
    #[inline]
    pub fn base_price(&self) -> Money {
        Money::from_cents(self.base_price_cents)
    }
}

/// A client in the client registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Client {
    pub id: String,
    pub name: String,
    /// Tier used when the caller does not name one.
    pub default_tier_id: String,
}

/// Narrows a catalog listing.
///
/// Both criteria are optional; when both are set a product must satisfy both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub product_ids: Option<Vec<String>>,
}

impl ProductFilter {
    pub fn category(category: impl Into<String>) -> Self {
        ProductFilter {
            category: Some(category.into()),
            product_ids: None,
        }
    }

    pub fn ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ProductFilter {
            category: None,
            product_ids: Some(ids.into_iter().map(Into::into).collect()),
        }
    }

    /// Returns true if the product passes every set criterion.
    pub fn matches(&self, product: &Product) -> bool {
        if let Some(ref category) = self.category {
            if &product.category != category {
                return false;
            }
        }
        if let Some(ref ids) = self.product_ids {
            if !ids.iter().any(|id| id == &product.id) {
                return false;
            }
        }
        true
    }
}

// =============================================================================
// Composite Keys
// =============================================================================

/// Identity of a tier rule for upsert purposes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TierRuleKey {
    pub product_id: String,
    pub tier_id: String,
}

impl TierRuleKey {
    pub fn new(product_id: impl Into<String>, tier_id: impl Into<String>) -> Self {
        TierRuleKey {
            product_id: product_id.into(),
            tier_id: tier_id.into(),
        }
    }
}

/// Identity of a client rule for upsert purposes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClientRuleKey {
    pub client_id: String,
    pub product_id: String,
}

impl ClientRuleKey {
    pub fn new(client_id: impl Into<String>, product_id: impl Into<String>) -> Self {
        ClientRuleKey {
            client_id: client_id.into(),
            product_id: product_id.into(),
        }
    }
}

impl std::fmt::Display for TierRuleKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(product={:?}, tier={:?})", self.product_id, self.tier_id)
    }
}

impl std::fmt::Display for ClientRuleKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(client={:?}, product={:?})", self.client_id, self.product_id)
    }
}

// =============================================================================
// Tier Price Rule
// =============================================================================

/// List price of one product for one tier.
///
/// At most one active rule exists per [`TierRuleKey`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct TierPriceRule {
    pub id: String,
    pub product_id: String,
    pub tier_id: String,
    pub base_price_cents: i64,
    pub discount_type: AdjustmentKind,
    /// Basis points or cents, per `discount_type`. Never negative.
    pub discount_value: i64,
    /// Derived; never set independently.
    pub final_price_cents: i64,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub last_modified: DateTime<Utc>,
    pub modified_by: String,
}

impl TierPriceRule {
    pub fn key(&self) -> TierRuleKey {
        TierRuleKey::new(&self.product_id, &self.tier_id)
    }

    #[inline]
    pub fn base_price(&self) -> Money {
        Money::from_cents(self.base_price_cents)
    }

    #[inline]
    pub fn final_price(&self) -> Money {
        Money::from_cents(self.final_price_cents)
    }

    pub fn discount(&self) -> Adjustment {
        Adjustment {
            kind: self.discount_type,
            value: self.discount_value,
        }
    }
}

// =============================================================================
// Client Price Rule
// =============================================================================

/// The pricing formula of a client rule, in typed form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientPricing {
    /// A negotiated unit price.
    Fixed { price: Money },
    /// A markup over a base price.
    Markup { base: Money, markup: Adjustment },
}

impl ClientPricing {
    pub fn pricing_type(&self) -> PricingType {
        match self {
            ClientPricing::Fixed { .. } => PricingType::Fixed,
            ClientPricing::Markup { .. } => PricingType::Markup,
        }
    }
}

/// A negotiated or history-derived price override for one client+product.
///
/// At most one active rule exists per [`ClientRuleKey`]. The `priority`
/// field records provenance (1 = manual, 2 = historical) and is never
/// consulted during resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ClientPriceRule {
    pub id: String,
    pub client_id: String,
    pub product_id: String,
    pub pricing_type: PricingType,
    pub fixed_price_cents: Option<i64>,
    pub base_price_cents: Option<i64>,
    pub markup_type: Option<AdjustmentKind>,
    pub markup_value: Option<i64>,
    /// Derived; never set independently.
    pub final_price_cents: i64,
    pub agreement_ref: String,
    #[ts(as = "String")]
    pub valid_from: NaiveDate,
    /// Inclusive last day of validity; `None` is open-ended.
    #[ts(as = "Option<String>")]
    pub valid_until: Option<NaiveDate>,
    pub min_quantity: i64,
    pub priority: i32,
    pub price_source: PriceSource,
    pub based_on_history_id: Option<String>,
    pub notes: Option<String>,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    #[ts(as = "String")]
    pub last_modified: DateTime<Utc>,
    pub modified_by: String,
}

impl ClientPriceRule {
    pub fn key(&self) -> ClientRuleKey {
        ClientRuleKey::new(&self.client_id, &self.product_id)
    }

    #[inline]
    pub fn final_price(&self) -> Money {
        Money::from_cents(self.final_price_cents)
    }

    /// Returns true if `date` falls inside `[valid_from, valid_until]`.
    pub fn is_valid_on(&self, date: NaiveDate) -> bool {
        if date < self.valid_from {
            return false;
        }
        match self.valid_until {
            Some(until) => date <= until,
            None => true,
        }
    }

    /// Returns true if this rule prices an order of `quantity` on `date`.
    pub fn applies_to(&self, quantity: i64, date: NaiveDate) -> bool {
        self.is_active && quantity >= self.min_quantity && self.is_valid_on(date)
    }

    /// Reassembles the typed formula from the flat persisted fields.
    ///
    /// Returns `None` if the persisted fields are inconsistent with
    /// `pricing_type` (e.g. a fixed rule without a fixed price).
    pub fn pricing(&self) -> Option<ClientPricing> {
        match self.pricing_type {
            PricingType::Fixed => self.fixed_price_cents.map(|cents| ClientPricing::Fixed {
                price: Money::from_cents(cents),
            }),
            PricingType::Markup => {
                let base = self.base_price_cents?;
                let kind = self.markup_type?;
                let value = self.markup_value?;
                Some(ClientPricing::Markup {
                    base: Money::from_cents(base),
                    markup: Adjustment { kind, value },
                })
            }
        }
    }
}

// =============================================================================
// Price History Ledger
// =============================================================================

/// One past sale. Append-only: never updated, never deduplicated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PriceHistoryRecord {
    pub id: String,
    pub client_id: String,
    pub product_id: String,
    pub price_cents: i64,
    pub quantity: i64,
    #[ts(as = "String")]
    pub sold_date: NaiveDate,
    pub order_id: Option<String>,
    pub contract_ref: Option<String>,
    pub original_price_cents: Option<i64>,
    /// `original_price - price`, present only with an original price.
    pub discount_cents: Option<i64>,
    /// Discount as basis points of the original price.
    pub discount_bps: Option<i64>,
    pub source: HistorySource,
    pub notes: Option<String>,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl PriceHistoryRecord {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

/// A historical sale as handed over by the import adapter.
///
/// Parsing and format validation happen in the adapter; the engine only
/// applies business rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PriceRecord {
    pub product_id: String,
    pub price: Money,
    pub quantity: i64,
    #[ts(as = "String")]
    pub sold_date: NaiveDate,
    pub order_id: Option<String>,
    pub contract_ref: Option<String>,
    pub original_price: Option<Money>,
    pub notes: Option<String>,
}

impl PriceRecord {
    /// A record with only the required fields set.
    pub fn new(
        product_id: impl Into<String>,
        price: Money,
        quantity: i64,
        sold_date: NaiveDate,
    ) -> Self {
        PriceRecord {
            product_id: product_id.into(),
            price,
            quantity,
            sold_date,
            order_id: None,
            contract_ref: None,
            original_price: None,
            notes: None,
        }
    }
}

// =============================================================================
// Operation Results
// =============================================================================

/// The authoritative unit price for one order line, with provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ResolvedPrice {
    pub unit_price: Money,
    pub source: ResolutionSource,
    /// Id of the rule that priced the line; `None` for catalog defaults.
    pub rule_id: Option<String>,
    /// Tier consulted at step 2, if any.
    pub tier_id: Option<String>,
}

/// A sub-batch of an import that was skipped in full.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BatchFailure {
    pub batch_index: usize,
    pub record_count: usize,
    pub reason: String,
}

/// Counts reported by a historical import.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ImportSummary {
    pub imported_count: usize,
    pub skipped_count: usize,
    pub pricing_rules_created_count: usize,
    pub batches_committed: usize,
    pub failed_batches: Vec<BatchFailure>,
}

impl ImportSummary {
    /// True if any sub-batch failed.
    pub fn is_partial(&self) -> bool {
        !self.failed_batches.is_empty()
    }
}

/// Result of a committed bulk tier update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BulkUpdateSummary {
    pub updated_count: usize,
    pub product_ids: Vec<String>,
}

// =============================================================================
// Unit Tests
// =============================================================================
