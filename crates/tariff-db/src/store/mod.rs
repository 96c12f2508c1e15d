//! # Pricing Rule Store
//!
//! Persistence seam for tier rules, client rules and the sale ledger.
//!
//! ## Staged Writes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Write Lifecycle                                   │
//! │                                                                         │
//! │  engine ──► WriteBatch (staged, in memory, no side effects)            │
//! │                 │                                                       │
//! │                 ├── drop ──► discarded, nothing written                │
//! │                 │                                                       │
//! │                 ▼                                                       │
//! │  store.commit(batch) ── ONE transaction, writes applied in order       │
//! │                 │                                                       │
//! │                 ├── Ok(outcomes) ──► every write landed                │
//! │                 └── Err(_)       ──► no write landed                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Upserts are read-existing-then-conditional-write inside the committing
//! transaction, so two racing creates for one key end as create + overwrite.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::error::DbResult;
use tariff_core::{
    ClientPriceRule, ClientRuleDraft, ClientRuleKey, PriceHistoryRecord, RuleIndex,
    TierPriceRule, TierRuleDraft, TierRuleKey,
};

pub use memory::MemoryPricingStore;
pub use sqlite::SqlitePricingStore;

// =============================================================================
// Staged Writes
// =============================================================================

/// One write waiting for commit.
#[derive(Debug, Clone, PartialEq)]
pub enum StagedWrite {
    /// Overwrite the active tier rule for the key, or create one.
    UpsertTier(TierRuleDraft),
    /// Overwrite the active client rule for the key, or create one.
    UpsertClient(ClientRuleDraft),
    /// Create a client rule only if the key has no active rule.
    CreateClientIfAbsent(ClientRuleDraft),
    /// Append a ledger record.
    AppendHistory(PriceHistoryRecord),
    /// Retire the active client rule for the key.
    DeactivateClient { key: ClientRuleKey, actor: String },
}

/// What a committed write did.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    TierCreated(TierPriceRule),
    TierUpdated(TierPriceRule),
    ClientCreated(ClientPriceRule),
    ClientUpdated(ClientPriceRule),
    /// `CreateClientIfAbsent` found an active rule and left it alone.
    ClientSkipped(ClientRuleKey),
    HistoryAppended(PriceHistoryRecord),
    ClientDeactivated(ClientPriceRule),
}

impl WriteOutcome {
    /// The tier rule this write produced, if any.
    pub fn tier_rule(&self) -> Option<&TierPriceRule> {
        match self {
            WriteOutcome::TierCreated(r) | WriteOutcome::TierUpdated(r) => Some(r),
            _ => None,
        }
    }

    /// The client rule this write produced or retired, if any.
    pub fn client_rule(&self) -> Option<&ClientPriceRule> {
        match self {
            WriteOutcome::ClientCreated(r)
            | WriteOutcome::ClientUpdated(r)
            | WriteOutcome::ClientDeactivated(r) => Some(r),
            _ => None,
        }
    }

    pub fn is_client_created(&self) -> bool {
        matches!(self, WriteOutcome::ClientCreated(_))
    }

    pub fn is_history_appended(&self) -> bool {
        matches!(self, WriteOutcome::HistoryAppended(_))
    }
}

/// An ordered set of writes committed atomically.
///
/// Building a batch touches nothing; dropping it discards it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    writes: Vec<StagedWrite>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        WriteBatch {
            writes: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, write: StagedWrite) {
        self.writes.push(write);
    }

    pub fn upsert_tier(&mut self, draft: TierRuleDraft) {
        self.push(StagedWrite::UpsertTier(draft));
    }

    pub fn upsert_client(&mut self, draft: ClientRuleDraft) {
        self.push(StagedWrite::UpsertClient(draft));
    }

    pub fn create_client_if_absent(&mut self, draft: ClientRuleDraft) {
        self.push(StagedWrite::CreateClientIfAbsent(draft));
    }

    pub fn append_history(&mut self, record: PriceHistoryRecord) {
        self.push(StagedWrite::AppendHistory(record));
    }

    pub fn deactivate_client(&mut self, key: ClientRuleKey, actor: impl Into<String>) {
        self.push(StagedWrite::DeactivateClient {
            key,
            actor: actor.into(),
        });
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn writes(&self) -> &[StagedWrite] {
        &self.writes
    }

    pub fn into_writes(self) -> Vec<StagedWrite> {
        self.writes
    }
}

impl FromIterator<StagedWrite> for WriteBatch {
    fn from_iter<I: IntoIterator<Item = StagedWrite>>(iter: I) -> Self {
        WriteBatch {
            writes: iter.into_iter().collect(),
        }
    }
}

// =============================================================================
// Store Trait
// =============================================================================

/// Storage for pricing rules and the sale ledger.
///
/// Implementations: [`SqlitePricingStore`] for production,
/// [`MemoryPricingStore`] for tests.
#[async_trait]
pub trait PricingStore: Send + Sync {
    /// Fails with `StoreUnavailable` if persistence cannot be reached.
    async fn ping(&self) -> DbResult<()>;

    /// The active tier rule for a key.
    async fn active_tier_rule(&self, key: &TierRuleKey) -> DbResult<Option<TierPriceRule>>;

    /// The active client rule for a key.
    async fn active_client_rule(&self, key: &ClientRuleKey) -> DbResult<Option<ClientPriceRule>>;

    /// Any tier rule by id.
    async fn tier_rule(&self, id: &str) -> DbResult<Option<TierPriceRule>>;

    /// Any client rule by id, active or retired.
    async fn client_rule(&self, id: &str) -> DbResult<Option<ClientPriceRule>>;

    /// Every tier rule for a tier, ordered by product id.
    async fn tier_rules_for_tier(&self, tier_id: &str) -> DbResult<Vec<TierPriceRule>>;

    /// Every client rule for a client, active and retired, ordered by product id.
    async fn client_rules_for_client(&self, client_id: &str) -> DbResult<Vec<ClientPriceRule>>;

    /// Ledger entries for a client, oldest sale first.
    async fn history_for_client(&self, client_id: &str) -> DbResult<Vec<PriceHistoryRecord>>;

    /// Ledger entries for one client+product, oldest sale first.
    async fn history_for_pair(&self, key: &ClientRuleKey) -> DbResult<Vec<PriceHistoryRecord>>;

    /// Snapshot of every active rule.
    async fn load_index(&self) -> DbResult<RuleIndex>;

    /// Applies a batch atomically. Outcomes are in write order.
    async fn commit(&self, batch: WriteBatch) -> DbResult<Vec<WriteOutcome>>;
}

// =============================================================================
// Shared Test Fixtures
// =============================================================================


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_batch_keeps_write_order() {
        let mut batch = WriteBatch::new();
        batch.upsert_tier(tier_draft("P1", "t1", 100, 0));
        batch.deactivate_client(ClientRuleKey::new("C1", "P1"), "tester");
        batch.upsert_client(fixed_client_draft("C1", "P1", 90));

        assert_eq!(batch.len(), 3);
        assert!(matches!(batch.writes()[0], StagedWrite::UpsertTier(_)));
        assert!(matches!(batch.writes()[1], StagedWrite::DeactivateClient { .. }));
        assert!(matches!(batch.writes()[2], StagedWrite::UpsertClient(_)));
    }

    #[test]
    fn test_empty_batch() {
        let batch: WriteBatch = Vec::new().into_iter().collect();
        assert!(batch.is_empty());
    }
}
