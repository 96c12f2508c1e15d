//! # In-Memory Pricing Store
//!
//! [`PricingStore`] over a [`RuleIndex`], for tests and previews.
//!
//! A commit applies the batch to a copy of the state and swaps it in only
//! if every write succeeded, so readers never see a half-applied batch.
//! Faults can be injected to exercise that guarantee.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

use super::{PricingStore, StagedWrite, WriteBatch, WriteOutcome};
use crate::error::{DbError, DbResult};
use tariff_core::{
    new_id, ClientPriceRule, ClientRuleKey, PriceHistoryRecord, RuleIndex, TierPriceRule,
    TierRuleKey,
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    active: RuleIndex,
    retired_clients: Vec<ClientPriceRule>,
    history: Vec<PriceHistoryRecord>,
}

/// In-memory store.
#[derive(Debug)]
pub struct MemoryPricingStore {
    state: RwLock<MemoryState>,
    available: AtomicBool,
    /// One-shot: the next commit fails when it reaches this write index.
    fail_at: std::sync::Mutex<Option<usize>>,
    /// One-shot: the commit with this sequence number fails.
    fail_commit: std::sync::Mutex<Option<usize>>,
    commits: AtomicUsize,
}

impl Default for MemoryPricingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPricingStore {
    pub fn new() -> Self {
        Self::with_state(MemoryState::default())
    }

    /// Builds a store from already-persisted rules.
    pub fn from_rules<T, C>(tier_rules: T, client_rules: C) -> Self
    where
        T: IntoIterator<Item = TierPriceRule>,
        C: IntoIterator<Item = ClientPriceRule>,
    {
        let client_rules: Vec<ClientPriceRule> = client_rules.into_iter().collect();
        let retired_clients = client_rules.iter().filter(|r| !r.is_active).cloned().collect();
        Self::with_state(MemoryState {
            active: RuleIndex::rebuild(tier_rules, client_rules),
            retired_clients,
            history: Vec::new(),
        })
    }

    fn with_state(state: MemoryState) -> Self {
        MemoryPricingStore {
            state: RwLock::new(state),
            available: AtomicBool::new(true),
            fail_at: std::sync::Mutex::new(None),
            fail_commit: std::sync::Mutex::new(None),
            commits: AtomicUsize::new(0),
        }
    }

    /// Simulates persistence going away (or coming back).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Makes the next commit fail when it reaches write `index` (0-based).
    pub fn fail_write_at(&self, index: usize) {
        if let Ok(mut fail_at) = self.fail_at.lock() {
            *fail_at = Some(index);
        }
    }

    /// Makes the commit numbered `sequence` (0-based, counted from store
    /// creation) fail before applying anything.
    pub fn fail_commit(&self, sequence: usize) {
        if let Ok(mut fail_commit) = self.fail_commit.lock() {
            *fail_commit = Some(sequence);
        }
    }

    /// Number of ledger entries, for assertions.
    pub async fn history_len(&self) -> usize {
        self.state.read().await.history.len()
    }

    fn check_available(&self) -> DbResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DbError::StoreUnavailable("memory store marked unavailable".into()))
        }
    }

    fn take_fail_at(&self) -> Option<usize> {
        self.fail_at.lock().ok().and_then(|mut f| f.take())
    }

    fn commit_should_fail(&self, sequence: usize) -> bool {
        match self.fail_commit.lock() {
            Ok(mut fail_commit) if *fail_commit == Some(sequence) => {
                *fail_commit = None;
                true
            }
            _ => false,
        }
    }
}

/// Applies one write to `state`.
fn apply(state: &mut MemoryState, write: StagedWrite) -> DbResult<WriteOutcome> {
    let now = Utc::now();

    match write {
        StagedWrite::UpsertTier(draft) => match state.active.tier_rule(draft.key()) {
            Some(existing) => {
                let rule = draft.supersede(existing, now);
                state.active.put_tier(rule.clone());
                Ok(WriteOutcome::TierUpdated(rule))
            }
            None => {
                let rule = draft.create(new_id(), now);
                state.active.put_tier(rule.clone());
                Ok(WriteOutcome::TierCreated(rule))
            }
        },

        StagedWrite::UpsertClient(draft) => match state.active.client_rule(draft.key()) {
            Some(existing) => {
                let rule = draft.supersede(existing, now);
                state.active.put_client(rule.clone());
                Ok(WriteOutcome::ClientUpdated(rule))
            }
            None => {
                let rule = draft.create(new_id(), now);
                state.active.put_client(rule.clone());
                Ok(WriteOutcome::ClientCreated(rule))
            }
        },

        StagedWrite::CreateClientIfAbsent(draft) => {
            if state.active.client_rule(draft.key()).is_some() {
                return Ok(WriteOutcome::ClientSkipped(draft.key().clone()));
            }
            let rule = draft.create(new_id(), now);
            state.active.put_client(rule.clone());
            Ok(WriteOutcome::ClientCreated(rule))
        }

        StagedWrite::AppendHistory(record) => {
            state.history.push(record.clone());
            Ok(WriteOutcome::HistoryAppended(record))
        }

        StagedWrite::DeactivateClient { key, actor } => {
            let mut rule = state
                .active
                .remove_client(&key)
                .ok_or_else(|| DbError::not_found("ClientPriceRule", key.to_string()))?;
            rule.is_active = false;
            rule.last_modified = now;
            rule.modified_by = actor;
            state.retired_clients.push(rule.clone());
            Ok(WriteOutcome::ClientDeactivated(rule))
        }
    }
}

#[async_trait]
impl PricingStore for MemoryPricingStore {
    async fn ping(&self) -> DbResult<()> {
        self.check_available()
    }

    async fn active_tier_rule(&self, key: &TierRuleKey) -> DbResult<Option<TierPriceRule>> {
        self.check_available()?;
        Ok(self.state.read().await.active.tier_rule(key).cloned())
    }

    async fn active_client_rule(&self, key: &ClientRuleKey) -> DbResult<Option<ClientPriceRule>> {
        self.check_available()?;
        Ok(self.state.read().await.active.client_rule(key).cloned())
    }

    async fn tier_rule(&self, id: &str) -> DbResult<Option<TierPriceRule>> {
        self.check_available()?;
        let state = self.state.read().await;
        let found = state.active.tier_rules().find(|r| r.id == id).cloned();
        Ok(found)
    }

    async fn client_rule(&self, id: &str) -> DbResult<Option<ClientPriceRule>> {
        self.check_available()?;
        let state = self.state.read().await;
        let found = state
            .active
            .client_rules()
            .chain(state.retired_clients.iter())
            .find(|r| r.id == id)
            .cloned();
        Ok(found)
    }

    async fn tier_rules_for_tier(&self, tier_id: &str) -> DbResult<Vec<TierPriceRule>> {
        self.check_available()?;
        let state = self.state.read().await;
        let mut rules: Vec<TierPriceRule> = state
            .active
            .tier_rules()
            .filter(|r| r.tier_id == tier_id)
            .cloned()
            .collect();
        rules.sort_by(|a, b| a.product_id.cmp(&b.product_id));
        Ok(rules)
    }

    async fn client_rules_for_client(&self, client_id: &str) -> DbResult<Vec<ClientPriceRule>> {
        self.check_available()?;
        let state = self.state.read().await;
        let mut rules: Vec<ClientPriceRule> = state
            .active
            .client_rules()
            .chain(state.retired_clients.iter())
            .filter(|r| r.client_id == client_id)
            .cloned()
            .collect();
        rules.sort_by(|a, b| {
            a.product_id
                .cmp(&b.product_id)
                .then(a.created_at.cmp(&b.created_at))
        });
        Ok(rules)
    }

    async fn history_for_client(&self, client_id: &str) -> DbResult<Vec<PriceHistoryRecord>> {
        self.check_available()?;
        let state = self.state.read().await;
        let mut records: Vec<PriceHistoryRecord> = state
            .history
            .iter()
            .filter(|h| h.client_id == client_id)
            .cloned()
            .collect();
        records.sort_by_key(|h| h.sold_date);
        Ok(records)
    }

    async fn history_for_pair(&self, key: &ClientRuleKey) -> DbResult<Vec<PriceHistoryRecord>> {
        let mut records = self.history_for_client(&key.client_id).await?;
        records.retain(|h| h.product_id == key.product_id);
        Ok(records)
    }

    async fn load_index(&self) -> DbResult<RuleIndex> {
        self.check_available()?;
        Ok(self.state.read().await.active.clone())
    }

    async fn commit(&self, batch: WriteBatch) -> DbResult<Vec<WriteOutcome>> {
        self.check_available()?;
        let sequence = self.commits.fetch_add(1, Ordering::SeqCst);
        if self.commit_should_fail(sequence) {
            debug!(sequence, "Injected commit failure");
            return Err(DbError::TransactionFailed(format!(
                "injected failure on commit {}",
                sequence
            )));
        }
        let fail_at = self.take_fail_at();

        let mut state = self.state.write().await;
        let mut staged = state.clone();
        let mut outcomes = Vec::with_capacity(batch.len());

        for (i, write) in batch.into_writes().into_iter().enumerate() {
            if fail_at == Some(i) {
                debug!(write_index = i, "Injected commit failure, rolling back");
                return Err(DbError::TransactionFailed(format!(
                    "injected failure at write {}",
                    i
                )));
            }
            outcomes.push(apply(&mut staged, write)?);
        }

        *state = staged;
        debug!(writes = outcomes.len(), "Memory batch committed");
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;

    #[tokio::test]
    async fn test_upsert_is_idempotent_per_key() {
        let store = MemoryPricingStore::new();

        let mut batch = WriteBatch::new();
        batch.upsert_tier(tier_draft("P1", "t1", 10_000, 1000));
        let first = store.commit(batch).await.unwrap();

        let mut batch = WriteBatch::new();
        batch.upsert_tier(tier_draft("P1", "t1", 10_000, 1000));
        let second = store.commit(batch).await.unwrap();

        assert!(matches!(first[0], WriteOutcome::TierCreated(_)));
        assert!(matches!(second[0], WriteOutcome::TierUpdated(_)));
        assert_eq!(
            first[0].tier_rule().unwrap().id,
            second[0].tier_rule().unwrap().id
        );
        assert_eq!(store.tier_rules_for_tier("t1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_later_writes_see_earlier_ones() {
        let store = MemoryPricingStore::new();
        let mut batch = WriteBatch::new();
        batch.create_client_if_absent(fixed_client_draft("C1", "P1", 500));
        batch.create_client_if_absent(fixed_client_draft("C1", "P1", 450));
        let outcomes = store.commit(batch).await.unwrap();

        assert!(outcomes[0].is_client_created());
        assert!(matches!(outcomes[1], WriteOutcome::ClientSkipped(_)));
        let rule = store
            .active_client_rule(&ClientRuleKey::new("C1", "P1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rule.final_price_cents, 500);
    }

    #[tokio::test]
    async fn test_injected_failure_rolls_back_whole_batch() {
        let store = MemoryPricingStore::new();
        store.fail_write_at(2);

        let batch: WriteBatch = ["P1", "P2", "P3"]
            .iter()
            .map(|p| StagedWrite::UpsertTier(tier_draft(p, "t1", 1000, 0)))
            .collect();
        assert!(store.commit(batch.clone()).await.is_err());
        assert!(store.tier_rules_for_tier("t1").await.unwrap().is_empty());

        // One-shot: the retry succeeds
        assert_eq!(store.commit(batch).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_failed_commit_by_sequence() {
        let store = MemoryPricingStore::new();
        store.fail_commit(1);

        for (n, product) in ["P1", "P2", "P3"].iter().enumerate() {
            let mut batch = WriteBatch::new();
            batch.upsert_tier(tier_draft(product, "t1", 1000, 0));
            assert_eq!(store.commit(batch).await.is_ok(), n != 1);
        }

        let rules = store.tier_rules_for_tier("t1").await.unwrap();
        let products: Vec<&str> = rules.iter().map(|r| r.product_id.as_str()).collect();
        assert_eq!(products, vec!["P1", "P3"]);
    }

    #[tokio::test]
    async fn test_lookup_by_id_includes_retired() {
        let store = MemoryPricingStore::new();
        let mut batch = WriteBatch::new();
        batch.upsert_tier(tier_draft("P1", "t1", 1000, 0));
        batch.upsert_client(fixed_client_draft("C1", "P1", 900));
        batch.deactivate_client(ClientRuleKey::new("C1", "P1"), "bob");
        let outcomes = store.commit(batch).await.unwrap();

        let tier_id = &outcomes[0].tier_rule().unwrap().id;
        let client_id = &outcomes[1].client_rule().unwrap().id;
        assert!(store.tier_rule(tier_id).await.unwrap().is_some());
        assert!(!store.client_rule(client_id).await.unwrap().unwrap().is_active);
        assert!(store.tier_rule("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unavailable_store_rejects_everything() {
        let store = MemoryPricingStore::new();
        store.set_available(false);
        let err = store.ping().await.unwrap_err();
        assert!(err.is_retryable());
        assert!(store.commit(WriteBatch::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_deactivate_then_upsert_mints_new_id() {
        let store = MemoryPricingStore::new();
        let key = ClientRuleKey::new("C1", "P1");

        let mut batch = WriteBatch::new();
        batch.upsert_client(fixed_client_draft("C1", "P1", 700));
        let created = store.commit(batch).await.unwrap();
        let old_id = created[0].client_rule().unwrap().id.clone();

        let mut batch = WriteBatch::new();
        batch.deactivate_client(key.clone(), "bob");
        store.commit(batch).await.unwrap();
        assert!(store.active_client_rule(&key).await.unwrap().is_none());

        let mut batch = WriteBatch::new();
        batch.upsert_client(fixed_client_draft("C1", "P1", 650));
        let recreated = store.commit(batch).await.unwrap();
        let new_id = &recreated[0].client_rule().unwrap().id;
        assert_ne!(&old_id, new_id);

        let retired = store.client_rule(&old_id).await.unwrap().unwrap();
        assert!(!retired.is_active);
        assert_eq!(retired.modified_by, "bob");
        assert_eq!(store.client_rules_for_client("C1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_deactivate_without_active_rule_is_not_found() {
        let store = MemoryPricingStore::new();
        let mut batch = WriteBatch::new();
        batch.deactivate_client(ClientRuleKey::new("C1", "P1"), "bob");
        assert!(matches!(
            store.commit(batch).await,
            Err(DbError::NotFound { .. })
        ));
    }
}
