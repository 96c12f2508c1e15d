//! # Historical Import Processor
//!
//! Records past sales in the ledger and seeds fixed-price client rules for
//! pairs that have none.
//!
//! ## Sub-batches
//! ```text
//! records ──► distinct product ids looked up once, before any commit
//!               │
//!               ▼
//!          chunks of (cap / 2) records, each record staging 2 writes
//!               │
//!               ├── structural check fails ──► whole chunk skipped,
//!               │                              BatchFailure recorded
//!               ├── unknown product / price ≤ 0 ──► that record skipped
//!               │
//!               ▼
//!      WriteBatch: AppendHistory + CreateClientIfAbsent per record
//!               │
//!               └── store.commit ── Ok  ──► counts aggregated
//!                                  └ Err ──► BatchFailure, next chunk runs
//! ```
//!
//! Chunks commit sequentially and independently: a failed chunk never rolls
//! back an earlier one, and the summary reports what landed.
//!
//! An active client rule for a pair, manual or historical, is never
//! overwritten by an import. The ledger entry is written regardless.

use chrono::{NaiveDate, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::error::{DbError, DbResult};
use crate::store::{PricingStore, WriteBatch, WriteOutcome};
use tariff_core::history::{historical_rule_draft, ledger_record};
use tariff_core::validation::{validate_id, validate_price_record, ValidationResult};
use tariff_core::{new_id, BatchFailure, HistorySource, ImportSummary, PriceRecord};

/// Writes staged per imported record: one ledger entry, one conditional rule.
const WRITES_PER_RECORD: usize = 2;

/// Who is importing, from where, and which day synthesized rules start on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportContext {
    pub source: HistorySource,
    pub actor: String,
    pub today: NaiveDate,
}

impl ImportContext {
    /// A file import by `actor`, dated today.
    pub fn new(actor: impl Into<String>) -> Self {
        ImportContext {
            source: HistorySource::Import,
            actor: actor.into(),
            today: Utc::now().date_naive(),
        }
    }

    pub fn with_source(mut self, source: HistorySource) -> Self {
        self.source = source;
        self
    }

    pub fn on(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }
}

/// Imports historical sales for one client.
#[derive(Clone)]
pub struct HistoricalImportProcessor {
    store: Arc<dyn PricingStore>,
    catalog: Arc<dyn Catalog>,
    batch_cap: usize,
}

impl HistoricalImportProcessor {
    pub fn new(store: Arc<dyn PricingStore>, catalog: Arc<dyn Catalog>, batch_cap: usize) -> Self {
        HistoricalImportProcessor {
            store,
            catalog,
            batch_cap,
        }
    }

    /// Records per sub-batch, so no transaction exceeds the write cap.
    pub fn records_per_batch(&self) -> usize {
        (self.batch_cap / WRITES_PER_RECORD).max(1)
    }

    /// Imports `records` for `client_id`.
    ///
    /// Fails outright only before the first sub-batch commits: invalid or
    /// unknown client, an unreachable store, or a failed product lookup.
    /// Everything after that is reported in the summary.
    pub async fn process_import(
        &self,
        client_id: &str,
        records: &[PriceRecord],
        ctx: &ImportContext,
    ) -> DbResult<ImportSummary> {
        validate_id("client_id", client_id)?;
        self.store.ping().await?;
        self.catalog
            .client(client_id)
            .await?
            .ok_or_else(|| DbError::not_found("Client", client_id))?;

        // No catalog reads once sub-batches start landing
        let known_products = self.known_products(records).await?;

        let mut summary = ImportSummary::default();

        for (batch_index, chunk) in records.chunks(self.records_per_batch()).enumerate() {
            if let Err(e) = chunk.iter().try_for_each(validate_price_record) {
                warn!(batch_index, records = chunk.len(), error = %e, "Import sub-batch rejected");
                summary.skipped_count += chunk.len();
                summary.failed_batches.push(BatchFailure {
                    batch_index,
                    record_count: chunk.len(),
                    reason: e.to_string(),
                });
                continue;
            }

            let mut batch = WriteBatch::with_capacity(chunk.len() * WRITES_PER_RECORD);
            let mut staged_records = 0;

            for record in chunk {
                if !known_products.contains(&record.product_id) {
                    warn!(client_id, product_id = %record.product_id, "Skipping sale of unknown product");
                    summary.skipped_count += 1;
                    continue;
                }
                if !record.price.is_positive() {
                    warn!(
                        client_id,
                        product_id = %record.product_id,
                        price = %record.price,
                        "Skipping sale with non-positive price"
                    );
                    summary.skipped_count += 1;
                    continue;
                }

                if let Err(e) = stage_record(&mut batch, client_id, record, ctx) {
                    warn!(client_id, product_id = %record.product_id, error = %e, "Skipping unstageable sale");
                    summary.skipped_count += 1;
                    continue;
                }
                staged_records += 1;
            }

            if batch.is_empty() {
                continue;
            }

            match self.store.commit(batch).await {
                Ok(outcomes) => {
                    let imported = outcomes.iter().filter(|o| o.is_history_appended()).count();
                    let created = outcomes.iter().filter(|o| o.is_client_created()).count();
                    let preserved = outcomes
                        .iter()
                        .filter(|o| matches!(o, WriteOutcome::ClientSkipped(_)))
                        .count();

                    debug!(batch_index, imported, created, preserved, "Import sub-batch committed");
                    summary.imported_count += imported;
                    summary.pricing_rules_created_count += created;
                    summary.batches_committed += 1;
                }
                Err(e) => {
                    warn!(batch_index, records = staged_records, error = %e, "Import sub-batch failed");
                    summary.skipped_count += staged_records;
                    summary.failed_batches.push(BatchFailure {
                        batch_index,
                        record_count: staged_records,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            client_id,
            imported = summary.imported_count,
            skipped = summary.skipped_count,
            rules_created = summary.pricing_rules_created_count,
            failed_batches = summary.failed_batches.len(),
            "Historical import finished"
        );
        Ok(summary)
    }

    /// Ids of the records' products that exist in the catalog.
    async fn known_products(&self, records: &[PriceRecord]) -> DbResult<HashSet<String>> {
        let mut seen = HashSet::new();
        let mut known = HashSet::new();
        for record in records {
            if record.product_id.is_empty() || !seen.insert(record.product_id.as_str()) {
                continue;
            }
            if self.catalog.product(&record.product_id).await?.is_some() {
                known.insert(record.product_id.clone());
            }
        }
        debug!(distinct = seen.len(), known = known.len(), "Import products resolved");
        Ok(known)
    }
}

fn stage_record(
    batch: &mut WriteBatch,
    client_id: &str,
    record: &PriceRecord,
    ctx: &ImportContext,
) -> ValidationResult<()> {
    let history = ledger_record(new_id(), client_id, record, ctx.source, Utc::now());
    let draft = historical_rule_draft(&history, record, ctx.today, &ctx.actor)?;
    batch.append_history(history);
    batch.create_client_if_absent(draft);
    Ok(())
}
