//! # SQLite Pricing Store
//!
//! [`PricingStore`] backed by the `tier_price_rules`, `client_price_rules`
//! and `price_history` tables.
//!
//! ## Commit
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN IMMEDIATE                  (write lock taken before any read)    │
//! │    for each staged write, in order:                                     │
//! │      SELECT active rule by key ─► UPDATE by id  | INSERT new id         │
//! │  COMMIT                           (any error ─► ROLLBACK, nothing kept) │
//! │                                                                         │
//! │  Writers queue on the busy timeout, so a second upsert on a key reads   │
//! │  the first one's rule and overwrites it. A busy timeout or a hit on     │
//! │  the partial UNIQUE index (… WHERE is_active = 1) retries the batch.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::pool::PoolConnection;
use sqlx::{Connection, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, warn};

use super::{PricingStore, StagedWrite, WriteBatch, WriteOutcome};
use crate::error::{DbError, DbResult};
use tariff_core::{
    new_id, ClientPriceRule, ClientRuleKey, PriceHistoryRecord, RuleIndex, TierPriceRule,
    TierRuleKey,
};

/// Attempts per commit when a write lock or unique-index race is lost.
const MAX_COMMIT_ATTEMPTS: u32 = 3;

const TIER_COLUMNS: &str = r#"
    id, product_id, tier_id, base_price_cents, discount_type, discount_value,
    final_price_cents, is_active, created_at, last_modified, modified_by
"#;

const CLIENT_COLUMNS: &str = r#"
    id, client_id, product_id, pricing_type, fixed_price_cents, base_price_cents,
    markup_type, markup_value, final_price_cents, agreement_ref, valid_from,
    valid_until, min_quantity, priority, price_source, based_on_history_id, notes,
    is_active, created_at, created_by, last_modified, modified_by
"#;

const HISTORY_COLUMNS: &str = r#"
    id, client_id, product_id, price_cents, quantity, sold_date, order_id,
    contract_ref, original_price_cents, discount_cents, discount_bps, source,
    notes, is_active, created_at
"#;

/// SQLite-backed store.
#[derive(Debug, Clone)]
pub struct SqlitePricingStore {
    pool: SqlitePool,
}

impl SqlitePricingStore {
    pub fn new(pool: SqlitePool) -> Self {
        SqlitePricingStore { pool }
    }

    async fn try_commit(&self, batch: &WriteBatch) -> DbResult<Vec<WriteOutcome>> {
        let now = Utc::now();
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| DbError::StoreUnavailable(e.to_string()))?;

        // A deferred BEGIN would read a snapshot and fail on the lock upgrade.
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

        let mut outcomes = Vec::with_capacity(batch.len());
        for write in batch.writes() {
            match apply(&mut *conn, write, now).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    rollback(conn).await;
                    return Err(e);
                }
            }
        }

        if let Err(e) = sqlx::query("COMMIT").execute(&mut *conn).await {
            let err = match DbError::from(e) {
                busy @ DbError::Busy(_) => busy,
                other => DbError::TransactionFailed(other.to_string()),
            };
            rollback(conn).await;
            return Err(err);
        }
        Ok(outcomes)
    }
}

/// Rolls back an open transaction. A connection that cannot roll back is
/// closed instead of going back to the pool mid-transaction.
async fn rollback(mut conn: PoolConnection<Sqlite>) {
    if let Err(e) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
        warn!(error = %e, "Rollback failed, closing connection");
        if let Err(e) = conn.detach().close().await {
            debug!(error = %e, "Connection close after failed rollback");
        }
    }
}

// =============================================================================
// Transactional Writes
// =============================================================================

async fn apply(
    conn: &mut SqliteConnection,
    write: &StagedWrite,
    now: DateTime<Utc>,
) -> DbResult<WriteOutcome> {
    match write {
        StagedWrite::UpsertTier(draft) => match active_tier(&mut *conn, draft.key()).await? {
            Some(existing) => {
                let rule = draft.supersede(&existing, now);
                update_tier(conn, &rule).await?;
                debug!(id = %rule.id, key = %draft.key(), "Tier rule updated");
                Ok(WriteOutcome::TierUpdated(rule))
            }
            None => {
                let rule = draft.create(new_id(), now);
                insert_tier(conn, &rule).await?;
                debug!(id = %rule.id, key = %draft.key(), "Tier rule created");
                Ok(WriteOutcome::TierCreated(rule))
            }
        },

        StagedWrite::UpsertClient(draft) => match active_client(&mut *conn, draft.key()).await? {
            Some(existing) => {
                let rule = draft.supersede(&existing, now);
                update_client(conn, &rule).await?;
                debug!(id = %rule.id, key = %draft.key(), "Client rule updated");
                Ok(WriteOutcome::ClientUpdated(rule))
            }
            None => {
                let rule = draft.create(new_id(), now);
                insert_client(conn, &rule).await?;
                debug!(id = %rule.id, key = %draft.key(), "Client rule created");
                Ok(WriteOutcome::ClientCreated(rule))
            }
        },

        StagedWrite::CreateClientIfAbsent(draft) => {
            if active_client(&mut *conn, draft.key()).await?.is_some() {
                debug!(key = %draft.key(), "Active client rule exists, not creating");
                return Ok(WriteOutcome::ClientSkipped(draft.key().clone()));
            }
            let rule = draft.create(new_id(), now);
            insert_client(conn, &rule).await?;
            debug!(id = %rule.id, key = %draft.key(), "Client rule created");
            Ok(WriteOutcome::ClientCreated(rule))
        }

        StagedWrite::AppendHistory(record) => {
            insert_history(conn, record).await?;
            Ok(WriteOutcome::HistoryAppended(record.clone()))
        }

        StagedWrite::DeactivateClient { key, actor } => {
            let mut rule = active_client(&mut *conn, key)
                .await?
                .ok_or_else(|| DbError::not_found("ClientPriceRule", key.to_string()))?;

            sqlx::query(
                r#"
                UPDATE client_price_rules
                SET is_active = 0, last_modified = ?2, modified_by = ?3
                WHERE id = ?1
                "#,
            )
            .bind(&rule.id)
            .bind(now)
            .bind(actor)
            .execute(&mut *conn)
            .await?;

            rule.is_active = false;
            rule.last_modified = now;
            rule.modified_by = actor.clone();
            debug!(id = %rule.id, %key, "Client rule retired");
            Ok(WriteOutcome::ClientDeactivated(rule))
        }
    }
}

async fn active_tier(
    conn: &mut SqliteConnection,
    key: &TierRuleKey,
) -> DbResult<Option<TierPriceRule>> {
    let sql = format!(
        "SELECT {} FROM tier_price_rules WHERE product_id = ?1 AND tier_id = ?2 AND is_active = 1",
        TIER_COLUMNS
    );
    Ok(sqlx::query_as::<_, TierPriceRule>(&sql)
        .bind(&key.product_id)
        .bind(&key.tier_id)
        .fetch_optional(conn)
        .await?)
}

async fn active_client(
    conn: &mut SqliteConnection,
    key: &ClientRuleKey,
) -> DbResult<Option<ClientPriceRule>> {
    let sql = format!(
        "SELECT {} FROM client_price_rules WHERE client_id = ?1 AND product_id = ?2 AND is_active = 1",
        CLIENT_COLUMNS
    );
    Ok(sqlx::query_as::<_, ClientPriceRule>(&sql)
        .bind(&key.client_id)
        .bind(&key.product_id)
        .fetch_optional(conn)
        .await?)
}

async fn insert_tier(conn: &mut SqliteConnection, rule: &TierPriceRule) -> DbResult<()> {
    let sql = format!(
        "INSERT INTO tier_price_rules ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        TIER_COLUMNS
    );
    sqlx::query(&sql)
        .bind(&rule.id)
        .bind(&rule.product_id)
        .bind(&rule.tier_id)
        .bind(rule.base_price_cents)
        .bind(rule.discount_type)
        .bind(rule.discount_value)
        .bind(rule.final_price_cents)
        .bind(rule.is_active)
        .bind(rule.created_at)
        .bind(rule.last_modified)
        .bind(&rule.modified_by)
        .execute(conn)
        .await?;
    Ok(())
}

async fn update_tier(conn: &mut SqliteConnection, rule: &TierPriceRule) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE tier_price_rules SET
            base_price_cents = ?2,
            discount_type = ?3,
            discount_value = ?4,
            final_price_cents = ?5,
            last_modified = ?6,
            modified_by = ?7
        WHERE id = ?1 AND is_active = 1
        "#,
    )
    .bind(&rule.id)
    .bind(rule.base_price_cents)
    .bind(rule.discount_type)
    .bind(rule.discount_value)
    .bind(rule.final_price_cents)
    .bind(rule.last_modified)
    .bind(&rule.modified_by)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("TierPriceRule", &rule.id));
    }
    Ok(())
}

async fn insert_client(conn: &mut SqliteConnection, rule: &ClientPriceRule) -> DbResult<()> {
    let sql = format!(
        r#"INSERT INTO client_price_rules ({}) VALUES (
            ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11,
            ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22
        )"#,
        CLIENT_COLUMNS
    );
    sqlx::query(&sql)
        .bind(&rule.id)
        .bind(&rule.client_id)
        .bind(&rule.product_id)
        .bind(rule.pricing_type)
        .bind(rule.fixed_price_cents)
        .bind(rule.base_price_cents)
        .bind(rule.markup_type)
        .bind(rule.markup_value)
        .bind(rule.final_price_cents)
        .bind(&rule.agreement_ref)
        .bind(rule.valid_from)
        .bind(rule.valid_until)
        .bind(rule.min_quantity)
        .bind(rule.priority)
        .bind(rule.price_source)
        .bind(&rule.based_on_history_id)
        .bind(&rule.notes)
        .bind(rule.is_active)
        .bind(rule.created_at)
        .bind(&rule.created_by)
        .bind(rule.last_modified)
        .bind(&rule.modified_by)
        .execute(conn)
        .await?;
    Ok(())
}

async fn update_client(conn: &mut SqliteConnection, rule: &ClientPriceRule) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE client_price_rules SET
            pricing_type = ?2,
            fixed_price_cents = ?3,
            base_price_cents = ?4,
            markup_type = ?5,
            markup_value = ?6,
            final_price_cents = ?7,
            agreement_ref = ?8,
            valid_from = ?9,
            valid_until = ?10,
            min_quantity = ?11,
            priority = ?12,
            price_source = ?13,
            based_on_history_id = ?14,
            notes = ?15,
            last_modified = ?16,
            modified_by = ?17
        WHERE id = ?1 AND is_active = 1
        "#,
    )
    .bind(&rule.id)
    .bind(rule.pricing_type)
    .bind(rule.fixed_price_cents)
    .bind(rule.base_price_cents)
    .bind(rule.markup_type)
    .bind(rule.markup_value)
    .bind(rule.final_price_cents)
    .bind(&rule.agreement_ref)
    .bind(rule.valid_from)
    .bind(rule.valid_until)
    .bind(rule.min_quantity)
    .bind(rule.priority)
    .bind(rule.price_source)
    .bind(&rule.based_on_history_id)
    .bind(&rule.notes)
    .bind(rule.last_modified)
    .bind(&rule.modified_by)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("ClientPriceRule", &rule.id));
    }
    Ok(())
}

async fn insert_history(conn: &mut SqliteConnection, record: &PriceHistoryRecord) -> DbResult<()> {
    let sql = format!(
        r#"INSERT INTO price_history ({}) VALUES (
            ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15
        )"#,
        HISTORY_COLUMNS
    );
    sqlx::query(&sql)
        .bind(&record.id)
        .bind(&record.client_id)
        .bind(&record.product_id)
        .bind(record.price_cents)
        .bind(record.quantity)
        .bind(record.sold_date)
        .bind(&record.order_id)
        .bind(&record.contract_ref)
        .bind(record.original_price_cents)
        .bind(record.discount_cents)
        .bind(record.discount_bps)
        .bind(record.source)
        .bind(&record.notes)
        .bind(record.is_active)
        .bind(record.created_at)
        .execute(conn)
        .await?;
    Ok(())
}

// =============================================================================
// PricingStore
// =============================================================================

#[async_trait]
impl PricingStore for SqlitePricingStore {
    async fn ping(&self) -> DbResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| DbError::StoreUnavailable(e.to_string()))
    }

    async fn active_tier_rule(&self, key: &TierRuleKey) -> DbResult<Option<TierPriceRule>> {
        debug!(%key, "Looking up active tier rule");
        let mut conn = self.pool.acquire().await?;
        active_tier(&mut *conn, key).await
    }

    async fn active_client_rule(&self, key: &ClientRuleKey) -> DbResult<Option<ClientPriceRule>> {
        debug!(%key, "Looking up active client rule");
        let mut conn = self.pool.acquire().await?;
        active_client(&mut *conn, key).await
    }

    async fn tier_rule(&self, id: &str) -> DbResult<Option<TierPriceRule>> {
        let sql = format!("SELECT {} FROM tier_price_rules WHERE id = ?1", TIER_COLUMNS);
        Ok(sqlx::query_as::<_, TierPriceRule>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn client_rule(&self, id: &str) -> DbResult<Option<ClientPriceRule>> {
        let sql = format!("SELECT {} FROM client_price_rules WHERE id = ?1", CLIENT_COLUMNS);
        Ok(sqlx::query_as::<_, ClientPriceRule>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn tier_rules_for_tier(&self, tier_id: &str) -> DbResult<Vec<TierPriceRule>> {
        let sql = format!(
            "SELECT {} FROM tier_price_rules WHERE tier_id = ?1 ORDER BY product_id, created_at",
            TIER_COLUMNS
        );
        let rules = sqlx::query_as::<_, TierPriceRule>(&sql)
            .bind(tier_id)
            .fetch_all(&self.pool)
            .await?;
        debug!(tier_id, count = rules.len(), "Listed tier rules");
        Ok(rules)
    }

    async fn client_rules_for_client(&self, client_id: &str) -> DbResult<Vec<ClientPriceRule>> {
        let sql = format!(
            "SELECT {} FROM client_price_rules WHERE client_id = ?1 ORDER BY product_id, created_at",
            CLIENT_COLUMNS
        );
        let rules = sqlx::query_as::<_, ClientPriceRule>(&sql)
            .bind(client_id)
            .fetch_all(&self.pool)
            .await?;
        debug!(client_id, count = rules.len(), "Listed client rules");
        Ok(rules)
    }

    async fn history_for_client(&self, client_id: &str) -> DbResult<Vec<PriceHistoryRecord>> {
        let sql = format!(
            "SELECT {} FROM price_history WHERE client_id = ?1 ORDER BY sold_date, created_at",
            HISTORY_COLUMNS
        );
        Ok(sqlx::query_as::<_, PriceHistoryRecord>(&sql)
            .bind(client_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn history_for_pair(&self, key: &ClientRuleKey) -> DbResult<Vec<PriceHistoryRecord>> {
        let sql = format!(
            r#"SELECT {} FROM price_history
               WHERE client_id = ?1 AND product_id = ?2
               ORDER BY sold_date, created_at"#,
            HISTORY_COLUMNS
        );
        Ok(sqlx::query_as::<_, PriceHistoryRecord>(&sql)
            .bind(&key.client_id)
            .bind(&key.product_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn load_index(&self) -> DbResult<RuleIndex> {
        let tier_sql = format!("SELECT {} FROM tier_price_rules WHERE is_active = 1", TIER_COLUMNS);
        let client_sql = format!(
            "SELECT {} FROM client_price_rules WHERE is_active = 1",
            CLIENT_COLUMNS
        );

        let tier_rules = sqlx::query_as::<_, TierPriceRule>(&tier_sql)
            .fetch_all(&self.pool)
            .await?;
        let client_rules = sqlx::query_as::<_, ClientPriceRule>(&client_sql)
            .fetch_all(&self.pool)
            .await?;

        let index = RuleIndex::rebuild(tier_rules, client_rules);
        debug!(
            tier_rules = index.tier_len(),
            client_rules = index.client_len(),
            "Rule index loaded"
        );
        Ok(index)
    }

    async fn commit(&self, batch: WriteBatch) -> DbResult<Vec<WriteOutcome>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let mut attempt = 1;
        loop {
            match self.try_commit(&batch).await {
                Err(e) if e.is_unique_violation() && attempt < MAX_COMMIT_ATTEMPTS => {
                    warn!(attempt, error = %e, "Concurrent create on an active-rule key, retrying batch");
                    attempt += 1;
                }
                Err(DbError::Busy(msg)) if attempt < MAX_COMMIT_ATTEMPTS => {
                    warn!(attempt, error = %msg, "Write lock busy, retrying batch");
                    attempt += 1;
                }
                Ok(outcomes) => {
                    debug!(writes = outcomes.len(), attempt, "Batch committed");
                    return Ok(outcomes);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
