//! # Historical Sales
//!
//! Turns imported sale records into ledger entries and, where no rule
//! exists yet, into a fixed-price client rule draft.
//!
//! ```text
//! PriceRecord ──► ledger_record() ──► PriceHistoryRecord (always written)
//!      │
//!      └────────► historical_rule_draft() ──► ClientRuleDraft
//!                 (written only if the pair has no active rule)
//! ```

use chrono::{DateTime, NaiveDate, Utc};

use crate::draft::{ClientRuleDraft, ClientRuleTerms, DraftOrigin};
use crate::types::{
    ClientPricing, ClientRuleKey, HistorySource, PriceHistoryRecord, PriceRecord,
};
use crate::validation::ValidationResult;

/// Builds the immutable ledger entry for one imported sale.
///
/// When an original price is present the discount is derived from it, both
/// as an amount and as basis points of the original.
pub fn ledger_record(
    id: String,
    client_id: &str,
    record: &PriceRecord,
    source: HistorySource,
    now: DateTime<Utc>,
) -> PriceHistoryRecord {
    let (discount_cents, discount_bps) = match record.original_price {
        Some(original) => {
            let discount = original.saturating_sub(record.price);
            (Some(discount.cents()), original.bps_of(discount))
        }
        None => (None, None),
    };

    PriceHistoryRecord {
        id,
        client_id: client_id.to_string(),
        product_id: record.product_id.clone(),
        price_cents: record.price.cents(),
        quantity: record.quantity,
        sold_date: record.sold_date,
        order_id: record.order_id.clone(),
        contract_ref: record.contract_ref.clone(),
        original_price_cents: record.original_price.map(|m| m.cents()),
        discount_cents,
        discount_bps,
        source,
        notes: record.notes.clone(),
        is_active: true,
        created_at: now,
    }
}

/// Agreement reference for a rule synthesized from a sale.
pub fn historical_agreement_ref(record: &PriceRecord) -> String {
    if let Some(ref contract) = record.contract_ref {
        if !contract.trim().is_empty() {
            return contract.clone();
        }
    }
    match record.order_id {
        Some(ref order) if !order.trim().is_empty() => format!("HIST-{}", order),
        _ => format!("HIST-{}", record.sold_date.format("%Y%m%d")),
    }
}

/// Note stamped on a rule synthesized from a sale.
pub fn historical_note(sold_date: NaiveDate) -> String {
    format!("Auto-created from historical sale on {}", sold_date)
}

/// Draft of the fixed-price rule derived from a ledger entry.
///
/// Valid from `today`, open-ended, minimum quantity 1.
pub fn historical_rule_draft(
    history: &PriceHistoryRecord,
    record: &PriceRecord,
    today: NaiveDate,
    actor: &str,
) -> ValidationResult<ClientRuleDraft> {
    let mut terms = ClientRuleTerms::starting(historical_agreement_ref(record), today);
    terms.notes = Some(historical_note(record.sold_date));

    ClientRuleDraft::new(
        ClientRuleKey::new(&history.client_id, &history.product_id),
        ClientPricing::Fixed {
            price: record.price,
        },
        terms,
        DraftOrigin::Historical {
            history_id: history.id.clone(),
        },
        actor,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;
    use crate::types::PriceSource;
    use crate::PRIORITY_HISTORICAL;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_ledger_record_without_original_price() {
        let record = PriceRecord::new("P2", Money::from_cents(50_000), 3, day(2025, 1, 5));
        let entry = ledger_record("h1".into(), "C2", &record, HistorySource::Import, Utc::now());
        assert_eq!(entry.price_cents, 50_000);
        assert_eq!(entry.quantity, 3);
        assert!(entry.discount_cents.is_none());
        assert!(entry.discount_bps.is_none());
        assert!(entry.is_active);
    }

    #[test]
    fn test_ledger_record_derives_discount() {
        let mut record = PriceRecord::new("P2", Money::from_cents(45_000), 1, day(2025, 1, 5));
        record.original_price = Some(Money::from_cents(50_000));
        let entry = ledger_record("h1".into(), "C2", &record, HistorySource::Import, Utc::now());
        assert_eq!(entry.discount_cents, Some(5_000));
        assert_eq!(entry.discount_bps, Some(1000));
    }

    #[test]
    fn test_agreement_ref_fallbacks() {
        let mut record = PriceRecord::new("P2", Money::from_cents(1), 1, day(2025, 1, 5));
        assert_eq!(historical_agreement_ref(&record), "HIST-20250105");
        record.order_id = Some("SO-991".into());
        assert_eq!(historical_agreement_ref(&record), "HIST-SO-991");
        record.contract_ref = Some("CTR-12".into());
        assert_eq!(historical_agreement_ref(&record), "CTR-12");
    }

    #[test]
    fn test_historical_rule_draft() {
        let record = PriceRecord::new("P2", Money::from_cents(50_000), 1, day(2025, 1, 5));
        let entry = ledger_record("h1".into(), "C2", &record, HistorySource::Import, Utc::now());
        let draft = historical_rule_draft(&entry, &record, day(2025, 3, 1), "importer").unwrap();
        let rule = draft.create("r1".into(), Utc::now());

        assert_eq!(rule.fixed_price_cents, Some(50_000));
        assert_eq!(rule.final_price_cents, 50_000);
        assert_eq!(rule.price_source, PriceSource::Historical);
        assert_eq!(rule.priority, PRIORITY_HISTORICAL);
        assert_eq!(rule.based_on_history_id.as_deref(), Some("h1"));
        assert_eq!(rule.valid_from, day(2025, 3, 1));
        assert!(rule.notes.unwrap().contains("2025-01-05"));
    }
}
