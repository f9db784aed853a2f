//! Pure payment-state rules.
//!
//! The webhook repository pushes the partial-payment increment into a single
//! SQL statement; the functions here express the same transition rules for
//! reconciliation decisions and for tests, plus the matching and precedence
//! rules reconciliation applies to provider data.

use crate::database::payment_record_repository::PaymentRecord;
use crate::payments::types::{PaymentStatus, ProviderInvoice};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};

/// The reconciliation-relevant slice of a payment record.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerState {
    pub amount_to_pay: BigDecimal,
    pub amount_paid: BigDecimal,
    pub status: PaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub last_webhook_update: Option<DateTime<Utc>>,
}

/// Status derived from the paid/owed relation. `completed` iff the paid sum
/// covers the target, `partially_paid` iff anything has landed.
pub fn derive_status(amount_paid: &BigDecimal, amount_to_pay: &BigDecimal) -> PaymentStatus {
    if amount_paid >= amount_to_pay {
        PaymentStatus::Completed
    } else if amount_paid > &BigDecimal::from(0) {
        PaymentStatus::PartiallyPaid
    } else {
        PaymentStatus::Pending
    }
}

/// One incremental payment. Strictly additive; `paid_at` is stamped only on
/// the transition into completed, `last_webhook_update` unconditionally.
pub fn apply_partial(state: &LedgerState, delta: &BigDecimal, now: DateTime<Utc>) -> LedgerState {
    let amount_paid = &state.amount_paid + delta;
    let status = derive_status(&amount_paid, &state.amount_to_pay);
    let paid_at = if status == PaymentStatus::Completed {
        state.paid_at.or(Some(now))
    } else {
        state.paid_at
    };

    LedgerState {
        amount_to_pay: state.amount_to_pay.clone(),
        amount_paid,
        status,
        paid_at,
        last_webhook_update: Some(now),
    }
}

/// The authoritative settlement signal: forces the record fully paid,
/// overriding any partial-sum drift. Applying it twice is a no-op.
pub fn apply_settlement(state: &LedgerState, now: DateTime<Utc>) -> LedgerState {
    LedgerState {
        amount_to_pay: state.amount_to_pay.clone(),
        amount_paid: state.amount_to_pay.clone(),
        status: PaymentStatus::Completed,
        paid_at: state.paid_at.or(Some(now)),
        last_webhook_update: Some(now),
    }
}

/// Extracts the `email` query parameter from a return URL. The provider's
/// customer-email field is not always populated, so issuance embeds the payer
/// email in the return URL as a fallback correlation key.
pub fn return_url_email(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    parsed
        .query_pairs()
        .find(|(key, _)| key == "email")
        .map(|(_, value)| value.into_owned())
}

/// An invoice belongs to a payer when the provider recorded their email, or
/// when the return URL embeds it.
pub fn invoice_matches_payer(invoice: &ProviderInvoice, email: &str) -> bool {
    if let Some(customer_email) = &invoice.customer_email {
        if customer_email.eq_ignore_ascii_case(email) {
            return true;
        }
    }
    invoice
        .return_url
        .as_deref()
        .and_then(return_url_email)
        .map(|embedded| embedded.eq_ignore_ascii_case(email))
        .unwrap_or(false)
}

/// Outcome of cross-checking one payer against the provider's invoices.
#[derive(Debug, Clone)]
pub struct SyncDecision {
    pub matched_references: Vec<String>,
    pub repair: Option<SyncRepair>,
}

#[derive(Debug, Clone)]
pub struct SyncRepair {
    pub amount_paid: BigDecimal,
    pub status: PaymentStatus,
}

/// Re-derives the correct paid amount and status from provider ground truth.
/// No paid invoice for the payer means the local state stands as-is.
pub fn decide_sync(
    email: &str,
    invoices: &[ProviderInvoice],
    amount_to_pay: &BigDecimal,
) -> SyncDecision {
    let matched: Vec<&ProviderInvoice> = invoices
        .iter()
        .filter(|invoice| invoice_matches_payer(invoice, email))
        .collect();
    let matched_references = matched.iter().map(|i| i.reference.clone()).collect();

    let paid: Vec<&&ProviderInvoice> = matched.iter().filter(|i| i.is_paid()).collect();
    if paid.is_empty() {
        return SyncDecision {
            matched_references,
            repair: None,
        };
    }

    let total_paid: BigDecimal = paid
        .iter()
        .fold(BigDecimal::from(0), |acc, i| acc + i.total_paid.clone());
    let status = if &total_paid >= amount_to_pay {
        PaymentStatus::Completed
    } else {
        PaymentStatus::PartiallyPaid
    };

    SyncDecision {
        matched_references,
        repair: Some(SyncRepair {
            amount_paid: total_paid,
            status,
        }),
    }
}

/// Provider-side paid activity for a record's invoice, zero when the invoice
/// is unknown upstream.
fn paid_activity(record: &PaymentRecord, invoices: &[ProviderInvoice]) -> BigDecimal {
    invoices
        .iter()
        .find(|invoice| invoice.reference == record.invoice_id)
        .map(|invoice| invoice.total_paid.clone())
        .unwrap_or_else(|| BigDecimal::from(0))
}

/// Picks the single record to keep among a payer's duplicates:
/// (a) a completed record, newest first; else (b) the record with the most
/// provider-side paid activity; else (c) the newest record.
pub fn select_keeper<'a>(
    records: &'a [PaymentRecord],
    invoices: &[ProviderInvoice],
) -> Option<&'a PaymentRecord> {
    if records.is_empty() {
        return None;
    }

    if let Some(completed) = records
        .iter()
        .filter(|r| r.status == PaymentStatus::Completed.as_str())
        .max_by_key(|r| r.created_at)
    {
        return Some(completed);
    }

    let with_activity: Vec<(&PaymentRecord, BigDecimal)> = records
        .iter()
        .map(|r| (r, paid_activity(r, invoices)))
        .collect();
    let max_activity = with_activity
        .iter()
        .map(|(_, activity)| activity.clone())
        .max();
    if let Some(max_activity) = max_activity {
        if max_activity > BigDecimal::from(0) {
            return with_activity
                .iter()
                .filter(|(_, activity)| *activity == max_activity)
                .map(|(record, _)| *record)
                .max_by_key(|r| r.created_at);
        }
    }

    records.iter().max_by_key(|r| r.created_at)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(to_pay: i64, paid: i64, status: PaymentStatus) -> LedgerState {
        LedgerState {
            amount_to_pay: BigDecimal::from(to_pay),
            amount_paid: BigDecimal::from(paid),
            status,
            paid_at: None,
            last_webhook_update: None,
        }
    }

    #[test]
    fn partial_below_target_becomes_partially_paid() {
        let now = Utc::now();
        let next = apply_partial(&state(1000, 0, PaymentStatus::Pending), &BigDecimal::from(400), now);
        assert_eq!(next.amount_paid, BigDecimal::from(400));
        assert_eq!(next.status, PaymentStatus::PartiallyPaid);
        assert_eq!(next.paid_at, None);
        assert_eq!(next.last_webhook_update, Some(now));
    }

    #[test]
    fn partial_reaching_target_completes_and_stamps_paid_at() {
        let now = Utc::now();
        let next = apply_partial(
            &state(1000, 600, PaymentStatus::PartiallyPaid),
            &BigDecimal::from(400),
            now,
        );
        assert_eq!(next.status, PaymentStatus::Completed);
        assert_eq!(next.paid_at, Some(now));
    }

    #[test]
    fn zero_delta_on_zero_balance_stays_pending() {
        let now = Utc::now();
        let next = apply_partial(&state(1000, 0, PaymentStatus::Pending), &BigDecimal::from(0), now);
        assert_eq!(next.status, PaymentStatus::Pending);
        assert_eq!(next.last_webhook_update, Some(now));
    }

    #[test]
    fn settlement_preserves_existing_paid_at() {
        let first = Utc::now();
        let completed = apply_settlement(&state(1000, 400, PaymentStatus::PartiallyPaid), first);
        assert_eq!(completed.amount_paid, BigDecimal::from(1000));
        assert_eq!(completed.paid_at, Some(first));

        let later = first + chrono::Duration::minutes(5);
        let again = apply_settlement(&completed, later);
        assert_eq!(again.amount_paid, completed.amount_paid);
        assert_eq!(again.status, PaymentStatus::Completed);
        assert_eq!(again.paid_at, Some(first));
    }

    #[test]
    fn return_url_email_is_extracted() {
        let url = "https://hostel.example.com/payments/complete?reference=HP-1&email=jane%40example.com&phone=%2B2348012345678";
        assert_eq!(
            return_url_email(url).as_deref(),
            Some("jane@example.com")
        );
        assert_eq!(return_url_email("https://hostel.example.com/done"), None);
        assert_eq!(return_url_email("not a url"), None);
    }

    fn invoice(reference: &str, status: &str, amount: i64, total_paid: i64) -> ProviderInvoice {
        ProviderInvoice {
            id: format!("inv_{}", reference),
            reference: reference.to_string(),
            status: status.to_string(),
            amount: BigDecimal::from(amount),
            total_paid: BigDecimal::from(total_paid),
            customer_email: None,
            return_url: None,
        }
    }

    #[test]
    fn payer_matching_uses_customer_email_or_return_url() {
        let mut by_email = invoice("r1", "open", 1000, 0);
        by_email.customer_email = Some("Jane@Example.com".to_string());
        assert!(invoice_matches_payer(&by_email, "jane@example.com"));

        let mut by_url = invoice("r2", "open", 1000, 0);
        by_url.return_url =
            Some("https://hostel.example.com/done?email=jane%40example.com".to_string());
        assert!(invoice_matches_payer(&by_url, "jane@example.com"));

        let neither = invoice("r3", "open", 1000, 0);
        assert!(!invoice_matches_payer(&neither, "jane@example.com"));
    }

    #[test]
    fn sync_with_no_paid_invoice_reports_unchanged() {
        let mut open = invoice("r1", "open", 1000, 200);
        open.customer_email = Some("jane@example.com".to_string());
        let decision = decide_sync("jane@example.com", &[open], &BigDecimal::from(1000));
        assert_eq!(decision.matched_references, vec!["r1".to_string()]);
        assert!(decision.repair.is_none());
    }

    #[test]
    fn sync_with_fully_paid_invoice_repairs_to_completed() {
        let mut paid = invoice("r1", "paid", 1000, 1000);
        paid.customer_email = Some("jane@example.com".to_string());
        let decision = decide_sync("jane@example.com", &[paid], &BigDecimal::from(1000));
        let repair = decision.repair.expect("paid invoice should repair");
        assert_eq!(repair.amount_paid, BigDecimal::from(1000));
        assert_eq!(repair.status, PaymentStatus::Completed);
    }

    #[test]
    fn sync_sums_paid_invoices_across_duplicates() {
        let mut a = invoice("r1", "paid", 600, 600);
        a.customer_email = Some("jane@example.com".to_string());
        let mut b = invoice("r2", "paid", 600, 600);
        b.return_url = Some("https://h.example.com/done?email=jane%40example.com".to_string());
        let decision = decide_sync("jane@example.com", &[a, b], &BigDecimal::from(1000));
        let repair = decision.repair.unwrap();
        assert_eq!(repair.amount_paid, BigDecimal::from(1200));
        assert_eq!(repair.status, PaymentStatus::Completed);
    }

    fn record(invoice_id: &str, status: &str, minutes_ago: i64) -> PaymentRecord {
        PaymentRecord {
            id: uuid::Uuid::new_v4(),
            email: "jane@example.com".to_string(),
            phone: "+2348012345678".to_string(),
            amount_to_pay: BigDecimal::from(1000),
            amount_paid: BigDecimal::from(0),
            invoice_id: invoice_id.to_string(),
            provider_ref: Some(format!("inv_{}", invoice_id)),
            status: status.to_string(),
            paid_at: None,
            last_webhook_update: None,
            created_at: Utc::now() - chrono::Duration::minutes(minutes_ago),
        }
    }

    #[test]
    fn keeper_prefers_completed_even_when_oldest() {
        let records = vec![
            record("r_completed", "completed", 120),
            record("r_pending", "pending", 10),
            record("r_partial", "partially_paid", 5),
        ];
        let keeper = select_keeper(&records, &[]).expect("keeper expected");
        assert_eq!(keeper.invoice_id, "r_completed");
    }

    #[test]
    fn keeper_falls_back_to_most_paid_activity() {
        let records = vec![
            record("r_a", "pending", 60),
            record("r_b", "partially_paid", 30),
        ];
        let invoices = vec![
            invoice("r_a", "open", 1000, 700),
            invoice("r_b", "open", 1000, 200),
        ];
        let keeper = select_keeper(&records, &invoices).expect("keeper expected");
        assert_eq!(keeper.invoice_id, "r_a");
    }

    #[test]
    fn keeper_falls_back_to_newest_without_activity() {
        let records = vec![record("r_old", "pending", 60), record("r_new", "pending", 1)];
        let keeper = select_keeper(&records, &[]).expect("keeper expected");
        assert_eq!(keeper.invoice_id, "r_new");
    }
}
