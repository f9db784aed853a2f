use crate::database::error::DatabaseError;
use crate::database::payment_record_repository::{PaymentRecord, PaymentRecordRepository};
use crate::payments::client::InvoiceProvider;
use crate::payments::error::ProviderError;
use crate::payments::types::PaymentStatus;
use crate::services::audit::AuditRecorder;
use crate::services::ledger;
use bigdecimal::BigDecimal;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("{0}")]
    Validation(String),
    #[error("No payment records found for '{key}'")]
    NotFound { key: String },
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Result of cross-checking one payer against provider ground truth.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub email: String,
    pub old_status: String,
    pub new_status: String,
    pub old_amount_paid: BigDecimal,
    pub new_amount_paid: BigDecimal,
    pub matched_invoices: Vec<String>,
    pub changed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct KeptRecord {
    pub payment_id: Uuid,
    pub invoice_reference: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CleanupReport {
    pub payments_found: usize,
    /// Count of records cancelled; field name preserved from the operation
    /// contract even though nothing is hard-deleted.
    pub payments_deleted: usize,
    pub kept: KeptRecord,
}

#[derive(Debug, Clone, Serialize)]
pub struct OverriddenRecord {
    pub payment_id: Uuid,
    pub old_status: String,
    pub new_status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OverrideReport {
    pub updated: Vec<OverriddenRecord>,
}

/// Recovers from missed, delayed or duplicated webhooks by re-deriving local
/// state from the provider, and collapses duplicate records per payer.
/// Every operation reads the provider before touching local state; a provider
/// failure aborts with nothing mutated.
pub struct ReconciliationService {
    records: PaymentRecordRepository,
    provider: Arc<dyn InvoiceProvider>,
    audit: AuditRecorder,
}

impl ReconciliationService {
    pub fn new(
        records: PaymentRecordRepository,
        provider: Arc<dyn InvoiceProvider>,
        audit: AuditRecorder,
    ) -> Self {
        Self {
            records,
            provider,
            audit,
        }
    }

    /// Re-derives one payer's paid amount and status from provider invoices.
    pub async fn sync_one(&self, email: &str, actor: &str) -> Result<SyncReport, ReconcileError> {
        let email = normalized(email)?;

        let records = self.records.find_by_email(&email).await?;
        let target = records
            .iter()
            .find(|r| r.status != PaymentStatus::Cancelled.as_str())
            .ok_or_else(|| ReconcileError::NotFound { key: email.clone() })?;

        let invoices = self.provider.list_invoices().await?;
        let decision = ledger::decide_sync(&email, &invoices, &target.amount_to_pay);

        let Some(repair) = decision.repair else {
            info!(email = %email, "sync found no paid invoices; local state unchanged");
            return Ok(SyncReport {
                email,
                old_status: target.status.clone(),
                new_status: target.status.clone(),
                old_amount_paid: target.amount_paid.clone(),
                new_amount_paid: target.amount_paid.clone(),
                matched_invoices: decision.matched_references,
                changed: false,
            });
        };

        let updated = self
            .records
            .overwrite_progress(target.id, &repair.amount_paid, repair.status.as_str())
            .await?;

        info!(
            email = %email,
            old_status = %target.status,
            new_status = %updated.status,
            amount_paid = %updated.amount_paid,
            "payment record repaired from provider state"
        );

        self.audit
            .record(
                "payment.reconciled",
                "payment_record",
                Some(&updated.id.to_string()),
                actor,
                serde_json::json!({
                    "old_amount_paid": target.amount_paid.to_string(),
                    "new_amount_paid": updated.amount_paid.to_string(),
                    "old_status": target.status,
                    "new_status": updated.status,
                    "matched_invoices": decision.matched_references,
                }),
            )
            .await;

        Ok(SyncReport {
            email,
            old_status: target.status.clone(),
            new_status: updated.status.clone(),
            old_amount_paid: target.amount_paid.clone(),
            new_amount_paid: updated.amount_paid.clone(),
            matched_invoices: decision.matched_references,
            changed: true,
        })
    }

    /// Collapses duplicate records for one payer down to a single keeper.
    /// Losers are cancelled upstream (when still open) and locally, never
    /// hard-deleted.
    pub async fn cleanup_duplicates(
        &self,
        email: &str,
        actor: &str,
    ) -> Result<CleanupReport, ReconcileError> {
        let email = normalized(email)?;

        let records: Vec<PaymentRecord> = self
            .records
            .find_by_email(&email)
            .await?
            .into_iter()
            .filter(|r| r.status != PaymentStatus::Cancelled.as_str())
            .collect();

        if records.is_empty() {
            return Err(ReconcileError::NotFound { key: email });
        }

        // Provider state is fetched up front: it both feeds keeper precedence
        // and tells which duplicate invoices are still open upstream.
        let invoices = self.provider.list_invoices().await?;

        let keeper = ledger::select_keeper(&records, &invoices)
            .ok_or_else(|| ReconcileError::NotFound { key: email.clone() })?
            .clone();

        let losers: Vec<&PaymentRecord> =
            records.iter().filter(|r| r.id != keeper.id).collect();

        let mut cancelled = 0usize;
        for loser in &losers {
            let upstream = invoices
                .iter()
                .find(|invoice| invoice.reference == loser.invoice_id);
            if let Some(invoice) = upstream {
                if invoice.is_open() {
                    self.provider.cancel_invoice(&invoice.id).await?;
                }
            }

            let updated = self.records.mark_cancelled(loser.id).await?;
            cancelled += 1;

            self.audit
                .record(
                    "payment.duplicate_cancelled",
                    "payment_record",
                    Some(&updated.id.to_string()),
                    actor,
                    serde_json::json!({
                        "invoice_reference": updated.invoice_id,
                        "old_status": loser.status,
                        "kept_payment_id": keeper.id.to_string(),
                    }),
                )
                .await;
        }

        info!(
            email = %email,
            found = records.len(),
            cancelled = cancelled,
            kept = %keeper.id,
            "duplicate payment records collapsed"
        );

        self.audit
            .record(
                "payment.duplicate_kept",
                "payment_record",
                Some(&keeper.id.to_string()),
                actor,
                serde_json::json!({
                    "invoice_reference": keeper.invoice_id,
                    "status": keeper.status,
                    "considered": records
                        .iter()
                        .map(|r| serde_json::json!({
                            "payment_id": r.id.to_string(),
                            "invoice_reference": r.invoice_id,
                            "status": r.status,
                            "created_at": r.created_at.to_rfc3339(),
                        }))
                        .collect::<Vec<_>>(),
                }),
            )
            .await;

        Ok(CleanupReport {
            payments_found: records.len(),
            payments_deleted: cancelled,
            kept: KeptRecord {
                payment_id: keeper.id,
                invoice_reference: keeper.invoice_id.clone(),
                status: keeper.status.clone(),
            },
        })
    }

    /// Administrative escape hatch: force-sets status on every record matching
    /// the payer, bypassing all derivation logic.
    pub async fn override_status(
        &self,
        email: Option<&str>,
        phone: Option<&str>,
        status: PaymentStatus,
        actor: &str,
    ) -> Result<OverrideReport, ReconcileError> {
        let records = match (email, phone) {
            (Some(email), _) if !email.trim().is_empty() => {
                self.records.find_by_email(email.trim()).await?
            }
            (_, Some(phone)) if !phone.trim().is_empty() => {
                self.records.find_by_phone(phone.trim()).await?
            }
            _ => {
                return Err(ReconcileError::Validation(
                    "email or phone is required".to_string(),
                ))
            }
        };

        if records.is_empty() {
            let key = email.or(phone).unwrap_or_default().to_string();
            return Err(ReconcileError::NotFound { key });
        }

        let mut updated = Vec::with_capacity(records.len());
        for record in &records {
            let changed = self.records.force_status(record.id, status.as_str()).await?;

            info!(
                payment_id = %record.id,
                old_status = %record.status,
                new_status = %changed.status,
                actor = %actor,
                "payment status manually overridden"
            );

            self.audit
                .record(
                    "payment.status_overridden",
                    "payment_record",
                    Some(&record.id.to_string()),
                    actor,
                    serde_json::json!({
                        "manual": true,
                        "old_status": record.status,
                        "new_status": changed.status,
                    }),
                )
                .await;

            updated.push(OverriddenRecord {
                payment_id: record.id,
                old_status: record.status.clone(),
                new_status: changed.status,
            });
        }

        Ok(OverrideReport { updated })
    }
}

fn normalized(email: &str) -> Result<String, ReconcileError> {
    let email = email.trim().to_lowercase();
    if email.is_empty() {
        return Err(ReconcileError::Validation("email is required".to_string()));
    }
    Ok(email)
}
