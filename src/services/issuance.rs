use crate::config::{InvoicingConfig, PaymentConfig};
use crate::database::error::DatabaseError;
use crate::database::payment_record_repository::{NewPaymentRecord, PaymentRecordRepository};
use crate::payments::client::InvoiceProvider;
use crate::payments::error::ProviderError;
use crate::payments::types::{CreateInvoiceRequest, PayerDetails, PaymentStatus};
use crate::services::audit::AuditRecorder;
use bigdecimal::BigDecimal;
use chrono::Utc;
use regex::Regex;
use serde::Serialize;
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum IssuanceError {
    #[error("Invalid field '{field}': {message}")]
    Validation { field: String, message: String },
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// What the front-end payment flow receives for a fresh invoice.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedPayment {
    pub payment_id: Uuid,
    pub invoice_id: String,
    pub invoice_reference: String,
    pub payment_url: String,
    pub amount: BigDecimal,
    pub status: PaymentStatus,
    pub due_date: chrono::DateTime<chrono::Utc>,
}

/// Creates the external invoice and the local record in lock-step. The local
/// insert only runs after the provider accepted the invoice, so a provider
/// failure leaves no record behind.
pub struct IssuanceService {
    records: PaymentRecordRepository,
    provider: Arc<dyn InvoiceProvider>,
    audit: AuditRecorder,
    payment: PaymentConfig,
    invoicing: InvoicingConfig,
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"))
}

fn phone_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\+?[0-9]{7,15}$").expect("valid phone regex"))
}

impl IssuanceService {
    pub fn new(
        records: PaymentRecordRepository,
        provider: Arc<dyn InvoiceProvider>,
        audit: AuditRecorder,
        payment: PaymentConfig,
        invoicing: InvoicingConfig,
    ) -> Self {
        Self {
            records,
            provider,
            audit,
            payment,
            invoicing,
        }
    }

    pub async fn issue(&self, payer: PayerDetails) -> Result<IssuedPayment, IssuanceError> {
        validate_payer(&payer)?;

        let now = Utc::now();
        let reference = generate_reference(now);
        let due_date = now + chrono::Duration::days(self.payment.due_days);
        let return_url = build_return_url(
            &self.invoicing.return_url,
            &reference,
            &payer.email,
            &payer.phone,
        );

        let created = self
            .provider
            .create_invoice(CreateInvoiceRequest {
                reference: reference.clone(),
                amount: self.payment.amount_owed.clone(),
                currency: self.payment.currency.clone(),
                customer_name: format!("{} {}", payer.first_name.trim(), payer.last_name.trim()),
                customer_email: payer.email.clone(),
                customer_phone: payer.phone.clone(),
                callback_url: self.invoicing.callback_url.clone(),
                return_url,
                due_date,
            })
            .await?;

        let record = self
            .records
            .insert(NewPaymentRecord {
                email: payer.email.clone(),
                phone: payer.phone.clone(),
                amount_to_pay: self.payment.amount_owed.clone(),
                invoice_id: reference.clone(),
                provider_ref: Some(created.id.clone()),
            })
            .await?;

        info!(
            payment_id = %record.id,
            reference = %reference,
            email = %payer.email,
            "payment initiated"
        );

        self.audit
            .record(
                "payment.initiated",
                "payment_record",
                Some(&record.id.to_string()),
                &payer.email,
                serde_json::json!({
                    "invoice_reference": reference,
                    "provider_ref": created.id,
                    "amount_to_pay": self.payment.amount_owed.to_string(),
                    "due_date": due_date.to_rfc3339(),
                }),
            )
            .await;

        Ok(IssuedPayment {
            payment_id: record.id,
            invoice_id: created.id,
            invoice_reference: reference,
            payment_url: created.payment_url,
            amount: self.payment.amount_owed.clone(),
            status: PaymentStatus::Pending,
            due_date: created.due_date.unwrap_or(due_date),
        })
    }
}

fn validate_payer(payer: &PayerDetails) -> Result<(), IssuanceError> {
    let required = [
        ("firstName", &payer.first_name),
        ("lastName", &payer.last_name),
        ("email", &payer.email),
        ("phone", &payer.phone),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(IssuanceError::Validation {
                field: field.to_string(),
                message: "is required".to_string(),
            });
        }
    }

    if !email_pattern().is_match(payer.email.trim()) {
        return Err(IssuanceError::Validation {
            field: "email".to_string(),
            message: "is not a valid email address".to_string(),
        });
    }

    if !phone_pattern().is_match(payer.phone.trim()) {
        return Err(IssuanceError::Validation {
            field: "phone".to_string(),
            message: "must be 7-15 digits with an optional leading +".to_string(),
        });
    }

    Ok(())
}

/// Correlation key between the local record and the external invoice:
/// UTC timestamp plus a random suffix.
fn generate_reference(now: chrono::DateTime<chrono::Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("HP-{}-{}", now.format("%Y%m%d%H%M%S"), &suffix[..6])
}

/// The return URL carries reference, email and phone so the post-payment
/// redirect (and reconciliation's fallback matching) can identify the payer.
fn build_return_url(base: &str, reference: &str, email: &str, phone: &str) -> String {
    match reqwest::Url::parse(base) {
        Ok(mut url) => {
            url.query_pairs_mut()
                .append_pair("reference", reference)
                .append_pair("email", email)
                .append_pair("phone", phone);
            url.to_string()
        }
        Err(_) => base.to_string(),
    }
}
