use crate::database::error::DatabaseError;
use crate::database::payment_record_repository::{
    PartialPaymentOutcome, PaymentRecord, PaymentRecordRepository,
};
use crate::payments::types::{minor_to_major, InboundWebhook};
use crate::payments::utils::verify_webhook_signature;
use crate::services::audit::AuditRecorder;
use bigdecimal::BigDecimal;
use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Missing Request-Signature or Request-Timestamp header")]
    MissingHeaders,
    #[error("Malformed webhook payload: {0}")]
    Malformed(String),
    #[error("Invalid webhook signature")]
    InvalidSignature,
    #[error("No payment record matches '{key}'")]
    RecordNotFound { key: String },
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Before/after view of one webhook application, echoed to the provider and
/// written to the audit trail.
#[derive(Debug, Clone, Serialize)]
pub struct StateChange {
    pub event: String,
    pub old_amount_paid: BigDecimal,
    pub new_amount_paid: BigDecimal,
    pub old_status: String,
    pub new_status: String,
}

impl StateChange {
    fn between(event: &str, previous: &PaymentRecord, current: &PaymentRecord) -> Self {
        Self {
            event: event.to_string(),
            old_amount_paid: previous.amount_paid.clone(),
            new_amount_paid: current.amount_paid.clone(),
            old_status: previous.status.clone(),
            new_status: current.status.clone(),
        }
    }
}

#[derive(Debug)]
pub enum WebhookOutcome {
    /// Unrecognized event name: acknowledged, nothing touched.
    Ignored,
    /// A recognized event was applied (or re-applied as a no-op).
    Applied(StateChange),
}

/// Consumes provider push notifications. Authenticity is checked before any
/// payload interpretation; state transitions are idempotent and monotonic.
pub struct WebhookProcessor {
    records: PaymentRecordRepository,
    audit: AuditRecorder,
    signing_secret: String,
}

impl WebhookProcessor {
    pub fn new(
        records: PaymentRecordRepository,
        audit: AuditRecorder,
        signing_secret: impl Into<String>,
    ) -> Self {
        Self {
            records,
            audit,
            signing_secret: signing_secret.into(),
        }
    }

    /// Header and signature gate. Pure: no store access, so nothing can have
    /// been mutated when this rejects.
    pub fn authenticate(
        secret: &str,
        signature: Option<&str>,
        timestamp: Option<&str>,
        body: &str,
    ) -> Result<JsonValue, WebhookError> {
        let signature = match signature {
            Some(value) if !value.trim().is_empty() => value,
            _ => return Err(WebhookError::MissingHeaders),
        };
        if !timestamp.is_some_and(|value| !value.trim().is_empty()) {
            return Err(WebhookError::MissingHeaders);
        }

        let payload: JsonValue = serde_json::from_str(body)
            .map_err(|e| WebhookError::Malformed(format!("invalid JSON body: {}", e)))?;

        if !verify_webhook_signature(&payload, secret, signature) {
            return Err(WebhookError::InvalidSignature);
        }

        Ok(payload)
    }

    pub async fn process(
        &self,
        signature: Option<&str>,
        timestamp: Option<&str>,
        body: &str,
    ) -> Result<WebhookOutcome, WebhookError> {
        let payload = Self::authenticate(&self.signing_secret, signature, timestamp, body)?;

        let event: InboundWebhook = serde_json::from_value(payload.clone())
            .map_err(|e| WebhookError::Malformed(format!("unexpected event shape: {}", e)))?;

        match event {
            InboundWebhook::PaymentSucceeded(event) => {
                self.apply_partial(event, &payload).await
            }
            InboundWebhook::InvoicePaid(event) => self.apply_settlement(event, &payload).await,
            InboundWebhook::Unknown => {
                let name = payload
                    .get("event")
                    .and_then(|v| v.as_str())
                    .unwrap_or("<missing>");
                warn!(event = %name, "unrecognized webhook event acknowledged and ignored");
                Ok(WebhookOutcome::Ignored)
            }
        }
    }

    async fn apply_partial(
        &self,
        event: crate::payments::types::PartialPaymentEvent,
        payload: &JsonValue,
    ) -> Result<WebhookOutcome, WebhookError> {
        if event.amount < 0 {
            return Err(WebhookError::Malformed(
                "payment amount must be non-negative".to_string(),
            ));
        }

        let delta = minor_to_major(event.amount);
        let outcome = self
            .records
            .apply_partial_payment(&event.invoice_id, &event.payment_id, &delta)
            .await?;

        match outcome {
            PartialPaymentOutcome::NotFound => Err(WebhookError::RecordNotFound {
                key: event.invoice_id,
            }),
            PartialPaymentOutcome::Duplicate(record) => {
                info!(
                    invoice_id = %event.invoice_id,
                    payment_id = %event.payment_id,
                    "redelivered payment event ignored"
                );
                Ok(WebhookOutcome::Applied(StateChange::between(
                    "payment-succeeded",
                    &record,
                    &record,
                )))
            }
            PartialPaymentOutcome::Applied { previous, current } => {
                info!(
                    invoice_id = %event.invoice_id,
                    payment_id = %event.payment_id,
                    amount = %delta,
                    status = %current.status,
                    "partial payment credited"
                );

                let change = StateChange::between("payment-succeeded", &previous, &current);
                self.audit
                    .record(
                        "payment.webhook.partial",
                        "payment_record",
                        Some(&current.id.to_string()),
                        "provider",
                        serde_json::json!({
                            "old_amount_paid": change.old_amount_paid.to_string(),
                            "new_amount_paid": change.new_amount_paid.to_string(),
                            "old_status": change.old_status,
                            "new_status": change.new_status,
                            "payload": payload,
                        }),
                    )
                    .await;

                Ok(WebhookOutcome::Applied(change))
            }
        }
    }

    async fn apply_settlement(
        &self,
        event: crate::payments::types::SettlementEvent,
        payload: &JsonValue,
    ) -> Result<WebhookOutcome, WebhookError> {
        let settled = self.records.settle(&event.invoice_reference).await?;

        match settled {
            None => Err(WebhookError::RecordNotFound {
                key: event.invoice_reference,
            }),
            Some((previous, current)) => {
                info!(
                    reference = %event.invoice_reference,
                    amount = %current.amount_paid,
                    "invoice settled in full"
                );

                let change = StateChange::between("invoice-paid", &previous, &current);
                self.audit
                    .record(
                        "payment.webhook.settled",
                        "payment_record",
                        Some(&current.id.to_string()),
                        "provider",
                        serde_json::json!({
                            "old_amount_paid": change.old_amount_paid.to_string(),
                            "new_amount_paid": change.new_amount_paid.to_string(),
                            "old_status": change.old_status,
                            "new_status": change.new_status,
                            "payload": payload,
                        }),
                    )
                    .await;

                Ok(WebhookOutcome::Applied(change))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::utils::sign_payload;
    use serde_json::json;

    const SECRET: &str = "whsec_test";

    #[test]
    fn missing_signature_header_is_rejected() {
        let err = WebhookProcessor::authenticate(SECRET, None, Some("1722500000"), "{}")
            .unwrap_err();
        assert!(matches!(err, WebhookError::MissingHeaders));
    }

    #[test]
    fn missing_timestamp_header_is_rejected() {
        let err = WebhookProcessor::authenticate(SECRET, Some("deadbeef"), None, "{}").unwrap_err();
        assert!(matches!(err, WebhookError::MissingHeaders));
    }

    #[test]
    fn invalid_json_body_is_malformed() {
        let err = WebhookProcessor::authenticate(
            SECRET,
            Some("deadbeef"),
            Some("1722500000"),
            "not json",
        )
        .unwrap_err();
        assert!(matches!(err, WebhookError::Malformed(_)));
    }

    #[test]
    fn valid_signature_passes_the_gate() {
        let payload = json!({"event": "invoice-paid", "data": {"invoiceReference": "HP-1"}});
        let signature = sign_payload(&payload, SECRET);
        let body = serde_json::to_string(&payload).unwrap();

        let parsed = WebhookProcessor::authenticate(
            SECRET,
            Some(&signature),
            Some("1722500000"),
            &body,
        )
        .expect("authentic webhook should pass");
        assert_eq!(parsed["event"], "invoice-paid");
    }

    #[test]
    fn tampered_body_with_original_signature_is_rejected() {
        let payload = json!({"event": "payment-succeeded", "data": {"invoiceId": "inv_1", "paymentId": "pay_1", "amount": 40000}});
        let signature = sign_payload(&payload, SECRET);

        let tampered = json!({"event": "payment-succeeded", "data": {"invoiceId": "inv_1", "paymentId": "pay_1", "amount": 9900000}});
        let body = serde_json::to_string(&tampered).unwrap();

        let err = WebhookProcessor::authenticate(
            SECRET,
            Some(&signature),
            Some("1722500000"),
            &body,
        )
        .unwrap_err();
        assert!(matches!(err, WebhookError::InvalidSignature));
    }
}
