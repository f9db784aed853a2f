use crate::payments::error::ProviderError;
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Lifecycle of a local payment record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    PartiallyPaid,
    Completed,
    Failed,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::PartiallyPaid => "partially_paid",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = ProviderError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "pending" => Ok(PaymentStatus::Pending),
            "partially_paid" => Ok(PaymentStatus::PartiallyPaid),
            "completed" => Ok(PaymentStatus::Completed),
            "failed" => Ok(PaymentStatus::Failed),
            "cancelled" => Ok(PaymentStatus::Cancelled),
            _ => Err(ProviderError::Validation {
                message: format!("unsupported payment status: {}", value),
                field: Some("status".to_string()),
            }),
        }
    }
}

/// Webhook amounts arrive in the minor currency unit (kobo); local records
/// hold major units with two decimal places.
pub fn minor_to_major(minor: i64) -> BigDecimal {
    BigDecimal::new(minor.into(), 2)
}

/// Payer identity supplied to issuance. The charge amount never comes from
/// the caller.
#[derive(Debug, Clone, Deserialize)]
pub struct PayerDetails {
    #[serde(rename = "firstName")]
    pub first_name: String,
    #[serde(rename = "lastName")]
    pub last_name: String,
    pub email: String,
    pub phone: String,
}

/// Request body for creating an invoice upstream.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoiceRequest {
    pub reference: String,
    pub amount: BigDecimal,
    pub currency: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub callback_url: String,
    pub return_url: String,
    pub due_date: chrono::DateTime<chrono::Utc>,
}

/// Provider response for a freshly created invoice.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedInvoice {
    pub id: String,
    pub reference: String,
    pub payment_url: String,
    pub status: String,
    #[serde(default)]
    pub due_date: Option<chrono::DateTime<chrono::Utc>>,
}

/// One invoice as reported by the provider's listing endpoint. This is the
/// ground truth reconciliation reads.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderInvoice {
    pub id: String,
    pub reference: String,
    pub status: String,
    pub amount: BigDecimal,
    #[serde(default)]
    pub total_paid: BigDecimal,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub return_url: Option<String>,
}

impl ProviderInvoice {
    /// The provider's own paid flag is not always set for invoices settled in
    /// installments, so the paid total is consulted as well.
    pub fn is_paid(&self) -> bool {
        self.status.eq_ignore_ascii_case("paid") || self.total_paid >= self.amount
    }

    /// An invoice still open upstream can be cancelled there.
    pub fn is_open(&self) -> bool {
        !self.is_paid() && !self.status.eq_ignore_ascii_case("cancelled")
    }
}

/// Inbound webhook body, tagged by event name. Unrecognized events parse into
/// `Unknown` and are acknowledged without effect.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum InboundWebhook {
    /// One incremental payment against an invoice. May fire many times per
    /// invoice as installments arrive; `payment_id` identifies the delivery.
    #[serde(rename = "payment-succeeded")]
    PaymentSucceeded(PartialPaymentEvent),
    /// Authoritative signal that the invoice is fully settled.
    #[serde(rename = "invoice-paid")]
    InvoicePaid(SettlementEvent),
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialPaymentEvent {
    /// The provider's internal invoice id, not the reference string.
    pub invoice_id: String,
    pub payment_id: String,
    /// Minor currency units.
    pub amount: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementEvent {
    /// The issuance reference string, not the provider's internal id.
    pub invoice_reference: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minor_units_convert_with_two_decimals() {
        assert_eq!(minor_to_major(40000).to_string(), "400.00");
        assert_eq!(minor_to_major(5).to_string(), "0.05");
        assert_eq!(minor_to_major(0).to_string(), "0.00");
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            PaymentStatus::Pending,
            PaymentStatus::PartiallyPaid,
            PaymentStatus::Completed,
            PaymentStatus::Failed,
            PaymentStatus::Cancelled,
        ] {
            assert_eq!(PaymentStatus::from_str(status.as_str()).unwrap(), status);
        }
        assert!(PaymentStatus::from_str("refunded").is_err());
    }

    #[test]
    fn partial_payment_webhook_deserializes() {
        let body = serde_json::json!({
            "event": "payment-succeeded",
            "data": {
                "invoiceId": "inv_77",
                "paymentId": "pay_1",
                "amount": 40000
            }
        });

        match serde_json::from_value::<InboundWebhook>(body).unwrap() {
            InboundWebhook::PaymentSucceeded(event) => {
                assert_eq!(event.invoice_id, "inv_77");
                assert_eq!(event.payment_id, "pay_1");
                assert_eq!(event.amount, 40000);
            }
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn settlement_webhook_deserializes() {
        let body = serde_json::json!({
            "event": "invoice-paid",
            "data": { "invoiceReference": "HP-20260801120000-ab12cd" }
        });

        match serde_json::from_value::<InboundWebhook>(body).unwrap() {
            InboundWebhook::InvoicePaid(event) => {
                assert_eq!(event.invoice_reference, "HP-20260801120000-ab12cd");
            }
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn unknown_event_is_recognized_as_ignorable() {
        let body = serde_json::json!({
            "event": "invoice-viewed",
            "data": { "invoiceId": "inv_77" }
        });

        assert!(matches!(
            serde_json::from_value::<InboundWebhook>(body).unwrap(),
            InboundWebhook::Unknown
        ));
    }

    #[test]
    fn invoice_paid_detection_uses_status_or_total() {
        let by_status = ProviderInvoice {
            id: "inv_1".to_string(),
            reference: "ref_1".to_string(),
            status: "PAID".to_string(),
            amount: BigDecimal::from(1000),
            total_paid: BigDecimal::from(0),
            customer_email: None,
            return_url: None,
        };
        assert!(by_status.is_paid());

        let by_total = ProviderInvoice {
            status: "open".to_string(),
            total_paid: BigDecimal::from(1000),
            ..by_status.clone()
        };
        assert!(by_total.is_paid());

        let unpaid = ProviderInvoice {
            status: "open".to_string(),
            total_paid: BigDecimal::from(400),
            ..by_status
        };
        assert!(!unpaid.is_paid());
        assert!(unpaid.is_open());
    }
}
