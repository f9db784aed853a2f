use crate::config::InvoicingConfig;
use crate::payments::error::{ProviderError, ProviderResult};
use crate::payments::types::{CreateInvoiceRequest, CreatedInvoice, ProviderInvoice};
use crate::payments::utils::ProviderHttpClient;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::info;

/// Seam to the external invoicing provider. Issuance creates invoices through
/// it; reconciliation reads it as ground truth and cancels duplicates.
#[async_trait]
pub trait InvoiceProvider: Send + Sync {
    async fn create_invoice(&self, request: CreateInvoiceRequest) -> ProviderResult<CreatedInvoice>;

    async fn list_invoices(&self) -> ProviderResult<Vec<ProviderInvoice>>;

    async fn cancel_invoice(&self, invoice_id: &str) -> ProviderResult<()>;
}

/// HTTP implementation against the provider's REST API.
pub struct InvoiceApiClient {
    config: InvoicingConfig,
    http: ProviderHttpClient,
}

impl InvoiceApiClient {
    pub fn new(config: InvoicingConfig) -> ProviderResult<Self> {
        let http =
            ProviderHttpClient::new(Duration::from_secs(config.timeout_secs), config.max_retries)?;
        Ok(Self { config, http })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl InvoiceProvider for InvoiceApiClient {
    async fn create_invoice(&self, request: CreateInvoiceRequest) -> ProviderResult<CreatedInvoice> {
        if request.customer_email.trim().is_empty() {
            return Err(ProviderError::Validation {
                message: "customer email is required for invoice creation".to_string(),
                field: Some("customerEmail".to_string()),
            });
        }

        let payload = serde_json::to_value(&request).map_err(|e| ProviderError::Validation {
            message: format!("invoice request not serializable: {}", e),
            field: None,
        })?;

        let raw: ProviderEnvelope<CreatedInvoice> = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint("/invoices"),
                Some(&self.config.secret_key),
                Some(&payload),
            )
            .await?;

        let data = raw.into_data()?;
        info!(reference = %data.reference, invoice_id = %data.id, "invoice created upstream");
        Ok(data)
    }

    async fn list_invoices(&self) -> ProviderResult<Vec<ProviderInvoice>> {
        let raw: ProviderEnvelope<Vec<ProviderInvoice>> = self
            .http
            .request_json(
                reqwest::Method::GET,
                &self.endpoint("/invoices"),
                Some(&self.config.secret_key),
                None,
            )
            .await?;

        raw.into_data()
    }

    async fn cancel_invoice(&self, invoice_id: &str) -> ProviderResult<()> {
        let raw: ProviderEnvelope<Option<serde_json::Value>> = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint(&format!("/invoices/{}/cancel", invoice_id)),
                Some(&self.config.secret_key),
                None,
            )
            .await?;

        raw.into_data()?;
        info!(invoice_id = %invoice_id, "invoice cancelled upstream");
        Ok(())
    }
}

/// The provider wraps every response in `{status, message, data}`.
#[derive(Debug, Deserialize)]
struct ProviderEnvelope<T> {
    status: bool,
    message: String,
    data: T,
}

impl<T> ProviderEnvelope<T> {
    fn into_data(self) -> ProviderResult<T> {
        if !self.status {
            return Err(ProviderError::Api {
                message: self.message,
                status_code: None,
                retryable: false,
            });
        }
        Ok(self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> InvoiceApiClient {
        InvoiceApiClient::new(InvoicingConfig {
            base_url: "https://invoices.example.com/".to_string(),
            secret_key: "sk_test".to_string(),
            webhook_secret: Some("whsec_test".to_string()),
            timeout_secs: 5,
            max_retries: 1,
            callback_url: "https://hostel.example.com/webhooks/payments".to_string(),
            return_url: "https://hostel.example.com/payments/complete".to_string(),
        })
        .expect("client init should succeed")
    }

    #[test]
    fn endpoint_joins_without_double_slash() {
        let client = client();
        assert_eq!(
            client.endpoint("/invoices"),
            "https://invoices.example.com/invoices"
        );
    }

    #[test]
    fn envelope_with_status_false_becomes_api_error() {
        let envelope = ProviderEnvelope {
            status: false,
            message: "invoice limit reached".to_string(),
            data: serde_json::json!(null),
        };
        let err = envelope.into_data().unwrap_err();
        assert!(matches!(err, ProviderError::Api { .. }));
        assert!(err.to_string().contains("invoice limit reached"));
    }

    #[test]
    fn invoice_listing_deserializes_camel_case() {
        let body = serde_json::json!({
            "status": true,
            "message": "ok",
            "data": [{
                "id": "inv_9",
                "reference": "HP-20260801120000-ab12cd",
                "status": "open",
                "amount": "1000.00",
                "totalPaid": "400.00",
                "customerEmail": "resident@example.com",
                "returnUrl": "https://hostel.example.com/payments/complete?email=resident@example.com"
            }]
        });

        let envelope: ProviderEnvelope<Vec<ProviderInvoice>> =
            serde_json::from_value(body).expect("listing should parse");
        let invoices = envelope.into_data().unwrap();
        assert_eq!(invoices.len(), 1);
        assert_eq!(invoices[0].id, "inv_9");
        assert!(!invoices[0].is_paid());
    }
}
