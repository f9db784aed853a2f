use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use tracing::info;

use crate::api::AppState;
use crate::database::audit_log_repository::AuditLogRepository;
use crate::database::payment_record_repository::PaymentRecordRepository;
use crate::error::ErrorCode;
use crate::middleware::error::{error_response, success_response};
use crate::services::audit::AuditRecorder;
use crate::services::webhook_processor::{WebhookError, WebhookOutcome, WebhookProcessor};

pub const SIGNATURE_HEADER: &str = "request-signature";
pub const TIMESTAMP_HEADER: &str = "request-timestamp";

/// POST /webhooks/payments
///
/// Receives provider push notifications. The raw body is kept as delivered so
/// the signature check covers exactly what the provider signed.
pub async fn handle_payment_webhook(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
    body: String,
) -> impl IntoResponse {
    info!("payment webhook received");

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    let timestamp = headers
        .get(TIMESTAMP_HEADER)
        .and_then(|v| v.to_str().ok());

    let processor = WebhookProcessor::new(
        PaymentRecordRepository::new(state.db_pool.clone()),
        AuditRecorder::new(AuditLogRepository::new(state.db_pool.clone())),
        state.config.invoicing.webhook_signing_secret(),
    );

    match processor.process(signature, timestamp, &body).await {
        Ok(WebhookOutcome::Applied(change)) => success_response(change).into_response(),
        Ok(WebhookOutcome::Ignored) => {
            success_response(serde_json::json!({"event": "ignored"})).into_response()
        }
        Err(err) => webhook_error_response(err).into_response(),
    }
}

fn webhook_error_response(err: WebhookError) -> (StatusCode, Json<crate::middleware::error::ErrorBody>) {
    match &err {
        WebhookError::MissingHeaders | WebhookError::Malformed(_) => error_response(
            StatusCode::BAD_REQUEST,
            ErrorCode::ValidationError,
            err.to_string(),
            None,
        ),
        WebhookError::InvalidSignature => error_response(
            StatusCode::UNAUTHORIZED,
            ErrorCode::AuthenticationError,
            err.to_string(),
            None,
        ),
        WebhookError::RecordNotFound { .. } => error_response(
            StatusCode::NOT_FOUND,
            ErrorCode::NotFound,
            err.to_string(),
            None,
        ),
        WebhookError::Database(_) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::PersistenceError,
            "Storage operation failed. Please try again later",
            None,
        ),
    }
}
