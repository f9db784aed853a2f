use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use tracing::info;

use crate::api::AppState;
use crate::database::audit_log_repository::AuditLogRepository;
use crate::database::payment_record_repository::PaymentRecordRepository;
use crate::error::{AppError, ErrorCode};
use crate::middleware::error::{
    app_error_response, error_response, get_request_id_from_headers, success_response, ErrorBody,
};
use crate::payments::types::PayerDetails;
use crate::services::audit::AuditRecorder;
use crate::services::issuance::{IssuanceError, IssuanceService};

/// POST /api/payments/initiate
///
/// Creates an external invoice for the configured amount owed and the local
/// record mirroring it.
pub async fn initiate_payment(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
    Json(payload): Json<PayerDetails>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    let request_id = get_request_id_from_headers(&headers);

    info!(email = %payload.email, "payment initiation requested");

    let service = IssuanceService::new(
        PaymentRecordRepository::new(state.db_pool.clone()),
        state.provider.clone(),
        AuditRecorder::new(AuditLogRepository::new(state.db_pool.clone())),
        state.config.payment.clone(),
        state.config.invoicing.clone(),
    );

    let issued = service.issue(payload).await.map_err(|e| match e {
        IssuanceError::Validation { field, message } => error_response(
            StatusCode::BAD_REQUEST,
            ErrorCode::ValidationError,
            format!("Invalid field '{}': {}", field, message),
            request_id.clone(),
        ),
        IssuanceError::Provider(err) => {
            app_error_response(AppError::from(err), request_id.clone())
        }
        IssuanceError::Database(err) => {
            app_error_response(AppError::from(err), request_id.clone())
        }
    })?;

    Ok(success_response(issued))
}
