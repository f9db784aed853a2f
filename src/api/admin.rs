use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;
use std::str::FromStr;
use tracing::info;

use crate::api::AppState;
use crate::database::audit_log_repository::AuditLogRepository;
use crate::database::payment_record_repository::PaymentRecordRepository;
use crate::error::{AppError, ErrorCode};
use crate::middleware::auth::AdminIdentity;
use crate::middleware::error::{
    app_error_response, error_response, get_request_id_from_headers, success_response, ErrorBody,
};
use crate::payments::types::PaymentStatus;
use crate::services::audit::AuditRecorder;
use crate::services::reconciliation::{ReconcileError, ReconciliationService};

#[derive(Debug, Deserialize)]
pub struct SyncRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct CleanupRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct OverrideRequest {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub status: String,
}

fn reconciliation_service(state: &AppState) -> ReconciliationService {
    ReconciliationService::new(
        PaymentRecordRepository::new(state.db_pool.clone()),
        state.provider.clone(),
        AuditRecorder::new(AuditLogRepository::new(state.db_pool.clone())),
    )
}

fn reconcile_error_response(
    err: ReconcileError,
    request_id: Option<String>,
) -> (StatusCode, Json<ErrorBody>) {
    match err {
        ReconcileError::Validation(message) => error_response(
            StatusCode::BAD_REQUEST,
            ErrorCode::ValidationError,
            message,
            request_id,
        ),
        ReconcileError::NotFound { key } => error_response(
            StatusCode::NOT_FOUND,
            ErrorCode::NotFound,
            format!("No payment records found for '{}'", key),
            request_id,
        ),
        ReconcileError::Provider(err) => app_error_response(AppError::from(err), request_id),
        ReconcileError::Database(err) => app_error_response(AppError::from(err), request_id),
    }
}

/// POST /api/admin/payments/sync
///
/// Re-derives one payer's local state from the provider's invoices.
pub async fn sync_payment(
    State(state): State<AppState>,
    identity: AdminIdentity,
    headers: axum::http::HeaderMap,
    Json(payload): Json<SyncRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    identity.require_admin()?;
    let request_id = get_request_id_from_headers(&headers);

    info!(email = %payload.email, actor = %identity.subject, "payment sync requested");

    let report = reconciliation_service(&state)
        .sync_one(&payload.email, &identity.subject)
        .await
        .map_err(|e| reconcile_error_response(e, request_id))?;

    Ok(success_response(report))
}

/// POST /api/admin/payments/cleanup
///
/// Collapses a payer's duplicate records to one, cancelling the rest.
pub async fn cleanup_duplicates(
    State(state): State<AppState>,
    identity: AdminIdentity,
    headers: axum::http::HeaderMap,
    Json(payload): Json<CleanupRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    identity.require_admin()?;
    let request_id = get_request_id_from_headers(&headers);

    info!(email = %payload.email, actor = %identity.subject, "duplicate cleanup requested");

    let report = reconciliation_service(&state)
        .cleanup_duplicates(&payload.email, &identity.subject)
        .await
        .map_err(|e| reconcile_error_response(e, request_id))?;

    Ok(success_response(report))
}

/// POST /api/admin/payments/override
///
/// Force-sets a payment status, bypassing derivation. The escape hatch for
/// cases automated reconciliation cannot resolve.
pub async fn override_status(
    State(state): State<AppState>,
    identity: AdminIdentity,
    headers: axum::http::HeaderMap,
    Json(payload): Json<OverrideRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    identity.require_admin()?;
    let request_id = get_request_id_from_headers(&headers);

    let status = PaymentStatus::from_str(&payload.status).map_err(|_| {
        error_response(
            StatusCode::BAD_REQUEST,
            ErrorCode::ValidationError,
            format!("unsupported payment status: {}", payload.status),
            request_id.clone(),
        )
    })?;

    info!(
        status = %status,
        actor = %identity.subject,
        "manual status override requested"
    );

    let report = reconciliation_service(&state)
        .override_status(
            payload.email.as_deref(),
            payload.phone.as_deref(),
            status,
            &identity.subject,
        )
        .await
        .map_err(|e| reconcile_error_response(e, request_id))?;

    Ok(success_response(report))
}
