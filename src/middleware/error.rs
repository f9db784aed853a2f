//! Uniform JSON envelope for every endpoint: `{"success": bool, "data" | "error"}`.

use crate::error::{AppError, ErrorCode};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Error half of the envelope.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    pub code: ErrorCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Success half of the envelope.
pub fn success_response<T: Serialize>(data: T) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "success": true,
        "data": data,
    }))
}

pub fn error_response(
    status: StatusCode,
    code: ErrorCode,
    message: impl Into<String>,
    request_id: Option<String>,
) -> (StatusCode, Json<ErrorBody>) {
    (
        status,
        Json(ErrorBody {
            success: false,
            error: message.into(),
            code,
            request_id,
        }),
    )
}

/// Maps an `AppError` into the envelope with its canonical status code.
pub fn app_error_response(
    err: AppError,
    request_id: Option<String>,
) -> (StatusCode, Json<ErrorBody>) {
    let err = match request_id {
        Some(req_id) => err.with_request_id(req_id),
        None => err,
    };
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    if status.is_server_error() {
        tracing::error!(error = ?err, status = %status.as_u16(), "server error");
    } else {
        tracing::warn!(error = ?err, status = %status.as_u16(), "client error");
    }

    error_response(status, err.error_code(), err.user_message(), err.request_id.clone())
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let request_id = self.request_id.clone();
        app_error_response(self, request_id).into_response()
    }
}

/// Helper to extract request ID from request headers
pub fn get_request_id_from_headers(headers: &axum::http::HeaderMap) -> Option<String> {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_body_serializes_with_success_false() {
        let (_, Json(body)) = error_response(
            StatusCode::BAD_REQUEST,
            ErrorCode::ValidationError,
            "email is required",
            Some("req_1".to_string()),
        );
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "email is required");
        assert_eq!(json["code"], "VALIDATION_ERROR");
        assert_eq!(json["request_id"], "req_1");
    }

    #[test]
    fn app_error_maps_to_its_status() {
        let (status, Json(body)) =
            app_error_response(AppError::not_found("PaymentRecord", "inv_1"), None);
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.code, ErrorCode::NotFound);
    }

    #[test]
    fn success_envelope_wraps_data() {
        let Json(value) = success_response(serde_json::json!({"amount": "1000.00"}));
        assert_eq!(value["success"], true);
        assert_eq!(value["data"]["amount"], "1000.00");
    }
}
