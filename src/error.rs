//! Unified error handling for the payment reconciliation backend
//!
//! Every fallible path maps into one of five categories with a stable HTTP
//! status and a machine-readable code, so the API envelope stays uniform.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes for programmatic client handling
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCode {
    #[serde(rename = "VALIDATION_ERROR")]
    ValidationError,
    #[serde(rename = "AUTHENTICATION_ERROR")]
    AuthenticationError,
    #[serde(rename = "FORBIDDEN")]
    Forbidden,
    #[serde(rename = "NOT_FOUND")]
    NotFound,
    #[serde(rename = "UPSTREAM_ERROR")]
    UpstreamError,
    #[serde(rename = "UPSTREAM_TIMEOUT")]
    UpstreamTimeout,
    #[serde(rename = "PERSISTENCE_ERROR")]
    PersistenceError,
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError,
}

/// Unified application error type
#[derive(Debug, Clone)]
pub struct AppError {
    pub kind: AppErrorKind,
    pub request_id: Option<String>,
}

#[derive(Debug, Clone)]
pub enum AppErrorKind {
    /// Missing or malformed required input. No mutation happened.
    Validation { field: Option<String>, message: String },
    /// Webhook signature or administrative identity check failed.
    Authentication { message: String },
    /// Authenticated caller lacks the role for the operation.
    Forbidden { subject: String },
    /// No record matches the supplied correlation key.
    NotFound { entity: String, key: String },
    /// The invoicing provider call failed or timed out.
    Upstream {
        message: String,
        is_timeout: bool,
        is_retryable: bool,
    },
    /// The store rejected a read or write.
    Persistence { message: String },
}

impl AppError {
    pub fn new(kind: AppErrorKind) -> Self {
        Self {
            kind,
            request_id: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Validation {
            field: None,
            message: message.into(),
        })
    }

    pub fn validation_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Validation {
            field: Some(field.into()),
            message: message.into(),
        })
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Authentication {
            message: message.into(),
        })
    }

    pub fn not_found(entity: impl Into<String>, key: impl Into<String>) -> Self {
        Self::new(AppErrorKind::NotFound {
            entity: entity.into(),
            key: key.into(),
        })
    }

    pub fn upstream(message: impl Into<String>, is_retryable: bool) -> Self {
        Self::new(AppErrorKind::Upstream {
            message: message.into(),
            is_timeout: false,
            is_retryable,
        })
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Persistence {
            message: message.into(),
        })
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Map error to HTTP status code
    pub fn status_code(&self) -> u16 {
        match &self.kind {
            AppErrorKind::Validation { .. } => 400,
            AppErrorKind::Authentication { .. } => 401,
            AppErrorKind::Forbidden { .. } => 403,
            AppErrorKind::NotFound { .. } => 404,
            AppErrorKind::Upstream { is_timeout, .. } => {
                if *is_timeout {
                    504
                } else {
                    502
                }
            }
            AppErrorKind::Persistence { .. } => 500,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> ErrorCode {
        match &self.kind {
            AppErrorKind::Validation { .. } => ErrorCode::ValidationError,
            AppErrorKind::Authentication { .. } => ErrorCode::AuthenticationError,
            AppErrorKind::Forbidden { .. } => ErrorCode::Forbidden,
            AppErrorKind::NotFound { .. } => ErrorCode::NotFound,
            AppErrorKind::Upstream { is_timeout, .. } => {
                if *is_timeout {
                    ErrorCode::UpstreamTimeout
                } else {
                    ErrorCode::UpstreamError
                }
            }
            AppErrorKind::Persistence { .. } => ErrorCode::PersistenceError,
        }
    }

    /// Human-readable message. Upstream messages pass through so operators see
    /// the provider's own words; secrets never appear in provider messages we
    /// construct.
    pub fn user_message(&self) -> String {
        match &self.kind {
            AppErrorKind::Validation { field, message } => match field {
                Some(field) => format!("Invalid field '{}': {}", field, message),
                None => message.clone(),
            },
            AppErrorKind::Authentication { message } => message.clone(),
            AppErrorKind::Forbidden { .. } => {
                "Caller is not permitted to perform this operation".to_string()
            }
            AppErrorKind::NotFound { entity, key } => {
                format!("{} '{}' not found", entity, key)
            }
            AppErrorKind::Upstream { message, .. } => {
                format!("Invoicing provider error: {}", message)
            }
            AppErrorKind::Persistence { .. } => {
                "Storage operation failed. Please try again later".to_string()
            }
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match &self.kind {
            AppErrorKind::Upstream { is_retryable, .. } => *is_retryable,
            AppErrorKind::Persistence { .. } => true,
            _ => false,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

impl std::error::Error for AppError {}

/// Result type for operations that can fail with AppError
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_mapping() {
        assert_eq!(AppError::validation("missing email").status_code(), 400);
        assert_eq!(
            AppError::authentication("bad signature").status_code(),
            401
        );
        assert_eq!(
            AppError::not_found("PaymentRecord", "inv_1").status_code(),
            404
        );
        assert_eq!(AppError::upstream("boom", true).status_code(), 502);
        assert_eq!(AppError::persistence("down").status_code(), 500);
    }

    #[test]
    fn test_timeout_maps_to_504() {
        let error = AppError::new(AppErrorKind::Upstream {
            message: "timed out".to_string(),
            is_timeout: true,
            is_retryable: true,
        });

        assert_eq!(error.status_code(), 504);
        assert_eq!(error.error_code(), ErrorCode::UpstreamTimeout);
        assert!(error.is_retryable());
    }

    #[test]
    fn test_persistence_message_is_generic() {
        let error = AppError::persistence("connection refused to 10.0.0.3:5432");
        assert!(!error.user_message().contains("10.0.0.3"));
    }

    #[test]
    fn test_validation_error_with_field() {
        let error = AppError::validation_field("email", "must not be empty");
        assert!(error.user_message().contains("email"));
        assert!(!error.is_retryable());
    }
}
