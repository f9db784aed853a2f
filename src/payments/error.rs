use thiserror::Error;

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors from the invoicing provider integration.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Provider request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Rate limit exceeded: {message}")]
    RateLimit {
        message: String,
        retry_after_seconds: Option<u64>,
    },

    #[error("Provider error: {message}")]
    Api {
        message: String,
        status_code: Option<u16>,
        retryable: bool,
    },

    #[error("Invalid provider response: {message}")]
    InvalidResponse { message: String },
}

impl ProviderError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Validation { .. } => false,
            ProviderError::Network { .. } => true,
            ProviderError::Timeout { .. } => true,
            ProviderError::RateLimit { .. } => true,
            ProviderError::Api { retryable, .. } => *retryable,
            ProviderError::InvalidResponse { .. } => false,
        }
    }
}

impl From<ProviderError> for crate::error::AppError {
    fn from(err: ProviderError) -> Self {
        use crate::error::{AppError, AppErrorKind};

        match err {
            ProviderError::Validation { message, field } => AppError::new(AppErrorKind::Validation {
                field,
                message,
            }),
            ProviderError::Timeout { seconds } => AppError::new(AppErrorKind::Upstream {
                message: format!("request timed out after {}s", seconds),
                is_timeout: true,
                is_retryable: true,
            }),
            other => {
                let retryable = other.is_retryable();
                AppError::new(AppErrorKind::Upstream {
                    message: other.to_string(),
                    is_timeout: false,
                    is_retryable: retryable,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_flags_are_set() {
        assert!(ProviderError::Network {
            message: "connection reset".to_string()
        }
        .is_retryable());
        assert!(!ProviderError::InvalidResponse {
            message: "truncated body".to_string()
        }
        .is_retryable());
    }

    #[test]
    fn timeout_converts_to_gateway_timeout() {
        let err: crate::error::AppError = ProviderError::Timeout { seconds: 15 }.into();
        assert_eq!(err.status_code(), 504);
    }

    #[test]
    fn api_error_converts_to_bad_gateway() {
        let err: crate::error::AppError = ProviderError::Api {
            message: "invoice rejected".to_string(),
            status_code: Some(422),
            retryable: false,
        }
        .into();
        assert_eq!(err.status_code(), 502);
    }
}
