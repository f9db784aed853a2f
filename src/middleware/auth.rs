//! Administrative caller identity.
//!
//! Back-office requests carry `Authorization: Bearer <token>`; each configured
//! token maps to a subject and a role, so reconciliation mutations are
//! attributable in the audit trail instead of hiding behind one shared key.

use crate::api::AppState;
use crate::error::ErrorCode;
use crate::middleware::error::{error_response, ErrorBody};
use crate::payments::utils::secure_eq;
use axum::{extract::FromRequestParts, http::StatusCode, Json};
use http::request::Parts;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminRole {
    Admin,
    Viewer,
}

impl AdminRole {
    fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "admin" => AdminRole::Admin,
            _ => AdminRole::Viewer,
        }
    }
}

/// Resolved caller identity for administrative endpoints.
#[derive(Debug, Clone)]
pub struct AdminIdentity {
    pub subject: String,
    pub role: AdminRole,
}

impl AdminIdentity {
    pub fn require_admin(&self) -> Result<(), (StatusCode, Json<ErrorBody>)> {
        if self.role != AdminRole::Admin {
            return Err(error_response(
                StatusCode::FORBIDDEN,
                ErrorCode::Forbidden,
                "Caller is not permitted to perform this operation",
                None,
            ));
        }
        Ok(())
    }
}

impl FromRequestParts<AppState> for AdminIdentity {
    type Rejection = (StatusCode, Json<ErrorBody>);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let unauthorized = || {
            error_response(
                StatusCode::UNAUTHORIZED,
                ErrorCode::AuthenticationError,
                "Missing or invalid administrative credentials",
                None,
            )
        };

        let token = parts
            .headers
            .get(http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(unauthorized)?;

        let matched = state
            .config
            .admin
            .tokens
            .iter()
            .find(|entry| secure_eq(entry.token.as_bytes(), token.as_bytes()))
            .ok_or_else(unauthorized)?;

        Ok(AdminIdentity {
            subject: matched.subject.clone(),
            role: AdminRole::parse(&matched.role),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parsing_defaults_to_viewer() {
        assert_eq!(AdminRole::parse("admin"), AdminRole::Admin);
        assert_eq!(AdminRole::parse("ADMIN"), AdminRole::Admin);
        assert_eq!(AdminRole::parse("viewer"), AdminRole::Viewer);
        assert_eq!(AdminRole::parse("anything-else"), AdminRole::Viewer);
    }

    #[test]
    fn viewer_cannot_mutate() {
        let identity = AdminIdentity {
            subject: "warden@hostel".to_string(),
            role: AdminRole::Viewer,
        };
        assert!(identity.require_admin().is_err());

        let identity = AdminIdentity {
            subject: "bursar@hostel".to_string(),
            role: AdminRole::Admin,
        };
        assert!(identity.require_admin().is_ok());
    }
}
