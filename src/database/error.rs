use thiserror::Error;

/// Storage-layer error type shared by all repositories.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("{entity} '{id}' not found")]
    NotFound { entity: String, id: String },

    #[error("Unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    #[error("Database connection error: {message}")]
    Connection { message: String },

    #[error("Database query failed: {message}")]
    Query { message: String },
}

impl DatabaseError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DatabaseError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn from_sqlx(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => DatabaseError::NotFound {
                entity: "row".to_string(),
                id: "unknown".to_string(),
            },
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                DatabaseError::UniqueViolation {
                    constraint: db_err.constraint().unwrap_or("unknown").to_string(),
                }
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DatabaseError::Connection {
                    message: err.to_string(),
                }
            }
            _ => DatabaseError::Query {
                message: err.to_string(),
            },
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, DatabaseError::Connection { .. })
    }
}

impl From<DatabaseError> for crate::error::AppError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound { entity, id } => crate::error::AppError::not_found(entity, id),
            other => crate::error::AppError::persistence(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        let err: crate::error::AppError =
            DatabaseError::not_found("PaymentRecord", "abc").into();
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn query_errors_map_to_persistence() {
        let err: crate::error::AppError = DatabaseError::Query {
            message: "syntax error".to_string(),
        }
        .into();
        assert_eq!(err.status_code(), 500);
    }
}
