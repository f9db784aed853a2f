use crate::database::error::DatabaseError;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Write-only audit trail row. Core logic never reads these back; they exist
/// for forensic replay of reconciliation-relevant mutations.
#[derive(Debug, Clone, FromRow)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub actor: String,
    pub metadata: serde_json::Value,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

pub struct AuditLogRepository {
    pool: PgPool,
}

impl AuditLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(
        &self,
        action: &str,
        resource_type: &str,
        resource_id: Option<&str>,
        actor: &str,
        metadata: serde_json::Value,
    ) -> Result<AuditLogEntry, DatabaseError> {
        sqlx::query_as::<_, AuditLogEntry>(
            "INSERT INTO audit_logs (action, resource_type, resource_id, actor, metadata) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, action, resource_type, resource_id, actor, metadata, created_at",
        )
        .bind(action)
        .bind(resource_type)
        .bind(resource_id)
        .bind(actor)
        .bind(metadata)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}
