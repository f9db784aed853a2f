use crate::database::audit_log_repository::AuditLogRepository;
use tracing::warn;

/// Best-effort audit recording. The trail matters for forensics but is not a
/// transaction participant: a failed insert is logged and swallowed so it can
/// never fail the mutation it describes.
pub struct AuditRecorder {
    repo: AuditLogRepository,
}

impl AuditRecorder {
    pub fn new(repo: AuditLogRepository) -> Self {
        Self { repo }
    }

    pub async fn record(
        &self,
        action: &str,
        resource_type: &str,
        resource_id: Option<&str>,
        actor: &str,
        metadata: serde_json::Value,
    ) {
        if let Err(e) = self
            .repo
            .insert(action, resource_type, resource_id, actor, metadata)
            .await
        {
            warn!(action = %action, error = %e, "audit log write failed");
        }
    }
}
