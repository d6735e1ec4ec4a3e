use async_trait::async_trait;
use moss_core::AppResult;
use moss_domain::{AuditAction, UserId};

/// Audit event emitted by authorization mutations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    /// Account that performed the mutation.
    pub actor: UserId,
    /// Stable action identifier.
    pub action: AuditAction,
    /// Event resource type.
    pub resource_type: String,
    /// Event resource identifier.
    pub resource_id: String,
    /// Optional structured detail.
    pub detail: Option<serde_json::Value>,
}

/// Port for the external audit sink.
#[async_trait]
pub trait AuditRepository: Send + Sync {
    /// Appends one event.
    async fn append_event(&self, event: AuditEvent) -> AppResult<()>;
}
