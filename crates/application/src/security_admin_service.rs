use std::sync::Arc;

use moss_core::{AppResult, Session, UserRole};
use moss_domain::{AuditAction, UserId};
use tracing::warn;

use crate::access_guard::authorize_session;
use crate::{AuditEvent, AuditRepository, AuthorizationService};

mod assignments;
mod group_members;
mod object_permissions;
mod role_permissions;
mod roles;
mod seed;

pub use seed::{SYSTEM_ROLE_ADMIN, SYSTEM_ROLE_EDITOR, SYSTEM_ROLE_VIEWER, SystemRoleSeedSummary};

/// Application service for role, assignment and override administration.
///
/// Every mutation runs inside an authorization mutation scope so the store
/// write and the cache invalidation form one unit, then notifies the audit
/// sink.
#[derive(Clone)]
pub struct SecurityAdminService {
    authorization_service: AuthorizationService,
    audit_repository: Arc<dyn AuditRepository>,
}

impl SecurityAdminService {
    /// Creates a new service from required dependencies.
    #[must_use]
    pub fn new(
        authorization_service: AuthorizationService,
        audit_repository: Arc<dyn AuditRepository>,
    ) -> Self {
        Self {
            authorization_service,
            audit_repository,
        }
    }

    /// Returns the authorization service this service invalidates.
    #[must_use]
    pub fn authorization_service(&self) -> &AuthorizationService {
        &self.authorization_service
    }

    fn require_admin(actor: &Session) -> AppResult<UserId> {
        authorize_session(actor, UserRole::Admin)?;
        Ok(UserId::from_uuid(actor.user_id()))
    }

    async fn append_audit_event(
        &self,
        actor: UserId,
        action: AuditAction,
        resource_type: &str,
        resource_id: String,
        detail: Option<serde_json::Value>,
    ) {
        let event = AuditEvent {
            actor,
            action,
            resource_type: resource_type.to_owned(),
            resource_id,
            detail,
        };

        if let Err(error) = self.audit_repository.append_event(event).await {
            warn!(action = action.as_str(), %error, "failed to record audit event");
        }
    }
}

fn normalize_notes(notes: Option<String>) -> Option<String> {
    notes
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests;
