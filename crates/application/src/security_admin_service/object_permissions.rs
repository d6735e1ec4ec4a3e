use chrono::Utc;
use moss_core::{AppError, AppResult, Session};
use moss_domain::{AuditAction, ObjectPermissionId, ObjectPermissionOverride};
use serde_json::json;
use tracing::info;

use crate::{GrantObjectPermissionInput, ObjectPermissionQuery};

use super::SecurityAdminService;

impl SecurityAdminService {
    /// Lists object permission overrides matching the query.
    pub async fn list_object_permissions(
        &self,
        actor: &Session,
        query: &ObjectPermissionQuery,
    ) -> AppResult<Vec<ObjectPermissionOverride>> {
        Self::require_admin(actor)?;
        self.authorization_service
            .stores()
            .object_permissions
            .list_overrides(query)
            .await
    }

    /// Grants one action on one object to a person or group.
    pub async fn grant_object_permission(
        &self,
        actor: &Session,
        input: GrantObjectPermissionInput,
    ) -> AppResult<ObjectPermissionOverride> {
        let actor_id = Self::require_admin(actor)?;

        let scope = self.authorization_service.begin_mutation().await;
        let stores = scope.stores();
        let duplicate = stores
            .object_permissions
            .list_overrides(&ObjectPermissionQuery {
                object_type: Some(input.object_type),
                object_id: Some(input.object_id),
                subject: Some(input.subject),
                permission: Some(input.permission),
                limit: Some(1),
                offset: 0,
            })
            .await?;
        if !duplicate.is_empty() {
            return Err(AppError::Conflict(format!(
                "{} already holds '{}' on {}:{}",
                input.subject, input.permission, input.object_type, input.object_id
            )));
        }

        let granted = stores
            .object_permissions
            .create_override(ObjectPermissionOverride {
                id: ObjectPermissionId::new(),
                object_type: input.object_type,
                object_id: input.object_id,
                permission: input.permission,
                subject: input.subject,
                granted_by: actor_id,
                granted_at: Utc::now(),
            })
            .await?;
        scope.invalidate_subject(granted.subject).await;
        drop(scope);

        info!(
            object_permission_id = %granted.id,
            object_type = granted.object_type.as_str(),
            object_id = %granted.object_id,
            permission = granted.permission.as_str(),
            subject = %granted.subject,
            "object permission granted"
        );
        self.append_audit_event(
            actor_id,
            AuditAction::ObjectPermissionGranted,
            "object_permission",
            granted.id.to_string(),
            Some(json!({
                "object": format!("{}:{}", granted.object_type, granted.object_id),
                "permission": granted.permission.as_str(),
                "subject": granted.subject,
            })),
        )
        .await;

        Ok(granted)
    }

    /// Revokes an override and returns the removed row.
    pub async fn revoke_object_permission(
        &self,
        actor: &Session,
        override_id: ObjectPermissionId,
    ) -> AppResult<ObjectPermissionOverride> {
        let actor_id = Self::require_admin(actor)?;

        let scope = self.authorization_service.begin_mutation().await;
        let removed = scope
            .stores()
            .object_permissions
            .delete_override(override_id)
            .await?;
        scope.invalidate_subject(removed.subject).await;
        drop(scope);

        info!(object_permission_id = %override_id, "object permission revoked");
        self.append_audit_event(
            actor_id,
            AuditAction::ObjectPermissionRevoked,
            "object_permission",
            override_id.to_string(),
            Some(json!({
                "object": format!("{}:{}", removed.object_type, removed.object_id),
                "permission": removed.permission.as_str(),
                "subject": removed.subject,
            })),
        )
        .await;

        Ok(removed)
    }
}
