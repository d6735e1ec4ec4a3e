use moss_core::{AppError, AppResult, Session};
use moss_domain::{AuditAction, PermissionGrant, RoleId, RolePermission};
use serde_json::json;
use tracing::info;

use crate::EffectivePermission;
use crate::authorization_service::MutationScope;

use super::SecurityAdminService;

impl SecurityAdminService {
    /// Lists grants reachable from the role, inherited ones included.
    pub async fn list_role_permissions(
        &self,
        actor: &Session,
        role_id: RoleId,
    ) -> AppResult<Vec<EffectivePermission>> {
        Self::require_admin(actor)?;
        self.authorization_service
            .effective_role_permissions(role_id)
            .await
    }

    /// Adds a grant to a custom role. Returns `false` when the role already
    /// held it.
    pub async fn grant_role_permission(
        &self,
        actor: &Session,
        role_id: RoleId,
        grant: PermissionGrant,
    ) -> AppResult<bool> {
        let actor_id = Self::require_admin(actor)?;

        let scope = self.authorization_service.begin_mutation().await;
        ensure_mutable_role(&scope, role_id).await?;
        let added = scope
            .stores()
            .role_permissions
            .add_permission(RolePermission { role_id, grant })
            .await?;
        if !added {
            return Ok(false);
        }
        scope.invalidate_role(role_id).await;
        drop(scope);

        info!(%role_id, %grant, "role permission granted");
        self.append_audit_event(
            actor_id,
            AuditAction::RolePermissionGranted,
            "role_permission",
            role_id.to_string(),
            Some(json!({ "permission": grant.to_string() })),
        )
        .await;

        Ok(true)
    }

    /// Removes a grant from a custom role. Returns `false` when the role did
    /// not hold it.
    pub async fn revoke_role_permission(
        &self,
        actor: &Session,
        role_id: RoleId,
        grant: PermissionGrant,
    ) -> AppResult<bool> {
        let actor_id = Self::require_admin(actor)?;

        let scope = self.authorization_service.begin_mutation().await;
        ensure_mutable_role(&scope, role_id).await?;
        let removed = scope
            .stores()
            .role_permissions
            .remove_permission(RolePermission { role_id, grant })
            .await?;
        if !removed {
            return Ok(false);
        }
        scope.invalidate_role(role_id).await;
        drop(scope);

        info!(%role_id, %grant, "role permission revoked");
        self.append_audit_event(
            actor_id,
            AuditAction::RolePermissionRevoked,
            "role_permission",
            role_id.to_string(),
            Some(json!({ "permission": grant.to_string() })),
        )
        .await;

        Ok(true)
    }
}

async fn ensure_mutable_role(scope: &MutationScope<'_>, role_id: RoleId) -> AppResult<()> {
    scope
        .stores()
        .roles
        .find_role(role_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' does not exist")))?
        .ensure_mutable()
}
