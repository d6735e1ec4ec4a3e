use moss_core::{AppError, AppResult, Session};
use moss_domain::{AuditAction, Role, RoleId};
use serde_json::json;
use tracing::info;

use crate::{CreateRoleInput, DeletedRole, RoleQuery, UpdateRoleInput};

use super::SecurityAdminService;

impl SecurityAdminService {
    /// Lists roles matching the query.
    pub async fn list_roles(&self, actor: &Session, query: &RoleQuery) -> AppResult<Vec<Role>> {
        Self::require_admin(actor)?;
        self.authorization_service
            .stores()
            .roles
            .list_roles(query)
            .await
    }

    /// Returns one role.
    pub async fn get_role(&self, actor: &Session, role_id: RoleId) -> AppResult<Role> {
        Self::require_admin(actor)?;
        self.authorization_service
            .stores()
            .roles
            .find_role(role_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' does not exist")))
    }

    /// Creates a custom role with its initial grants.
    pub async fn create_role(&self, actor: &Session, input: CreateRoleInput) -> AppResult<Role> {
        let actor_id = Self::require_admin(actor)?;
        let role = Role::new(
            RoleId::new(),
            input.name,
            input.description,
            input.parent_role_id,
            false,
        )?;

        let scope = self.authorization_service.begin_mutation().await;
        let stores = scope.stores();
        if let Some(parent_role_id) = role.parent_role_id()
            && stores.roles.find_role(parent_role_id).await?.is_none()
        {
            return Err(AppError::NotFound(format!(
                "parent role '{parent_role_id}' does not exist"
            )));
        }
        if stores
            .roles
            .find_role_by_name(role.name().as_str())
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(format!(
                "role '{}' already exists",
                role.name().as_str()
            )));
        }

        let role = stores
            .roles
            .create_role(role, input.permissions.as_slice())
            .await?;
        drop(scope);

        info!(role_id = %role.id(), name = role.name().as_str(), "role created");
        self.append_audit_event(
            actor_id,
            AuditAction::RoleCreated,
            "role",
            role.id().to_string(),
            Some(json!({
                "name": role.name().as_str(),
                "parent_role_id": role.parent_role_id(),
                "permissions": input
                    .permissions
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>(),
            })),
        )
        .await;

        Ok(role)
    }

    /// Updates name, description or parent of a custom role.
    ///
    /// The cycle guard runs before the write; a rejected parent leaves the
    /// role untouched.
    pub async fn update_role(
        &self,
        actor: &Session,
        role_id: RoleId,
        input: UpdateRoleInput,
    ) -> AppResult<Role> {
        let actor_id = Self::require_admin(actor)?;

        let scope = self.authorization_service.begin_mutation().await;
        let stores = scope.stores();
        let existing = stores
            .roles
            .find_role(role_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' does not exist")))?;
        existing.ensure_mutable()?;
        if input.is_empty() {
            return Ok(existing);
        }

        let parent_role_id = input
            .parent_role_id
            .unwrap_or_else(|| existing.parent_role_id());
        let parent_changed = parent_role_id != existing.parent_role_id();
        if parent_changed {
            if let Some(parent_role_id) = parent_role_id
                && stores.roles.find_role(parent_role_id).await?.is_none()
            {
                return Err(AppError::NotFound(format!(
                    "parent role '{parent_role_id}' does not exist"
                )));
            }
            scope
                .load_hierarchy()
                .await?
                .ensure_acyclic(role_id, parent_role_id)?;
        }

        let name = input
            .name
            .unwrap_or_else(|| existing.name().as_str().to_owned());
        let description = input
            .description
            .unwrap_or_else(|| existing.description().map(str::to_owned));
        let updated = Role::new(role_id, name, description, parent_role_id, false)?;
        if updated.name() != existing.name()
            && let Some(other) = stores
                .roles
                .find_role_by_name(updated.name().as_str())
                .await?
            && other.id() != role_id
        {
            return Err(AppError::Conflict(format!(
                "role '{}' already exists",
                updated.name().as_str()
            )));
        }

        let updated = stores.roles.update_role(updated).await?;
        scope.invalidate_role(role_id).await;
        drop(scope);

        info!(%role_id, parent_changed, "role updated");
        self.append_audit_event(
            actor_id,
            AuditAction::RoleUpdated,
            "role",
            role_id.to_string(),
            Some(json!({
                "name": updated.name().as_str(),
                "description": updated.description(),
                "parent_role_id": updated.parent_role_id(),
                "previous_parent_role_id": existing.parent_role_id(),
            })),
        )
        .await;

        Ok(updated)
    }

    /// Deletes a custom role together with its grants and assignments.
    ///
    /// Child roles become roots.
    pub async fn delete_role(&self, actor: &Session, role_id: RoleId) -> AppResult<DeletedRole> {
        let actor_id = Self::require_admin(actor)?;

        let scope = self.authorization_service.begin_mutation().await;
        let existing = scope
            .stores()
            .roles
            .find_role(role_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' does not exist")))?;
        existing.ensure_mutable()?;

        let affected = scope.persons_holding_role(role_id).await;
        let removed_assignments = scope.stores().roles.delete_role(role_id).await?;
        scope.invalidate_collected(affected, &format!("role:{role_id}"));
        drop(scope);

        info!(%role_id, removed_assignments, "role deleted");
        self.append_audit_event(
            actor_id,
            AuditAction::RoleDeleted,
            "role",
            role_id.to_string(),
            Some(json!({
                "name": existing.name().as_str(),
                "removed_assignments": removed_assignments,
            })),
        )
        .await;

        Ok(DeletedRole {
            role_id,
            removed_assignments,
        })
    }
}
