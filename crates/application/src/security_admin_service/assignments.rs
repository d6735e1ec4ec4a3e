use chrono::Utc;
use moss_core::{AppError, AppResult, Session};
use moss_domain::{AssignmentId, AuditAction, RoleAssignment};
use serde_json::json;
use tracing::info;

use crate::{CreateRoleAssignmentInput, RoleAssignmentQuery, UpdateRoleAssignmentInput};

use super::{SecurityAdminService, normalize_notes};

impl SecurityAdminService {
    /// Lists assignments matching the query.
    pub async fn list_role_assignments(
        &self,
        actor: &Session,
        query: &RoleAssignmentQuery,
    ) -> AppResult<Vec<RoleAssignment>> {
        Self::require_admin(actor)?;
        self.authorization_service
            .stores()
            .assignments
            .list_assignments(query)
            .await
    }

    /// Assigns a role to a person or group.
    pub async fn assign_role(
        &self,
        actor: &Session,
        input: CreateRoleAssignmentInput,
    ) -> AppResult<RoleAssignment> {
        let actor_id = Self::require_admin(actor)?;

        let scope = self.authorization_service.begin_mutation().await;
        let stores = scope.stores();
        let role = stores
            .roles
            .find_role(input.role_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("role '{}' does not exist", input.role_id))
            })?;
        let duplicate = stores
            .assignments
            .list_assignments(&RoleAssignmentQuery {
                subject: Some(input.subject),
                role_id: Some(input.role_id),
                limit: Some(1),
                ..RoleAssignmentQuery::default()
            })
            .await?;
        if !duplicate.is_empty() {
            return Err(AppError::Conflict(format!(
                "{} already holds role '{}'",
                input.subject,
                role.name().as_str()
            )));
        }

        let assignment = stores
            .assignments
            .create_assignment(RoleAssignment {
                id: AssignmentId::new(),
                role_id: input.role_id,
                subject: input.subject,
                scope: input.scope,
                granted_by: actor_id,
                granted_at: Utc::now(),
                notes: normalize_notes(input.notes),
            })
            .await?;
        scope.invalidate_subject(assignment.subject).await;
        drop(scope);

        info!(
            assignment_id = %assignment.id,
            role_id = %assignment.role_id,
            subject = %assignment.subject,
            scope = assignment.scope.kind().as_str(),
            "role assigned"
        );
        self.append_audit_event(
            actor_id,
            AuditAction::RoleAssignmentCreated,
            "role_assignment",
            assignment.id.to_string(),
            Some(json!({
                "role": role.name().as_str(),
                "subject": assignment.subject,
                "scope": assignment.scope,
            })),
        )
        .await;

        Ok(assignment)
    }

    /// Replaces scope or notes of an assignment.
    pub async fn update_role_assignment(
        &self,
        actor: &Session,
        assignment_id: AssignmentId,
        input: UpdateRoleAssignmentInput,
    ) -> AppResult<RoleAssignment> {
        let actor_id = Self::require_admin(actor)?;

        let scope = self.authorization_service.begin_mutation().await;
        let existing = scope
            .stores()
            .assignments
            .find_assignment(assignment_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("assignment '{assignment_id}' does not exist"))
            })?;

        let role_scope = input.scope.unwrap_or_else(|| existing.scope.clone());
        let notes = input
            .notes
            .map(normalize_notes)
            .unwrap_or_else(|| existing.notes.clone());
        let updated = scope
            .stores()
            .assignments
            .update_assignment(assignment_id, role_scope, notes)
            .await?;
        scope.invalidate_subject(updated.subject).await;
        drop(scope);

        info!(%assignment_id, scope = updated.scope.kind().as_str(), "role assignment updated");
        self.append_audit_event(
            actor_id,
            AuditAction::RoleAssignmentUpdated,
            "role_assignment",
            assignment_id.to_string(),
            Some(json!({
                "previous_scope": existing.scope,
                "scope": updated.scope,
            })),
        )
        .await;

        Ok(updated)
    }

    /// Revokes an assignment and returns the removed row.
    pub async fn revoke_role_assignment(
        &self,
        actor: &Session,
        assignment_id: AssignmentId,
    ) -> AppResult<RoleAssignment> {
        let actor_id = Self::require_admin(actor)?;

        let scope = self.authorization_service.begin_mutation().await;
        let removed = scope
            .stores()
            .assignments
            .delete_assignment(assignment_id)
            .await?;
        scope.invalidate_subject(removed.subject).await;
        drop(scope);

        info!(%assignment_id, subject = %removed.subject, "role assignment revoked");
        self.append_audit_event(
            actor_id,
            AuditAction::RoleAssignmentRevoked,
            "role_assignment",
            assignment_id.to_string(),
            Some(json!({
                "role_id": removed.role_id,
                "subject": removed.subject,
            })),
        )
        .await;

        Ok(removed)
    }
}
