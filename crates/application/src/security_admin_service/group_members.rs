use moss_core::{AppResult, Session};
use moss_domain::{AuditAction, GroupId, GroupMembership, PersonId};
use serde_json::json;
use tracing::info;

use super::SecurityAdminService;

impl SecurityAdminService {
    /// Lists current members of a group.
    pub async fn list_group_members(
        &self,
        actor: &Session,
        group_id: GroupId,
    ) -> AppResult<Vec<PersonId>> {
        Self::require_admin(actor)?;
        self.authorization_service
            .stores()
            .groups
            .list_group_members(group_id)
            .await
    }

    /// Adds a person to a group. Returns `false` when already a member.
    pub async fn add_group_member(
        &self,
        actor: &Session,
        group_id: GroupId,
        person_id: PersonId,
    ) -> AppResult<bool> {
        let actor_id = Self::require_admin(actor)?;

        let scope = self.authorization_service.begin_mutation().await;
        let added = scope
            .stores()
            .groups
            .add_group_member(GroupMembership {
                group_id,
                person_id,
            })
            .await?;
        if !added {
            return Ok(false);
        }
        scope.invalidate_person(person_id);
        drop(scope);

        info!(%group_id, %person_id, "group member added");
        self.append_audit_event(
            actor_id,
            AuditAction::GroupMemberAdded,
            "group",
            group_id.to_string(),
            Some(json!({ "person_id": person_id })),
        )
        .await;

        Ok(true)
    }

    /// Removes a person from a group. Returns `false` when not a member.
    pub async fn remove_group_member(
        &self,
        actor: &Session,
        group_id: GroupId,
        person_id: PersonId,
    ) -> AppResult<bool> {
        let actor_id = Self::require_admin(actor)?;

        let scope = self.authorization_service.begin_mutation().await;
        let removed = scope
            .stores()
            .groups
            .remove_group_member(GroupMembership {
                group_id,
                person_id,
            })
            .await?;
        if !removed {
            return Ok(false);
        }
        scope.invalidate_person(person_id);
        drop(scope);

        info!(%group_id, %person_id, "group member removed");
        self.append_audit_event(
            actor_id,
            AuditAction::GroupMemberRemoved,
            "group",
            group_id.to_string(),
            Some(json!({ "person_id": person_id })),
        )
        .await;

        Ok(true)
    }
}
