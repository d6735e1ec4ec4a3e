use std::sync::Arc;

use async_trait::async_trait;

use moss_core::AppResult;
use moss_domain::{
    AssignmentId, GroupId, GroupMembership, ObjectPermissionId, ObjectPermissionOverride,
    PermissionGrant, PersonId, Role, RoleAssignment, RoleId, RolePermission, RoleScope, Subject,
};

use super::assignments::RoleAssignmentQuery;
use super::object_permissions::ObjectPermissionQuery;
use super::roles::RoleQuery;

/// Repository port for the role store.
#[async_trait]
pub trait RoleRepository: Send + Sync {
    /// Lists roles ordered by name.
    async fn list_roles(&self, query: &RoleQuery) -> AppResult<Vec<Role>>;

    /// Finds a role by id.
    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<Role>>;

    /// Finds a role by its unique name.
    async fn find_role_by_name(&self, name: &str) -> AppResult<Option<Role>>;

    /// Persists a new role together with its initial grants as one write.
    /// Fails with `Conflict` when the name is taken; on any failure neither
    /// the role nor any of its grants is stored.
    async fn create_role(&self, role: Role, permissions: &[PermissionGrant]) -> AppResult<Role>;

    /// Replaces name, description and parent of an existing role.
    ///
    /// Implementations re-validate the hierarchy inside their write
    /// transaction and fail with `InvalidHierarchy` on a cycle.
    async fn update_role(&self, role: Role) -> AppResult<Role>;

    /// Deletes a role together with its grants and assignments, returning the
    /// number of removed assignments. Child roles become roots.
    async fn delete_role(&self, role_id: RoleId) -> AppResult<u64>;
}

/// Repository port for the role permission catalog.
#[async_trait]
pub trait RolePermissionRepository: Send + Sync {
    /// Lists grant tuples attached directly to any of the roles.
    async fn list_permissions_for_roles(&self, role_ids: &[RoleId])
    -> AppResult<Vec<RolePermission>>;

    /// Adds a grant tuple. Returns `false` when it already existed.
    async fn add_permission(&self, permission: RolePermission) -> AppResult<bool>;

    /// Removes a grant tuple. Returns `false` when it did not exist.
    async fn remove_permission(&self, permission: RolePermission) -> AppResult<bool>;
}

/// Repository port for role assignments.
#[async_trait]
pub trait RoleAssignmentRepository: Send + Sync {
    /// Lists assignments matching the query.
    async fn list_assignments(&self, query: &RoleAssignmentQuery)
    -> AppResult<Vec<RoleAssignment>>;

    /// Lists assignments bound to any of the subjects.
    ///
    /// Rows with unreadable scope data are skipped.
    async fn list_assignments_for_subjects(
        &self,
        subjects: &[Subject],
    ) -> AppResult<Vec<RoleAssignment>>;

    /// Lists assignments of any of the roles.
    async fn list_assignments_for_roles(
        &self,
        role_ids: &[RoleId],
    ) -> AppResult<Vec<RoleAssignment>>;

    /// Finds an assignment by id.
    async fn find_assignment(&self, assignment_id: AssignmentId)
    -> AppResult<Option<RoleAssignment>>;

    /// Persists an assignment. Fails with `Conflict` when the subject already
    /// holds the role.
    async fn create_assignment(&self, assignment: RoleAssignment) -> AppResult<RoleAssignment>;

    /// Replaces scope and notes of an assignment.
    async fn update_assignment(
        &self,
        assignment_id: AssignmentId,
        scope: RoleScope,
        notes: Option<String>,
    ) -> AppResult<RoleAssignment>;

    /// Deletes an assignment and returns the removed row.
    async fn delete_assignment(&self, assignment_id: AssignmentId) -> AppResult<RoleAssignment>;
}

/// Repository port for object permission overrides.
#[async_trait]
pub trait ObjectPermissionRepository: Send + Sync {
    /// Lists overrides matching the query.
    async fn list_overrides(
        &self,
        query: &ObjectPermissionQuery,
    ) -> AppResult<Vec<ObjectPermissionOverride>>;

    /// Lists overrides granted to any of the subjects.
    async fn list_overrides_for_subjects(
        &self,
        subjects: &[Subject],
    ) -> AppResult<Vec<ObjectPermissionOverride>>;

    /// Finds an override by id.
    async fn find_override(
        &self,
        override_id: ObjectPermissionId,
    ) -> AppResult<Option<ObjectPermissionOverride>>;

    /// Persists an override. Fails with `Conflict` on a duplicate
    /// subject + object + permission.
    async fn create_override(
        &self,
        object_permission: ObjectPermissionOverride,
    ) -> AppResult<ObjectPermissionOverride>;

    /// Deletes an override and returns the removed row.
    async fn delete_override(
        &self,
        override_id: ObjectPermissionId,
    ) -> AppResult<ObjectPermissionOverride>;
}

/// Repository port for one-level group membership.
#[async_trait]
pub trait GroupMembershipRepository: Send + Sync {
    /// Lists groups the person belongs to.
    async fn list_groups_for_person(&self, person_id: PersonId) -> AppResult<Vec<GroupId>>;

    /// Lists current members of a group.
    async fn list_group_members(&self, group_id: GroupId) -> AppResult<Vec<PersonId>>;

    /// Adds a member. Returns `false` when already a member; `NotFound` for
    /// an unknown group.
    async fn add_group_member(&self, membership: GroupMembership) -> AppResult<bool>;

    /// Removes a member. Returns `false` when not a member.
    async fn remove_group_member(&self, membership: GroupMembership) -> AppResult<bool>;
}

/// Bundle of every store the authorization engine reads and writes.
#[derive(Clone)]
pub struct AuthorizationStores {
    /// Role store.
    pub roles: Arc<dyn RoleRepository>,
    /// Role permission catalog.
    pub role_permissions: Arc<dyn RolePermissionRepository>,
    /// Role assignment store.
    pub assignments: Arc<dyn RoleAssignmentRepository>,
    /// Object permission override store.
    pub object_permissions: Arc<dyn ObjectPermissionRepository>,
    /// Group membership resolver.
    pub groups: Arc<dyn GroupMembershipRepository>,
}

impl AuthorizationStores {
    /// Builds the bundle from one adapter implementing every port.
    #[must_use]
    pub fn from_shared<T>(store: Arc<T>) -> Self
    where
        T: RoleRepository
            + RolePermissionRepository
            + RoleAssignmentRepository
            + ObjectPermissionRepository
            + GroupMembershipRepository
            + 'static,
    {
        Self {
            roles: store.clone(),
            role_permissions: store.clone(),
            assignments: store.clone(),
            object_permissions: store.clone(),
            groups: store,
        }
    }
}
