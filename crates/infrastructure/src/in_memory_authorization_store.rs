use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use moss_application::{
    GroupMembershipRepository, ObjectPermissionQuery, ObjectPermissionRepository,
    RoleAssignmentQuery, RoleAssignmentRepository, RolePermissionRepository, RoleQuery,
    RoleRepository,
};
use moss_core::{AppError, AppResult};
use moss_domain::{
    AssignmentId, GroupId, GroupMembership, ObjectPermissionId, ObjectPermissionOverride,
    PermissionGrant, PersonId, Role, RoleAssignment, RoleHierarchy, RoleId, RolePermission,
    RoleScope, Subject,
};
use tokio::sync::RwLock;

/// In-memory implementation of every authorization store port.
///
/// Roles, grants, assignments and overrides live behind one lock so a
/// cascading delete is observed atomically.
#[derive(Debug, Default)]
pub struct InMemoryAuthorizationStore {
    catalog: RwLock<Catalog>,
    groups: RwLock<HashMap<GroupId, BTreeSet<PersonId>>>,
}

#[derive(Debug, Default)]
struct Catalog {
    roles: HashMap<RoleId, Role>,
    permissions: BTreeSet<RolePermission>,
    assignments: BTreeMap<AssignmentId, RoleAssignment>,
    overrides: BTreeMap<ObjectPermissionId, ObjectPermissionOverride>,
}

impl InMemoryAuthorizationStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an empty group. Groups are owned by the directory; this
    /// stands in for its provisioning.
    pub async fn create_group(&self) -> GroupId {
        let group_id = GroupId::new();
        self.groups.write().await.insert(group_id, BTreeSet::new());
        group_id
    }

    /// Removes a group together with its assignments and overrides and
    /// returns the people who were members, or `None` for an unknown group.
    ///
    /// The store does not see the permission cache: callers must invalidate
    /// every returned person, otherwise the grants they held through the
    /// group stay cached until the entries expire.
    pub async fn delete_group(&self, group_id: GroupId) -> Option<BTreeSet<PersonId>> {
        let members = self.groups.write().await.remove(&group_id)?;
        let subject = Subject::Group(group_id);
        let mut catalog = self.catalog.write().await;
        catalog
            .assignments
            .retain(|_, assignment| assignment.subject != subject);
        catalog.overrides.retain(|_, value| value.subject != subject);
        Some(members)
    }
}

fn paginate<T>(values: impl Iterator<Item = T>, offset: usize, limit: Option<usize>) -> Vec<T> {
    values
        .skip(offset)
        .take(limit.unwrap_or(usize::MAX))
        .collect()
}

fn role_not_found(role_id: RoleId) -> AppError {
    AppError::NotFound(format!("role '{role_id}' does not exist"))
}

fn with_parent(role: &Role, parent_role_id: Option<RoleId>) -> AppResult<Role> {
    Role::new(
        role.id(),
        role.name().as_str(),
        role.description().map(str::to_owned),
        parent_role_id,
        role.is_system(),
    )
}

#[async_trait]
impl RoleRepository for InMemoryAuthorizationStore {
    async fn list_roles(&self, query: &RoleQuery) -> AppResult<Vec<Role>> {
        let catalog = self.catalog.read().await;
        let mut roles = catalog
            .roles
            .values()
            .filter(|role| query.matches(role))
            .cloned()
            .collect::<Vec<_>>();
        roles.sort_by(|left, right| left.name().as_str().cmp(right.name().as_str()));

        Ok(paginate(roles.into_iter(), query.offset, query.limit))
    }

    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<Role>> {
        Ok(self.catalog.read().await.roles.get(&role_id).cloned())
    }

    async fn find_role_by_name(&self, name: &str) -> AppResult<Option<Role>> {
        Ok(self
            .catalog
            .read()
            .await
            .roles
            .values()
            .find(|role| role.name().as_str() == name.trim())
            .cloned())
    }

    async fn create_role(&self, role: Role, permissions: &[PermissionGrant]) -> AppResult<Role> {
        let mut catalog = self.catalog.write().await;
        if catalog
            .roles
            .values()
            .any(|existing| existing.name() == role.name())
        {
            return Err(AppError::Conflict(format!(
                "role '{}' already exists",
                role.name().as_str()
            )));
        }
        if let Some(parent_role_id) = role.parent_role_id()
            && !catalog.roles.contains_key(&parent_role_id)
        {
            return Err(role_not_found(parent_role_id));
        }

        catalog.roles.insert(role.id(), role.clone());
        catalog
            .permissions
            .extend(permissions.iter().map(|grant| RolePermission {
                role_id: role.id(),
                grant: *grant,
            }));
        Ok(role)
    }

    async fn update_role(&self, role: Role) -> AppResult<Role> {
        let mut catalog = self.catalog.write().await;
        if !catalog.roles.contains_key(&role.id()) {
            return Err(role_not_found(role.id()));
        }
        if catalog
            .roles
            .values()
            .any(|existing| existing.id() != role.id() && existing.name() == role.name())
        {
            return Err(AppError::Conflict(format!(
                "role '{}' already exists",
                role.name().as_str()
            )));
        }
        if let Some(parent_role_id) = role.parent_role_id()
            && !catalog.roles.contains_key(&parent_role_id)
        {
            return Err(role_not_found(parent_role_id));
        }
        RoleHierarchy::from_roles(catalog.roles.values())
            .ensure_acyclic(role.id(), role.parent_role_id())?;

        catalog.roles.insert(role.id(), role.clone());
        Ok(role)
    }

    async fn delete_role(&self, role_id: RoleId) -> AppResult<u64> {
        let mut catalog = self.catalog.write().await;
        if catalog.roles.remove(&role_id).is_none() {
            return Err(role_not_found(role_id));
        }

        let orphans = catalog
            .roles
            .values()
            .filter(|role| role.parent_role_id() == Some(role_id))
            .map(|role| with_parent(role, None))
            .collect::<AppResult<Vec<_>>>()?;
        for orphan in orphans {
            catalog.roles.insert(orphan.id(), orphan);
        }

        catalog
            .permissions
            .retain(|permission| permission.role_id != role_id);
        let before = catalog.assignments.len();
        catalog
            .assignments
            .retain(|_, assignment| assignment.role_id != role_id);

        Ok(u64::try_from(before - catalog.assignments.len()).unwrap_or(u64::MAX))
    }
}

#[async_trait]
impl RolePermissionRepository for InMemoryAuthorizationStore {
    async fn list_permissions_for_roles(
        &self,
        role_ids: &[RoleId],
    ) -> AppResult<Vec<RolePermission>> {
        let role_ids = role_ids.iter().copied().collect::<BTreeSet<_>>();
        Ok(self
            .catalog
            .read()
            .await
            .permissions
            .iter()
            .filter(|permission| role_ids.contains(&permission.role_id))
            .copied()
            .collect())
    }

    async fn add_permission(&self, permission: RolePermission) -> AppResult<bool> {
        let mut catalog = self.catalog.write().await;
        if !catalog.roles.contains_key(&permission.role_id) {
            return Err(role_not_found(permission.role_id));
        }
        Ok(catalog.permissions.insert(permission))
    }

    async fn remove_permission(&self, permission: RolePermission) -> AppResult<bool> {
        Ok(self.catalog.write().await.permissions.remove(&permission))
    }
}

#[async_trait]
impl RoleAssignmentRepository for InMemoryAuthorizationStore {
    async fn list_assignments(
        &self,
        query: &RoleAssignmentQuery,
    ) -> AppResult<Vec<RoleAssignment>> {
        let catalog = self.catalog.read().await;
        let mut assignments = catalog
            .assignments
            .values()
            .filter(|assignment| query.matches(assignment))
            .cloned()
            .collect::<Vec<_>>();
        assignments.sort_by_key(|assignment| (assignment.granted_at, assignment.id));

        Ok(paginate(assignments.into_iter(), query.offset, query.limit))
    }

    async fn list_assignments_for_subjects(
        &self,
        subjects: &[Subject],
    ) -> AppResult<Vec<RoleAssignment>> {
        Ok(self
            .catalog
            .read()
            .await
            .assignments
            .values()
            .filter(|assignment| subjects.contains(&assignment.subject))
            .cloned()
            .collect())
    }

    async fn list_assignments_for_roles(
        &self,
        role_ids: &[RoleId],
    ) -> AppResult<Vec<RoleAssignment>> {
        Ok(self
            .catalog
            .read()
            .await
            .assignments
            .values()
            .filter(|assignment| role_ids.contains(&assignment.role_id))
            .cloned()
            .collect())
    }

    async fn find_assignment(
        &self,
        assignment_id: AssignmentId,
    ) -> AppResult<Option<RoleAssignment>> {
        Ok(self
            .catalog
            .read()
            .await
            .assignments
            .get(&assignment_id)
            .cloned())
    }

    async fn create_assignment(&self, assignment: RoleAssignment) -> AppResult<RoleAssignment> {
        if let Subject::Group(group_id) = assignment.subject
            && !self.groups.read().await.contains_key(&group_id)
        {
            return Err(AppError::NotFound(format!(
                "group '{group_id}' does not exist"
            )));
        }

        let mut catalog = self.catalog.write().await;
        if !catalog.roles.contains_key(&assignment.role_id) {
            return Err(role_not_found(assignment.role_id));
        }
        if catalog.assignments.values().any(|existing| {
            existing.role_id == assignment.role_id && existing.subject == assignment.subject
        }) {
            return Err(AppError::Conflict(format!(
                "{} already holds role '{}'",
                assignment.subject, assignment.role_id
            )));
        }

        catalog
            .assignments
            .insert(assignment.id, assignment.clone());
        Ok(assignment)
    }

    async fn update_assignment(
        &self,
        assignment_id: AssignmentId,
        scope: RoleScope,
        notes: Option<String>,
    ) -> AppResult<RoleAssignment> {
        let mut catalog = self.catalog.write().await;
        let assignment = catalog
            .assignments
            .get_mut(&assignment_id)
            .ok_or_else(|| {
                AppError::NotFound(format!("assignment '{assignment_id}' does not exist"))
            })?;
        assignment.scope = scope;
        assignment.notes = notes;

        Ok(assignment.clone())
    }

    async fn delete_assignment(&self, assignment_id: AssignmentId) -> AppResult<RoleAssignment> {
        self.catalog
            .write()
            .await
            .assignments
            .remove(&assignment_id)
            .ok_or_else(|| {
                AppError::NotFound(format!("assignment '{assignment_id}' does not exist"))
            })
    }
}

#[async_trait]
impl ObjectPermissionRepository for InMemoryAuthorizationStore {
    async fn list_overrides(
        &self,
        query: &ObjectPermissionQuery,
    ) -> AppResult<Vec<ObjectPermissionOverride>> {
        let catalog = self.catalog.read().await;
        let mut overrides = catalog
            .overrides
            .values()
            .filter(|value| query.matches(value))
            .cloned()
            .collect::<Vec<_>>();
        overrides.sort_by_key(|value| (value.granted_at, value.id));

        Ok(paginate(overrides.into_iter(), query.offset, query.limit))
    }

    async fn list_overrides_for_subjects(
        &self,
        subjects: &[Subject],
    ) -> AppResult<Vec<ObjectPermissionOverride>> {
        Ok(self
            .catalog
            .read()
            .await
            .overrides
            .values()
            .filter(|value| subjects.contains(&value.subject))
            .cloned()
            .collect())
    }

    async fn find_override(
        &self,
        override_id: ObjectPermissionId,
    ) -> AppResult<Option<ObjectPermissionOverride>> {
        Ok(self
            .catalog
            .read()
            .await
            .overrides
            .get(&override_id)
            .cloned())
    }

    async fn create_override(
        &self,
        object_permission: ObjectPermissionOverride,
    ) -> AppResult<ObjectPermissionOverride> {
        if let Subject::Group(group_id) = object_permission.subject
            && !self.groups.read().await.contains_key(&group_id)
        {
            return Err(AppError::NotFound(format!(
                "group '{group_id}' does not exist"
            )));
        }

        let mut catalog = self.catalog.write().await;
        if catalog.overrides.values().any(|existing| {
            existing.subject == object_permission.subject
                && existing.object_type == object_permission.object_type
                && existing.object_id == object_permission.object_id
                && existing.permission == object_permission.permission
        }) {
            return Err(AppError::Conflict(format!(
                "{} already holds '{}' on {}:{}",
                object_permission.subject,
                object_permission.permission,
                object_permission.object_type,
                object_permission.object_id
            )));
        }

        catalog
            .overrides
            .insert(object_permission.id, object_permission.clone());
        Ok(object_permission)
    }

    async fn delete_override(
        &self,
        override_id: ObjectPermissionId,
    ) -> AppResult<ObjectPermissionOverride> {
        self.catalog
            .write()
            .await
            .overrides
            .remove(&override_id)
            .ok_or_else(|| {
                AppError::NotFound(format!("object permission '{override_id}' does not exist"))
            })
    }
}

#[async_trait]
impl GroupMembershipRepository for InMemoryAuthorizationStore {
    async fn list_groups_for_person(&self, person_id: PersonId) -> AppResult<Vec<GroupId>> {
        let mut group_ids = self
            .groups
            .read()
            .await
            .iter()
            .filter(|(_, members)| members.contains(&person_id))
            .map(|(group_id, _)| *group_id)
            .collect::<Vec<_>>();
        group_ids.sort();

        Ok(group_ids)
    }

    async fn list_group_members(&self, group_id: GroupId) -> AppResult<Vec<PersonId>> {
        Ok(self
            .groups
            .read()
            .await
            .get(&group_id)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default())
    }

    async fn add_group_member(&self, membership: GroupMembership) -> AppResult<bool> {
        let mut groups = self.groups.write().await;
        let members = groups.get_mut(&membership.group_id).ok_or_else(|| {
            AppError::NotFound(format!("group '{}' does not exist", membership.group_id))
        })?;

        Ok(members.insert(membership.person_id))
    }

    async fn remove_group_member(&self, membership: GroupMembership) -> AppResult<bool> {
        Ok(self
            .groups
            .write()
            .await
            .get_mut(&membership.group_id)
            .is_some_and(|members| members.remove(&membership.person_id)))
    }
}
