//! Hand-written port fakes shared by the service tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use moss_core::{AppError, AppResult, AuthContext, Session, UserRole};
use moss_domain::{
    AssignmentId, GroupId, GroupMembership, ObjectPermissionId, ObjectPermissionOverride,
    ObjectType, PermissionAction, PermissionGrant, PersonId, Role, RoleAssignment, RoleHierarchy, RoleId,
    RolePermission, RoleScope, Subject, UserId,
};
use tokio::sync::Mutex;

use crate::{
    AuditEvent, AuditRepository, AuthorizationService, AuthorizationStores,
    GroupMembershipRepository, IdentityProvider, ObjectPermissionQuery,
    ObjectPermissionRepository, PermissionCacheConfig, RoleAssignmentQuery,
    RoleAssignmentRepository, RolePermissionRepository, RoleQuery, RoleRepository,
};

#[derive(Default)]
struct FakeState {
    roles: BTreeMap<RoleId, Role>,
    permissions: BTreeSet<RolePermission>,
    assignments: Vec<RoleAssignment>,
    overrides: Vec<ObjectPermissionOverride>,
    groups: BTreeMap<GroupId, BTreeSet<PersonId>>,
}

#[derive(Default)]
pub(crate) struct FakeAuthorizationStore {
    state: Mutex<FakeState>,
    group_lookups: AtomicUsize,
    fail_member_lookups: AtomicBool,
    fail_permission_writes: AtomicBool,
}

impl FakeAuthorizationStore {
    pub(crate) async fn seed_role(&self, name: &str, parent_role_id: Option<RoleId>) -> RoleId {
        self.seed_role_with_flag(name, parent_role_id, false).await
    }

    pub(crate) async fn seed_system_role(&self, name: &str) -> RoleId {
        self.seed_role_with_flag(name, None, true).await
    }

    async fn seed_role_with_flag(
        &self,
        name: &str,
        parent_role_id: Option<RoleId>,
        is_system: bool,
    ) -> RoleId {
        let role_id = RoleId::new();
        let Ok(role) = Role::new(role_id, name, None, parent_role_id, is_system) else {
            panic!("seed role '{name}' should be valid");
        };
        self.state.lock().await.roles.insert(role_id, role);
        role_id
    }

    pub(crate) async fn seed_grant(
        &self,
        role_id: RoleId,
        object_type: ObjectType,
        action: PermissionAction,
    ) {
        self.state
            .lock()
            .await
            .permissions
            .insert(RolePermission::new(role_id, object_type, action));
    }

    pub(crate) async fn seed_assignment(
        &self,
        role_id: RoleId,
        subject: Subject,
        scope: RoleScope,
    ) -> AssignmentId {
        let assignment = RoleAssignment {
            id: AssignmentId::new(),
            role_id,
            subject,
            scope,
            granted_by: UserId::new(),
            granted_at: Utc::now(),
            notes: None,
        };
        let assignment_id = assignment.id;
        self.state.lock().await.assignments.push(assignment);
        assignment_id
    }

    pub(crate) async fn seed_group(&self, members: &[PersonId]) -> GroupId {
        let group_id = GroupId::new();
        self.state
            .lock()
            .await
            .groups
            .insert(group_id, members.iter().copied().collect());
        group_id
    }

    pub(crate) async fn set_parent_unchecked(&self, role_id: RoleId, parent: Option<RoleId>) {
        let mut state = self.state.lock().await;
        let Some(role) = state.roles.get(&role_id).cloned() else {
            panic!("role should exist");
        };
        let Ok(updated) = Role::new(
            role.id(),
            role.name().as_str(),
            role.description().map(str::to_owned),
            parent,
            role.is_system(),
        ) else {
            panic!("role update should be valid");
        };
        state.roles.insert(role_id, updated);
    }

    pub(crate) fn group_lookups(&self) -> usize {
        self.group_lookups.load(Ordering::SeqCst)
    }

    pub(crate) fn fail_member_lookups(&self, fail: bool) {
        self.fail_member_lookups.store(fail, Ordering::SeqCst);
    }

    /// Makes every grant write fail, including the grants of a new role.
    pub(crate) fn fail_permission_writes(&self, fail: bool) {
        self.fail_permission_writes.store(fail, Ordering::SeqCst);
    }

    fn permission_write_guard(&self) -> AppResult<()> {
        if self.fail_permission_writes.load(Ordering::SeqCst) {
            return Err(AppError::Internal("grant store unavailable".to_owned()));
        }
        Ok(())
    }
}

fn page<T>(values: impl Iterator<Item = T>, offset: usize, limit: Option<usize>) -> Vec<T> {
    values.skip(offset).take(limit.unwrap_or(usize::MAX)).collect()
}

#[async_trait]
impl RoleRepository for FakeAuthorizationStore {
    async fn list_roles(&self, query: &RoleQuery) -> AppResult<Vec<Role>> {
        let state = self.state.lock().await;
        let mut roles = state
            .roles
            .values()
            .filter(|role| query.matches(role))
            .cloned()
            .collect::<Vec<_>>();
        roles.sort_by(|left, right| left.name().as_str().cmp(right.name().as_str()));
        Ok(page(roles.into_iter(), query.offset, query.limit))
    }

    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<Role>> {
        Ok(self.state.lock().await.roles.get(&role_id).cloned())
    }

    async fn find_role_by_name(&self, name: &str) -> AppResult<Option<Role>> {
        Ok(self
            .state
            .lock()
            .await
            .roles
            .values()
            .find(|role| role.name().as_str() == name)
            .cloned())
    }

    async fn create_role(&self, role: Role, permissions: &[PermissionGrant]) -> AppResult<Role> {
        let mut state = self.state.lock().await;
        if state
            .roles
            .values()
            .any(|existing| existing.name() == role.name())
        {
            return Err(AppError::Conflict(format!(
                "role '{}' already exists",
                role.name().as_str()
            )));
        }
        if !permissions.is_empty() {
            self.permission_write_guard()?;
        }
        state.roles.insert(role.id(), role.clone());
        state.permissions.extend(permissions.iter().map(|grant| RolePermission {
            role_id: role.id(),
            grant: *grant,
        }));
        Ok(role)
    }

    async fn update_role(&self, role: Role) -> AppResult<Role> {
        let mut state = self.state.lock().await;
        if !state.roles.contains_key(&role.id()) {
            return Err(AppError::NotFound(format!(
                "role '{}' does not exist",
                role.id()
            )));
        }
        RoleHierarchy::from_roles(state.roles.values())
            .ensure_acyclic(role.id(), role.parent_role_id())?;
        state.roles.insert(role.id(), role.clone());
        Ok(role)
    }

    async fn delete_role(&self, role_id: RoleId) -> AppResult<u64> {
        let mut state = self.state.lock().await;
        if state.roles.remove(&role_id).is_none() {
            return Err(AppError::NotFound(format!(
                "role '{role_id}' does not exist"
            )));
        }
        let children = state
            .roles
            .values()
            .filter(|role| role.parent_role_id() == Some(role_id))
            .map(Role::id)
            .collect::<Vec<_>>();
        for child in children {
            if let Some(role) = state.roles.get(&child).cloned()
                && let Ok(root) = Role::new(
                    role.id(),
                    role.name().as_str(),
                    role.description().map(str::to_owned),
                    None,
                    role.is_system(),
                )
            {
                state.roles.insert(child, root);
            }
        }
        state
            .permissions
            .retain(|permission| permission.role_id != role_id);
        let before = state.assignments.len();
        state
            .assignments
            .retain(|assignment| assignment.role_id != role_id);
        Ok((before - state.assignments.len()) as u64)
    }
}

#[async_trait]
impl RolePermissionRepository for FakeAuthorizationStore {
    async fn list_permissions_for_roles(
        &self,
        role_ids: &[RoleId],
    ) -> AppResult<Vec<RolePermission>> {
        Ok(self
            .state
            .lock()
            .await
            .permissions
            .iter()
            .filter(|permission| role_ids.contains(&permission.role_id))
            .copied()
            .collect())
    }

    async fn add_permission(&self, permission: RolePermission) -> AppResult<bool> {
        self.permission_write_guard()?;
        Ok(self.state.lock().await.permissions.insert(permission))
    }

    async fn remove_permission(&self, permission: RolePermission) -> AppResult<bool> {
        Ok(self.state.lock().await.permissions.remove(&permission))
    }
}

#[async_trait]
impl RoleAssignmentRepository for FakeAuthorizationStore {
    async fn list_assignments(
        &self,
        query: &RoleAssignmentQuery,
    ) -> AppResult<Vec<RoleAssignment>> {
        let state = self.state.lock().await;
        Ok(page(
            state
                .assignments
                .iter()
                .filter(|assignment| query.matches(assignment))
                .cloned(),
            query.offset,
            query.limit,
        ))
    }

    async fn list_assignments_for_subjects(
        &self,
        subjects: &[Subject],
    ) -> AppResult<Vec<RoleAssignment>> {
        Ok(self
            .state
            .lock()
            .await
            .assignments
            .iter()
            .filter(|assignment| subjects.contains(&assignment.subject))
            .cloned()
            .collect())
    }

    async fn list_assignments_for_roles(
        &self,
        role_ids: &[RoleId],
    ) -> AppResult<Vec<RoleAssignment>> {
        Ok(self
            .state
            .lock()
            .await
            .assignments
            .iter()
            .filter(|assignment| role_ids.contains(&assignment.role_id))
            .cloned()
            .collect())
    }

    async fn find_assignment(
        &self,
        assignment_id: AssignmentId,
    ) -> AppResult<Option<RoleAssignment>> {
        Ok(self
            .state
            .lock()
            .await
            .assignments
            .iter()
            .find(|assignment| assignment.id == assignment_id)
            .cloned())
    }

    async fn create_assignment(&self, assignment: RoleAssignment) -> AppResult<RoleAssignment> {
        let mut state = self.state.lock().await;
        if state.assignments.iter().any(|existing| {
            existing.role_id == assignment.role_id && existing.subject == assignment.subject
        }) {
            return Err(AppError::Conflict("role is already assigned".to_owned()));
        }
        state.assignments.push(assignment.clone());
        Ok(assignment)
    }

    async fn update_assignment(
        &self,
        assignment_id: AssignmentId,
        scope: RoleScope,
        notes: Option<String>,
    ) -> AppResult<RoleAssignment> {
        let mut state = self.state.lock().await;
        let Some(assignment) = state
            .assignments
            .iter_mut()
            .find(|assignment| assignment.id == assignment_id)
        else {
            return Err(AppError::NotFound(format!(
                "assignment '{assignment_id}' does not exist"
            )));
        };
        assignment.scope = scope;
        assignment.notes = notes;
        Ok(assignment.clone())
    }

    async fn delete_assignment(&self, assignment_id: AssignmentId) -> AppResult<RoleAssignment> {
        let mut state = self.state.lock().await;
        let Some(index) = state
            .assignments
            .iter()
            .position(|assignment| assignment.id == assignment_id)
        else {
            return Err(AppError::NotFound(format!(
                "assignment '{assignment_id}' does not exist"
            )));
        };
        Ok(state.assignments.remove(index))
    }
}

#[async_trait]
impl ObjectPermissionRepository for FakeAuthorizationStore {
    async fn list_overrides(
        &self,
        query: &ObjectPermissionQuery,
    ) -> AppResult<Vec<ObjectPermissionOverride>> {
        let state = self.state.lock().await;
        Ok(page(
            state
                .overrides
                .iter()
                .filter(|value| query.matches(value))
                .cloned(),
            query.offset,
            query.limit,
        ))
    }

    async fn list_overrides_for_subjects(
        &self,
        subjects: &[Subject],
    ) -> AppResult<Vec<ObjectPermissionOverride>> {
        Ok(self
            .state
            .lock()
            .await
            .overrides
            .iter()
            .filter(|value| subjects.contains(&value.subject))
            .cloned()
            .collect())
    }

    async fn find_override(
        &self,
        override_id: ObjectPermissionId,
    ) -> AppResult<Option<ObjectPermissionOverride>> {
        Ok(self
            .state
            .lock()
            .await
            .overrides
            .iter()
            .find(|value| value.id == override_id)
            .cloned())
    }

    async fn create_override(
        &self,
        object_permission: ObjectPermissionOverride,
    ) -> AppResult<ObjectPermissionOverride> {
        let mut state = self.state.lock().await;
        if state.overrides.iter().any(|existing| {
            existing.subject == object_permission.subject
                && existing.object_type == object_permission.object_type
                && existing.object_id == object_permission.object_id
                && existing.permission == object_permission.permission
        }) {
            return Err(AppError::Conflict(
                "object permission already granted".to_owned(),
            ));
        }
        state.overrides.push(object_permission.clone());
        Ok(object_permission)
    }

    async fn delete_override(
        &self,
        override_id: ObjectPermissionId,
    ) -> AppResult<ObjectPermissionOverride> {
        let mut state = self.state.lock().await;
        let Some(index) = state
            .overrides
            .iter()
            .position(|value| value.id == override_id)
        else {
            return Err(AppError::NotFound(format!(
                "object permission '{override_id}' does not exist"
            )));
        };
        Ok(state.overrides.remove(index))
    }
}

#[async_trait]
impl GroupMembershipRepository for FakeAuthorizationStore {
    async fn list_groups_for_person(&self, person_id: PersonId) -> AppResult<Vec<GroupId>> {
        self.group_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .state
            .lock()
            .await
            .groups
            .iter()
            .filter(|(_, members)| members.contains(&person_id))
            .map(|(group_id, _)| *group_id)
            .collect())
    }

    async fn list_group_members(&self, group_id: GroupId) -> AppResult<Vec<PersonId>> {
        if self.fail_member_lookups.load(Ordering::SeqCst) {
            return Err(AppError::Internal("member lookup failed".to_owned()));
        }
        Ok(self
            .state
            .lock()
            .await
            .groups
            .get(&group_id)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default())
    }

    async fn add_group_member(&self, membership: GroupMembership) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        let Some(members) = state.groups.get_mut(&membership.group_id) else {
            return Err(AppError::NotFound(format!(
                "group '{}' does not exist",
                membership.group_id
            )));
        };
        Ok(members.insert(membership.person_id))
    }

    async fn remove_group_member(&self, membership: GroupMembership) -> AppResult<bool> {
        Ok(self
            .state
            .lock()
            .await
            .groups
            .get_mut(&membership.group_id)
            .is_some_and(|members| members.remove(&membership.person_id)))
    }
}

#[derive(Default)]
pub(crate) struct FakeAuditRepository {
    pub(crate) events: Mutex<Vec<AuditEvent>>,
    pub(crate) fail: AtomicBool,
}

#[async_trait]
impl AuditRepository for FakeAuditRepository {
    async fn append_event(&self, event: AuditEvent) -> AppResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Internal("audit sink unavailable".to_owned()));
        }
        self.events.lock().await.push(event);
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FakeIdentityProvider {
    pub(crate) session: Option<Session>,
    pub(crate) api_context: Option<AuthContext>,
}

#[async_trait]
impl IdentityProvider for FakeIdentityProvider {
    async fn current_session(&self) -> AppResult<Option<Session>> {
        Ok(self.session.clone())
    }

    async fn current_api_context(&self) -> AppResult<Option<AuthContext>> {
        Ok(self.api_context.clone())
    }
}

pub(crate) fn session_with_role(role: UserRole) -> Session {
    Session::new(
        uuid::Uuid::new_v4(),
        Some(uuid::Uuid::new_v4()),
        "Test Operator".to_owned(),
        None,
        role,
    )
}

pub(crate) fn authorization_service(
    store: &Arc<FakeAuthorizationStore>,
) -> AuthorizationService {
    AuthorizationService::new(
        AuthorizationStores::from_shared(store.clone()),
        PermissionCacheConfig::default(),
    )
}
