use std::collections::{BTreeSet, HashMap, HashSet};

use moss_core::{AppError, AppResult};
use moss_domain::{
    AssignmentId, GroupId, ObjectPermissionOverride, PermissionGrant, PersonId, Role,
    RoleHierarchy, RoleId, RolePermission, RoleScope, Subject,
};
use serde::Serialize;

use crate::{AuthorizationStores, RoleQuery};

use super::decision::{PermissionCheck, PermissionDecision};

/// Grant reachable from a role, tagged with the role that holds it directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectivePermission {
    /// Granted object type and action.
    pub grant: PermissionGrant,
    /// Role that carries the grant tuple.
    pub source_role_id: RoleId,
    /// Name of the role that carries the grant tuple.
    pub source_role_name: String,
    /// Whether the grant comes from an ancestor rather than the role itself.
    pub inherited: bool,
}

/// Role-path grants contributed by one assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignedRolePermissions {
    /// Source assignment.
    pub assignment_id: AssignmentId,
    /// Assigned role.
    pub role_id: RoleId,
    /// Where the assignment applies.
    pub scope: RoleScope,
    /// Grants of the role and its ancestors, nearest role first.
    pub permissions: Vec<EffectivePermission>,
}

/// Resolved authorization state of one person.
///
/// Evaluation over a snapshot is pure: it reads no store and has no side
/// effects, so a cached snapshot answers exactly as a fresh one would.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalPermissions {
    person_id: PersonId,
    group_ids: Vec<GroupId>,
    assignments: Vec<AssignedRolePermissions>,
    overrides: Vec<ObjectPermissionOverride>,
}

impl PrincipalPermissions {
    /// Returns a snapshot with no grants.
    #[must_use]
    pub fn empty(person_id: PersonId) -> Self {
        Self {
            person_id,
            group_ids: Vec::new(),
            assignments: Vec::new(),
            overrides: Vec::new(),
        }
    }

    /// Returns the person this snapshot belongs to.
    #[must_use]
    pub fn person_id(&self) -> PersonId {
        self.person_id
    }

    /// Returns the groups the person belonged to at resolution time.
    #[must_use]
    pub fn group_ids(&self) -> &[GroupId] {
        &self.group_ids
    }

    /// Returns role-path grants per applicable assignment.
    #[must_use]
    pub fn assignments(&self) -> &[AssignedRolePermissions] {
        &self.assignments
    }

    /// Returns object overrides granted to the person or its groups.
    #[must_use]
    pub fn overrides(&self) -> &[ObjectPermissionOverride] {
        &self.overrides
    }

    /// Answers a permission check.
    ///
    /// Object overrides are consulted first, then role grants whose
    /// assignment scope covers the object, then the check is denied.
    #[must_use]
    pub fn evaluate(&self, check: &PermissionCheck) -> PermissionDecision {
        if let Some(object_id) = check.object_id
            && self
                .overrides
                .iter()
                .any(|value| value.grants(check.object_type, object_id, check.action))
        {
            return PermissionDecision::granted_by_override(check, object_id);
        }

        let wanted = PermissionGrant::new(check.object_type, check.action);
        let role_grant = self
            .assignments
            .iter()
            .filter(|assignment| {
                assignment
                    .scope
                    .applies_to(check.object_id, check.location_id)
            })
            .flat_map(|assignment| assignment.permissions.iter())
            .find(|permission| permission.grant == wanted);

        match role_grant {
            Some(permission) => PermissionDecision::granted_by_role(
                check,
                &permission.source_role_name,
                permission.inherited,
            ),
            None => PermissionDecision::denied(check),
        }
    }

    /// Returns every grant the person holds under a global assignment.
    #[must_use]
    pub fn global_grants(&self) -> BTreeSet<PermissionGrant> {
        self.assignments
            .iter()
            .filter(|assignment| matches!(assignment.scope, RoleScope::Global))
            .flat_map(|assignment| assignment.permissions.iter().map(|value| value.grant))
            .collect()
    }
}

/// Loads every store a decision depends on and builds a person snapshot.
pub(super) struct PermissionResolver<'a> {
    stores: &'a AuthorizationStores,
}

impl<'a> PermissionResolver<'a> {
    pub(super) fn new(stores: &'a AuthorizationStores) -> Self {
        Self { stores }
    }

    pub(super) async fn resolve(&self, person_id: PersonId) -> AppResult<PrincipalPermissions> {
        let group_ids = self.stores.groups.list_groups_for_person(person_id).await?;
        let subjects = std::iter::once(Subject::Person(person_id))
            .chain(group_ids.iter().copied().map(Subject::Group))
            .collect::<Vec<_>>();

        let assignments = self
            .stores
            .assignments
            .list_assignments_for_subjects(&subjects)
            .await?;
        let overrides = self
            .stores
            .object_permissions
            .list_overrides_for_subjects(&subjects)
            .await?;

        if assignments.is_empty() {
            return Ok(PrincipalPermissions {
                person_id,
                group_ids,
                assignments: Vec::new(),
                overrides,
            });
        }

        let catalog = self.load_catalog().await?;
        let chains = assignments
            .iter()
            .map(|assignment| catalog.hierarchy.ancestors(assignment.role_id))
            .collect::<Vec<_>>();
        let role_ids = chains
            .iter()
            .flatten()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect::<Vec<_>>();
        let grants = self
            .stores
            .role_permissions
            .list_permissions_for_roles(&role_ids)
            .await?;
        let grants_by_role = group_by_role(grants);

        let assignments = assignments
            .into_iter()
            .zip(chains)
            .map(|(assignment, chain)| AssignedRolePermissions {
                assignment_id: assignment.id,
                role_id: assignment.role_id,
                scope: assignment.scope,
                permissions: collect_chain_permissions(&chain, &catalog.roles, &grants_by_role),
            })
            .collect();

        Ok(PrincipalPermissions {
            person_id,
            group_ids,
            assignments,
            overrides,
        })
    }

    pub(super) async fn effective_role_permissions(
        &self,
        role_id: RoleId,
    ) -> AppResult<Vec<EffectivePermission>> {
        let catalog = self.load_catalog().await?;
        if !catalog.hierarchy.contains(role_id) {
            return Err(AppError::NotFound(format!("role '{role_id}' does not exist")));
        }

        let chain = catalog.hierarchy.ancestors(role_id);
        let grants = self
            .stores
            .role_permissions
            .list_permissions_for_roles(&chain)
            .await?;

        Ok(collect_chain_permissions(
            &chain,
            &catalog.roles,
            &group_by_role(grants),
        ))
    }

    pub(super) async fn load_hierarchy(&self) -> AppResult<RoleHierarchy> {
        Ok(self.load_catalog().await?.hierarchy)
    }

    async fn load_catalog(&self) -> AppResult<RoleCatalog> {
        let roles = self.stores.roles.list_roles(&RoleQuery::default()).await?;
        let hierarchy = RoleHierarchy::from_roles(&roles);
        let roles = roles
            .into_iter()
            .map(|role| (role.id(), role))
            .collect::<HashMap<_, _>>();

        Ok(RoleCatalog { roles, hierarchy })
    }
}

struct RoleCatalog {
    roles: HashMap<RoleId, Role>,
    hierarchy: RoleHierarchy,
}

fn group_by_role(grants: Vec<RolePermission>) -> HashMap<RoleId, Vec<PermissionGrant>> {
    let mut grouped: HashMap<RoleId, Vec<PermissionGrant>> = HashMap::new();
    for grant in grants {
        grouped.entry(grant.role_id).or_default().push(grant.grant);
    }

    for values in grouped.values_mut() {
        values.sort();
        values.dedup();
    }

    grouped
}

/// Unions grants along an ancestor chain. A grant held at several levels is
/// reported once, attributed to the nearest role.
fn collect_chain_permissions(
    chain: &[RoleId],
    roles: &HashMap<RoleId, Role>,
    grants_by_role: &HashMap<RoleId, Vec<PermissionGrant>>,
) -> Vec<EffectivePermission> {
    let mut seen = HashSet::new();
    let mut permissions = Vec::new();

    for (depth, role_id) in chain.iter().enumerate() {
        let Some(grants) = grants_by_role.get(role_id) else {
            continue;
        };
        let source_role_name = roles
            .get(role_id)
            .map(|role| role.name().as_str().to_owned())
            .unwrap_or_else(|| role_id.to_string());

        for grant in grants {
            if seen.insert(*grant) {
                permissions.push(EffectivePermission {
                    grant: *grant,
                    source_role_id: *role_id,
                    source_role_name: source_role_name.clone(),
                    inherited: depth > 0,
                });
            }
        }
    }

    permissions
}
