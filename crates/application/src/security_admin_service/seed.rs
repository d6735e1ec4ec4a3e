use moss_core::{AppError, AppResult};
use moss_domain::{ObjectType, PermissionAction, PermissionGrant, Role, RoleId, RolePermission};
use tracing::info;

use super::SecurityAdminService;

/// Name of the read-only system role.
pub const SYSTEM_ROLE_VIEWER: &str = "viewer";
/// Name of the system role that may edit every object type.
pub const SYSTEM_ROLE_EDITOR: &str = "editor";
/// Name of the system role holding every action.
pub const SYSTEM_ROLE_ADMIN: &str = "admin";

struct SystemRoleDefinition {
    name: &'static str,
    description: &'static str,
    parent: Option<&'static str>,
    actions: &'static [PermissionAction],
}

const SYSTEM_ROLES: [SystemRoleDefinition; 3] = [
    SystemRoleDefinition {
        name: SYSTEM_ROLE_VIEWER,
        description: "Read access to every object type",
        parent: None,
        actions: &[PermissionAction::View],
    },
    SystemRoleDefinition {
        name: SYSTEM_ROLE_EDITOR,
        description: "Viewer access plus edit on every object type",
        parent: Some(SYSTEM_ROLE_VIEWER),
        actions: &[PermissionAction::Edit],
    },
    SystemRoleDefinition {
        name: SYSTEM_ROLE_ADMIN,
        description: "Editor access plus delete and permission management",
        parent: Some(SYSTEM_ROLE_EDITOR),
        actions: &[PermissionAction::Delete, PermissionAction::ManagePermissions],
    },
];

/// Counts of rows written by one seeding run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SystemRoleSeedSummary {
    /// System roles created.
    pub created_roles: usize,
    /// Grant tuples added.
    pub added_permissions: usize,
}

impl SecurityAdminService {
    /// Installs the system roles and their grants. Safe to run repeatedly;
    /// existing roles and grants are left as they are.
    ///
    /// Fails with `Conflict` before writing anything when a role carrying a
    /// system name is a custom role, or when an existing system role sits
    /// under a different parent than its definition.
    pub async fn seed_system_roles(&self) -> AppResult<SystemRoleSeedSummary> {
        let scope = self.authorization_service.begin_mutation().await;
        let stores = scope.stores();

        let mut existing: Vec<Option<Role>> = Vec::with_capacity(SYSTEM_ROLES.len());
        for definition in &SYSTEM_ROLES {
            existing.push(stores.roles.find_role_by_name(definition.name).await?);
        }
        for (definition, role) in SYSTEM_ROLES.iter().zip(&existing) {
            if let Some(role) = role {
                ensure_matches_definition(definition, role, &existing)?;
            }
        }

        let mut summary = SystemRoleSeedSummary::default();
        let mut seeded: Vec<(&'static str, RoleId)> = Vec::new();
        for (definition, role) in SYSTEM_ROLES.iter().zip(existing) {
            let role = match role {
                Some(role) => {
                    for grant in definition.grants() {
                        if stores
                            .role_permissions
                            .add_permission(RolePermission {
                                role_id: role.id(),
                                grant,
                            })
                            .await?
                        {
                            summary.added_permissions += 1;
                        }
                    }
                    role
                }
                None => {
                    let parent_role_id = definition.parent.and_then(|parent| {
                        seeded
                            .iter()
                            .find(|(name, _)| *name == parent)
                            .map(|(_, role_id)| *role_id)
                    });
                    let role = Role::new(
                        RoleId::new(),
                        definition.name,
                        Some(definition.description.to_owned()),
                        parent_role_id,
                        true,
                    )?;
                    let grants = definition.grants();
                    let role = stores.roles.create_role(role, grants.as_slice()).await?;
                    summary.created_roles += 1;
                    summary.added_permissions += grants.len();
                    role
                }
            };

            seeded.push((definition.name, role.id()));
        }

        if summary != SystemRoleSeedSummary::default() {
            scope.clear();
        }
        drop(scope);

        info!(
            created_roles = summary.created_roles,
            added_permissions = summary.added_permissions,
            "system roles seeded"
        );

        Ok(summary)
    }
}

impl SystemRoleDefinition {
    fn grants(&self) -> Vec<PermissionGrant> {
        ObjectType::all()
            .iter()
            .flat_map(|object_type| {
                self.actions
                    .iter()
                    .map(|action| PermissionGrant::new(*object_type, *action))
            })
            .collect()
    }
}

fn ensure_matches_definition(
    definition: &SystemRoleDefinition,
    role: &Role,
    existing: &[Option<Role>],
) -> AppResult<()> {
    if !role.is_system() {
        return Err(AppError::Conflict(format!(
            "custom role '{}' uses a system role name",
            definition.name
        )));
    }

    let expected_parent = match definition.parent {
        None => None,
        Some(parent) => {
            let found = SYSTEM_ROLES
                .iter()
                .zip(existing)
                .find(|(candidate, _)| candidate.name == parent)
                .and_then(|(_, role)| role.as_ref().map(Role::id));
            // A child that exists without its parent cannot be re-linked.
            if found.is_none() {
                return Err(AppError::Conflict(format!(
                    "system role '{}' exists but its parent '{parent}' does not",
                    definition.name
                )));
            }
            found
        }
    };
    if role.parent_role_id() != expected_parent {
        return Err(AppError::Conflict(format!(
            "system role '{}' has an unexpected parent",
            definition.name
        )));
    }

    Ok(())
}
