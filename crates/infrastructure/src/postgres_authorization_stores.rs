use std::sync::Arc;

use sqlx::PgPool;

use moss_application::AuthorizationStores;

use crate::{
    PostgresGroupMembershipRepository, PostgresObjectPermissionRepository,
    PostgresRoleAssignmentRepository, PostgresRoleRepository,
};

/// Wires every authorization store port to PostgreSQL over one pool.
#[must_use]
pub fn postgres_authorization_stores(pool: PgPool) -> AuthorizationStores {
    let roles = Arc::new(PostgresRoleRepository::new(pool.clone()));

    AuthorizationStores {
        roles: roles.clone(),
        role_permissions: roles,
        assignments: Arc::new(PostgresRoleAssignmentRepository::new(pool.clone())),
        object_permissions: Arc::new(PostgresObjectPermissionRepository::new(pool.clone())),
        groups: Arc::new(PostgresGroupMembershipRepository::new(pool)),
    }
}
