//! Application services and ports for role-based authorization.

#![forbid(unsafe_code)]

mod access_guard;
mod authorization_service;
mod security_admin_ports;
mod security_admin_service;

#[cfg(test)]
mod test_support;

pub use access_guard::{AccessGuard, authorize_session};
pub use authorization_service::{
    AssignedRolePermissions, AuthorizationService, DEFAULT_PERMISSION_CACHE_MAX_ENTRIES,
    DEFAULT_PERMISSION_CACHE_TTL, EffectivePermission, PermissionCacheConfig,
    PermissionCheck, PermissionDecision, PrincipalPermissions,
};
pub use security_admin_ports::{
    AuditEvent, AuditRepository, AuthorizationStores, CreateRoleAssignmentInput,
    CreateRoleInput, DeletedRole, GrantObjectPermissionInput, GroupMembershipRepository,
    IdentityProvider, ObjectPermissionQuery, ObjectPermissionRepository, RoleAssignmentQuery,
    RoleAssignmentRepository, RolePermissionRepository, RoleQuery, RoleRepository,
    UpdateRoleAssignmentInput, UpdateRoleInput,
};
pub use security_admin_service::{
    SYSTEM_ROLE_ADMIN, SYSTEM_ROLE_EDITOR, SYSTEM_ROLE_VIEWER, SecurityAdminService,
    SystemRoleSeedSummary,
};
