mod assignments;
mod audit;
mod identity;
mod object_permissions;
mod repositories;
mod roles;

pub use assignments::{CreateRoleAssignmentInput, RoleAssignmentQuery, UpdateRoleAssignmentInput};
pub use audit::{AuditEvent, AuditRepository};
pub use identity::IdentityProvider;
pub use object_permissions::{GrantObjectPermissionInput, ObjectPermissionQuery};
pub use repositories::{
    AuthorizationStores, GroupMembershipRepository, ObjectPermissionRepository,
    RoleAssignmentRepository, RolePermissionRepository, RoleRepository,
};
pub use roles::{CreateRoleInput, DeletedRole, RoleQuery, UpdateRoleInput};
