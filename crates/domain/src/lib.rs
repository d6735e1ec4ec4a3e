//! Domain entities and invariants for role-based authorization.

#![forbid(unsafe_code)]

mod assignment;
mod hierarchy;
mod ids;
mod object_permission;
mod role;
mod security;
mod subject;

pub use assignment::{RoleAssignment, RoleScope, ScopeKind};
pub use hierarchy::RoleHierarchy;
pub use ids::{
    AssignmentId, GroupId, LocationId, ObjectId, ObjectPermissionId, PersonId, RoleId, UserId,
};
pub use object_permission::{GroupMembership, ObjectPermissionOverride};
pub use role::{PermissionGrant, ROLE_NAME_MAX_LENGTH, Role, RolePermission};
pub use security::{AuditAction, ObjectType, PermissionAction};
pub use subject::Subject;
