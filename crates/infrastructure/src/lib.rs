//! Storage adapters for the authorization ports.

#![forbid(unsafe_code)]

mod in_memory_authorization_store;
mod postgres_audit_repository;
mod postgres_authorization_stores;
mod postgres_group_membership_repository;
mod postgres_object_permission_repository;
mod postgres_role_assignment_repository;
mod postgres_role_repository;

pub use in_memory_authorization_store::InMemoryAuthorizationStore;
pub use postgres_audit_repository::PostgresAuditRepository;
pub use postgres_authorization_stores::postgres_authorization_stores;
pub use postgres_group_membership_repository::PostgresGroupMembershipRepository;
pub use postgres_object_permission_repository::PostgresObjectPermissionRepository;
pub use postgres_role_assignment_repository::PostgresRoleAssignmentRepository;
pub use postgres_role_repository::PostgresRoleRepository;
