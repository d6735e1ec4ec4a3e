use std::str::FromStr;

use moss_core::AppError;
use serde::{Deserialize, Serialize};

/// Managed object types that permissions apply to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    /// Companies (vendors, manufacturers, customers).
    Company,
    /// Sites and buildings.
    Location,
    /// Rooms inside a location.
    Room,
    /// People records.
    Person,
    /// Hardware devices.
    Device,
    /// Device interfaces and ports.
    Io,
    /// IP address records.
    IpAddress,
    /// Networks and VLANs.
    Network,
    /// Software catalog entries.
    Software,
    /// Hosted SaaS services.
    SaasService,
    /// Applications installed on devices.
    InstalledApplication,
    /// Software licenses.
    SoftwareLicense,
    /// Uploaded documents.
    Document,
    /// Links to documents held elsewhere.
    ExternalDocument,
    /// Contracts.
    Contract,
    /// Groups of people.
    Group,
}

impl ObjectType {
    /// Returns a stable storage value for this object type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Company => "company",
            Self::Location => "location",
            Self::Room => "room",
            Self::Person => "person",
            Self::Device => "device",
            Self::Io => "io",
            Self::IpAddress => "ip_address",
            Self::Network => "network",
            Self::Software => "software",
            Self::SaasService => "saas_service",
            Self::InstalledApplication => "installed_application",
            Self::SoftwareLicense => "software_license",
            Self::Document => "document",
            Self::ExternalDocument => "external_document",
            Self::Contract => "contract",
            Self::Group => "group",
        }
    }

    /// Returns all known object types.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[ObjectType] = &[
            ObjectType::Company,
            ObjectType::Location,
            ObjectType::Room,
            ObjectType::Person,
            ObjectType::Device,
            ObjectType::Io,
            ObjectType::IpAddress,
            ObjectType::Network,
            ObjectType::Software,
            ObjectType::SaasService,
            ObjectType::InstalledApplication,
            ObjectType::SoftwareLicense,
            ObjectType::Document,
            ObjectType::ExternalDocument,
            ObjectType::Contract,
            ObjectType::Group,
        ];

        ALL
    }
}

impl FromStr for ObjectType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|object_type| object_type.as_str() == value)
            .ok_or_else(|| AppError::Validation(format!("unknown object type '{value}'")))
    }
}

impl std::fmt::Display for ObjectType {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Actions a permission can grant on an object type or object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionAction {
    /// Read access.
    View,
    /// Write access.
    Edit,
    /// Deletion.
    Delete,
    /// Granting and revoking object-level permissions.
    ManagePermissions,
}

impl PermissionAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Edit => "edit",
            Self::Delete => "delete",
            Self::ManagePermissions => "manage_permissions",
        }
    }

    /// Returns all known actions.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[PermissionAction] = &[
            PermissionAction::View,
            PermissionAction::Edit,
            PermissionAction::Delete,
            PermissionAction::ManagePermissions,
        ];

        ALL
    }
}

impl FromStr for PermissionAction {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "view" => Ok(Self::View),
            "edit" => Ok(Self::Edit),
            "delete" => Ok(Self::Delete),
            "manage_permissions" => Ok(Self::ManagePermissions),
            _ => Err(AppError::Validation(format!(
                "unknown permission action '{value}'"
            ))),
        }
    }
}

impl std::fmt::Display for PermissionAction {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Stable audit actions emitted by authorization mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// A custom role was created.
    RoleCreated,
    /// A role's name, description or parent changed.
    RoleUpdated,
    /// A custom role was deleted.
    RoleDeleted,
    /// A permission was added to a role.
    RolePermissionGranted,
    /// A permission was removed from a role.
    RolePermissionRevoked,
    /// A role was assigned to a subject.
    RoleAssignmentCreated,
    /// An assignment's scope changed.
    RoleAssignmentUpdated,
    /// A role assignment was revoked.
    RoleAssignmentRevoked,
    /// An object permission override was granted.
    ObjectPermissionGranted,
    /// An object permission override was revoked.
    ObjectPermissionRevoked,
    /// A person joined a group.
    GroupMemberAdded,
    /// A person left a group.
    GroupMemberRemoved,
}

impl AuditAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RoleCreated => "role.created",
            Self::RoleUpdated => "role.updated",
            Self::RoleDeleted => "role.deleted",
            Self::RolePermissionGranted => "role.permission_granted",
            Self::RolePermissionRevoked => "role.permission_revoked",
            Self::RoleAssignmentCreated => "role_assignment.created",
            Self::RoleAssignmentUpdated => "role_assignment.updated",
            Self::RoleAssignmentRevoked => "role_assignment.revoked",
            Self::ObjectPermissionGranted => "object_permission.granted",
            Self::ObjectPermissionRevoked => "object_permission.revoked",
            Self::GroupMemberAdded => "group.member_added",
            Self::GroupMemberRemoved => "group.member_removed",
        }
    }
}
