use moss_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};

use crate::{ObjectType, PermissionAction, RoleId};

/// Maximum role name length accepted on create and rename.
pub const ROLE_NAME_MAX_LENGTH: usize = 100;

/// Named, hierarchical bundle of permission grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    id: RoleId,
    name: NonEmptyString,
    description: Option<String>,
    parent_role_id: Option<RoleId>,
    is_system: bool,
}

impl Role {
    /// Creates a role with validated fields.
    pub fn new(
        id: RoleId,
        name: impl Into<String>,
        description: Option<String>,
        parent_role_id: Option<RoleId>,
        is_system: bool,
    ) -> AppResult<Self> {
        if parent_role_id == Some(id) {
            return Err(AppError::InvalidHierarchy(format!(
                "role '{id}' cannot be its own parent"
            )));
        }

        Ok(Self {
            id,
            name: NonEmptyString::bounded(name, ROLE_NAME_MAX_LENGTH)?,
            description: normalize_description(description),
            parent_role_id,
            is_system,
        })
    }

    /// Returns the role identifier.
    #[must_use]
    pub fn id(&self) -> RoleId {
        self.id
    }

    /// Returns the unique role name.
    #[must_use]
    pub fn name(&self) -> &NonEmptyString {
        &self.name
    }

    /// Returns the optional description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the parent role, when the role is not a root.
    #[must_use]
    pub fn parent_role_id(&self) -> Option<RoleId> {
        self.parent_role_id
    }

    /// Returns whether the role is system-managed and immutable.
    #[must_use]
    pub fn is_system(&self) -> bool {
        self.is_system
    }

    /// Fails with `Forbidden` when the role is a system role.
    pub fn ensure_mutable(&self) -> AppResult<()> {
        if self.is_system {
            return Err(AppError::Forbidden(format!(
                "system role '{}' cannot be modified",
                self.name
            )));
        }

        Ok(())
    }
}

fn normalize_description(description: Option<String>) -> Option<String> {
    description
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

/// Additive grant of one action on one object type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PermissionGrant {
    /// Object type covered by the grant.
    pub object_type: ObjectType,
    /// Granted action.
    pub action: PermissionAction,
}

impl PermissionGrant {
    /// Creates a grant tuple.
    #[must_use]
    pub fn new(object_type: ObjectType, action: PermissionAction) -> Self {
        Self {
            object_type,
            action,
        }
    }
}

impl std::fmt::Display for PermissionGrant {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{} {}", self.action, self.object_type)
    }
}

/// Grant tuple attached to a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RolePermission {
    /// Role owning the grant.
    pub role_id: RoleId,
    /// Granted object type and action.
    pub grant: PermissionGrant,
}

impl RolePermission {
    /// Creates a role grant tuple.
    #[must_use]
    pub fn new(role_id: RoleId, object_type: ObjectType, action: PermissionAction) -> Self {
        Self {
            role_id,
            grant: PermissionGrant::new(object_type, action),
        }
    }
}
