use moss_domain::{PermissionGrant, Role, RoleId};

/// Input payload for creating custom roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRoleInput {
    /// Unique role name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Optional parent role.
    pub parent_role_id: Option<RoleId>,
    /// Grants to attach to the role.
    pub permissions: Vec<PermissionGrant>,
}

/// Partial update for a custom role. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateRoleInput {
    /// New role name.
    pub name: Option<String>,
    /// New description; `Some(None)` clears it.
    pub description: Option<Option<String>>,
    /// New parent; `Some(None)` makes the role a root.
    pub parent_role_id: Option<Option<RoleId>>,
}

impl UpdateRoleInput {
    /// Returns whether the update carries no changes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.parent_role_id.is_none()
    }
}

/// Query parameters for role listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleQuery {
    /// Case-insensitive substring match on name or description.
    pub search: Option<String>,
    /// Optional system-role filter.
    pub is_system: Option<bool>,
    /// Maximum rows returned; `None` returns every row.
    pub limit: Option<usize>,
    /// Number of rows skipped for offset pagination.
    pub offset: usize,
}

impl RoleQuery {
    /// Returns whether the role passes the filters, ignoring pagination.
    #[must_use]
    pub fn matches(&self, role: &Role) -> bool {
        if self.is_system.is_some_and(|is_system| is_system != role.is_system()) {
            return false;
        }

        let Some(search) = self.search.as_deref().map(str::trim).filter(|value| !value.is_empty())
        else {
            return true;
        };
        let search = search.to_lowercase();
        role.name().as_str().to_lowercase().contains(&search)
            || role
                .description()
                .is_some_and(|description| description.to_lowercase().contains(&search))
    }
}

/// Result of deleting a custom role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeletedRole {
    /// Deleted role.
    pub role_id: RoleId,
    /// Assignments removed by the cascade.
    pub removed_assignments: u64,
}
