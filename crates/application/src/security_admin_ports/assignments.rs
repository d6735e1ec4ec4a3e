use moss_domain::{RoleAssignment, RoleId, RoleScope, ScopeKind, Subject};

/// Input payload for assigning a role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRoleAssignmentInput {
    /// Role to assign.
    pub role_id: RoleId,
    /// Person or group receiving the role.
    pub subject: Subject,
    /// Where the assignment applies.
    pub scope: RoleScope,
    /// Free-form notes.
    pub notes: Option<String>,
}

/// Input payload for changing an assignment's scope or notes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRoleAssignmentInput {
    /// Replacement scope.
    pub scope: Option<RoleScope>,
    /// Replacement notes; `Some(None)` clears them.
    pub notes: Option<Option<String>>,
}

/// Query parameters for assignment listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleAssignmentQuery {
    /// Optional subject filter.
    pub subject: Option<Subject>,
    /// Optional role filter.
    pub role_id: Option<RoleId>,
    /// Optional scope filter.
    pub scope: Option<ScopeKind>,
    /// Maximum rows returned; `None` returns every row.
    pub limit: Option<usize>,
    /// Number of rows skipped for offset pagination.
    pub offset: usize,
}

impl RoleAssignmentQuery {
    /// Returns whether the assignment passes the filters, ignoring pagination.
    #[must_use]
    pub fn matches(&self, assignment: &RoleAssignment) -> bool {
        self.subject.is_none_or(|subject| subject == assignment.subject)
            && self.role_id.is_none_or(|role_id| role_id == assignment.role_id)
            && self.scope.is_none_or(|kind| kind == assignment.scope.kind())
    }
}
