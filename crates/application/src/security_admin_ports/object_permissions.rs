use moss_domain::{ObjectId, ObjectPermissionOverride, ObjectType, PermissionAction, Subject};

/// Input payload for granting an object permission override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrantObjectPermissionInput {
    /// Type of the covered object.
    pub object_type: ObjectType,
    /// Covered object.
    pub object_id: ObjectId,
    /// Granted action.
    pub permission: PermissionAction,
    /// Person or group receiving the grant.
    pub subject: Subject,
}

/// Query parameters for override listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectPermissionQuery {
    /// Optional object type filter.
    pub object_type: Option<ObjectType>,
    /// Optional object filter.
    pub object_id: Option<ObjectId>,
    /// Optional subject filter.
    pub subject: Option<Subject>,
    /// Optional action filter.
    pub permission: Option<PermissionAction>,
    /// Maximum rows returned; `None` returns every row.
    pub limit: Option<usize>,
    /// Number of rows skipped for offset pagination.
    pub offset: usize,
}

impl ObjectPermissionQuery {
    /// Returns whether the override passes the filters, ignoring pagination.
    #[must_use]
    pub fn matches(&self, value: &ObjectPermissionOverride) -> bool {
        self.object_type
            .is_none_or(|object_type| object_type == value.object_type)
            && self.object_id.is_none_or(|object_id| object_id == value.object_id)
            && self.subject.is_none_or(|subject| subject == value.subject)
            && self
                .permission
                .is_none_or(|permission| permission == value.permission)
    }
}
