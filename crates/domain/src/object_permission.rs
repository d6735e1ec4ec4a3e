use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    GroupId, ObjectId, ObjectPermissionId, ObjectType, PermissionAction, PersonId, Subject, UserId,
};

/// Grant of one permission on one object to a person or group, independent
/// of the role hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectPermissionOverride {
    /// Stable override identifier.
    pub id: ObjectPermissionId,
    /// Type of the covered object.
    pub object_type: ObjectType,
    /// Covered object.
    pub object_id: ObjectId,
    /// Granted action.
    pub permission: PermissionAction,
    /// Person or group receiving the grant.
    pub subject: Subject,
    /// Account that granted the override.
    pub granted_by: UserId,
    /// Grant timestamp.
    pub granted_at: DateTime<Utc>,
}

impl ObjectPermissionOverride {
    /// Returns whether the override grants `action` on the given object.
    #[must_use]
    pub fn grants(&self, object_type: ObjectType, object_id: ObjectId, action: PermissionAction) -> bool {
        self.object_type == object_type && self.object_id == object_id && self.permission == action
    }
}

/// Membership of one person in one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupMembership {
    /// Group.
    pub group_id: GroupId,
    /// Member.
    pub person_id: PersonId,
}
