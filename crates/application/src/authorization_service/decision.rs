use moss_domain::{LocationId, ObjectId, ObjectType, PermissionAction};
use serde::Serialize;

/// One authorization question asked on behalf of a person.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionCheck {
    /// Object type being accessed.
    pub object_type: ObjectType,
    /// Requested action.
    pub action: PermissionAction,
    /// Concrete object, when the check targets one.
    pub object_id: Option<ObjectId>,
    /// Location of the object, when known.
    pub location_id: Option<LocationId>,
}

impl PermissionCheck {
    /// Creates a type-level check with no object and no location.
    #[must_use]
    pub fn new(object_type: ObjectType, action: PermissionAction) -> Self {
        Self {
            object_type,
            action,
            object_id: None,
            location_id: None,
        }
    }

    /// Targets a concrete object.
    #[must_use]
    pub fn on_object(mut self, object_id: ObjectId) -> Self {
        self.object_id = Some(object_id);
        self
    }

    /// Records the location the object lives at.
    #[must_use]
    pub fn at_location(mut self, location_id: LocationId) -> Self {
        self.location_id = Some(location_id);
        self
    }
}

/// Outcome of a permission check with its explanation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionDecision {
    /// Whether access is granted.
    pub granted: bool,
    /// Human-readable reason.
    pub reason: String,
    /// Steps leading to the decision, outermost first.
    pub path: Vec<String>,
}

impl PermissionDecision {
    pub(super) fn granted_by_override(check: &PermissionCheck, object_id: ObjectId) -> Self {
        Self {
            granted: true,
            reason: "Granted by object-level permission override".to_owned(),
            path: vec![
                "User".to_owned(),
                "Object Permission".to_owned(),
                format!("{}:{object_id}", check.object_type),
                format!("Action: {}", check.action),
            ],
        }
    }

    pub(super) fn granted_by_role(
        check: &PermissionCheck,
        source_role_name: &str,
        inherited: bool,
    ) -> Self {
        let (reason, step) = if inherited {
            (
                format!("Granted by inherited permission from role: {source_role_name}"),
                format!("Inherited from: {source_role_name}"),
            )
        } else {
            (
                format!("Granted by role: {source_role_name}"),
                format!("Role: {source_role_name}"),
            )
        };

        Self {
            granted: true,
            reason,
            path: vec![
                "User".to_owned(),
                "Role Assignment".to_owned(),
                step,
                format!("Permission: {} {}", check.action, check.object_type),
            ],
        }
    }

    pub(super) fn denied(check: &PermissionCheck) -> Self {
        Self {
            granted: false,
            reason: format!(
                "No permission found for {} on {}",
                check.action, check.object_type
            ),
            path: vec!["User".to_owned(), "No matching permission".to_owned()],
        }
    }
}
