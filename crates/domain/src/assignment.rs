use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use moss_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

use crate::{AssignmentId, LocationId, ObjectId, RoleId, Subject, UserId};

/// Storage discriminator for [`RoleScope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    /// Applies everywhere.
    Global,
    /// Applies to objects at bound locations.
    Location,
    /// Applies to an explicit object list.
    SpecificObjects,
}

impl ScopeKind {
    /// Returns a stable storage value for the scope kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Location => "location",
            Self::SpecificObjects => "specific_objects",
        }
    }
}

impl FromStr for ScopeKind {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "global" => Ok(Self::Global),
            "location" => Ok(Self::Location),
            "specific_objects" => Ok(Self::SpecificObjects),
            _ => Err(AppError::Validation(format!(
                "unknown role scope '{value}'"
            ))),
        }
    }
}

/// Restriction on where a role assignment applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum RoleScope {
    /// Applies to every object.
    Global,
    /// Applies to objects located at one of the bound locations.
    Location {
        /// Bound locations, never empty.
        location_ids: BTreeSet<LocationId>,
    },
    /// Applies only to the listed objects.
    SpecificObjects {
        /// Objects covered by the assignment.
        object_ids: BTreeSet<ObjectId>,
    },
}

impl RoleScope {
    /// Creates a location scope, rejecting an empty location set.
    pub fn location(location_ids: impl IntoIterator<Item = LocationId>) -> AppResult<Self> {
        let location_ids = location_ids.into_iter().collect::<BTreeSet<_>>();
        if location_ids.is_empty() {
            return Err(AppError::Validation(
                "location-scoped assignments require at least one location".to_owned(),
            ));
        }

        Ok(Self::Location { location_ids })
    }

    /// Creates a specific-objects scope.
    pub fn specific_objects(object_ids: impl IntoIterator<Item = ObjectId>) -> AppResult<Self> {
        let object_ids = object_ids.into_iter().collect::<BTreeSet<_>>();
        if object_ids.is_empty() {
            return Err(AppError::Validation(
                "object-scoped assignments require at least one object".to_owned(),
            ));
        }

        Ok(Self::SpecificObjects { object_ids })
    }

    /// Rebuilds a scope from its stored parts.
    pub fn from_parts(
        kind: ScopeKind,
        location_ids: impl IntoIterator<Item = LocationId>,
        object_ids: impl IntoIterator<Item = ObjectId>,
    ) -> AppResult<Self> {
        match kind {
            ScopeKind::Global => Ok(Self::Global),
            ScopeKind::Location => Self::location(location_ids),
            ScopeKind::SpecificObjects => Self::specific_objects(object_ids),
        }
    }

    /// Returns the storage discriminator.
    #[must_use]
    pub fn kind(&self) -> ScopeKind {
        match self {
            Self::Global => ScopeKind::Global,
            Self::Location { .. } => ScopeKind::Location,
            Self::SpecificObjects { .. } => ScopeKind::SpecificObjects,
        }
    }

    /// Returns whether the scope covers an object with the given identity and
    /// location. Missing data never matches a restricted scope.
    #[must_use]
    pub fn applies_to(&self, object_id: Option<ObjectId>, location_id: Option<LocationId>) -> bool {
        match self {
            Self::Global => true,
            Self::Location { location_ids } => {
                location_id.is_some_and(|location_id| location_ids.contains(&location_id))
            }
            Self::SpecificObjects { object_ids } => {
                object_id.is_some_and(|object_id| object_ids.contains(&object_id))
            }
        }
    }
}

/// Binding of a role to a subject under a scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    /// Stable assignment identifier.
    pub id: AssignmentId,
    /// Assigned role.
    pub role_id: RoleId,
    /// Person or group holding the role.
    pub subject: Subject,
    /// Where the assignment applies.
    pub scope: RoleScope,
    /// Account that granted the assignment.
    pub granted_by: UserId,
    /// Grant timestamp.
    pub granted_at: DateTime<Utc>,
    /// Free-form administrator notes.
    pub notes: Option<String>,
}
