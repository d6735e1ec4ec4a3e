//! Strongly typed identifiers for authorization records.

use moss_core::AppError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID value.
            #[must_use]
            pub fn from_uuid(value: Uuid) -> Self {
                Self(value)
            }

            /// Parses an identifier from its transport representation.
            pub fn parse(value: &str) -> Result<Self, AppError> {
                Uuid::parse_str(value.trim()).map(Self).map_err(|error| {
                    AppError::Validation(format!(
                        "invalid {} '{value}': {error}",
                        stringify!($name)
                    ))
                })
            }

            /// Returns the underlying UUID value.
            #[must_use]
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(formatter, "{}", self.0)
            }
        }
    };
}

uuid_identifier!(
    /// Identifier of a role in the hierarchy.
    RoleId
);
uuid_identifier!(
    /// Identifier of a person, the principal of permission checks.
    PersonId
);
uuid_identifier!(
    /// Identifier of a group of people.
    GroupId
);
uuid_identifier!(
    /// Identifier of a physical location.
    LocationId
);
uuid_identifier!(
    /// Identifier of any managed object (device, network, document, ...).
    ObjectId
);
uuid_identifier!(
    /// Identifier of a role assignment.
    AssignmentId
);
uuid_identifier!(
    /// Identifier of an object permission override.
    ObjectPermissionId
);
uuid_identifier!(
    /// Identifier of a user account.
    UserId
);
