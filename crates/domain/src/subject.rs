use moss_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{GroupId, PersonId};

/// Holder of an assignment or override: exactly one person or one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Subject {
    /// A single person.
    Person(PersonId),
    /// Every member of a group.
    Group(GroupId),
}

impl Subject {
    /// Builds a subject from the nullable column pair used by storage and
    /// transport layers, rejecting rows that set both or neither.
    pub fn from_parts(person_id: Option<Uuid>, group_id: Option<Uuid>) -> AppResult<Self> {
        match (person_id, group_id) {
            (Some(person_id), None) => Ok(Self::Person(PersonId::from_uuid(person_id))),
            (None, Some(group_id)) => Ok(Self::Group(GroupId::from_uuid(group_id))),
            (Some(_), Some(_)) => Err(AppError::Validation(
                "subject cannot be both a person and a group".to_owned(),
            )),
            (None, None) => Err(AppError::Validation(
                "subject must be either a person or a group".to_owned(),
            )),
        }
    }

    /// Splits the subject into the nullable `(person_id, group_id)` column pair.
    #[must_use]
    pub fn to_parts(&self) -> (Option<Uuid>, Option<Uuid>) {
        match self {
            Self::Person(person_id) => (Some(person_id.as_uuid()), None),
            Self::Group(group_id) => (None, Some(group_id.as_uuid())),
        }
    }

    /// Returns the person when the subject is a person.
    #[must_use]
    pub fn person_id(&self) -> Option<PersonId> {
        match self {
            Self::Person(person_id) => Some(*person_id),
            Self::Group(_) => None,
        }
    }

    /// Returns the group when the subject is a group.
    #[must_use]
    pub fn group_id(&self) -> Option<GroupId> {
        match self {
            Self::Person(_) => None,
            Self::Group(group_id) => Some(*group_id),
        }
    }
}

impl std::fmt::Display for Subject {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Person(person_id) => write!(formatter, "person:{person_id}"),
            Self::Group(group_id) => write!(formatter, "group:{group_id}"),
        }
    }
}
