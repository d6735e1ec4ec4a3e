use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppError;

/// Coarse account role carried by an authenticated session.
///
/// Ordered from least to most privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Regular account.
    User,
    /// Administrator.
    Admin,
    /// Administrator with access to every section.
    SuperAdmin,
}

impl UserRole {
    /// Returns a stable storage value for this role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
            Self::SuperAdmin => "super_admin",
        }
    }

    /// Returns whether this role meets or exceeds `minimum`.
    #[must_use]
    pub fn satisfies(self, minimum: Self) -> bool {
        self >= minimum
    }
}

impl FromStr for UserRole {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            "super_admin" => Ok(Self::SuperAdmin),
            _ => Err(AppError::Validation(format!(
                "unknown user role '{value}'"
            ))),
        }
    }
}

/// Authenticated interactive session supplied by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    user_id: Uuid,
    person_id: Option<Uuid>,
    display_name: String,
    email: Option<String>,
    role: UserRole,
}

impl Session {
    /// Creates a session from identity provider data.
    #[must_use]
    pub fn new(
        user_id: Uuid,
        person_id: Option<Uuid>,
        display_name: impl Into<String>,
        email: Option<String>,
        role: UserRole,
    ) -> Self {
        Self {
            user_id,
            person_id,
            display_name: display_name.into(),
            email,
            role,
        }
    }

    /// Returns the account identifier.
    #[must_use]
    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    /// Returns the person record linked to the account, if any.
    #[must_use]
    pub fn person_id(&self) -> Option<Uuid> {
        self.person_id
    }

    /// Returns the display name for the current user.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.display_name.as_str()
    }

    /// Returns the email, if the provider returned one.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    /// Returns the coarse account role.
    #[must_use]
    pub fn role(&self) -> UserRole {
        self.role
    }
}

/// Authentication context resolved from a bearer API token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    token_id: Uuid,
    user_id: Uuid,
    scopes: Vec<String>,
    role: UserRole,
}

impl AuthContext {
    /// Creates a token authentication context.
    #[must_use]
    pub fn new(token_id: Uuid, user_id: Uuid, scopes: Vec<String>, role: UserRole) -> Self {
        Self {
            token_id,
            user_id,
            scopes,
            role,
        }
    }

    /// Returns the token identifier.
    #[must_use]
    pub fn token_id(&self) -> Uuid {
        self.token_id
    }

    /// Returns the account owning the token.
    #[must_use]
    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    /// Returns the scopes granted to the token.
    #[must_use]
    pub fn scopes(&self) -> &[String] {
        self.scopes.as_slice()
    }

    /// Returns the coarse role of the token owner.
    #[must_use]
    pub fn role(&self) -> UserRole {
        self.role
    }

    /// Returns whether the token holds at least one of `required`.
    #[must_use]
    pub fn has_any_scope(&self, required: &[&str]) -> bool {
        required
            .iter()
            .any(|scope| self.scopes.iter().any(|held| held == scope))
    }
}
