use std::sync::Arc;

use moss_core::{AppError, AppResult, AuthContext, Session, UserRole};

use crate::IdentityProvider;

/// Coarse session and API-token gate in front of administrative operations.
#[derive(Clone)]
pub struct AccessGuard {
    identity: Arc<dyn IdentityProvider>,
}

impl AccessGuard {
    /// Creates a guard over the identity provider.
    #[must_use]
    pub fn new(identity: Arc<dyn IdentityProvider>) -> Self {
        Self { identity }
    }

    /// Returns the current session when its role meets the minimum.
    pub async fn require_role(&self, minimum: UserRole) -> AppResult<Session> {
        let session = self
            .identity
            .current_session()
            .await?
            .ok_or_else(|| AppError::Unauthorized("authentication required".to_owned()))?;

        authorize_session(&session, minimum)?;
        Ok(session)
    }

    /// Returns the current API token context when it holds any of the scopes.
    pub async fn require_api_scope(&self, scopes: &[&str]) -> AppResult<AuthContext> {
        let context = self
            .identity
            .current_api_context()
            .await?
            .ok_or_else(|| AppError::Unauthorized("api token required".to_owned()))?;

        if !context.has_any_scope(scopes) {
            return Err(AppError::Forbidden(format!(
                "api token is missing required scope: {}",
                scopes.join(" or ")
            )));
        }

        Ok(context)
    }
}

/// Fails with `Forbidden` when the session role is below the minimum.
pub fn authorize_session(session: &Session, minimum: UserRole) -> AppResult<()> {
    if session.role().satisfies(minimum) {
        return Ok(());
    }

    Err(AppError::Forbidden(format!(
        "role '{}' is required, session has '{}'",
        minimum.as_str(),
        session.role().as_str()
    )))
}
