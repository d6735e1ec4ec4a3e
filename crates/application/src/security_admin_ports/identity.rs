use async_trait::async_trait;
use moss_core::{AppResult, AuthContext, Session};

/// Port supplying the authenticated caller of the current request.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Returns the interactive session, if the caller is signed in.
    async fn current_session(&self) -> AppResult<Option<Session>>;

    /// Returns the bearer token context, if the caller presented a valid token.
    async fn current_api_context(&self) -> AppResult<Option<AuthContext>>;
}
