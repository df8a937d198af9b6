use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::debug;

use super::session::AuthContext;
use crate::{
    error::{AuthError, Unauthorized},
    state::AppState,
};

/// Bearer-token guard yielding the caller's [`AuthContext`].
pub struct AuthUser(pub AuthContext);

fn bearer_token(parts: &Parts) -> Option<&str> {
    let auth = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    auth.strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = Unauthorized;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(|| {
            debug!("missing or malformed Authorization header");
            Unauthorized(AuthError::InvalidToken)
        })?;

        state
            .sessions
            .authenticate(token)
            .await
            .map(AuthUser)
            .map_err(Unauthorized)
    }
}
