use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use tracing::warn;

use super::{claims::Claims, errors::AuthError};
use crate::state::AppState;

/// Extracts and validates the bearer token, yielding its claims.
pub struct AuthUser(pub Claims);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or(AuthError::TokenInvalidSignature)?;

        // Expect "Bearer <token>"
        let token = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .ok_or(AuthError::TokenInvalidSignature)?;

        let claims = state.auth.tokens().validate(token).map_err(|e| {
            warn!(error = %e, "bearer token rejected");
            AuthError::from(e)
        })?;

        Ok(AuthUser(claims))
    }
}
