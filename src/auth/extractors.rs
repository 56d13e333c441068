use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::warn;

use super::{jwt::TokenService, repo::UserStore, repo_types::User};
use crate::{
    error::{AppError, AuthError},
    state::AppState,
};

/// The authenticated principal for the rest of the request.
pub struct AuthUser(pub User);

/// Drops whitespace and stray quotes a client may wrap around the token.
pub fn normalize_token(raw: &str) -> &str {
    raw.trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim()
}

/// Verifies a bearer token and loads the user it names. Reads only.
pub async fn authenticate(
    raw_token: &str,
    tokens: &TokenService,
    users: &dyn UserStore,
) -> Result<User, AppError> {
    let token = normalize_token(raw_token);
    if token.is_empty() {
        return Err(AuthError::MissingToken.into());
    }

    let user_id = tokens.verify(token).map_err(|e| {
        warn!(kind = e.code(), "token rejected");
        e
    })?;

    match users.find_by_id(user_id).await? {
        Some(user) => Ok(user),
        None => {
            warn!(%user_id, "token subject no longer exists");
            Err(AuthError::UserNotFound.into())
        }
    }
}

/// Pulls the token out of `Authorization: Bearer <token>`.
fn bearer_token(parts: &Parts) -> Result<&str, AuthError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(AuthError::MissingToken)?;

    let (scheme, token) = header
        .trim()
        .split_once(' ')
        .ok_or(AuthError::Malformed)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::Malformed);
    }
    Ok(token)
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let user = authenticate(token, &state.tokens, state.users.as_ref()).await?;
        Ok(AuthUser(user))
    }
}
