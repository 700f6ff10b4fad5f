use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::auth::gate::{self, Identity};
use crate::error::AppError;
use crate::state::SharedState;

/// Caller identity for the REST routes. Every REST route is non-exempt.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i64,
    pub username: String,
}

impl From<Identity> for AuthUser {
    fn from(identity: Identity) -> Self {
        AuthUser {
            user_id: identity.user_id,
            username: identity.username,
        }
    }
}

/// Raw token from the `Authorization` header, if any.
pub fn bearer_token(parts: &Parts) -> Result<Option<&str>, AppError> {
    let Some(header) = parts.headers.get("authorization") else {
        return Ok(None);
    };
    let value = header
        .to_str()
        .map_err(|_| AppError::Unauthorized("Invalid authorization header".to_string()))?;
    Ok(gate::token_from_header(value))
}

impl FromRequestParts<SharedState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?.ok_or_else(|| {
            AppError::Unauthorized("Missing authentication token".to_string())
        })?;

        gate::authenticate(token, &state.config.jwt_secret).map(AuthUser::from)
    }
}

/// Optional token for the operation endpoint, where the gate decides per operation.
#[derive(Debug, Clone)]
pub struct MaybeToken(pub Option<String>);

impl FromRequestParts<SharedState> for MaybeToken {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybeToken(optional_token(parts)))
    }
}

/// An unreadable header counts as no token; the gate rejects non-exempt operations.
fn optional_token(parts: &Parts) -> Option<String> {
    bearer_token(parts).ok().flatten().map(str::to_string)
}
