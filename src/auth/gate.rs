//! Bearer-token gate shared by the operation endpoint and the REST extractor.

use chrono::Utc;

use crate::auth::jwt;
use crate::error::AppError;

/// Operations that bypass the token check unconditionally.
pub const EXEMPT_OPERATIONS: [&str; 5] = [
    "IntrospectionQuery",
    "AddCloudAccount",
    "Login",
    "Signup",
    "ChangePwd",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: i64,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// Exempt operation. Carries the caller's identity if a valid token was sent anyway.
    Exempt(Option<Identity>),
    Authenticated(Identity),
}

impl Access {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Access::Exempt(identity) => identity.as_ref(),
            Access::Authenticated(identity) => Some(identity),
        }
    }

    /// The identity, or `Unauthorized` for anonymous calls to exempt operations.
    pub fn require_identity(&self) -> Result<&Identity, AppError> {
        self.identity()
            .ok_or_else(|| AppError::Unauthorized("User is not authenticated".to_string()))
    }
}

pub fn is_exempt(operation: &str) -> bool {
    EXEMPT_OPERATIONS.contains(&operation)
}

/// Accepts both `Authorization: <token>` and `Authorization: Bearer <token>`.
pub fn token_from_header(value: &str) -> Option<&str> {
    let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();
    if token.is_empty() { None } else { Some(token) }
}

pub fn authorize(
    token: Option<&str>,
    operation: &str,
    secret: &str,
) -> Result<Access, AppError> {
    authorize_at(token, operation, secret, Utc::now().timestamp())
}

/// Same as [`authorize`] with an explicit clock (unix seconds).
pub fn authorize_at(
    token: Option<&str>,
    operation: &str,
    secret: &str,
    now: i64,
) -> Result<Access, AppError> {
    if is_exempt(operation) {
        let identity = token.and_then(|t| authenticate_at(t, secret, now).ok());
        return Ok(Access::Exempt(identity));
    }

    let token = token.ok_or_else(|| {
        tracing::debug!("Rejected {operation}: missing token");
        AppError::Unauthorized("User is not authenticated".to_string())
    })?;

    authenticate_at(token, secret, now).map(Access::Authenticated)
}

/// Verify a token against the current clock.
pub fn authenticate(token: &str, secret: &str) -> Result<Identity, AppError> {
    authenticate_at(token, secret, Utc::now().timestamp())
}

/// Verify a token for a non-exempt operation.
pub fn authenticate_at(token: &str, secret: &str, now: i64) -> Result<Identity, AppError> {
    let claims = jwt::decode_token(token, secret).map_err(|e| {
        tracing::debug!("Token rejected: {e}");
        AppError::Unauthorized("Invalid or expired token".to_string())
    })?;

    if now >= claims.exp {
        return Err(AppError::Unauthorized("Invalid or expired token".to_string()));
    }

    Ok(Identity {
        user_id: claims.user_id,
        username: claims.username,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{encode_token, Claims, SESSION_TTL_SECS};

    const SECRET: &str = "gate-test-secret-long-enough";
    const ISSUED: i64 = 1_700_000_000;

    fn token() -> String {
        encode_token(&Claims::issued_at(42, "ada".to_string(), ISSUED), SECRET).unwrap()
    }

    fn is_unauthorized(result: Result<Access, AppError>) -> bool {
        matches!(result, Err(AppError::Unauthorized(_)))
    }

    #[test]
    fn valid_token_yields_identity() {
        let access = authorize_at(Some(&token()), "CloudAccount", SECRET, ISSUED).unwrap();
        assert_eq!(
            access,
            Access::Authenticated(Identity {
                user_id: 42,
                username: "ada".to_string()
            })
        );
    }

    #[test]
    fn token_valid_until_one_hour_exclusive() {
        let t = token();
        let last_valid = ISSUED + SESSION_TTL_SECS - 1;
        assert!(authorize_at(Some(&t), "CloudAccount", SECRET, last_valid).is_ok());
        assert!(is_unauthorized(authorize_at(
            Some(&t),
            "CloudAccount",
            SECRET,
            ISSUED + SESSION_TTL_SECS
        )));
        assert!(is_unauthorized(authorize_at(
            Some(&t),
            "CloudAccount",
            SECRET,
            ISSUED + 2 * SESSION_TTL_SECS
        )));
    }

    #[test]
    fn exempt_operation_without_token_succeeds() {
        let access = authorize_at(None, "Login", SECRET, ISSUED).unwrap();
        assert_eq!(access, Access::Exempt(None));
    }

    #[test]
    fn exempt_operation_ignores_bad_token() {
        let access = authorize_at(Some("garbage"), "Signup", SECRET, ISSUED).unwrap();
        assert_eq!(access, Access::Exempt(None));
        assert!(access.require_identity().is_err());
    }

    #[test]
    fn exempt_operation_keeps_identity_of_valid_token() {
        let access = authorize_at(Some(&token()), "AddCloudAccount", SECRET, ISSUED).unwrap();
        assert_eq!(access.require_identity().unwrap().user_id, 42);
    }

    #[test]
    fn missing_token_rejected_for_non_exempt() {
        assert!(is_unauthorized(authorize_at(None, "CloudAccount", SECRET, ISSUED)));
    }

    #[test]
    fn malformed_token_rejected() {
        assert!(is_unauthorized(authorize_at(
            Some("not.a.jwt"),
            "User",
            SECRET,
            ISSUED
        )));
    }

    #[test]
    fn token_signed_with_other_key_rejected() {
        let forged =
            encode_token(&Claims::issued_at(42, "ada".to_string(), ISSUED), "another-secret-key")
                .unwrap();
        assert!(is_unauthorized(authorize_at(
            Some(&forged),
            "User",
            SECRET,
            ISSUED
        )));
    }

    #[test]
    fn operation_names_are_case_sensitive() {
        assert!(is_exempt("Login"));
        assert!(!is_exempt("login"));
        assert!(!is_exempt("CloudAccount"));
    }

    #[test]
    fn header_accepts_raw_and_bearer_tokens() {
        assert_eq!(token_from_header("abc"), Some("abc"));
        assert_eq!(token_from_header("Bearer abc"), Some("abc"));
        assert_eq!(token_from_header("Bearer "), None);
        assert_eq!(token_from_header(""), None);
    }
}
