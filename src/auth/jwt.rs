use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Sessions are valid for exactly one hour after issue.
pub const SESSION_TTL_SECS: i64 = 60 * 60;

/// Session claims carried in the signed token. Not persisted server-side.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    #[serde(rename = "userID")]
    pub user_id: i64,
    pub username: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn new(user_id: i64, username: String) -> Self {
        Self::issued_at(user_id, username, Utc::now().timestamp())
    }

    pub fn issued_at(user_id: i64, username: String, issued_at: i64) -> Self {
        Self {
            user_id,
            username,
            iat: issued_at,
            exp: issued_at + Duration::seconds(SESSION_TTL_SECS).num_seconds(),
        }
    }
}

pub fn encode_token(claims: &Claims, secret: &str) -> Result<String, String> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| format!("JWT encode failed: {e}"))
}

/// Verify the signature and shape of a token. Expiry is left to the caller so it
/// can be checked against an explicit clock without leeway.
pub fn decode_token(token: &str, secret: &str) -> Result<Claims, String> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    validation.leeway = 0;
    validation.set_required_spec_claims(&["exp"]);

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| format!("JWT decode failed: {e}"))
}
