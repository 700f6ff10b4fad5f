use chrono::{DateTime, Utc};

/// Persisted OAuth session state for one GCP/Azure account.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LinkSessionRow {
    pub account_id: i64,
    pub status: String,
    pub oauth_state: Option<String>,
    pub redirect_url: Option<String>,
    pub access_token: Option<Vec<u8>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub updated_at: DateTime<Utc>,
}
