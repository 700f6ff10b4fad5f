use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct User {
    #[serde(rename = "UserID")]
    pub user_id: i64,
    #[serde(rename = "Username")]
    pub username: String,
    #[serde(rename = "Email")]
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(rename = "RolePermissionLevel")]
    pub role: String,
    #[serde(skip_serializing)]
    pub created_at: DateTime<Utc>,
}
