use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::models::LinkSessionRow;

pub async fn find(pool: &PgPool, account_id: i64) -> Result<Option<LinkSessionRow>, sqlx::Error> {
    sqlx::query_as::<_, LinkSessionRow>("SELECT * FROM link_sessions WHERE account_id = $1")
        .bind(account_id)
        .fetch_optional(pool)
        .await
}

/// Record a pending redirect. Replaces whatever session the account had.
pub async fn upsert_pending(
    pool: &PgPool,
    account_id: i64,
    oauth_state: &str,
    redirect_url: &str,
) -> Result<LinkSessionRow, sqlx::Error> {
    sqlx::query_as::<_, LinkSessionRow>(
        "INSERT INTO link_sessions (account_id, status, oauth_state, redirect_url)
         VALUES ($1, 'pending_redirect', $2, $3)
         ON CONFLICT (account_id) DO UPDATE SET
           status = 'pending_redirect',
           oauth_state = EXCLUDED.oauth_state,
           redirect_url = EXCLUDED.redirect_url,
           access_token = NULL,
           expires_at = NULL,
           failure_reason = NULL,
           updated_at = now()
         RETURNING *",
    )
    .bind(account_id)
    .bind(oauth_state)
    .bind(redirect_url)
    .fetch_one(pool)
    .await
}

pub async fn mark_authenticated(
    pool: &PgPool,
    account_id: i64,
    access_token_enc: &[u8],
    expires_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE link_sessions SET
           status = 'authenticated',
           oauth_state = NULL,
           redirect_url = NULL,
           access_token = $2,
           expires_at = $3,
           failure_reason = NULL,
           updated_at = now()
         WHERE account_id = $1",
    )
    .bind(account_id)
    .bind(access_token_enc)
    .bind(expires_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn mark_failed(pool: &PgPool, account_id: i64, reason: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO link_sessions (account_id, status, failure_reason)
         VALUES ($1, 'failed', $2)
         ON CONFLICT (account_id) DO UPDATE SET
           status = 'failed',
           oauth_state = NULL,
           redirect_url = NULL,
           access_token = NULL,
           expires_at = NULL,
           failure_reason = EXCLUDED.failure_reason,
           updated_at = now()",
    )
    .bind(account_id)
    .bind(reason)
    .execute(pool)
    .await?;
    Ok(())
}

/// Drop the cached session, returning the account to `unlinked`.
pub async fn reset(pool: &PgPool, account_id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM link_sessions WHERE account_id = $1")
        .bind(account_id)
        .execute(pool)
        .await?;
    Ok(())
}
