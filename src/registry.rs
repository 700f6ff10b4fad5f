//! Account registry: the user -> cloud accounts relation.

use sqlx::PgPool;

use crate::db;
use crate::error::AppError;
use crate::models::{CloudAccount, CloudAccountInput};

pub use crate::db::cloud_accounts::AccountListing;

/// Accounts owned by `user_id`, in creation order. Accounts whose stored
/// credentials no longer decode are listed apart instead of failing the call.
pub async fn get_accounts_for_user(
    pool: &PgPool,
    user_id: i64,
    encryption_key: &str,
) -> Result<AccountListing, AppError> {
    Ok(db::cloud_accounts::list_for_user(pool, user_id, encryption_key).await?)
}

/// Validate and store an account for the session owner. A `UserID` in the input
/// must agree with the session.
pub async fn add_cloud_account(
    pool: &PgPool,
    owner_id: i64,
    input: CloudAccountInput,
    encryption_key: &str,
) -> Result<CloudAccount, AppError> {
    if let Some(claimed) = input.user_id {
        if claimed != owner_id {
            return Err(AppError::Forbidden(
                "Cannot add an account for another user".to_string(),
            ));
        }
    }

    let new = input.validate()?;
    let account = db::cloud_accounts::insert(pool, owner_id, &new, encryption_key).await?;

    tracing::info!(
        "User {owner_id} added {} account {}",
        account.provider,
        account.account_id
    );
    Ok(account)
}
