use sqlx::PgPool;

use crate::crypto;
use crate::error::AppError;
use crate::models::{
    AwsCredentials, AzureCredentials, CloudAccount, Credentials, GcpCredentials,
    NewCloudAccount, Provider,
};

/// Storage shape: one nullable column per credential field, secrets sealed.
#[derive(Debug, sqlx::FromRow)]
struct CloudAccountRow {
    account_id: i64,
    user_id: i64,
    provider: String,
    region: Option<String>,
    additional_information: Option<String>,
    access_key: Option<String>,
    secret_key: Option<Vec<u8>>,
    client_email: Option<String>,
    private_key: Option<Vec<u8>>,
    project_id: Option<String>,
    client_id: Option<String>,
    client_secret: Option<Vec<u8>>,
    tenant_id: Option<String>,
    subscription_id: Option<String>,
}

const COLUMNS: &str = "account_id, user_id, provider, region, additional_information, \
    access_key, secret_key, client_email, private_key, project_id, \
    client_id, client_secret, tenant_id, subscription_id";

#[derive(Debug)]
pub enum StoreError {
    Db(sqlx::Error),
    Crypto(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Db(e) => write!(f, "{e}"),
            StoreError::Crypto(e) => write!(f, "credential decode failed: {e}"),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Db(e)
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Db(e) => AppError::Database(e),
            StoreError::Crypto(e) => AppError::Internal(format!("credential decode failed: {e}")),
        }
    }
}

fn column<T>(value: Option<T>, name: &str) -> Result<T, String> {
    value.ok_or_else(|| format!("column {name} is null"))
}

fn open(sealed: Option<Vec<u8>>, name: &str, key: &str) -> Result<String, String> {
    crypto::decrypt(&column(sealed, name)?, key)
}

impl CloudAccountRow {
    fn into_account(self, key: &str) -> Result<CloudAccount, String> {
        let provider: Provider = self.provider.parse()?;
        let credentials = match provider {
            Provider::Aws => Credentials::Aws(AwsCredentials {
                access_key: column(self.access_key, "access_key")?,
                secret_key: open(self.secret_key, "secret_key", key)?,
            }),
            Provider::Gcp => Credentials::Gcp(GcpCredentials {
                client_email: column(self.client_email, "client_email")?,
                private_key: open(self.private_key, "private_key", key)?,
                project_id: column(self.project_id, "project_id")?,
            }),
            Provider::Azure => Credentials::Azure(AzureCredentials {
                client_id: column(self.client_id, "client_id")?,
                client_secret: open(self.client_secret, "client_secret", key)?,
                tenant_id: column(self.tenant_id, "tenant_id")?,
                subscription_id: column(self.subscription_id, "subscription_id")?,
            }),
        };

        Ok(CloudAccount {
            account_id: self.account_id,
            user_id: self.user_id,
            provider,
            region: self.region,
            additional_information: self.additional_information,
            credentials,
        })
    }
}

/// A stored account whose credentials could not be read back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnreadableAccount {
    pub account_id: i64,
    pub provider: Provider,
    pub reason: String,
}

/// A user's accounts, split by whether their credentials decoded.
#[derive(Debug, Default)]
pub struct AccountListing {
    pub accounts: Vec<CloudAccount>,
    pub unreadable: Vec<UnreadableAccount>,
}

/// Decode row by row so one damaged account cannot hide the others.
fn decode_all(rows: Vec<CloudAccountRow>, key: &str) -> AccountListing {
    let mut listing = AccountListing::default();
    for row in rows {
        let account_id = row.account_id;
        let provider = match row.provider.parse::<Provider>() {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!("Skipping account {account_id}: {e}");
                continue;
            }
        };
        match row.into_account(key) {
            Ok(account) => listing.accounts.push(account),
            Err(reason) => {
                tracing::warn!("Account {account_id} credentials unreadable: {reason}");
                listing.unreadable.push(UnreadableAccount {
                    account_id,
                    provider,
                    reason,
                });
            }
        }
    }
    listing
}

pub async fn insert(
    pool: &PgPool,
    user_id: i64,
    account: &NewCloudAccount,
    key: &str,
) -> Result<CloudAccount, StoreError> {
    let seal = |s: &str| crypto::encrypt(s, key).map_err(StoreError::Crypto);

    let mut access_key = None;
    let mut secret_key = None;
    let mut client_email = None;
    let mut private_key = None;
    let mut project_id = None;
    let mut client_id = None;
    let mut client_secret = None;
    let mut tenant_id = None;
    let mut subscription_id = None;

    match &account.credentials {
        Credentials::Aws(c) => {
            access_key = Some(c.access_key.as_str());
            secret_key = Some(seal(&c.secret_key)?);
        }
        Credentials::Gcp(c) => {
            client_email = Some(c.client_email.as_str());
            private_key = Some(seal(&c.private_key)?);
            project_id = Some(c.project_id.as_str());
        }
        Credentials::Azure(c) => {
            client_id = Some(c.client_id.as_str());
            client_secret = Some(seal(&c.client_secret)?);
            tenant_id = Some(c.tenant_id.as_str());
            subscription_id = Some(c.subscription_id.as_str());
        }
    }

    let row = sqlx::query_as::<_, CloudAccountRow>(&format!(
        "INSERT INTO cloud_accounts (user_id, provider, region, additional_information,
            access_key, secret_key, client_email, private_key, project_id,
            client_id, client_secret, tenant_id, subscription_id)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
         RETURNING {COLUMNS}"
    ))
    .bind(user_id)
    .bind(account.provider.as_str())
    .bind(account.region.as_deref())
    .bind(account.additional_information.as_deref())
    .bind(access_key)
    .bind(secret_key)
    .bind(client_email)
    .bind(private_key)
    .bind(project_id)
    .bind(client_id)
    .bind(client_secret)
    .bind(tenant_id)
    .bind(subscription_id)
    .fetch_one(pool)
    .await?;

    row.into_account(key).map_err(StoreError::Crypto)
}

pub async fn list_for_user(
    pool: &PgPool,
    user_id: i64,
    key: &str,
) -> Result<AccountListing, StoreError> {
    let rows = sqlx::query_as::<_, CloudAccountRow>(&format!(
        "SELECT {COLUMNS} FROM cloud_accounts WHERE user_id = $1 ORDER BY account_id"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(decode_all(rows, key))
}

/// Look up an account only if `user_id` owns it.
pub async fn find_for_user(
    pool: &PgPool,
    user_id: i64,
    account_id: i64,
    key: &str,
) -> Result<Option<CloudAccount>, StoreError> {
    let row = sqlx::query_as::<_, CloudAccountRow>(&format!(
        "SELECT {COLUMNS} FROM cloud_accounts WHERE user_id = $1 AND account_id = $2"
    ))
    .bind(user_id)
    .bind(account_id)
    .fetch_optional(pool)
    .await?;

    row.map(|r| r.into_account(key).map_err(StoreError::Crypto))
        .transpose()
}
