use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Provider {
    #[serde(rename = "AWS", alias = "aws")]
    Aws,
    #[serde(rename = "GCP", alias = "gcp")]
    Gcp,
    #[serde(rename = "AZURE", alias = "Azure", alias = "azure")]
    Azure,
}

impl Provider {
    /// Partition order used when merging aggregated results.
    pub const ALL: [Provider; 3] = [Provider::Aws, Provider::Gcp, Provider::Azure];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Aws => "AWS",
            Provider::Gcp => "GCP",
            Provider::Azure => "AZURE",
        }
    }

    /// Lowercase segment used in collaborator URLs (`/aws/s3/listBuckets`).
    pub fn path_segment(&self) -> &'static str {
        match self {
            Provider::Aws => "aws",
            Provider::Gcp => "gcp",
            Provider::Azure => "azure",
        }
    }

    /// Segment the link service routes OAuth under (`/auth/google/login`).
    pub fn link_segment(&self) -> &'static str {
        match self {
            Provider::Aws => "aws",
            Provider::Gcp => "google",
            Provider::Azure => "azure",
        }
    }

    /// Providers whose APIs need a live OAuth session on top of stored credentials.
    pub fn requires_redirect(&self) -> bool {
        matches!(self, Provider::Gcp | Provider::Azure)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AWS" => Ok(Provider::Aws),
            "GCP" => Ok(Provider::Gcp),
            "AZURE" => Ok(Provider::Azure),
            other => Err(format!("unknown provider '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AwsCredentials {
    #[serde(rename = "AccessKey")]
    pub access_key: String,
    #[serde(rename = "SecretKey")]
    pub secret_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GcpCredentials {
    #[serde(rename = "ClientEmail")]
    pub client_email: String,
    #[serde(rename = "PrivateKey")]
    pub private_key: String,
    #[serde(rename = "ProjectID")]
    pub project_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AzureCredentials {
    #[serde(rename = "ClientID")]
    pub client_id: String,
    #[serde(rename = "ClientSecret")]
    pub client_secret: String,
    #[serde(rename = "TenantID")]
    pub tenant_id: String,
    #[serde(rename = "SubscriptionID")]
    pub subscription_id: String,
}

/// Exactly one credential variant per account. Serialized flat, so fields of the
/// other variants never appear on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Credentials {
    Aws(AwsCredentials),
    Gcp(GcpCredentials),
    Azure(AzureCredentials),
}

impl Credentials {
    pub fn provider(&self) -> Provider {
        match self {
            Credentials::Aws(_) => Provider::Aws,
            Credentials::Gcp(_) => Provider::Gcp,
            Credentials::Azure(_) => Provider::Azure,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CloudAccount {
    #[serde(rename = "AccountID")]
    pub account_id: i64,
    #[serde(rename = "UserID")]
    pub user_id: i64,
    #[serde(rename = "CloudProvider")]
    pub provider: Provider,
    #[serde(rename = "Region", skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(
        rename = "AdditionalInformation",
        skip_serializing_if = "Option::is_none"
    )]
    pub additional_information: Option<String>,
    #[serde(flatten)]
    pub credentials: Credentials,
}

/// Loosely-typed account payload as submitted by the UI.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CloudAccountInput {
    #[serde(rename = "UserID")]
    pub user_id: Option<i64>,
    #[serde(rename = "CloudProvider")]
    pub provider: Option<String>,
    #[serde(rename = "Region")]
    pub region: Option<String>,
    #[serde(rename = "AdditionalInformation")]
    pub additional_information: Option<String>,
    #[serde(rename = "AccessKey")]
    pub access_key: Option<String>,
    #[serde(rename = "SecretKey")]
    pub secret_key: Option<String>,
    #[serde(rename = "ClientEmail")]
    pub client_email: Option<String>,
    #[serde(rename = "PrivateKey")]
    pub private_key: Option<String>,
    #[serde(rename = "ProjectID")]
    pub project_id: Option<String>,
    #[serde(rename = "ClientID")]
    pub client_id: Option<String>,
    #[serde(rename = "ClientSecret")]
    pub client_secret: Option<String>,
    #[serde(rename = "TenantID")]
    pub tenant_id: Option<String>,
    #[serde(rename = "SubscriptionID")]
    pub subscription_id: Option<String>,
}

/// A validated account ready to be persisted for the session owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCloudAccount {
    pub provider: Provider,
    pub region: Option<String>,
    pub additional_information: Option<String>,
    pub credentials: Credentials,
}

impl CloudAccountInput {
    /// Check that the submitted credential fields match the declared provider.
    pub fn validate(self) -> Result<NewCloudAccount, AppError> {
        let provider: Provider = self
            .provider
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| AppError::validation("CloudProvider", "is required"))?
            .parse::<Provider>()
            .map_err(|e| AppError::validation("CloudProvider", e))?;

        let foreign: Vec<(&str, &Option<String>)> = match provider {
            Provider::Aws => vec![
                ("ClientEmail", &self.client_email),
                ("PrivateKey", &self.private_key),
                ("ProjectID", &self.project_id),
                ("ClientID", &self.client_id),
                ("ClientSecret", &self.client_secret),
                ("TenantID", &self.tenant_id),
                ("SubscriptionID", &self.subscription_id),
            ],
            Provider::Gcp => vec![
                ("AccessKey", &self.access_key),
                ("SecretKey", &self.secret_key),
                ("ClientID", &self.client_id),
                ("ClientSecret", &self.client_secret),
                ("TenantID", &self.tenant_id),
                ("SubscriptionID", &self.subscription_id),
            ],
            Provider::Azure => vec![
                ("AccessKey", &self.access_key),
                ("SecretKey", &self.secret_key),
                ("ClientEmail", &self.client_email),
                ("PrivateKey", &self.private_key),
                ("ProjectID", &self.project_id),
            ],
        };

        for (field, value) in foreign {
            if value.as_deref().is_some_and(|v| !v.trim().is_empty()) {
                return Err(AppError::validation(
                    field,
                    format!("is not valid for {provider} accounts"),
                ));
            }
        }

        let credentials = match provider {
            Provider::Aws => {
                required("Region", &self.region)?;
                Credentials::Aws(AwsCredentials {
                    access_key: required("AccessKey", &self.access_key)?,
                    secret_key: required("SecretKey", &self.secret_key)?,
                })
            }
            Provider::Gcp => Credentials::Gcp(GcpCredentials {
                client_email: required("ClientEmail", &self.client_email)?,
                private_key: required("PrivateKey", &self.private_key)?,
                project_id: required("ProjectID", &self.project_id)?,
            }),
            Provider::Azure => Credentials::Azure(AzureCredentials {
                client_id: required("ClientID", &self.client_id)?,
                client_secret: required("ClientSecret", &self.client_secret)?,
                tenant_id: required("TenantID", &self.tenant_id)?,
                subscription_id: required("SubscriptionID", &self.subscription_id)?,
            }),
        };

        Ok(NewCloudAccount {
            provider,
            region: self.region.filter(|r| !r.trim().is_empty()),
            additional_information: self.additional_information,
            credentials,
        })
    }
}

fn required(field: &str, value: &Option<String>) -> Result<String, AppError> {
    match value.as_deref() {
        Some(v) if !v.trim().is_empty() => Ok(v.to_string()),
        _ => Err(AppError::validation(field, "is required")),
    }
}
