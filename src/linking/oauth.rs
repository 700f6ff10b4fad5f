use std::time::Duration;

use reqwest::header::LOCATION;
use serde::Deserialize;
use serde_json::json;

use crate::models::Provider;

/// Outcome of talking to the link service. Rejections are terminal for the
/// attempt; transport failures leave the stored state untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkError {
    Rejected(String),
    Transport(String),
}

impl std::fmt::Display for LinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkError::Rejected(msg) => write!(f, "link service rejected the request: {msg}"),
            LinkError::Transport(msg) => write!(f, "link service unreachable: {msg}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenGrant {
    #[serde(rename = "accessToken")]
    pub access_token: String,
    #[serde(rename = "expiresIn", default)]
    pub expires_in: Option<u64>,
}

#[derive(Deserialize)]
struct LoginStart {
    #[serde(rename = "redirectURL", alias = "redirectUrl", alias = "url")]
    redirect_url: String,
}

/// Client for the OAuth link service (`/auth/{provider}/login|callback`).
#[derive(Clone)]
pub struct LinkService {
    client: reqwest::Client,
    base_url: String,
}

impl LinkService {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {e}"))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, provider: Provider, step: &str) -> String {
        format!("{}/auth/{}/{step}", self.base_url, provider.link_segment())
    }

    /// Server-initiated login start. Returns the provider consent URL.
    pub async fn start_login(
        &self,
        provider: Provider,
        account_id: i64,
        state: &str,
    ) -> Result<String, LinkError> {
        let resp = self
            .client
            .post(self.url(provider, "login"))
            .json(&json!({ "accountID": account_id, "state": state }))
            .send()
            .await
            .map_err(|e| LinkError::Transport(e.to_string()))?;

        let status = resp.status();
        if status.is_redirection() {
            return resp
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
                .ok_or_else(|| LinkError::Rejected("redirect without Location".to_string()));
        }

        if !status.is_success() {
            return Err(LinkError::Rejected(format!("login start returned {status}")));
        }

        resp.json::<LoginStart>()
            .await
            .map(|body| body.redirect_url)
            .map_err(|e| LinkError::Rejected(format!("login start response unreadable: {e}")))
    }

    /// Exchange the callback code for an access token.
    pub async fn exchange(
        &self,
        provider: Provider,
        account_id: i64,
        code: &str,
        state: &str,
    ) -> Result<TokenGrant, LinkError> {
        let resp = self
            .client
            .post(self.url(provider, "callback"))
            .json(&json!({ "accountID": account_id, "code": code, "state": state }))
            .send()
            .await
            .map_err(|e| LinkError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(LinkError::Rejected(format!("callback returned {status}")));
        }

        resp.json::<TokenGrant>()
            .await
            .map_err(|e| LinkError::Rejected(format!("callback response unreadable: {e}")))
    }
}
