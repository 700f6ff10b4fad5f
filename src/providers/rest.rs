use std::time::Duration;

use serde_json::Value;

use super::{extract_items, AdapterError, Route};
use crate::models::Provider;
use crate::mutation::schema::MutationOp;

const MAX_ERROR_BODY: usize = 1024;

/// JSON-over-HTTP client for the provider collaborator
/// (`POST {base}/{provider}/{service}/{action}`).
#[derive(Clone)]
pub struct RestClient {
    client: reqwest::Client,
    base_url: String,
}

impl RestClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {e}"))?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn url(&self, provider: Provider, service: &str, action: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            self.base_url,
            provider.path_segment(),
            service,
            action
        )
    }

    pub async fn call(
        &self,
        provider: Provider,
        service: &str,
        action: &str,
        body: &Value,
    ) -> Result<Value, AdapterError> {
        let url = self.url(provider, service, action);
        tracing::debug!("POST {url}");

        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AdapterError::Timeout
                } else {
                    AdapterError::Transport(e.to_string())
                }
            })?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| {
            if e.is_timeout() {
                AdapterError::Timeout
            } else {
                AdapterError::Transport(e.to_string())
            }
        })?;

        if !status.is_success() {
            return Err(AdapterError::UpstreamStatus {
                status: status.as_u16(),
                body: text.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text).map_err(|e| AdapterError::Decode(e.to_string()))
    }

    pub async fn list(
        &self,
        provider: Provider,
        route: &Route,
        body: &Value,
    ) -> Result<Vec<Value>, AdapterError> {
        let response = self.call(provider, route.service, route.list, body).await?;
        extract_items(response, route.envelope)
    }

    pub async fn mutate(
        &self,
        provider: Provider,
        route: &Route,
        op: MutationOp,
        body: &Value,
    ) -> Result<Value, AdapterError> {
        self.call(provider, route.service, route.action(op), body).await
    }
}

/// Put the delete target under the key the route expects.
pub fn with_identifier(mut params: Value, route: &Route, identifier: &str) -> Value {
    if let Some(obj) = params.as_object_mut() {
        obj.insert(
            route.identifier.to_string(),
            Value::String(identifier.to_string()),
        );
    }
    params
}
