pub mod aws;
pub mod azure;
pub mod gcp;
#[cfg(test)]
pub(crate) mod mock;
pub mod rest;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::models::{CloudAccount, Credentials, FailureKind, Provider, ResourceKind};
use crate::mutation::schema::{MutationOp, PayloadSchema};

/// Collaborator endpoints for one resource kind: `{service}/{list|create|delete}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub service: &'static str,
    pub list: &'static str,
    pub create: &'static str,
    pub delete: &'static str,
    /// Key wrapping the item array in list responses, when the collaborator uses one.
    pub envelope: Option<&'static str>,
    /// Payload key the delete endpoint expects the resource identifier under.
    pub identifier: &'static str,
}

impl Route {
    pub fn action(&self, op: MutationOp) -> &'static str {
        match op {
            MutationOp::Create => self.create,
            MutationOp::Delete => self.delete,
        }
    }
}

/// Canonical column and the native paths it is read from, first match wins.
pub type FieldPaths = (&'static str, &'static [&'static str]);

pub const CANONICAL_FIELDS: [&str; 6] = [
    "name",
    "resourceId",
    "createdAt",
    "status",
    "location",
    "machineType",
];

#[derive(Debug, Clone, PartialEq)]
pub enum AdapterError {
    Timeout,
    Transport(String),
    UpstreamStatus { status: u16, body: String },
    Decode(String),
    Unsupported { provider: Provider, kind: ResourceKind },
}

impl AdapterError {
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            AdapterError::Timeout => FailureKind::Timeout,
            AdapterError::Transport(_) => FailureKind::Network,
            AdapterError::UpstreamStatus { .. } => FailureKind::UpstreamStatus,
            AdapterError::Decode(_) | AdapterError::Unsupported { .. } => FailureKind::Decode,
        }
    }
}

impl std::fmt::Display for AdapterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdapterError::Timeout => write!(f, "request timed out"),
            AdapterError::Transport(e) => write!(f, "request failed: {e}"),
            AdapterError::UpstreamStatus { status, body } => {
                write!(f, "upstream returned {status}: {body}")
            }
            AdapterError::Decode(e) => write!(f, "unreadable response: {e}"),
            AdapterError::Unsupported { provider, kind } => {
                write!(f, "{provider} does not support {kind}")
            }
        }
    }
}

/// Everything an adapter needs to scope a list call to one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub account_id: i64,
    pub region: Option<String>,
    /// OAuth session token. Required by GCP and Azure, unused by AWS.
    pub access_token: Option<String>,
    pub project_id: Option<String>,
    pub subscription_id: Option<String>,
}

impl AuthContext {
    pub fn for_account(account: &CloudAccount, access_token: Option<String>) -> Self {
        let (project_id, subscription_id) = match &account.credentials {
            Credentials::Gcp(c) => (Some(c.project_id.clone()), None),
            Credentials::Azure(c) => (None, Some(c.subscription_id.clone())),
            Credentials::Aws(_) => (None, None),
        };
        Self {
            account_id: account.account_id,
            region: account.region.clone(),
            access_token,
            project_id,
            subscription_id,
        }
    }
}

#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn provider(&self) -> Provider;

    fn route(&self, kind: ResourceKind) -> Option<Route>;

    fn supports(&self, kind: ResourceKind) -> bool {
        self.route(kind).is_some()
    }

    /// Native field paths for each canonical column of `kind`.
    fn field_map(&self, kind: ResourceKind) -> &'static [FieldPaths];

    fn mutation_schema(&self, kind: ResourceKind, op: MutationOp) -> Option<PayloadSchema>;

    async fn list(
        &self,
        kind: ResourceKind,
        ctx: &AuthContext,
    ) -> Result<Vec<Value>, AdapterError>;

    async fn create(&self, kind: ResourceKind, params: Value) -> Result<Value, AdapterError>;

    async fn delete(
        &self,
        kind: ResourceKind,
        identifier: &str,
        params: Value,
    ) -> Result<Value, AdapterError>;
}

pub struct AdapterRegistry {
    adapters: HashMap<Provider, Arc<dyn ProviderAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    /// Registry wired to the provider REST collaborator.
    pub fn with_rest(client: rest::RestClient) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(aws::AwsAdapter::new(client.clone())));
        registry.register(Arc::new(gcp::GcpAdapter::new(client.clone())));
        registry.register(Arc::new(azure::AzureAdapter::new(client)));
        registry
    }

    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters.insert(adapter.provider(), adapter);
    }

    pub fn get(&self, provider: Provider) -> Option<&Arc<dyn ProviderAdapter>> {
        self.adapters.get(&provider)
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Pull the item array out of a list response. Accepts a bare array, `null`,
/// an object keyed by `envelope`, an object with a `value` array, or an object
/// holding exactly one array.
pub fn extract_items(body: Value, envelope: Option<&str>) -> Result<Vec<Value>, AdapterError> {
    // Dotted envelopes name a nested array (`routeTables.RouteTables`).
    let nested = envelope
        .filter(|path| path.contains('.'))
        .and_then(|path| lookup(&body, path))
        .cloned();
    let body = nested.unwrap_or(body);

    match body {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => Ok(items),
        Value::Object(mut obj) => {
            let key = envelope
                .filter(|k| obj.contains_key(*k))
                .map(str::to_string)
                .or_else(|| obj.contains_key("value").then(|| "value".to_string()))
                .or_else(|| {
                    let mut arrays = obj.iter().filter(|(_, v)| v.is_array());
                    match (arrays.next(), arrays.next()) {
                        (Some((k, _)), None) => Some(k.clone()),
                        _ => None,
                    }
                });

            match key.and_then(|k| obj.remove(&k)) {
                Some(Value::Array(items)) => Ok(items),
                Some(Value::Null) => Ok(Vec::new()),
                Some(other) => Err(AdapterError::Decode(format!(
                    "expected item array, got {}",
                    type_name(&other)
                ))),
                None => Err(AdapterError::Decode(
                    "response object has no item array".to_string(),
                )),
            }
        }
        other => Err(AdapterError::Decode(format!(
            "expected item array, got {}",
            type_name(&other)
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Dotted-path lookup; numeric segments index arrays.
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, segment| match current {
        Value::Object(obj) => obj.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Project a native item onto the canonical columns. Missing columns are `null`.
/// Bare-string items (e.g. function names) become both `name` and `resourceId`.
pub fn normalize(raw: &Value, paths: &[FieldPaths]) -> Map<String, Value> {
    let mut fields: Map<String, Value> = CANONICAL_FIELDS
        .iter()
        .map(|f| (f.to_string(), Value::Null))
        .collect();

    if let Value::String(s) = raw {
        fields.insert("name".to_string(), Value::String(s.clone()));
        fields.insert("resourceId".to_string(), Value::String(s.clone()));
        return fields;
    }

    for (canonical, candidates) in paths {
        let found = candidates
            .iter()
            .filter_map(|p| lookup(raw, p))
            .find(|v| !v.is_null() && v.as_str() != Some(""));
        if let Some(value) = found {
            fields.insert(canonical.to_string(), value.clone());
        }
    }
    fields
}
