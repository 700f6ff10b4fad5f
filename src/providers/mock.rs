//! In-memory adapter for unit tests. Uses the real adapter's routes, field maps and
//! schemas but answers from canned replies and records every call.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::rest::RestClient;
use super::{aws, azure, gcp, AdapterError, AuthContext, FieldPaths, ProviderAdapter, Route};
use crate::models::{Provider, ResourceKind};
use crate::mutation::schema::{MutationOp, PayloadSchema};

#[derive(Debug, Clone)]
pub enum Reply {
    Items(Vec<Value>),
    Fail(AdapterError),
    Hang,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub op: &'static str,
    pub kind: ResourceKind,
    pub body: Value,
}

pub struct MockAdapter {
    catalog: Arc<dyn ProviderAdapter>,
    unsupported: Vec<ResourceKind>,
    replies: Mutex<HashMap<i64, Reply>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockAdapter {
    pub fn new(provider: Provider) -> Self {
        let rest = RestClient::with_client(reqwest::Client::new(), "http://unused.invalid");
        let catalog: Arc<dyn ProviderAdapter> = match provider {
            Provider::Aws => Arc::new(aws::AwsAdapter::new(rest)),
            Provider::Gcp => Arc::new(gcp::GcpAdapter::new(rest)),
            Provider::Azure => Arc::new(azure::AzureAdapter::new(rest)),
        };
        Self {
            catalog,
            unsupported: Vec::new(),
            replies: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn without(mut self, kind: ResourceKind) -> Self {
        self.unsupported.push(kind);
        self
    }

    pub fn reply(self, account_id: i64, reply: Reply) -> Self {
        self.replies.lock().unwrap().insert(account_id, reply);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, op: &'static str, kind: ResourceKind, body: Value) {
        self.calls.lock().unwrap().push(RecordedCall { op, kind, body });
    }
}

#[async_trait]
impl ProviderAdapter for MockAdapter {
    fn provider(&self) -> Provider {
        self.catalog.provider()
    }

    fn route(&self, kind: ResourceKind) -> Option<Route> {
        if self.unsupported.contains(&kind) {
            None
        } else {
            self.catalog.route(kind)
        }
    }

    fn field_map(&self, kind: ResourceKind) -> &'static [FieldPaths] {
        self.catalog.field_map(kind)
    }

    fn mutation_schema(&self, kind: ResourceKind, op: MutationOp) -> Option<PayloadSchema> {
        self.route(kind)?;
        self.catalog.mutation_schema(kind, op)
    }

    async fn list(
        &self,
        kind: ResourceKind,
        ctx: &AuthContext,
    ) -> Result<Vec<Value>, AdapterError> {
        self.record("list", kind, json!({ "accountID": ctx.account_id, "token": ctx.access_token }));
        let reply = self.replies.lock().unwrap().get(&ctx.account_id).cloned();
        match reply.unwrap_or(Reply::Items(Vec::new())) {
            Reply::Items(items) => Ok(items),
            Reply::Fail(err) => Err(err),
            Reply::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(Vec::new())
            }
        }
    }

    async fn create(&self, kind: ResourceKind, params: Value) -> Result<Value, AdapterError> {
        self.record("create", kind, params.clone());
        let account_id = params["accountID"].as_i64().unwrap_or_default();
        match self.replies.lock().unwrap().get(&account_id).cloned() {
            Some(Reply::Fail(err)) => Err(err),
            _ => Ok(params),
        }
    }

    async fn delete(
        &self,
        kind: ResourceKind,
        identifier: &str,
        mut params: Value,
    ) -> Result<Value, AdapterError> {
        if let Some(obj) = params.as_object_mut() {
            obj.insert("identifier".to_string(), json!(identifier));
        }
        self.record("delete", kind, params);
        Ok(json!({ "message": "deleted" }))
    }
}
