//! Create/delete dispatch: validate and coerce input, check ownership and linking,
//! then hand the payload to the provider's adapter.

pub mod coerce;
pub mod schema;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::aggregator::build_item;
use crate::db;
use crate::error::AppError;
use crate::linking::{self, LinkStatus};
use crate::models::{Ack, AggregatedResourceItem, CloudAccount, Credentials, Provider, ResourceKind};
use crate::providers::{AdapterRegistry, ProviderAdapter};
use crate::state::AppState;

use schema::{MutationOp, PayloadSchema};

/// Ownership and link lookups the router needs. Implemented by `AppState`.
#[async_trait]
pub trait AccessResolver: Send + Sync {
    /// The account, only if `owner` owns it.
    async fn owned_account(
        &self,
        owner: i64,
        account_id: i64,
    ) -> Result<Option<CloudAccount>, AppError>;

    async fn link_status(&self, account: &CloudAccount) -> Result<LinkStatus, AppError>;
}

#[async_trait]
impl AccessResolver for AppState {
    async fn owned_account(
        &self,
        owner: i64,
        account_id: i64,
    ) -> Result<Option<CloudAccount>, AppError> {
        Ok(db::cloud_accounts::find_for_user(
            &self.pool,
            owner,
            account_id,
            &self.config.encryption_key,
        )
        .await?)
    }

    async fn link_status(&self, account: &CloudAccount) -> Result<LinkStatus, AppError> {
        linking::resolve(self, account).await
    }
}

pub struct MutationRouter<'a> {
    adapters: &'a AdapterRegistry,
    access: &'a dyn AccessResolver,
}

/// Coerced payload plus the account it targets.
struct Prepared<'a> {
    adapter: &'a dyn ProviderAdapter,
    account: CloudAccount,
    body: Map<String, Value>,
}

impl<'a> MutationRouter<'a> {
    pub fn new(adapters: &'a AdapterRegistry, access: &'a dyn AccessResolver) -> Self {
        Self { adapters, access }
    }

    fn schema(
        &self,
        provider: Provider,
        kind: ResourceKind,
        op: MutationOp,
    ) -> Result<(&'a dyn ProviderAdapter, PayloadSchema), AppError> {
        let adapter = self
            .adapters
            .get(provider)
            .ok_or_else(|| AppError::BadRequest(format!("No adapter for {provider}")))?;
        if !adapter.supports(kind) {
            return Err(AppError::BadRequest(format!("{provider} does not support {kind}")));
        }
        let schema = adapter.mutation_schema(kind, op).ok_or_else(|| {
            AppError::BadRequest(format!("{provider} cannot {} {kind}", op.as_str()))
        })?;
        Ok((adapter.as_ref(), schema))
    }

    async fn prepare(
        &self,
        owner: i64,
        provider: Provider,
        kind: ResourceKind,
        op: MutationOp,
        params: &Map<String, Value>,
    ) -> Result<Prepared<'a>, AppError> {
        let (adapter, schema) = self.schema(provider, kind, op)?;

        // Everything below this point may touch storage or the network.
        let coerced = coerce::coerce(&schema, params)?;
        let body = coerce::assemble(schema.shape, coerced)?;

        let account_id = body
            .get("accountID")
            .and_then(Value::as_i64)
            .ok_or_else(|| AppError::validation("accountID", "is required"))?;

        let account = self
            .access
            .owned_account(owner, account_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Cloud account not found".to_string()))?;

        if account.provider != provider {
            return Err(AppError::validation(
                "provider",
                format!("account {account_id} is a {} account", account.provider),
            ));
        }

        Ok(Prepared {
            adapter,
            account,
            body,
        })
    }

    /// Inject session and credential-derived parameters. Returns the outgoing body.
    async fn authorize(&self, prepared: &Prepared<'_>) -> Result<Map<String, Value>, AppError> {
        let mut body = prepared.body.clone();
        let account = &prepared.account;

        match self.access.link_status(account).await? {
            LinkStatus::Ready {
                access_token: Some(token),
            } => {
                body.insert("token".to_string(), Value::String(token));
            }
            LinkStatus::Ready { access_token: None } => {}
            LinkStatus::RedirectRequired { redirect_url } => {
                return Err(AppError::LinkRequired {
                    account_id: account.account_id,
                    redirect_url: Some(redirect_url),
                    message: "re-authentication required".to_string(),
                });
            }
            LinkStatus::Failed { reason } => {
                return Err(AppError::LinkRequired {
                    account_id: account.account_id,
                    redirect_url: None,
                    message: reason,
                });
            }
        }

        if let Credentials::Azure(creds) = &account.credentials {
            body.entry("subscriptionID")
                .or_insert_with(|| Value::String(creds.subscription_id.clone()));
        }
        if let (Provider::Aws, Some(region)) = (account.provider, &account.region) {
            body.entry("region")
                .or_insert_with(|| Value::String(region.clone()));
        }

        Ok(body)
    }

    pub async fn create_resource(
        &self,
        owner: i64,
        kind: ResourceKind,
        provider: Provider,
        params: &Map<String, Value>,
    ) -> Result<AggregatedResourceItem, AppError> {
        let prepared = self
            .prepare(owner, provider, kind, MutationOp::Create, params)
            .await?;
        let body = self.authorize(&prepared).await?;

        let response = prepared
            .adapter
            .create(kind, Value::Object(body))
            .await
            .map_err(|e| AppError::Provider {
                provider,
                operation: format!("create {kind}"),
                cause: e.to_string(),
            })?;

        tracing::info!(
            "Created {kind} on {provider} account {}",
            prepared.account.account_id
        );

        // The echoed payload stands in for empty responses; it never carries the token.
        let raw = if response.is_null() {
            Value::Object(prepared.body)
        } else {
            response
        };

        Ok(build_item(
            prepared.adapter,
            prepared.account.account_id,
            prepared.account.region,
            kind,
            0,
            raw,
        ))
    }

    pub async fn delete_resource(
        &self,
        owner: i64,
        kind: ResourceKind,
        provider: Provider,
        identifier: &str,
        params: &Map<String, Value>,
    ) -> Result<Ack, AppError> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(AppError::validation("identifier", "is required"));
        }

        let prepared = self
            .prepare(owner, provider, kind, MutationOp::Delete, params)
            .await?;
        let body = self.authorize(&prepared).await?;

        let response = prepared
            .adapter
            .delete(kind, identifier, Value::Object(body))
            .await
            .map_err(|e| AppError::Provider {
                provider,
                operation: format!("delete {kind}"),
                cause: e.to_string(),
            })?;

        tracing::info!(
            "Deleted {kind} '{identifier}' on {provider} account {}",
            prepared.account.account_id
        );

        Ok(Ack {
            provider,
            kind,
            identifier: identifier.to_string(),
            response,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use serde_json::json;

    use super::*;
    use crate::models::{AwsCredentials, AzureCredentials, GcpCredentials};
    use crate::providers::mock::{MockAdapter, Reply};
    use crate::providers::AdapterError;

    struct FakeAccess {
        accounts: Vec<CloudAccount>,
        link: LinkStatus,
        lookups: Mutex<Vec<i64>>,
    }

    impl FakeAccess {
        fn new(accounts: Vec<CloudAccount>) -> Self {
            Self {
                accounts,
                link: LinkStatus::Ready { access_token: None },
                lookups: Mutex::new(Vec::new()),
            }
        }

        fn linked(mut self, link: LinkStatus) -> Self {
            self.link = link;
            self
        }
    }

    #[async_trait]
    impl AccessResolver for FakeAccess {
        async fn owned_account(
            &self,
            owner: i64,
            account_id: i64,
        ) -> Result<Option<CloudAccount>, AppError> {
            self.lookups.lock().unwrap().push(account_id);
            Ok(self
                .accounts
                .iter()
                .find(|a| a.account_id == account_id && a.user_id == owner)
                .cloned())
        }

        async fn link_status(&self, _account: &CloudAccount) -> Result<LinkStatus, AppError> {
            Ok(self.link.clone())
        }
    }

    fn aws_account(account_id: i64, user_id: i64) -> CloudAccount {
        CloudAccount {
            account_id,
            user_id,
            provider: Provider::Aws,
            region: Some("eu-west-1".to_string()),
            additional_information: None,
            credentials: Credentials::Aws(AwsCredentials {
                access_key: "AKIA".to_string(),
                secret_key: "s".to_string(),
            }),
        }
    }

    fn azure_account(account_id: i64) -> CloudAccount {
        CloudAccount {
            account_id,
            user_id: 1,
            provider: Provider::Azure,
            region: None,
            additional_information: None,
            credentials: Credentials::Azure(AzureCredentials {
                client_id: "c".to_string(),
                client_secret: "s".to_string(),
                tenant_id: "t".to_string(),
                subscription_id: "sub-123".to_string(),
            }),
        }
    }

    fn gcp_account(account_id: i64) -> CloudAccount {
        CloudAccount {
            account_id,
            user_id: 1,
            provider: Provider::Gcp,
            region: None,
            additional_information: None,
            credentials: Credentials::Gcp(GcpCredentials {
                client_email: "sa@example.com".to_string(),
                private_key: "pk".to_string(),
                project_id: "proj".to_string(),
            }),
        }
    }

    fn registry(adapter: &Arc<MockAdapter>) -> AdapterRegistry {
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::clone(adapter) as Arc<dyn ProviderAdapter>);
        registry
    }

    fn params(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn dynamo_table_create_coerces_strings() {
        let aws = Arc::new(MockAdapter::new(Provider::Aws));
        let adapters = registry(&aws);
        let access = FakeAccess::new(vec![aws_account(7, 1)]);
        let router = MutationRouter::new(&adapters, &access);

        let item = router
            .create_resource(
                1,
                ResourceKind::Table,
                Provider::Aws,
                &params(json!({
                    "accountID": "7",
                    "region": "eu-west-1",
                    "tableName": "orders",
                    "attributeName": "id",
                    "attributeType": "S",
                    "keySchema": "HASH",
                    "provisionedThroughput": "5"
                })),
            )
            .await
            .unwrap();

        let calls = aws.calls();
        assert_eq!(calls.len(), 1);
        let body = &calls[0].body;
        assert_eq!(body["accountID"], json!(7));
        assert_eq!(
            body["provisionedThroughput"],
            json!({"ReadCapacityUnits": 5, "WriteCapacityUnits": 5})
        );
        assert_eq!(item.id, "7-0");
        assert_eq!(item.account_id, 7);
    }

    #[tokio::test]
    async fn bad_throughput_fails_before_any_lookup() {
        let aws = Arc::new(MockAdapter::new(Provider::Aws));
        let adapters = registry(&aws);
        let access = FakeAccess::new(vec![aws_account(7, 1)]);
        let router = MutationRouter::new(&adapters, &access);

        let err = router
            .create_resource(
                1,
                ResourceKind::Table,
                Provider::Aws,
                &params(json!({
                    "accountID": 7,
                    "region": "eu-west-1",
                    "tableName": "orders",
                    "attributeName": "id",
                    "attributeType": "S",
                    "keySchema": "HASH",
                    "provisionedThroughput": "abc"
                })),
            )
            .await
            .unwrap_err();

        assert_eq!(err.field(), Some("provisionedThroughput"));
        assert!(aws.calls().is_empty());
        assert!(access.lookups.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn other_users_account_is_not_found() {
        let aws = Arc::new(MockAdapter::new(Provider::Aws));
        let adapters = registry(&aws);
        let access = FakeAccess::new(vec![aws_account(7, 2)]);
        let router = MutationRouter::new(&adapters, &access);

        let err = router
            .create_resource(
                1,
                ResourceKind::Bucket,
                Provider::Aws,
                &params(json!({"accountID": 7, "region": "eu-west-1", "bucketName": "b"})),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
        assert!(aws.calls().is_empty());
    }

    #[tokio::test]
    async fn provider_must_match_account() {
        let gcp = Arc::new(MockAdapter::new(Provider::Gcp));
        let adapters = registry(&gcp);
        let access = FakeAccess::new(vec![aws_account(7, 1)]);
        let router = MutationRouter::new(&adapters, &access);

        let err = router
            .create_resource(
                1,
                ResourceKind::Bucket,
                Provider::Gcp,
                &params(json!({"accountID": 7, "bucketName": "b"})),
            )
            .await
            .unwrap_err();

        assert_eq!(err.field(), Some("provider"));
    }

    #[tokio::test]
    async fn azure_delete_fills_subscription_and_token() {
        let azure = Arc::new(MockAdapter::new(Provider::Azure));
        let adapters = registry(&azure);
        let access = FakeAccess::new(vec![azure_account(3)]).linked(LinkStatus::Ready {
            access_token: Some("arm-token".to_string()),
        });
        let router = MutationRouter::new(&adapters, &access);

        let ack = router
            .delete_resource(
                1,
                ResourceKind::Vm,
                Provider::Azure,
                "web-01",
                &params(json!({"accountID": 3, "resourceGroup": "rg"})),
            )
            .await
            .unwrap();

        assert_eq!(ack.identifier, "web-01");
        let body = &azure.calls()[0].body;
        assert_eq!(body["subscriptionID"], json!("sub-123"));
        assert_eq!(body["token"], json!("arm-token"));
        assert_eq!(body["identifier"], json!("web-01"));
    }

    #[tokio::test]
    async fn unlinked_gcp_account_reports_redirect() {
        let gcp = Arc::new(MockAdapter::new(Provider::Gcp));
        let adapters = registry(&gcp);
        let access = FakeAccess::new(vec![gcp_account(4)]).linked(LinkStatus::RedirectRequired {
            redirect_url: "https://consent.example".to_string(),
        });
        let router = MutationRouter::new(&adapters, &access);

        let err = router
            .create_resource(
                1,
                ResourceKind::Network,
                Provider::Gcp,
                &params(json!({"accountID": 4, "networkName": "vpc-a"})),
            )
            .await
            .unwrap_err();

        match err {
            AppError::LinkRequired { redirect_url, .. } => {
                assert_eq!(redirect_url.as_deref(), Some("https://consent.example"))
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(gcp.calls().is_empty());
    }

    #[tokio::test]
    async fn adapter_failure_is_attributed_to_provider() {
        let aws = Arc::new(
            MockAdapter::new(Provider::Aws).reply(
                7,
                Reply::Fail(AdapterError::UpstreamStatus {
                    status: 500,
                    body: "BucketAlreadyExists".to_string(),
                }),
            ),
        );
        let adapters = registry(&aws);
        let access = FakeAccess::new(vec![aws_account(7, 1)]);
        let router = MutationRouter::new(&adapters, &access);

        let err = router
            .create_resource(
                1,
                ResourceKind::Bucket,
                Provider::Aws,
                &params(json!({"accountID": 7, "region": "eu-west-1", "bucketName": "b"})),
            )
            .await
            .unwrap_err();

        match err {
            AppError::Provider {
                provider,
                operation,
                cause,
            } => {
                assert_eq!(provider, Provider::Aws);
                assert_eq!(operation, "create bucket");
                assert!(cause.contains("BucketAlreadyExists"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(aws.calls().len(), 1);
    }

    #[tokio::test]
    async fn unsupported_kind_is_rejected() {
        let aws = Arc::new(MockAdapter::new(Provider::Aws).without(ResourceKind::Serverless));
        let adapters = registry(&aws);
        let access = FakeAccess::new(vec![aws_account(7, 1)]);
        let router = MutationRouter::new(&adapters, &access);

        let err = router
            .create_resource(1, ResourceKind::Serverless, Provider::Aws, &Map::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn blank_identifier_is_a_validation_error() {
        let aws = Arc::new(MockAdapter::new(Provider::Aws));
        let adapters = registry(&aws);
        let access = FakeAccess::new(vec![aws_account(7, 1)]);
        let router = MutationRouter::new(&adapters, &access);

        let err = router
            .delete_resource(
                1,
                ResourceKind::Bucket,
                Provider::Aws,
                " ",
                &params(json!({"accountID": 7})),
            )
            .await
            .unwrap_err();
        assert_eq!(err.field(), Some("identifier"));
    }
}
