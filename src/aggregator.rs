//! Cross-account fan-out: one list call per usable account, joined, normalized and
//! merged in a fixed order.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use serde_json::Value;

use crate::linking::LinkStatus;
use crate::models::{
    AccountFailure, AggregateResponse, AggregatedResourceItem, CloudAccount, FailureKind,
    Provider, ResourceKind,
};
use crate::providers::{normalize, AdapterError, AdapterRegistry, AuthContext, ProviderAdapter};

/// An account together with what linking decided about it.
#[derive(Debug, Clone)]
pub struct AccountTarget {
    pub account: CloudAccount,
    pub link: LinkStatus,
}

enum Outcome {
    Items {
        account: CloudAccount,
        adapter: Arc<dyn ProviderAdapter>,
        raw: Vec<Value>,
    },
    Failed(AccountFailure),
}

/// Turn one native item into the tabular model.
pub fn build_item(
    adapter: &dyn ProviderAdapter,
    account_id: i64,
    region: Option<String>,
    kind: ResourceKind,
    index: usize,
    raw: Value,
) -> AggregatedResourceItem {
    AggregatedResourceItem {
        id: format!("{account_id}-{index}"),
        account_id,
        provider: adapter.provider(),
        region,
        kind,
        fields: normalize(&raw, adapter.field_map(kind)),
        raw,
    }
}

fn failure(account: &CloudAccount, kind: FailureKind, message: String) -> AccountFailure {
    AccountFailure::new(account.account_id, account.provider, kind, message)
}

async fn list_one(
    adapter: Arc<dyn ProviderAdapter>,
    target: AccountTarget,
    kind: ResourceKind,
    timeout: Duration,
) -> Outcome {
    let AccountTarget { account, link } = target;

    let access_token = match link {
        LinkStatus::Ready { access_token } => access_token,
        LinkStatus::RedirectRequired { redirect_url } => {
            let mut f = failure(
                &account,
                FailureKind::ReauthenticationRequired,
                format!("{} account needs to be re-linked", account.provider),
            );
            f.redirect_url = Some(redirect_url);
            return Outcome::Failed(f);
        }
        LinkStatus::Failed { reason } => {
            return Outcome::Failed(failure(&account, FailureKind::LinkFailed, reason));
        }
    };

    let ctx = AuthContext::for_account(&account, access_token);
    let result = match tokio::time::timeout(timeout, adapter.list(kind, &ctx)).await {
        Ok(result) => result,
        Err(_) => Err(AdapterError::Timeout),
    };

    match result {
        Ok(raw) => Outcome::Items {
            account,
            adapter,
            raw,
        },
        Err(e) => {
            tracing::warn!(
                "List {kind} failed for account {} ({}): {e}",
                account.account_id,
                account.provider
            );
            Outcome::Failed(failure(&account, e.failure_kind(), e.to_string()))
        }
    }
}

/// Fan out `kind` listing over `targets`. Never fails as a whole: per-account
/// problems come back in `failures` with status `partial`. `rejected` holds
/// accounts that could not be prepared for a call; they are reported alongside.
pub async fn aggregate(
    adapters: &AdapterRegistry,
    mut targets: Vec<AccountTarget>,
    rejected: Vec<AccountFailure>,
    kind: ResourceKind,
    timeout: Duration,
) -> AggregateResponse {
    // Provider derives Ord in partition order (AWS, GCP, AZURE).
    targets.sort_by_key(|t| (t.account.provider, t.account.account_id));

    let calls = targets.into_iter().filter_map(|target| {
        let provider: Provider = target.account.provider;
        match adapters.get(provider) {
            Some(adapter) if adapter.supports(kind) => {
                Some(list_one(Arc::clone(adapter), target, kind, timeout))
            }
            _ => {
                tracing::debug!(
                    "Skipping account {}: {provider} has no {kind}",
                    target.account.account_id
                );
                None
            }
        }
    });

    let outcomes = join_all(calls).await;

    let rejected: Vec<AccountFailure> = rejected
        .into_iter()
        .filter(|f| adapters.get(f.provider).is_some_and(|a| a.supports(kind)))
        .collect();

    let (items, mut failures) = outcomes.into_iter().fold(
        (Vec::new(), rejected),
        |(mut items, mut failures), outcome| {
            match outcome {
                Outcome::Items {
                    account,
                    adapter,
                    raw,
                } => items.extend(raw.into_iter().enumerate().map(|(index, raw)| {
                    build_item(
                        adapter.as_ref(),
                        account.account_id,
                        account.region.clone(),
                        kind,
                        index,
                        raw,
                    )
                })),
                Outcome::Failed(f) => failures.push(f),
            }
            (items, failures)
        },
    );

    failures.sort_by_key(|f| (f.provider, f.account_id));

    tracing::info!(
        "Aggregated {kind}: {} items, {} failures",
        items.len(),
        failures.len()
    );

    AggregateResponse::new(items, failures)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::models::{
        AggregateStatus, AwsCredentials, AzureCredentials, Credentials, GcpCredentials,
    };
    use crate::providers::mock::{MockAdapter, Reply};

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn account(account_id: i64, provider: Provider) -> CloudAccount {
        let credentials = match provider {
            Provider::Aws => Credentials::Aws(AwsCredentials {
                access_key: "AKIA".to_string(),
                secret_key: "secret".to_string(),
            }),
            Provider::Gcp => Credentials::Gcp(GcpCredentials {
                client_email: "sa@example.com".to_string(),
                private_key: "pk".to_string(),
                project_id: "proj".to_string(),
            }),
            Provider::Azure => Credentials::Azure(AzureCredentials {
                client_id: "cid".to_string(),
                client_secret: "cs".to_string(),
                tenant_id: "tid".to_string(),
                subscription_id: "sub".to_string(),
            }),
        };
        CloudAccount {
            account_id,
            user_id: 1,
            provider,
            region: (provider == Provider::Aws).then(|| "us-east-1".to_string()),
            additional_information: None,
            credentials,
        }
    }

    fn ready(account_id: i64, provider: Provider) -> AccountTarget {
        let access_token = provider.requires_redirect().then(|| "tok".to_string());
        AccountTarget {
            account: account(account_id, provider),
            link: LinkStatus::Ready { access_token },
        }
    }

    fn registry(adapters: Vec<Arc<MockAdapter>>) -> AdapterRegistry {
        let mut registry = AdapterRegistry::new();
        for adapter in adapters {
            registry.register(adapter);
        }
        registry
    }

    #[tokio::test]
    async fn one_failing_account_does_not_hide_the_other() {
        let aws = Arc::new(
            MockAdapter::new(Provider::Aws)
                .reply(1, Reply::Fail(AdapterError::Transport("connection refused".into())))
                .reply(
                    2,
                    Reply::Items(vec![
                        json!({"instance_id": "i-a", "state_code": "running"}),
                        json!({"instance_id": "i-b", "state_code": "stopped"}),
                    ]),
                ),
        );
        let adapters = registry(vec![aws]);

        let resp = aggregate(
            &adapters,
            vec![ready(1, Provider::Aws), ready(2, Provider::Aws)],
            Vec::new(),
            ResourceKind::Vm,
            TIMEOUT,
        )
        .await;

        assert_eq!(resp.status, AggregateStatus::Partial);
        assert_eq!(resp.items.len(), 2);
        assert!(resp.items.iter().all(|i| i.account_id == 2));
        assert_eq!(resp.items[0].id, "2-0");
        assert_eq!(resp.items[1].id, "2-1");
        assert_eq!(resp.items[1].fields["status"], json!("stopped"));
        assert_eq!(resp.failures.len(), 1);
        assert_eq!(resp.failures[0].account_id, 1);
        assert_eq!(resp.failures[0].error_kind, FailureKind::Network);
    }

    #[tokio::test]
    async fn hanging_account_times_out_alone() {
        let aws = Arc::new(
            MockAdapter::new(Provider::Aws)
                .reply(1, Reply::Hang)
                .reply(2, Reply::Items(vec![json!({"Name": "logs"})])),
        );
        let adapters = registry(vec![aws]);

        let resp = aggregate(
            &adapters,
            vec![ready(1, Provider::Aws), ready(2, Provider::Aws)],
            Vec::new(),
            ResourceKind::Bucket,
            Duration::from_millis(50),
        )
        .await;

        assert_eq!(resp.items.len(), 1);
        assert_eq!(resp.items[0].fields["name"], json!("logs"));
        assert_eq!(resp.failures.len(), 1);
        assert_eq!(resp.failures[0].error_kind, FailureKind::Timeout);
    }

    #[tokio::test]
    async fn empty_results_are_not_failures() {
        let aws = Arc::new(MockAdapter::new(Provider::Aws).reply(1, Reply::Items(Vec::new())));
        let adapters = registry(vec![aws]);

        let resp = aggregate(&adapters, vec![ready(1, Provider::Aws)], Vec::new(), ResourceKind::Table, TIMEOUT)
            .await;

        assert_eq!(resp.status, AggregateStatus::Complete);
        assert!(resp.items.is_empty());
        assert!(resp.failures.is_empty());
    }

    #[tokio::test]
    async fn unsupported_kind_is_skipped_without_a_call() {
        let gcp = Arc::new(MockAdapter::new(Provider::Gcp).without(ResourceKind::Table));
        let adapters = registry(vec![Arc::clone(&gcp)]);

        let resp = aggregate(&adapters, vec![ready(5, Provider::Gcp)], Vec::new(), ResourceKind::Table, TIMEOUT)
            .await;

        assert_eq!(resp.status, AggregateStatus::Complete);
        assert!(resp.items.is_empty());
        assert!(gcp.calls().is_empty());
    }

    #[tokio::test]
    async fn merge_order_is_provider_then_account_then_item() {
        let aws = Arc::new(
            MockAdapter::new(Provider::Aws)
                .reply(4, Reply::Items(vec![json!({"Name": "a4"})]))
                .reply(2, Reply::Items(vec![json!({"Name": "a2-0"}), json!({"Name": "a2-1"})])),
        );
        let gcp = Arc::new(MockAdapter::new(Provider::Gcp).reply(1, Reply::Items(vec![json!({"name": "g1"})])));
        let azure = Arc::new(MockAdapter::new(Provider::Azure).reply(3, Reply::Items(vec![json!({"name": "z3"})])));
        let adapters = registry(vec![aws, gcp, azure]);

        let targets = vec![
            ready(3, Provider::Azure),
            ready(4, Provider::Aws),
            ready(1, Provider::Gcp),
            ready(2, Provider::Aws),
        ];
        let resp = aggregate(&adapters, targets, Vec::new(), ResourceKind::Bucket, TIMEOUT).await;

        let ids: Vec<&str> = resp.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["2-0", "2-1", "4-0", "1-0", "3-0"]);
        assert_eq!(resp.items[3].provider, Provider::Gcp);
    }

    #[tokio::test]
    async fn unusable_links_become_failures_without_calls() {
        let gcp = Arc::new(MockAdapter::new(Provider::Gcp));
        let azure = Arc::new(MockAdapter::new(Provider::Azure));
        let adapters = registry(vec![Arc::clone(&gcp), Arc::clone(&azure)]);

        let targets = vec![
            AccountTarget {
                account: account(7, Provider::Gcp),
                link: LinkStatus::RedirectRequired {
                    redirect_url: "https://consent.example".to_string(),
                },
            },
            AccountTarget {
                account: account(8, Provider::Azure),
                link: LinkStatus::Failed {
                    reason: "consent denied".to_string(),
                },
            },
        ];
        let resp = aggregate(&adapters, targets, Vec::new(), ResourceKind::Vm, TIMEOUT).await;

        assert_eq!(resp.failures.len(), 2);
        assert_eq!(resp.failures[0].error_kind, FailureKind::ReauthenticationRequired);
        assert_eq!(
            resp.failures[0].redirect_url.as_deref(),
            Some("https://consent.example")
        );
        assert_eq!(resp.failures[1].error_kind, FailureKind::LinkFailed);
        assert!(gcp.calls().is_empty());
        assert!(azure.calls().is_empty());
    }

    #[tokio::test]
    async fn repeated_reads_are_identical() {
        let aws = Arc::new(
            MockAdapter::new(Provider::Aws).reply(1, Reply::Items(vec![json!({"Name": "b"})])),
        );
        let adapters = registry(vec![aws]);

        let first = aggregate(&adapters, vec![ready(1, Provider::Aws)], Vec::new(), ResourceKind::Bucket, TIMEOUT).await;
        let second = aggregate(&adapters, vec![ready(1, Provider::Aws)], Vec::new(), ResourceKind::Bucket, TIMEOUT).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn oauth_token_reaches_the_adapter() {
        let gcp = Arc::new(MockAdapter::new(Provider::Gcp));
        let adapters = registry(vec![Arc::clone(&gcp)]);

        aggregate(&adapters, vec![ready(9, Provider::Gcp)], Vec::new(), ResourceKind::Network, TIMEOUT).await;

        let calls = gcp.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].body["token"], json!("tok"));
    }

    #[tokio::test]
    async fn unreadable_accounts_are_reported_next_to_live_items() {
        let aws = Arc::new(
            MockAdapter::new(Provider::Aws).reply(3, Reply::Items(vec![json!({"Name": "logs"})])),
        );
        let gcp = Arc::new(MockAdapter::new(Provider::Gcp).without(ResourceKind::Bucket));
        let adapters = registry(vec![Arc::clone(&aws), gcp]);

        let rejected = vec![
            AccountFailure::new(7, Provider::Gcp, FailureKind::Internal, "unreadable".into()),
            AccountFailure::new(2, Provider::Aws, FailureKind::Internal, "unreadable".into()),
        ];
        let resp = aggregate(
            &adapters,
            vec![ready(3, Provider::Aws)],
            rejected,
            ResourceKind::Bucket,
            TIMEOUT,
        )
        .await;

        assert_eq!(resp.status, AggregateStatus::Partial);
        assert_eq!(resp.items.len(), 1);
        assert_eq!(resp.items[0].account_id, 3);
        // GCP has no buckets here, so its unreadable account is not relevant.
        assert_eq!(resp.failures.len(), 1);
        assert_eq!(resp.failures[0].account_id, 2);
        assert_eq!(resp.failures[0].error_kind, FailureKind::Internal);
        assert_eq!(aws.calls().len(), 1);
    }
}
