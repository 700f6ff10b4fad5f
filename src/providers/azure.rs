use async_trait::async_trait;
use serde_json::{json, Value};

use super::rest::{with_identifier, RestClient};
use super::{AdapterError, AuthContext, FieldPaths, ProviderAdapter, Route};
use crate::models::{Provider, ResourceKind};
use crate::mutation::schema::{FieldSpec, MutationOp, PayloadSchema};

/// Azure calls carry the OAuth session token plus the subscription from the
/// account's stored credentials. Responses are ARM objects (`value` arrays).
pub struct AzureAdapter {
    rest: RestClient,
}

impl AzureAdapter {
    pub fn new(rest: RestClient) -> Self {
        Self { rest }
    }
}

const ACCOUNT: FieldSpec = FieldSpec::int("accountID");
const SUBSCRIPTION: FieldSpec = FieldSpec::text("subscriptionID").optional();
const RESOURCE_GROUP: FieldSpec = FieldSpec::text("resourceGroup");
const LOCATION: FieldSpec = FieldSpec::text("location");

const CREATE_STORAGE: &[FieldSpec] = &[
    ACCOUNT,
    SUBSCRIPTION,
    RESOURCE_GROUP,
    LOCATION,
    FieldSpec::text("accountName"),
    FieldSpec::text("storageType").optional(),
    FieldSpec::text("accessTier").optional(),
];

const CREATE_VM: &[FieldSpec] = &[
    ACCOUNT,
    SUBSCRIPTION,
    RESOURCE_GROUP,
    LOCATION,
    FieldSpec::text("vmName"),
    FieldSpec::text("vmSize"),
    FieldSpec::text("publisher").optional(),
    FieldSpec::text("offer").optional(),
    FieldSpec::text("sku").optional(),
    FieldSpec::text("version").optional(),
];

const CREATE_COSMOS: &[FieldSpec] = &[
    ACCOUNT,
    SUBSCRIPTION,
    RESOURCE_GROUP,
    LOCATION,
    FieldSpec::text("accountName"),
    FieldSpec::text("databaseName").optional(),
];

const CREATE_VNET: &[FieldSpec] = &[
    ACCOUNT,
    SUBSCRIPTION,
    RESOURCE_GROUP,
    LOCATION,
    FieldSpec::text("vnetName"),
    FieldSpec::list("addressPrefixes"),
];

const CREATE_SUBNET: &[FieldSpec] = &[
    ACCOUNT,
    SUBSCRIPTION,
    RESOURCE_GROUP,
    FieldSpec::text("vnetName"),
    FieldSpec::text("subnetName"),
    FieldSpec::text("addressPrefix"),
];

const CREATE_FUNCTION: &[FieldSpec] = &[
    ACCOUNT,
    SUBSCRIPTION,
    RESOURCE_GROUP,
    LOCATION,
    FieldSpec::text("functionAppName"),
    FieldSpec::text("appServicePlan").optional(),
];

const CREATE_FIREWALL: &[FieldSpec] = &[
    ACCOUNT,
    SUBSCRIPTION,
    RESOURCE_GROUP,
    FieldSpec::text("firewallName"),
    LOCATION.optional(),
];

const DELETE_ANY: &[FieldSpec] = &[ACCOUNT, SUBSCRIPTION, RESOURCE_GROUP];
const DELETE_SUBNET: &[FieldSpec] = &[
    ACCOUNT,
    SUBSCRIPTION,
    RESOURCE_GROUP,
    FieldSpec::text("vnetName"),
];

const VM_FIELDS: &[FieldPaths] = &[
    ("name", &["name"]),
    ("resourceId", &["id", "properties.vmId"]),
    ("createdAt", &["properties.timeCreated", "systemData.createdAt"]),
    ("status", &["properties.provisioningState"]),
    ("location", &["location"]),
    ("machineType", &["properties.hardwareProfile.vmSize"]),
];

const STORAGE_FIELDS: &[FieldPaths] = &[
    ("name", &["name"]),
    ("resourceId", &["id"]),
    ("createdAt", &["properties.creationTime"]),
    ("status", &["properties.provisioningState", "properties.statusOfPrimary"]),
    ("location", &["location", "primaryLocation"]),
    ("machineType", &["sku.name", "kind"]),
];

const COSMOS_FIELDS: &[FieldPaths] = &[
    ("name", &["name"]),
    ("resourceId", &["id"]),
    ("createdAt", &["systemData.createdAt"]),
    ("status", &["properties.provisioningState"]),
    ("location", &["location"]),
    ("machineType", &["kind"]),
];

const ARM_FIELDS: &[FieldPaths] = &[
    ("name", &["name"]),
    ("resourceId", &["id"]),
    ("createdAt", &["systemData.createdAt"]),
    ("status", &["properties.provisioningState", "properties.state"]),
    ("location", &["location"]),
];

#[async_trait]
impl ProviderAdapter for AzureAdapter {
    fn provider(&self) -> Provider {
        Provider::Azure
    }

    fn route(&self, kind: ResourceKind) -> Option<Route> {
        let route = match kind {
            ResourceKind::Firewall => Route {
                service: "network",
                list: "listFirewalls",
                create: "createFirewall",
                delete: "deleteFirewall",
                envelope: Some("firewalls"),
                identifier: "firewallName",
            },
            ResourceKind::RouteTable
            | ResourceKind::Gateway
            | ResourceKind::Cluster
            | ResourceKind::Container => return None,
            ResourceKind::Bucket => Route {
                service: "storage",
                list: "listAccounts",
                create: "createAccount",
                delete: "deleteAccount",
                envelope: None,
                identifier: "accountName",
            },
            ResourceKind::Vm => Route {
                service: "vm",
                list: "listInstances",
                create: "createInstance",
                delete: "terminateInstance",
                envelope: None,
                identifier: "vmName",
            },
            ResourceKind::Table => Route {
                service: "cosmos",
                list: "listAccounts",
                create: "createAccount",
                delete: "deleteAccount",
                envelope: None,
                identifier: "accountName",
            },
            ResourceKind::Network => Route {
                service: "network",
                list: "listVNet",
                create: "createVNet",
                delete: "deleteVNet",
                envelope: None,
                identifier: "vnetName",
            },
            ResourceKind::Subnet => Route {
                service: "network",
                list: "listSubnets",
                create: "createSubnet",
                delete: "deleteSubnet",
                envelope: None,
                identifier: "subnetName",
            },
            ResourceKind::Serverless => Route {
                service: "functions",
                list: "listFunctions",
                create: "createFunction",
                delete: "deleteFunction",
                envelope: None,
                identifier: "functionAppName",
            },
        };
        Some(route)
    }

    fn field_map(&self, kind: ResourceKind) -> &'static [FieldPaths] {
        match kind {
            ResourceKind::Vm => VM_FIELDS,
            ResourceKind::Bucket => STORAGE_FIELDS,
            ResourceKind::Table => COSMOS_FIELDS,
            ResourceKind::Network
            | ResourceKind::Subnet
            | ResourceKind::Serverless
            | ResourceKind::Firewall => ARM_FIELDS,
            ResourceKind::RouteTable
            | ResourceKind::Gateway
            | ResourceKind::Cluster
            | ResourceKind::Container => &[],
        }
    }

    fn mutation_schema(&self, kind: ResourceKind, op: MutationOp) -> Option<PayloadSchema> {
        let fields = match (kind, op) {
            (ResourceKind::Bucket, MutationOp::Create) => CREATE_STORAGE,
            (ResourceKind::Vm, MutationOp::Create) => CREATE_VM,
            (ResourceKind::Table, MutationOp::Create) => CREATE_COSMOS,
            (ResourceKind::Network, MutationOp::Create) => CREATE_VNET,
            (ResourceKind::Subnet, MutationOp::Create) => CREATE_SUBNET,
            (ResourceKind::Serverless, MutationOp::Create) => CREATE_FUNCTION,
            (ResourceKind::Firewall, MutationOp::Create) => CREATE_FIREWALL,
            (
                ResourceKind::RouteTable
                | ResourceKind::Gateway
                | ResourceKind::Cluster
                | ResourceKind::Container,
                _,
            ) => return None,
            (ResourceKind::Subnet, MutationOp::Delete) => DELETE_SUBNET,
            (_, MutationOp::Delete) => DELETE_ANY,
        };
        Some(PayloadSchema::flat(fields))
    }

    async fn list(
        &self,
        kind: ResourceKind,
        ctx: &AuthContext,
    ) -> Result<Vec<Value>, AdapterError> {
        let route = self.route(kind).ok_or(AdapterError::Unsupported {
            provider: Provider::Azure,
            kind,
        })?;
        let body = json!({
            "accountID": ctx.account_id,
            "token": ctx.access_token,
            "subscriptionID": ctx.subscription_id,
        });
        self.rest.list(Provider::Azure, &route, &body).await
    }

    async fn create(&self, kind: ResourceKind, params: Value) -> Result<Value, AdapterError> {
        let route = self.route(kind).ok_or(AdapterError::Unsupported {
            provider: Provider::Azure,
            kind,
        })?;
        self.rest
            .mutate(Provider::Azure, &route, MutationOp::Create, &params)
            .await
    }

    async fn delete(
        &self,
        kind: ResourceKind,
        identifier: &str,
        params: Value,
    ) -> Result<Value, AdapterError> {
        let route = self.route(kind).ok_or(AdapterError::Unsupported {
            provider: Provider::Azure,
            kind,
        })?;
        let body = with_identifier(params, &route, identifier);
        self.rest
            .mutate(Provider::Azure, &route, MutationOp::Delete, &body)
            .await
    }
}
