use async_trait::async_trait;
use serde_json::{json, Value};

use super::rest::{with_identifier, RestClient};
use super::{AdapterError, AuthContext, FieldPaths, ProviderAdapter, Route};
use crate::models::{Provider, ResourceKind};
use crate::mutation::schema::{FieldSpec, MutationOp, PayloadSchema};

/// GCP calls carry the account's OAuth session token (`token`) obtained through linking.
pub struct GcpAdapter {
    rest: RestClient,
}

impl GcpAdapter {
    pub fn new(rest: RestClient) -> Self {
        Self { rest }
    }
}

const ACCOUNT: FieldSpec = FieldSpec::int("accountID");

const CREATE_BUCKET: &[FieldSpec] = &[
    ACCOUNT,
    FieldSpec::text("bucketName"),
    FieldSpec::text("location").optional(),
    FieldSpec::text("storageClass").optional(),
];

const CREATE_INSTANCE: &[FieldSpec] = &[
    ACCOUNT,
    FieldSpec::text("name"),
    FieldSpec::text("machineType"),
    FieldSpec::text("image"),
    FieldSpec::text("zone"),
    FieldSpec::list("networks").optional(),
];

const CREATE_COLLECTION: &[FieldSpec] = &[
    ACCOUNT,
    FieldSpec::text("collectionName"),
    FieldSpec::text("databaseID").optional(),
];

const CREATE_NETWORK: &[FieldSpec] = &[
    ACCOUNT,
    FieldSpec::text("networkName"),
    FieldSpec::text("routingMode").optional(),
];

const CREATE_SUBNET: &[FieldSpec] = &[
    ACCOUNT,
    FieldSpec::text("networkName"),
    FieldSpec::text("subnetName"),
    FieldSpec::text("region"),
    FieldSpec::text("ipv4CIDRBlock"),
];

const CREATE_FUNCTION: &[FieldSpec] = &[
    ACCOUNT,
    FieldSpec::text("functionName"),
    FieldSpec::text("region"),
    FieldSpec::text("runtime"),
    FieldSpec::text("entryPoint"),
    FieldSpec::text("sourceArchiveUrl").optional(),
    FieldSpec::int("availableMemoryMb").optional(),
];

const CREATE_ROUTE: &[FieldSpec] = &[
    ACCOUNT,
    FieldSpec::text("routeName"),
    FieldSpec::text("destination"),
    FieldSpec::text("nextHopIp"),
    FieldSpec::text("network"),
    FieldSpec::int("priority"),
    FieldSpec::text("description").optional(),
    FieldSpec::list("tags").optional(),
];

const CREATE_FIREWALL_RULE: &[FieldSpec] = &[
    ACCOUNT,
    FieldSpec::text("firewallName"),
    FieldSpec::text("network"),
    FieldSpec::text("sourceCidr"),
    FieldSpec::text("allowedPorts"),
    FieldSpec::text("direction"),
    FieldSpec::int("priority"),
    FieldSpec::text("description").optional(),
    FieldSpec::list("sourceTags").optional(),
    FieldSpec::text("destinationIP").optional(),
];

const CREATE_ROUTER: &[FieldSpec] = &[
    ACCOUNT,
    FieldSpec::text("routerName"),
    FieldSpec::text("region"),
    FieldSpec::text("network"),
    FieldSpec::int("asn"),
    FieldSpec::text("description").optional(),
];

const DELETE_ANY: &[FieldSpec] = &[ACCOUNT];
const DELETE_ZONAL: &[FieldSpec] = &[ACCOUNT, FieldSpec::text("zone")];
const DELETE_REGIONAL: &[FieldSpec] = &[ACCOUNT, FieldSpec::text("region")];

const VM_FIELDS: &[FieldPaths] = &[
    ("name", &["name", "instance_id"]),
    ("resourceId", &["instance_id", "id"]),
    ("createdAt", &["launch_time", "creationTimestamp"]),
    ("status", &["state_code", "status"]),
    ("location", &["availability_zone", "zone"]),
    ("machineType", &["instance_type", "machineType"]),
];

const BUCKET_FIELDS: &[FieldPaths] = &[
    ("name", &["name", "Name"]),
    ("resourceId", &["id", "name", "Name"]),
    ("createdAt", &["timeCreated", "Created", "date"]),
    ("location", &["location", "Location"]),
    ("machineType", &["storageClass", "StorageClass"]),
];

const COLLECTION_FIELDS: &[FieldPaths] = &[
    ("name", &["name", "Name", "collectionName"]),
    ("resourceId", &["id", "name", "Name"]),
    ("createdAt", &["createTime"]),
    ("location", &["locationId"]),
];

const NETWORK_FIELDS: &[FieldPaths] = &[
    ("name", &["name"]),
    ("resourceId", &["id", "selfLink"]),
    ("createdAt", &["creationTimestamp"]),
];

const SUBNET_FIELDS: &[FieldPaths] = &[
    ("name", &["name"]),
    ("resourceId", &["id", "selfLink"]),
    ("createdAt", &["creationTimestamp"]),
    ("location", &["region"]),
];

const FUNCTION_FIELDS: &[FieldPaths] = &[
    ("name", &["name"]),
    ("resourceId", &["name"]),
    ("createdAt", &["updateTime"]),
    ("status", &["status", "state"]),
    ("location", &["region"]),
    ("machineType", &["runtime"]),
];

const ROUTE_FIELDS: &[FieldPaths] = &[
    ("name", &["name"]),
    ("resourceId", &["id", "selfLink", "name"]),
    ("createdAt", &["creationTimestamp"]),
    ("location", &["destRange", "network"]),
];

const ROUTER_FIELDS: &[FieldPaths] = &[
    ("name", &["name"]),
    ("resourceId", &["id", "selfLink", "name"]),
    ("createdAt", &["creationTimestamp"]),
    ("location", &["region"]),
];

#[async_trait]
impl ProviderAdapter for GcpAdapter {
    fn provider(&self) -> Provider {
        Provider::Gcp
    }

    fn route(&self, kind: ResourceKind) -> Option<Route> {
        let route = match kind {
            ResourceKind::RouteTable => Route {
                service: "network",
                list: "listRoutes",
                create: "createRoute",
                delete: "deleteRoute",
                envelope: Some("routes"),
                identifier: "routeName",
            },
            ResourceKind::Firewall => Route {
                service: "firewall",
                list: "listFirewallRules",
                create: "createFirewallRule",
                delete: "deleteFirewallRule",
                envelope: Some("firewallRules"),
                identifier: "firewallName",
            },
            ResourceKind::Gateway => Route {
                service: "router",
                list: "listCloudRouters",
                create: "createCloudRouter",
                delete: "deleteCloudRouter",
                envelope: Some("routers"),
                identifier: "routerName",
            },
            // GKE listing flattens cluster names into one string; ECS has no counterpart.
            ResourceKind::Cluster | ResourceKind::Container => return None,
            ResourceKind::Bucket => Route {
                service: "gcs",
                list: "listBuckets",
                create: "createBucket",
                delete: "deleteBucket",
                envelope: Some("buckets"),
                identifier: "bucketName",
            },
            ResourceKind::Vm => Route {
                service: "vm",
                list: "listInstances",
                create: "createInstance",
                delete: "terminateInstance",
                envelope: Some("instances"),
                identifier: "instanceID",
            },
            ResourceKind::Table => Route {
                service: "firebase",
                list: "listTables",
                create: "createTable",
                delete: "deleteTable",
                envelope: Some("collections"),
                identifier: "collectionName",
            },
            ResourceKind::Network => Route {
                service: "network",
                list: "listNetworks",
                create: "createNetwork",
                delete: "deleteNetwork",
                envelope: Some("networks"),
                identifier: "networkName",
            },
            ResourceKind::Subnet => Route {
                service: "network",
                list: "listSubnets",
                create: "createSubnet",
                delete: "deleteSubnet",
                envelope: Some("subnets"),
                identifier: "subnetName",
            },
            ResourceKind::Serverless => Route {
                service: "cloudfunctions",
                list: "listCloudFunction",
                create: "createCloudFunction",
                delete: "deleteCloudFunction",
                envelope: Some("functions"),
                identifier: "functionName",
            },
        };
        Some(route)
    }

    fn field_map(&self, kind: ResourceKind) -> &'static [FieldPaths] {
        match kind {
            ResourceKind::Vm => VM_FIELDS,
            ResourceKind::Bucket => BUCKET_FIELDS,
            ResourceKind::Table => COLLECTION_FIELDS,
            ResourceKind::Network => NETWORK_FIELDS,
            ResourceKind::Subnet => SUBNET_FIELDS,
            ResourceKind::Serverless => FUNCTION_FIELDS,
            ResourceKind::RouteTable => ROUTE_FIELDS,
            ResourceKind::Gateway => ROUTER_FIELDS,
            ResourceKind::Firewall | ResourceKind::Cluster | ResourceKind::Container => &[],
        }
    }

    fn mutation_schema(&self, kind: ResourceKind, op: MutationOp) -> Option<PayloadSchema> {
        let fields = match (kind, op) {
            (ResourceKind::Bucket, MutationOp::Create) => CREATE_BUCKET,
            (ResourceKind::Vm, MutationOp::Create) => CREATE_INSTANCE,
            (ResourceKind::Table, MutationOp::Create) => CREATE_COLLECTION,
            (ResourceKind::Network, MutationOp::Create) => CREATE_NETWORK,
            (ResourceKind::Subnet, MutationOp::Create) => CREATE_SUBNET,
            (ResourceKind::Serverless, MutationOp::Create) => CREATE_FUNCTION,
            (ResourceKind::RouteTable, MutationOp::Create) => CREATE_ROUTE,
            (ResourceKind::Firewall, MutationOp::Create) => CREATE_FIREWALL_RULE,
            (ResourceKind::Gateway, MutationOp::Create) => CREATE_ROUTER,
            (ResourceKind::Cluster | ResourceKind::Container, _) => return None,
            (ResourceKind::Vm, MutationOp::Delete) => DELETE_ZONAL,
            (
                ResourceKind::Subnet | ResourceKind::Serverless | ResourceKind::Gateway,
                MutationOp::Delete,
            ) => DELETE_REGIONAL,
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
            provider: Provider::Gcp,
            kind,
        })?;
        let body = json!({
            "accountID": ctx.account_id,
            "token": ctx.access_token,
            "projectID": ctx.project_id,
        });
        self.rest.list(Provider::Gcp, &route, &body).await
    }

    async fn create(&self, kind: ResourceKind, params: Value) -> Result<Value, AdapterError> {
        let route = self.route(kind).ok_or(AdapterError::Unsupported {
            provider: Provider::Gcp,
            kind,
        })?;
        self.rest
            .mutate(Provider::Gcp, &route, MutationOp::Create, &params)
            .await
    }

    async fn delete(
        &self,
        kind: ResourceKind,
        identifier: &str,
        params: Value,
    ) -> Result<Value, AdapterError> {
        let route = self.route(kind).ok_or(AdapterError::Unsupported {
            provider: Provider::Gcp,
            kind,
        })?;
        let body = with_identifier(params, &route, identifier);
        self.rest
            .mutate(Provider::Gcp, &route, MutationOp::Delete, &body)
            .await
    }
}
