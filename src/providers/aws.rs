use async_trait::async_trait;
use serde_json::{json, Value};

use super::rest::{with_identifier, RestClient};
use super::{AdapterError, AuthContext, FieldPaths, ProviderAdapter, Route};
use crate::models::{Provider, ResourceKind};
use crate::mutation::schema::{FieldSpec, MutationOp, PayloadSchema};

/// AWS accounts authenticate with their stored access keys; list calls are scoped
/// by account and region.
pub struct AwsAdapter {
    rest: RestClient,
}

impl AwsAdapter {
    pub fn new(rest: RestClient) -> Self {
        Self { rest }
    }
}

const ACCOUNT: FieldSpec = FieldSpec::int("accountID");
const REGION: FieldSpec = FieldSpec::text("region");

const CREATE_BUCKET: &[FieldSpec] = &[ACCOUNT, REGION, FieldSpec::text("bucketName")];

const CREATE_INSTANCE: &[FieldSpec] = &[
    ACCOUNT,
    REGION,
    FieldSpec::text("amiID"),
    FieldSpec::text("instanceType"),
    FieldSpec::text("keyName").optional(),
    FieldSpec::list("securityGroupIDs").optional(),
    FieldSpec::text("subnetID").optional(),
];

const CREATE_TABLE: &[FieldSpec] = &[
    ACCOUNT,
    REGION,
    FieldSpec::text("tableName"),
    FieldSpec::text("attributeName"),
    FieldSpec::text("attributeType"),
    FieldSpec::text("keySchema"),
    FieldSpec::int("provisionedThroughput"),
];

const CREATE_VPC: &[FieldSpec] = &[
    ACCOUNT,
    REGION,
    FieldSpec::text("cidrBlock"),
    FieldSpec::text("name").optional(),
];

const CREATE_SUBNET: &[FieldSpec] = &[
    ACCOUNT,
    REGION,
    FieldSpec::text("vpcId"),
    FieldSpec::text("cidrBlock"),
    FieldSpec::text("availabilityZone").optional(),
];

const CREATE_FUNCTION: &[FieldSpec] = &[
    ACCOUNT,
    REGION,
    FieldSpec::text("functionName"),
    FieldSpec::text("runtime"),
    FieldSpec::text("role"),
    FieldSpec::text("handler"),
    FieldSpec::int("memorySize").optional(),
    FieldSpec::int("timeout").optional(),
];

const CREATE_ROUTE_TABLE: &[FieldSpec] = &[
    ACCOUNT,
    REGION,
    FieldSpec::text("vpcId"),
    FieldSpec::text("subnetId").optional(),
    FieldSpec::list("route").optional(),
];

const CREATE_INTERNET_GATEWAY: &[FieldSpec] =
    &[ACCOUNT, REGION, FieldSpec::text("vpcId").optional()];

const CREATE_EKS: &[FieldSpec] = &[
    ACCOUNT,
    REGION,
    FieldSpec::text("clusterId"),
    FieldSpec::text("kubernetesVersion"),
    FieldSpec::text("roleARN"),
    FieldSpec::list("subnets"),
    FieldSpec::list("clusterLogging").optional(),
    FieldSpec::text("encryptionConfig").optional(),
];

const CREATE_ECS: &[FieldSpec] = &[
    ACCOUNT,
    REGION,
    FieldSpec::text("clusterId"),
    FieldSpec::text("infrastructure").optional(),
];

const DELETE_ANY: &[FieldSpec] = &[ACCOUNT, REGION.optional()];

const VM_FIELDS: &[FieldPaths] = &[
    ("name", &["name", "instance_id", "InstanceId"]),
    ("resourceId", &["instance_id", "InstanceId"]),
    ("createdAt", &["launch_time", "LaunchTime"]),
    ("status", &["state_code", "State.Name"]),
    ("location", &["availability_zone", "Placement.AvailabilityZone"]),
    ("machineType", &["instance_type", "InstanceType"]),
];

const BUCKET_FIELDS: &[FieldPaths] = &[
    ("name", &["Name", "name"]),
    ("resourceId", &["Name", "name"]),
    ("createdAt", &["CreationDate", "date"]),
    ("location", &["Region", "region"]),
];

const TABLE_FIELDS: &[FieldPaths] = &[
    ("name", &["Name", "TableName"]),
    ("resourceId", &["TableId", "TableArn", "Name", "TableName"]),
    ("createdAt", &["CreationDateTime"]),
    ("status", &["TableStatus"]),
    ("location", &["Region", "region"]),
];

const NETWORK_FIELDS: &[FieldPaths] = &[
    ("name", &["VpcId", "vpcId"]),
    ("resourceId", &["VpcId", "vpcId"]),
    ("status", &["State", "state"]),
    ("location", &["Region", "region"]),
];

const SUBNET_FIELDS: &[FieldPaths] = &[
    ("name", &["SubnetId", "id"]),
    ("resourceId", &["SubnetArn", "subnetArn", "SubnetId", "id"]),
    ("status", &["State", "state"]),
    ("location", &["AvailabilityZone", "availabilityZone"]),
];

const FUNCTION_FIELDS: &[FieldPaths] = &[
    ("name", &["FunctionName", "functionName"]),
    ("resourceId", &["FunctionArn", "FunctionName"]),
    ("createdAt", &["LastModified"]),
    ("status", &["State"]),
    ("location", &["Region", "region"]),
    ("machineType", &["Runtime", "runtime"]),
];

const ROUTE_TABLE_FIELDS: &[FieldPaths] = &[
    ("name", &["RouteTableId", "routeTableId"]),
    ("resourceId", &["RouteTableId", "routeTableId"]),
    ("status", &["Associations.0.AssociationState.State"]),
    ("location", &["VpcId", "vpcId"]),
];

const GATEWAY_FIELDS: &[FieldPaths] = &[
    ("name", &["internetGatewayId", "InternetGatewayId"]),
    ("resourceId", &["internetGatewayId", "InternetGatewayId"]),
    ("status", &["attachments.0.state", "Attachments.0.State"]),
    ("location", &["attachments.0.vpcId", "Attachments.0.VpcId"]),
];

#[async_trait]
impl ProviderAdapter for AwsAdapter {
    fn provider(&self) -> Provider {
        Provider::Aws
    }

    fn route(&self, kind: ResourceKind) -> Option<Route> {
        let route = match kind {
            ResourceKind::RouteTable => Route {
                service: "network",
                list: "listRouteTable",
                create: "createRouteTable",
                delete: "deleteRouteTable",
                envelope: Some("routeTables.RouteTables"),
                identifier: "routeTableId",
            },
            ResourceKind::Gateway => Route {
                service: "network",
                list: "listInternetGateway",
                create: "createInternetGateway",
                delete: "deleteInternetGateway",
                envelope: None,
                identifier: "internetGatewayId",
            },
            ResourceKind::Cluster => Route {
                service: "eks",
                list: "listClusters",
                create: "createCluster",
                delete: "deleteCluster",
                envelope: Some("clusters"),
                identifier: "clusterId",
            },
            ResourceKind::Container => Route {
                service: "ecs",
                list: "listClusters",
                create: "createCluster",
                delete: "deleteCluster",
                envelope: Some("ClusterArns"),
                identifier: "clusterId",
            },
            ResourceKind::Firewall => return None,
            ResourceKind::Bucket => Route {
                service: "s3",
                list: "listBuckets",
                create: "createBucket",
                delete: "deleteBucket",
                envelope: Some("buckets"),
                identifier: "bucketName",
            },
            ResourceKind::Vm => Route {
                service: "ec2",
                list: "listInstances",
                create: "createInstance",
                delete: "terminateInstance",
                envelope: Some("instances"),
                identifier: "instanceID",
            },
            ResourceKind::Table => Route {
                service: "dynamodb",
                list: "listTables",
                create: "createTable",
                delete: "deleteTable",
                envelope: Some("tables"),
                identifier: "tableName",
            },
            ResourceKind::Network => Route {
                service: "network",
                list: "listVPCs",
                create: "createVPC",
                delete: "deleteVPC",
                envelope: Some("Vpcs"),
                identifier: "vpcId",
            },
            ResourceKind::Subnet => Route {
                service: "network",
                list: "listSubnet",
                create: "createSubnet",
                delete: "deleteSubnet",
                envelope: Some("Subnets"),
                identifier: "subnetId",
            },
            ResourceKind::Serverless => Route {
                service: "lambda",
                list: "listFunctions",
                create: "createFunction",
                delete: "deleteFunction",
                envelope: Some("Functions"),
                identifier: "functionName",
            },
        };
        Some(route)
    }

    fn field_map(&self, kind: ResourceKind) -> &'static [FieldPaths] {
        match kind {
            ResourceKind::Vm => VM_FIELDS,
            ResourceKind::Bucket => BUCKET_FIELDS,
            ResourceKind::Table => TABLE_FIELDS,
            ResourceKind::Network => NETWORK_FIELDS,
            ResourceKind::Subnet => SUBNET_FIELDS,
            ResourceKind::Serverless => FUNCTION_FIELDS,
            ResourceKind::RouteTable => ROUTE_TABLE_FIELDS,
            ResourceKind::Gateway => GATEWAY_FIELDS,
            // Cluster names and ARNs arrive as bare strings.
            ResourceKind::Cluster | ResourceKind::Container | ResourceKind::Firewall => &[],
        }
    }

    fn mutation_schema(&self, kind: ResourceKind, op: MutationOp) -> Option<PayloadSchema> {
        let schema = match (kind, op) {
            (ResourceKind::Bucket, MutationOp::Create) => PayloadSchema::flat(CREATE_BUCKET),
            (ResourceKind::Vm, MutationOp::Create) => PayloadSchema::flat(CREATE_INSTANCE),
            (ResourceKind::Table, MutationOp::Create) => PayloadSchema::dynamo_table(CREATE_TABLE),
            (ResourceKind::Network, MutationOp::Create) => PayloadSchema::flat(CREATE_VPC),
            (ResourceKind::Subnet, MutationOp::Create) => PayloadSchema::flat(CREATE_SUBNET),
            (ResourceKind::Serverless, MutationOp::Create) => PayloadSchema::flat(CREATE_FUNCTION),
            (ResourceKind::RouteTable, MutationOp::Create) => {
                PayloadSchema::flat(CREATE_ROUTE_TABLE)
            }
            (ResourceKind::Gateway, MutationOp::Create) => {
                PayloadSchema::flat(CREATE_INTERNET_GATEWAY)
            }
            (ResourceKind::Cluster, MutationOp::Create) => PayloadSchema::flat(CREATE_EKS),
            (ResourceKind::Container, MutationOp::Create) => PayloadSchema::flat(CREATE_ECS),
            (ResourceKind::Firewall, _) => return None,
            (_, MutationOp::Delete) => PayloadSchema::flat(DELETE_ANY),
        };
        Some(schema)
    }

    async fn list(
        &self,
        kind: ResourceKind,
        ctx: &AuthContext,
    ) -> Result<Vec<Value>, AdapterError> {
        let route = self.route(kind).ok_or(AdapterError::Unsupported {
            provider: Provider::Aws,
            kind,
        })?;
        let body = json!({
            "accountID": ctx.account_id,
            "region": ctx.region,
        });
        self.rest.list(Provider::Aws, &route, &body).await
    }

    async fn create(&self, kind: ResourceKind, params: Value) -> Result<Value, AdapterError> {
        let route = self.route(kind).ok_or(AdapterError::Unsupported {
            provider: Provider::Aws,
            kind,
        })?;
        self.rest
            .mutate(Provider::Aws, &route, MutationOp::Create, &params)
            .await
    }

    async fn delete(
        &self,
        kind: ResourceKind,
        identifier: &str,
        params: Value,
    ) -> Result<Value, AdapterError> {
        let route = self.route(kind).ok_or(AdapterError::Unsupported {
            provider: Provider::Aws,
            kind,
        })?;
        let body = with_identifier(params, &route, identifier);
        self.rest
            .mutate(Provider::Aws, &route, MutationOp::Delete, &body)
            .await
    }
}
