use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::Provider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Vm,
    Bucket,
    Table,
    Network,
    Subnet,
    Serverless,
    RouteTable,
    Gateway,
    Firewall,
    Cluster,
    Container,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 11] = [
        ResourceKind::Vm,
        ResourceKind::Bucket,
        ResourceKind::Table,
        ResourceKind::Network,
        ResourceKind::Subnet,
        ResourceKind::Serverless,
        ResourceKind::RouteTable,
        ResourceKind::Gateway,
        ResourceKind::Firewall,
        ResourceKind::Cluster,
        ResourceKind::Container,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Vm => "vm",
            ResourceKind::Bucket => "bucket",
            ResourceKind::Table => "table",
            ResourceKind::Network => "network",
            ResourceKind::Subnet => "subnet",
            ResourceKind::Serverless => "serverless",
            ResourceKind::RouteTable => "routetable",
            ResourceKind::Gateway => "gateway",
            ResourceKind::Firewall => "firewall",
            ResourceKind::Cluster => "cluster",
            ResourceKind::Container => "container",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vm" | "vms" | "instance" | "instances" => Ok(ResourceKind::Vm),
            "bucket" | "buckets" | "storage" => Ok(ResourceKind::Bucket),
            "table" | "tables" | "database" | "dynamodbtable" => Ok(ResourceKind::Table),
            "network" | "networks" | "vpc" => Ok(ResourceKind::Network),
            "subnet" | "subnets" => Ok(ResourceKind::Subnet),
            "serverless" | "function" | "functions" => Ok(ResourceKind::Serverless),
            "routetable" | "routetables" | "route_table" | "route" | "routes" => {
                Ok(ResourceKind::RouteTable)
            }
            "gateway" | "gateways" | "internetgateway" | "router" | "routers" => {
                Ok(ResourceKind::Gateway)
            }
            "firewall" | "firewalls" | "firewallrule" | "firewallrules" => {
                Ok(ResourceKind::Firewall)
            }
            "cluster" | "clusters" | "kubernetes" | "eks" => Ok(ResourceKind::Cluster),
            "container" | "containers" | "ecs" => Ok(ResourceKind::Container),
            other => Err(format!("unknown resource kind '{other}'")),
        }
    }
}

/// One provider resource tagged with its owning account. Built per request, never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedResourceItem {
    pub id: String,
    #[serde(rename = "accountID")]
    pub account_id: i64,
    pub provider: Provider,
    pub region: Option<String>,
    pub kind: ResourceKind,
    pub fields: Map<String, Value>,
    pub raw: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    Network,
    UpstreamStatus,
    Decode,
    ReauthenticationRequired,
    LinkFailed,
    /// Stored credentials or session could not be read back.
    Internal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountFailure {
    #[serde(rename = "accountID")]
    pub account_id: i64,
    pub provider: Provider,
    #[serde(rename = "errorKind")]
    pub error_kind: FailureKind,
    pub message: String,
    #[serde(rename = "redirectURL", skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
}

impl AccountFailure {
    pub fn new(account_id: i64, provider: Provider, error_kind: FailureKind, message: String) -> Self {
        Self {
            account_id,
            provider,
            error_kind,
            message,
            redirect_url: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateStatus {
    Complete,
    Partial,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateResponse {
    pub status: AggregateStatus,
    pub items: Vec<AggregatedResourceItem>,
    pub failures: Vec<AccountFailure>,
}

impl AggregateResponse {
    pub fn new(items: Vec<AggregatedResourceItem>, failures: Vec<AccountFailure>) -> Self {
        let status = if failures.is_empty() {
            AggregateStatus::Complete
        } else {
            AggregateStatus::Partial
        };
        Self {
            status,
            items,
            failures,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ack {
    pub provider: Provider,
    pub kind: ResourceKind,
    pub identifier: String,
    pub response: Value,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn network_extras_parse_from_path_spellings() {
        assert_eq!("routeTables".parse::<ResourceKind>().unwrap(), ResourceKind::RouteTable);
        assert_eq!("internetgateway".parse::<ResourceKind>().unwrap(), ResourceKind::Gateway);
        assert_eq!("FirewallRules".parse::<ResourceKind>().unwrap(), ResourceKind::Firewall);
        assert_eq!("eks".parse::<ResourceKind>().unwrap(), ResourceKind::Cluster);
        assert_eq!("ecs".parse::<ResourceKind>().unwrap(), ResourceKind::Container);
        assert!("dynamodbitems".parse::<ResourceKind>().is_err());
    }

    #[test]
    fn as_str_matches_serialized_name() {
        for kind in ResourceKind::ALL {
            assert_eq!(serde_json::to_value(kind).unwrap(), json!(kind.as_str()));
            assert_eq!(kind.as_str().parse::<ResourceKind>().unwrap(), kind);
        }
    }

    #[test]
    fn unreadable_failure_serializes_as_internal() {
        let f = AccountFailure::new(4, Provider::Gcp, FailureKind::Internal, "x".into());
        let v = serde_json::to_value(&f).unwrap();
        assert_eq!(v["errorKind"], json!("internal"));
        assert_eq!(v["accountID"], json!(4));
        assert!(v.get("redirectURL").is_none());
    }
}
