//! ClusterNetwork CRD
//!
//! The shared network record for a cluster: the VPC with its primary
//! address range, plus the list of subnets published into it. Exactly
//! one ClusterNetwork exists per cluster; machine pools reference it
//! through the cluster-name label.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "infra.microscaler.io",
    version = "v1alpha1",
    kind = "ClusterNetwork",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterNetworkSpec {
    /// The cluster VPC
    pub vpc: VpcSpec,

    /// Subnets published to the cluster network, append-only
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subnets: Vec<SubnetSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VpcSpec {
    /// Cloud-side VPC identifier
    pub id: String,

    /// Primary CIDR block of the VPC
    pub cidr_block: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SubnetSpec {
    /// Subnet CIDR block
    pub cidr_block: String,

    /// Availability zone the subnet lives in
    pub availability_zone: String,

    /// Whether the subnet is publicly routable
    #[serde(default)]
    pub is_public: bool,

    /// Ownership tags; includes the owning machine pool's name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}
