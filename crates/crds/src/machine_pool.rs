//! MachinePool CRD
//!
//! A named group of compute nodes spanning one or more availability
//! zones, belonging to one cluster. The owning cluster is recorded in
//! the `cluster.infra.microscaler.io/cluster-name` label, and the
//! durable subnet assignment lives in the
//! `machinepool.infra.microscaler.io/reserved-cidr` annotation.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "infra.microscaler.io",
    version = "v1alpha1",
    kind = "MachinePool",
    namespaced,
    status = "MachinePoolStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct MachinePoolSpec {
    /// Availability zones the pool spans, in order.
    ///
    /// Zone index i always receives the same per-zone subnet, so the
    /// order of this list is significant.
    pub availability_zones: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct MachinePoolStatus {
    /// Subnet allocation state
    pub state: SubnetState,

    /// Mirror of the reserved-cidr annotation, for observability.
    /// The annotation, not this field, is the durable record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_cidr: Option<String>,

    /// Last reconciliation timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reconciled: Option<chrono::DateTime<chrono::Utc>>,

    /// Error message if the last attempt failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Subnet allocation state
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "PascalCase")]
pub enum SubnetState {
    /// No block assigned yet
    #[default]
    #[serde(alias = "pending")]
    Pending,

    /// Block assigned, associated, and published
    #[serde(alias = "allocated")]
    Allocated,

    /// Last reconcile attempt failed
    #[serde(alias = "failed")]
    Failed,
}
