//! Controller-specific error types.
//!
//! This module defines error types specific to the MachinePool Subnet
//! Controller that are not covered by upstream library errors.

use thiserror::Error;
use kube::Error as KubeError;
use vpc_client::VpcError;

/// Errors that can occur in the MachinePool Subnet Controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Cloud VPC API error
    #[error("VPC error: {0}")]
    Vpc(#[from] VpcError),

    /// Address-space allocation error (exhaustion or bad request)
    #[error("Allocation error: {0}")]
    Allocation(#[from] ipam::AllocationError),

    /// No ClusterNetwork found for the cluster
    #[error("ClusterNetwork not found for cluster: {0}")]
    ClusterNetworkNotFound(String),

    /// More than one ClusterNetwork matched the cluster
    #[error("Ambiguous ClusterNetwork for cluster {cluster}: found {count}")]
    AmbiguousClusterNetwork {
        /// Cluster that was looked up
        cluster: String,
        /// Number of matching records
        count: usize,
    },

    /// Malformed CIDR text in a stored record
    #[error("Invalid CIDR: {0}")]
    InvalidCidr(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Concurrent write to a record; retried with a fresh read next cycle
    #[error("Persistence conflict: {0}")]
    Conflict(String),

    /// Lock lease acquire/release failure; transient
    #[error("Lock error: {0}")]
    Lock(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),
}
