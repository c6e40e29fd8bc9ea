//! Machinepool Subnet Operator CRD Definitions
//!
//! Kubernetes Custom Resource Definitions shared by the
//! machinepool-subnet controller.

pub mod cluster_network;
pub mod keys;
pub mod machine_pool;

pub use cluster_network::*;
pub use machine_pool::*;
