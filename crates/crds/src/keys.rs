//! Shared label, annotation, and finalizer keys
//!
//! Every identifier the operator stamps onto Kubernetes objects lives
//! here, together with small helpers for reading them back.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;

/// Label holding the owning cluster's name, on both CRDs.
pub const CLUSTER_NAME_LABEL: &str = "cluster.infra.microscaler.io/cluster-name";

/// Opt-in watch filter label; pools without it are ignored.
pub const WATCH_FILTER_LABEL: &str = "cluster.infra.microscaler.io/watch-filter";

/// Required value of [`WATCH_FILTER_LABEL`].
pub const WATCH_FILTER_VALUE: &str = "capi";

/// Annotation recording the CIDR block reserved for a machine pool.
pub const RESERVED_CIDR_ANNOTATION: &str = "machinepool.infra.microscaler.io/reserved-cidr";

/// Finalizer blocking machine pool removal until the block is reclaimed.
pub const FINALIZER: &str = "machinepool-subnet-operator.infra.microscaler.io";

/// Subnet tag key naming the machine pool a published subnet belongs to.
pub const MACHINE_POOL_SUBNET_TAG: &str = "infra.microscaler.io/machine-pool";

/// Reads the owning cluster's name from an object's labels.
pub fn cluster_name_from_labels(meta: &ObjectMeta) -> Option<&str> {
    meta.labels
        .as_ref()
        .and_then(|l| l.get(CLUSTER_NAME_LABEL))
        .map(String::as_str)
}

/// Returns true if the object carries the opt-in watch filter label.
pub fn has_watch_label(meta: &ObjectMeta) -> bool {
    meta.labels
        .as_ref()
        .and_then(|l| l.get(WATCH_FILTER_LABEL))
        .is_some_and(|v| v == WATCH_FILTER_VALUE)
}

/// Reads the reserved-cidr annotation, if present.
pub fn reserved_cidr(meta: &ObjectMeta) -> Option<&str> {
    meta.annotations
        .as_ref()
        .and_then(|a| a.get(RESERVED_CIDR_ANNOTATION))
        .map(String::as_str)
}

/// Ownership tags stamped on every subnet published for a pool.
pub fn subnet_tags(pool_name: &str) -> BTreeMap<String, String> {
    let mut tags = BTreeMap::new();
    tags.insert(MACHINE_POOL_SUBNET_TAG.to_string(), pool_name.to_string());
    tags
}
