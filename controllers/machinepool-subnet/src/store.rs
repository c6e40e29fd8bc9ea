//! Typed object-store access.
//!
//! The reconciler never talks to the apiserver directly; it goes
//! through the [`ObjectStore`] trait so unit tests can substitute an
//! in-memory implementation. [`KubeStore`] is the real thing, built on
//! typed `kube::Api` clients registered explicitly at startup.
//!
//! Nothing is cached across reconcile invocations: every call fetches
//! or writes current state.

use crate::error::ControllerError;
use async_trait::async_trait;
use crds::keys;
use crds::{ClusterNetwork, MachinePool, MachinePoolStatus};
use kube::api::{ListParams, Patch, PatchParams};
use kube::Api;
use kube::Error as KubeError;
use serde_json::json;

/// Typed client interface to the declarative object store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List all machine pools belonging to `cluster`.
    async fn list_machine_pools(&self, cluster: &str) -> Result<Vec<MachinePool>, ControllerError>;

    /// List all cluster network records belonging to `cluster`.
    async fn list_cluster_networks(
        &self,
        cluster: &str,
    ) -> Result<Vec<ClusterNetwork>, ControllerError>;

    /// Set or clear a pool's reserved-cidr annotation.
    async fn set_reserved_cidr(
        &self,
        pool_name: &str,
        cidr: Option<&str>,
    ) -> Result<(), ControllerError>;

    /// Persist an updated cluster network spec.
    async fn update_cluster_network(
        &self,
        network: &ClusterNetwork,
    ) -> Result<(), ControllerError>;

    /// Patch a pool's status subresource.
    async fn patch_pool_status(
        &self,
        pool_name: &str,
        status: MachinePoolStatus,
    ) -> Result<(), ControllerError>;

    /// Add the operator finalizer to a pool if absent.
    async fn ensure_finalizer(&self, pool_name: &str) -> Result<(), ControllerError>;

    /// Remove the operator finalizer from a pool if present.
    async fn remove_finalizer(&self, pool_name: &str) -> Result<(), ControllerError>;
}

/// Maps a kube error, surfacing write conflicts as their own variant
/// so logs distinguish "retry with a fresh read" from real failures.
fn map_kube_err(err: KubeError, context: &str) -> ControllerError {
    match &err {
        KubeError::Api(ae) if ae.code == 409 => {
            ControllerError::Conflict(format!("{context}: {}", ae.message))
        }
        _ => ControllerError::Kube(err),
    }
}

/// Object store backed by the Kubernetes apiserver.
pub struct KubeStore {
    pools: Api<MachinePool>,
    networks: Api<ClusterNetwork>,
}

impl KubeStore {
    /// Creates a store from typed API clients.
    pub fn new(pools: Api<MachinePool>, networks: Api<ClusterNetwork>) -> Self {
        Self { pools, networks }
    }

    fn cluster_selector(cluster: &str) -> ListParams {
        ListParams::default().labels(&format!("{}={}", keys::CLUSTER_NAME_LABEL, cluster))
    }
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn list_machine_pools(&self, cluster: &str) -> Result<Vec<MachinePool>, ControllerError> {
        let list = self
            .pools
            .list(&Self::cluster_selector(cluster))
            .await
            .map_err(|e| map_kube_err(e, "list machine pools"))?;
        Ok(list.items)
    }

    async fn list_cluster_networks(
        &self,
        cluster: &str,
    ) -> Result<Vec<ClusterNetwork>, ControllerError> {
        let list = self
            .networks
            .list(&Self::cluster_selector(cluster))
            .await
            .map_err(|e| map_kube_err(e, "list cluster networks"))?;
        Ok(list.items)
    }

    async fn set_reserved_cidr(
        &self,
        pool_name: &str,
        cidr: Option<&str>,
    ) -> Result<(), ControllerError> {
        // JSON merge patch: a null value deletes the annotation without
        // touching the rest of the map.
        let value = match cidr {
            Some(c) => json!(c),
            None => serde_json::Value::Null,
        };
        let patch = json!({
            "metadata": {
                "annotations": {
                    keys::RESERVED_CIDR_ANNOTATION: value
                }
            }
        });
        self.pools
            .patch(pool_name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| map_kube_err(e, &format!("patch annotation on pool {pool_name}")))?;
        Ok(())
    }

    async fn update_cluster_network(
        &self,
        network: &ClusterNetwork,
    ) -> Result<(), ControllerError> {
        let name = network.metadata.name.as_deref().ok_or_else(|| {
            ControllerError::InvalidConfig("ClusterNetwork missing name".to_string())
        })?;
        let patch = json!({ "spec": network.spec });
        self.networks
            .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| map_kube_err(e, &format!("update cluster network {name}")))?;
        Ok(())
    }

    async fn patch_pool_status(
        &self,
        pool_name: &str,
        status: MachinePoolStatus,
    ) -> Result<(), ControllerError> {
        let patch = json!({ "status": status });
        self.pools
            .patch_status(pool_name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| map_kube_err(e, &format!("patch status on pool {pool_name}")))?;
        Ok(())
    }

    async fn ensure_finalizer(&self, pool_name: &str) -> Result<(), ControllerError> {
        let pool = self
            .pools
            .get(pool_name)
            .await
            .map_err(|e| map_kube_err(e, &format!("get pool {pool_name}")))?;
        let mut finalizers = pool.metadata.finalizers.unwrap_or_default();
        if finalizers.iter().any(|f| f == keys::FINALIZER) {
            return Ok(());
        }
        finalizers.push(keys::FINALIZER.to_string());
        let patch = json!({ "metadata": { "finalizers": finalizers } });
        self.pools
            .patch(pool_name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| map_kube_err(e, &format!("add finalizer to pool {pool_name}")))?;
        Ok(())
    }

    async fn remove_finalizer(&self, pool_name: &str) -> Result<(), ControllerError> {
        let pool = match self.pools.get(pool_name).await {
            Ok(p) => p,
            // The object may already be gone once the finalizer list is
            // empty; nothing left to do.
            Err(KubeError::Api(ae)) if ae.code == 404 => return Ok(()),
            Err(e) => return Err(map_kube_err(e, &format!("get pool {pool_name}"))),
        };
        let mut finalizers = pool.metadata.finalizers.unwrap_or_default();
        if !finalizers.iter().any(|f| f == keys::FINALIZER) {
            return Ok(());
        }
        finalizers.retain(|f| f != keys::FINALIZER);
        let patch = json!({ "metadata": { "finalizers": finalizers } });
        self.pools
            .patch(pool_name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| map_kube_err(e, &format!("remove finalizer from pool {pool_name}")))?;
        Ok(())
    }
}
