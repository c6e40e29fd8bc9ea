//! Test utilities for unit testing the reconciler.
//!
//! Provides an in-memory object store and cluster lock plus helpers
//! for building test resources, so reconciler tests run without an
//! apiserver or cloud API.

use crate::config::AllocationConfig;
use crate::error::ControllerError;
use crate::lock::{ClusterLock, LeaseGuard};
use crate::reconciler::Reconciler;
use crate::store::ObjectStore;
use async_trait::async_trait;
use crds::keys;
use crds::{
    ClusterNetwork, ClusterNetworkSpec, MachinePool, MachinePoolSpec, MachinePoolStatus, VpcSpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use vpc_client::{MockVpcClient, Vpc, VpcClientTrait};

/// In-memory [`ObjectStore`]. Clones share state so tests can assert
/// on writes the reconciler made.
#[derive(Clone, Default)]
pub struct MockStore {
    pools: Arc<Mutex<HashMap<String, MachinePool>>>,
    networks: Arc<Mutex<HashMap<String, ClusterNetwork>>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_pool(&self, pool: MachinePool) {
        let name = pool.metadata.name.clone().unwrap();
        self.pools.lock().unwrap().insert(name, pool);
    }

    pub fn add_network(&self, network: ClusterNetwork) {
        let name = network.metadata.name.clone().unwrap();
        self.networks.lock().unwrap().insert(name, network);
    }

    pub fn pool(&self, name: &str) -> MachinePool {
        self.pools.lock().unwrap().get(name).cloned().unwrap()
    }

    pub fn network(&self, name: &str) -> ClusterNetwork {
        self.networks.lock().unwrap().get(name).cloned().unwrap()
    }

    pub fn reserved_cidr_of(&self, name: &str) -> Option<String> {
        keys::reserved_cidr(&self.pool(name).metadata).map(String::from)
    }

    pub fn has_finalizer(&self, name: &str) -> bool {
        self.pool(name)
            .metadata
            .finalizers
            .unwrap_or_default()
            .iter()
            .any(|f| f == keys::FINALIZER)
    }

    fn with_pool<R>(
        &self,
        name: &str,
        f: impl FnOnce(&mut MachinePool) -> R,
    ) -> Result<R, ControllerError> {
        let mut pools = self.pools.lock().unwrap();
        let pool = pools.get_mut(name).ok_or_else(|| {
            ControllerError::InvalidConfig(format!("pool {name} not in mock store"))
        })?;
        Ok(f(pool))
    }
}

fn belongs_to(meta: &ObjectMeta, cluster: &str) -> bool {
    keys::cluster_name_from_labels(meta) == Some(cluster)
}

#[async_trait]
impl ObjectStore for MockStore {
    async fn list_machine_pools(&self, cluster: &str) -> Result<Vec<MachinePool>, ControllerError> {
        // Yield so concurrent reconciles actually interleave.
        tokio::task::yield_now().await;
        Ok(self
            .pools
            .lock()
            .unwrap()
            .values()
            .filter(|p| belongs_to(&p.metadata, cluster))
            .cloned()
            .collect())
    }

    async fn list_cluster_networks(
        &self,
        cluster: &str,
    ) -> Result<Vec<ClusterNetwork>, ControllerError> {
        tokio::task::yield_now().await;
        Ok(self
            .networks
            .lock()
            .unwrap()
            .values()
            .filter(|n| belongs_to(&n.metadata, cluster))
            .cloned()
            .collect())
    }

    async fn set_reserved_cidr(
        &self,
        pool_name: &str,
        cidr: Option<&str>,
    ) -> Result<(), ControllerError> {
        tokio::task::yield_now().await;
        self.with_pool(pool_name, |pool| {
            let annotations = pool.metadata.annotations.get_or_insert_with(BTreeMap::new);
            match cidr {
                Some(c) => {
                    annotations.insert(keys::RESERVED_CIDR_ANNOTATION.to_string(), c.to_string());
                }
                None => {
                    annotations.remove(keys::RESERVED_CIDR_ANNOTATION);
                }
            }
        })
    }

    async fn update_cluster_network(
        &self,
        network: &ClusterNetwork,
    ) -> Result<(), ControllerError> {
        tokio::task::yield_now().await;
        let name = network.metadata.name.clone().ok_or_else(|| {
            ControllerError::InvalidConfig("ClusterNetwork missing name".to_string())
        })?;
        self.networks.lock().unwrap().insert(name, network.clone());
        Ok(())
    }

    async fn patch_pool_status(
        &self,
        pool_name: &str,
        status: MachinePoolStatus,
    ) -> Result<(), ControllerError> {
        self.with_pool(pool_name, |pool| {
            pool.status = Some(status);
        })
    }

    async fn ensure_finalizer(&self, pool_name: &str) -> Result<(), ControllerError> {
        self.with_pool(pool_name, |pool| {
            let finalizers = pool.metadata.finalizers.get_or_insert_with(Vec::new);
            if !finalizers.iter().any(|f| f == keys::FINALIZER) {
                finalizers.push(keys::FINALIZER.to_string());
            }
        })
    }

    async fn remove_finalizer(&self, pool_name: &str) -> Result<(), ControllerError> {
        self.with_pool(pool_name, |pool| {
            if let Some(finalizers) = pool.metadata.finalizers.as_mut() {
                finalizers.retain(|f| f != keys::FINALIZER);
            }
        })
    }
}

/// In-memory [`ClusterLock`] with real mutual exclusion: a second
/// acquirer waits until the holder releases.
#[derive(Clone, Default)]
pub struct InMemoryLock {
    held: Arc<Mutex<HashSet<String>>>,
}

impl InMemoryLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_held(&self, cluster: &str) -> bool {
        self.held.lock().unwrap().contains(cluster)
    }
}

#[async_trait]
impl ClusterLock for InMemoryLock {
    async fn acquire(&self, cluster: &str) -> Result<LeaseGuard, ControllerError> {
        loop {
            {
                let mut held = self.held.lock().unwrap();
                if held.insert(cluster.to_string()) {
                    return Ok(LeaseGuard {
                        cluster: cluster.to_string(),
                        lease_name: format!("subnet-alloc-{cluster}"),
                    });
                }
            }
            tokio::task::yield_now().await;
        }
    }

    async fn release(&self, guard: LeaseGuard) -> Result<(), ControllerError> {
        self.held.lock().unwrap().remove(&guard.cluster);
        Ok(())
    }
}

/// Helper to create a test MachinePool with the expected labels.
pub fn create_test_pool(name: &str, cluster: &str, zones: &[&str]) -> MachinePool {
    let mut labels = BTreeMap::new();
    labels.insert(keys::CLUSTER_NAME_LABEL.to_string(), cluster.to_string());
    labels.insert(
        keys::WATCH_FILTER_LABEL.to_string(),
        keys::WATCH_FILTER_VALUE.to_string(),
    );
    MachinePool {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("default".to_string()),
            labels: Some(labels),
            ..Default::default()
        },
        spec: MachinePoolSpec {
            availability_zones: zones.iter().map(|z| z.to_string()).collect(),
        },
        status: None,
    }
}

/// Stamp an existing reservation onto a pool.
pub fn with_reserved_cidr(mut pool: MachinePool, cidr: &str) -> MachinePool {
    pool.metadata
        .annotations
        .get_or_insert_with(BTreeMap::new)
        .insert(keys::RESERVED_CIDR_ANNOTATION.to_string(), cidr.to_string());
    pool
}

/// Mark a pool as being deleted, with the operator finalizer holding
/// it in place.
pub fn deleting(mut pool: MachinePool) -> MachinePool {
    pool.metadata.deletion_timestamp = Some(Time(chrono::Utc::now()));
    pool.metadata
        .finalizers
        .get_or_insert_with(Vec::new)
        .push(keys::FINALIZER.to_string());
    pool
}

/// Helper to create a test ClusterNetwork and its backing VPC.
pub fn create_test_network(name: &str, cluster: &str, vpc_id: &str, vpc_cidr: &str) -> ClusterNetwork {
    let mut labels = BTreeMap::new();
    labels.insert(keys::CLUSTER_NAME_LABEL.to_string(), cluster.to_string());
    ClusterNetwork {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("default".to_string()),
            labels: Some(labels),
            ..Default::default()
        },
        spec: ClusterNetworkSpec {
            vpc: VpcSpec {
                id: vpc_id.to_string(),
                cidr_block: vpc_cidr.to_string(),
            },
            subnets: Vec::new(),
        },
    }
}

/// Seed the mock VPC client with the VPC a test network references.
pub fn seed_vpc(vpc: &MockVpcClient, vpc_id: &str, vpc_cidr: &str) {
    vpc.add_vpc(Vpc {
        id: vpc_id.to_string(),
        cidr_block: vpc_cidr.to_string(),
        cidr_associations: Vec::new(),
    });
}

/// Standard reconciler under test: parent 10.10.0.0/16, /24 blocks.
pub fn create_test_reconciler(
    store: &MockStore,
    vpc: &MockVpcClient,
    lock: &InMemoryLock,
) -> Reconciler {
    create_test_reconciler_with(store, vpc, lock, "10.10.0.0/16", 24)
}

/// Reconciler with explicit allocation parameters.
pub fn create_test_reconciler_with(
    store: &MockStore,
    vpc: &MockVpcClient,
    lock: &InMemoryLock,
    parent: &str,
    prefix_len: u8,
) -> Reconciler {
    let vpc: Arc<dyn VpcClientTrait> = Arc::new(vpc.clone());
    Reconciler::new(
        Arc::new(store.clone()),
        vpc,
        Arc::new(lock.clone()),
        AllocationConfig {
            parent_cidr: parent.parse().unwrap(),
            subnet_prefix_len: prefix_len,
        },
    )
}
