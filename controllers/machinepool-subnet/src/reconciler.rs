//! Reconciliation logic for MachinePool subnet allocation.
//!
//! The create path resolves the owning ClusterNetwork, reuses or
//! computes the pool's reserved CIDR block, makes sure the block is
//! associated with the cluster VPC, and publishes per-zone subnets to
//! the ClusterNetwork record. The delete path runs the inverse:
//! disassociate cloud-side first, and only then clear the reservation.
//!
//! Every step is safe to re-run. Partial progress (reservation written
//! but association or publish missing) is resumed on the next attempt,
//! and a persisted reservation is never recomputed. Failures abort the
//! attempt without rollback; the fixed requeue cadence is the retry
//! mechanism.

use crate::config::AllocationConfig;
use crate::error::ControllerError;
use crate::lock::ClusterLock;
use crate::store::ObjectStore;
use chrono::Utc;
use crds::keys;
use crds::{ClusterNetwork, MachinePool, MachinePoolStatus, SubnetSpec, SubnetState};
use ipnet::Ipv4Net;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use vpc_client::{VpcClientTrait, VpcError};

/// Reconciles machine pool subnet assignments.
pub struct Reconciler {
    store: Arc<dyn ObjectStore>,
    vpc: Arc<dyn VpcClientTrait>,
    lock: Arc<dyn ClusterLock>,
    allocation: AllocationConfig,
}

impl Reconciler {
    /// Creates a new reconciler instance.
    pub fn new(
        store: Arc<dyn ObjectStore>,
        vpc: Arc<dyn VpcClientTrait>,
        lock: Arc<dyn ClusterLock>,
        allocation: AllocationConfig,
    ) -> Self {
        Self {
            store,
            vpc,
            lock,
            allocation,
        }
    }

    /// Reconciles one MachinePool event: allocation while the pool is
    /// live, reclaim once it is marked for deletion.
    pub async fn reconcile(&self, pool: &MachinePool) -> Result<(), ControllerError> {
        let name = pool
            .metadata
            .name
            .as_deref()
            .ok_or_else(|| ControllerError::InvalidConfig("MachinePool missing name".to_string()))?;

        if !keys::has_watch_label(&pool.metadata) {
            info!(
                "MachinePool {} does not have {}={} label, ignoring",
                name,
                keys::WATCH_FILTER_LABEL,
                keys::WATCH_FILTER_VALUE
            );
            return Ok(());
        }

        if pool.metadata.deletion_timestamp.is_some() {
            info!("Reclaiming subnet of MachinePool {}", name);
            if let Err(e) = self.delete(pool, name).await {
                self.update_status(
                    name,
                    MachinePoolStatus {
                        state: SubnetState::Failed,
                        assigned_cidr: keys::reserved_cidr(&pool.metadata).map(String::from),
                        last_reconciled: Some(Utc::now()),
                        error: Some(e.to_string()),
                    },
                )
                .await;
                return Err(e);
            }
            self.store.remove_finalizer(name).await?;
            return Ok(());
        }

        info!("Reconciling MachinePool {}", name);
        match self.allocate(pool, name).await {
            Ok(assigned) => {
                self.store.ensure_finalizer(name).await?;
                self.update_status(
                    name,
                    MachinePoolStatus {
                        state: SubnetState::Allocated,
                        assigned_cidr: Some(assigned.to_string()),
                        last_reconciled: Some(Utc::now()),
                        error: None,
                    },
                )
                .await;
                Ok(())
            }
            Err(e) => {
                self.update_status(
                    name,
                    MachinePoolStatus {
                        state: SubnetState::Failed,
                        assigned_cidr: keys::reserved_cidr(&pool.metadata).map(String::from),
                        last_reconciled: Some(Utc::now()),
                        error: Some(e.to_string()),
                    },
                )
                .await;
                Err(e)
            }
        }
    }

    /// The create/reconcile path. Returns the pool's assigned block.
    async fn allocate(&self, pool: &MachinePool, name: &str) -> Result<Ipv4Net, ControllerError> {
        let cluster = owning_cluster(pool)?;
        let network = self.cluster_network(cluster).await?;

        // Reuse the persisted assignment if one exists; it is never
        // recomputed while the pool is live.
        let assigned = match keys::reserved_cidr(&pool.metadata) {
            Some(raw) => raw.parse::<Ipv4Net>().map_err(|e| {
                ControllerError::InvalidCidr(format!("reserved CIDR '{raw}' on pool {name}: {e}"))
            })?,
            None => self.allocate_block(name, cluster, &network).await?,
        };

        self.ensure_association(&network, assigned).await?;
        self.publish_subnets(pool, name, network, assigned).await?;

        Ok(assigned)
    }

    /// Picks a free block under the cluster allocation lock and
    /// persists it as the pool's reservation.
    async fn allocate_block(
        &self,
        name: &str,
        cluster: &str,
        network: &ClusterNetwork,
    ) -> Result<Ipv4Net, ControllerError> {
        let guard = self.lock.acquire(cluster).await?;
        let result = self.find_and_reserve(name, cluster, network).await;
        // The lock is released even when allocation failed; a held
        // lease would block every sibling until it expires.
        if let Err(e) = self.lock.release(guard).await {
            warn!("Failed to release allocation lease for cluster {}: {}", cluster, e);
        }
        result
    }

    async fn find_and_reserve(
        &self,
        name: &str,
        cluster: &str,
        network: &ClusterNetwork,
    ) -> Result<Ipv4Net, ControllerError> {
        let vpc_cidr = &network.spec.vpc.cidr_block;
        let mut used = vec![vpc_cidr.parse::<Ipv4Net>().map_err(|e| {
            ControllerError::InvalidCidr(format!("VPC CIDR '{vpc_cidr}': {e}"))
        })?];

        for sibling in self.store.list_machine_pools(cluster).await? {
            if let Some(raw) = keys::reserved_cidr(&sibling.metadata) {
                let sibling_name = sibling.metadata.name.as_deref().unwrap_or("<unknown>");
                used.push(raw.parse::<Ipv4Net>().map_err(|e| {
                    ControllerError::InvalidCidr(format!(
                        "reserved CIDR '{raw}' on pool {sibling_name}: {e}"
                    ))
                })?);
            }
        }

        let block = ipam::find_free(
            self.allocation.parent_cidr,
            self.allocation.subnet_prefix_len,
            &used,
        )?;

        self.store
            .set_reserved_cidr(name, Some(&block.to_string()))
            .await?;
        info!("Reserved {} for MachinePool {}", block, name);
        Ok(block)
    }

    /// Makes sure the assigned block is associated with the cluster
    /// VPC. Re-issued on every reconcile until confirmed; associating
    /// an already-present block is a no-op.
    async fn ensure_association(
        &self,
        network: &ClusterNetwork,
        assigned: Ipv4Net,
    ) -> Result<(), ControllerError> {
        let vpc_id = &network.spec.vpc.id;
        let cidr = assigned.to_string();
        let vpc = self.vpc.get_vpc(vpc_id).await?;
        if vpc.has_association(&cidr) {
            debug!("{} already associated with VPC {}", cidr, vpc_id);
            return Ok(());
        }
        self.vpc.associate_cidr_block(vpc_id, &cidr).await?;
        info!("Associated {} with VPC {}", cidr, vpc_id);
        Ok(())
    }

    /// Publishes the pool's per-zone subnets to the ClusterNetwork.
    ///
    /// Each per-zone sub-range is checked independently so a partially
    /// published previous attempt is completed rather than skipped.
    async fn publish_subnets(
        &self,
        pool: &MachinePool,
        name: &str,
        mut network: ClusterNetwork,
        assigned: Ipv4Net,
    ) -> Result<(), ControllerError> {
        let zones = &pool.spec.availability_zones;
        if zones.is_empty() {
            return Err(ControllerError::InvalidConfig(format!(
                "MachinePool {name} has no availability zones"
            )));
        }

        let ranges = ipam::split(assigned, zones.len())?;

        let mut added = 0usize;
        for (zone, range) in zones.iter().zip(&ranges) {
            let cidr = range.to_string();
            if network.spec.subnets.iter().any(|s| s.cidr_block == cidr) {
                continue;
            }
            network.spec.subnets.push(SubnetSpec {
                cidr_block: cidr,
                availability_zone: zone.clone(),
                is_public: false,
                tags: keys::subnet_tags(name),
            });
            added += 1;
        }

        if added > 0 {
            self.store.update_cluster_network(&network).await?;
            info!(
                "Published {} subnet(s) of MachinePool {} to ClusterNetwork",
                added, name
            );
        }
        Ok(())
    }

    /// The delete/reclaim path: disassociate the block cloud-side, and
    /// only then clear the reservation so a failed disassociation can
    /// be retried against the same recorded range.
    async fn delete(&self, pool: &MachinePool, name: &str) -> Result<(), ControllerError> {
        let Some(cidr) = keys::reserved_cidr(&pool.metadata) else {
            debug!("MachinePool {} has no reservation, nothing to reclaim", name);
            return Ok(());
        };

        let cluster = owning_cluster(pool)?;
        let network = self.cluster_network(cluster).await?;
        let vpc = self.vpc.get_vpc(&network.spec.vpc.id).await?;

        match vpc.find_association(cidr) {
            Some(association) => {
                match self
                    .vpc
                    .disassociate_cidr_block(&association.association_id)
                    .await
                {
                    Ok(()) => info!("Disassociated {} from VPC {}", cidr, network.spec.vpc.id),
                    // Steady state, not a fault: reclaimed out of band
                    // between our read and the call.
                    Err(VpcError::NotFound(_)) => {
                        info!("Association for {} already gone", cidr);
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            None => debug!("{} not associated with VPC {}", cidr, network.spec.vpc.id),
        }

        self.store.set_reserved_cidr(name, None).await?;
        info!("Cleared reservation {} from MachinePool {}", cidr, name);
        Ok(())
    }

    /// Resolves the single ClusterNetwork owning `cluster`.
    async fn cluster_network(&self, cluster: &str) -> Result<ClusterNetwork, ControllerError> {
        let mut networks = self.store.list_cluster_networks(cluster).await?;
        match networks.len() {
            0 => Err(ControllerError::ClusterNetworkNotFound(cluster.to_string())),
            1 => Ok(networks.remove(0)),
            count => Err(ControllerError::AmbiguousClusterNetwork {
                cluster: cluster.to_string(),
                count,
            }),
        }
    }

    /// Patches the pool's status, logging failures instead of failing
    /// the attempt: status is advisory, the annotation is the record.
    async fn update_status(&self, name: &str, status: MachinePoolStatus) {
        if let Err(e) = self.store.patch_pool_status(name, status).await {
            error!("Failed to update MachinePool {} status: {}", name, e);
        }
    }
}

fn owning_cluster(pool: &MachinePool) -> Result<&str, ControllerError> {
    keys::cluster_name_from_labels(&pool.metadata).ok_or_else(|| {
        ControllerError::InvalidConfig(format!(
            "MachinePool {} missing {} label",
            pool.metadata.name.as_deref().unwrap_or("<unknown>"),
            keys::CLUSTER_NAME_LABEL
        ))
    })
}
