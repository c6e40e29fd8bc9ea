//! Cluster-scoped allocation lock.
//!
//! Serializes the read-decide-write section of subnet allocation so
//! two pools in the same cluster can never both pick the same block.
//! The lock is advisory and lease-based: a holder that crashes stops
//! renewing, the lease expires, and the next acquirer takes over.
//!
//! [`KubeLeaseLock`] backs the lock with a `coordination.k8s.io/v1`
//! Lease object; take-over of an expired lease goes through a
//! resourceVersion-guarded replace, so two racing takers cannot both
//! win.

use crate::error::ControllerError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use k8s_openapi::api::coordination::v1::{Lease, LeaseSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::MicroTime;
use kube::api::{DeleteParams, ObjectMeta, PostParams};
use kube::Api;
use kube::Error as KubeError;
use tracing::debug;
use uuid::Uuid;

/// Token for a held cluster lock.
#[derive(Debug, Clone)]
pub struct LeaseGuard {
    /// Cluster the lock is scoped to
    pub cluster: String,
    /// Name of the backing lease object
    pub lease_name: String,
}

/// Lease-based mutual exclusion, scoped per cluster.
#[async_trait]
pub trait ClusterLock: Send + Sync {
    /// Acquire the lock for `cluster`. Contention is a transient
    /// [`ControllerError::Lock`]; the caller retries next cycle.
    async fn acquire(&self, cluster: &str) -> Result<LeaseGuard, ControllerError>;

    /// Release a held lock. Idempotent: releasing an expired or
    /// already-released lease succeeds.
    async fn release(&self, guard: LeaseGuard) -> Result<(), ControllerError>;
}

/// Returns true once the lease's grant has outlived its TTL.
fn lease_expired(lease: &Lease, now: DateTime<Utc>) -> bool {
    let Some(spec) = &lease.spec else {
        return true;
    };
    let Some(renewed) = spec.renew_time.as_ref().or(spec.acquire_time.as_ref()) else {
        return true;
    };
    let ttl = chrono::Duration::seconds(i64::from(spec.lease_duration_seconds.unwrap_or(0)));
    renewed.0 + ttl < now
}

/// Cluster lock backed by Kubernetes Lease objects.
pub struct KubeLeaseLock {
    api: Api<Lease>,
    holder: String,
    ttl_seconds: i32,
}

impl KubeLeaseLock {
    /// Creates a lock with a unique holder identity for this process.
    pub fn new(api: Api<Lease>, ttl_seconds: i32) -> Self {
        Self {
            api,
            holder: format!("machinepool-subnet-{}", Uuid::new_v4()),
            ttl_seconds,
        }
    }

    fn lease_body(&self, name: &str, now: DateTime<Utc>) -> Lease {
        Lease {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            spec: Some(LeaseSpec {
                holder_identity: Some(self.holder.clone()),
                lease_duration_seconds: Some(self.ttl_seconds),
                acquire_time: Some(MicroTime(now)),
                renew_time: Some(MicroTime(now)),
                ..Default::default()
            }),
        }
    }
}

#[async_trait]
impl ClusterLock for KubeLeaseLock {
    async fn acquire(&self, cluster: &str) -> Result<LeaseGuard, ControllerError> {
        let name = format!("subnet-alloc-{cluster}");
        let now = Utc::now();
        let guard = LeaseGuard {
            cluster: cluster.to_string(),
            lease_name: name.clone(),
        };

        match self
            .api
            .create(&PostParams::default(), &self.lease_body(&name, now))
            .await
        {
            Ok(_) => {
                debug!("Acquired allocation lease {}", name);
                Ok(guard)
            }
            Err(KubeError::Api(ae)) if ae.code == 409 => {
                let existing = self
                    .api
                    .get(&name)
                    .await
                    .map_err(|e| ControllerError::Lock(format!("get lease {name}: {e}")))?;
                let holder = existing
                    .spec
                    .as_ref()
                    .and_then(|s| s.holder_identity.clone());

                if holder.as_deref() == Some(self.holder.as_str()) || lease_expired(&existing, now)
                {
                    // Take over, keeping the resourceVersion so a
                    // concurrent taker loses with a conflict.
                    let mut updated = self.lease_body(&name, now);
                    updated.metadata.resource_version = existing.metadata.resource_version.clone();
                    self.api
                        .replace(&name, &PostParams::default(), &updated)
                        .await
                        .map_err(|e| {
                            ControllerError::Lock(format!("take over lease {name}: {e}"))
                        })?;
                    debug!("Took over expired allocation lease {}", name);
                    Ok(guard)
                } else {
                    Err(ControllerError::Lock(format!(
                        "allocation lease {} held by {}",
                        name,
                        holder.as_deref().unwrap_or("<unknown>")
                    )))
                }
            }
            Err(e) => Err(ControllerError::Lock(format!("create lease {name}: {e}"))),
        }
    }

    async fn release(&self, guard: LeaseGuard) -> Result<(), ControllerError> {
        let existing = match self.api.get(&guard.lease_name).await {
            Ok(l) => l,
            Err(KubeError::Api(ae)) if ae.code == 404 => return Ok(()),
            Err(e) => {
                return Err(ControllerError::Lock(format!(
                    "get lease {}: {e}",
                    guard.lease_name
                )));
            }
        };

        let holder = existing
            .spec
            .as_ref()
            .and_then(|s| s.holder_identity.as_deref());
        if holder != Some(self.holder.as_str()) {
            // Our lease expired and someone else took it; theirs now.
            debug!(
                "Not releasing lease {}: held by {}",
                guard.lease_name,
                holder.unwrap_or("<unknown>")
            );
            return Ok(());
        }

        match self
            .api
            .delete(&guard.lease_name, &DeleteParams::default())
            .await
        {
            Ok(_) => {
                debug!("Released allocation lease {}", guard.lease_name);
                Ok(())
            }
            Err(KubeError::Api(ae)) if ae.code == 404 => Ok(()),
            Err(e) => Err(ControllerError::Lock(format!(
                "delete lease {}: {e}",
                guard.lease_name
            ))),
        }
    }
}
