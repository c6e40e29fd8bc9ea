//! Kubernetes resource watcher.
//!
//! Drives the reconciler from MachinePool events using
//! kube_runtime::Controller, which handles reconnection and retry
//! scheduling. Successful attempts requeue at the fixed resync
//! interval; that periodic re-invocation is the operator's sole retry
//! mechanism, the reconciler never self-schedules.

use crate::error::ControllerError;
use crate::reconciler::Reconciler;
use crds::MachinePool;
use futures::StreamExt;
use kube::Api;
use kube_runtime::{
    controller::{Action, Config as ControllerConfig},
    watcher, Controller,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Watches MachinePool resources for changes.
pub struct Watcher {
    reconciler: Arc<Reconciler>,
    pool_api: Api<MachinePool>,
    resync: Duration,
}

impl Watcher {
    /// Creates a new watcher instance.
    pub fn new(reconciler: Arc<Reconciler>, pool_api: Api<MachinePool>, resync: Duration) -> Self {
        Self {
            reconciler,
            pool_api,
            resync,
        }
    }

    /// Starts watching MachinePool resources. Runs until the process
    /// shuts down.
    pub async fn watch_machine_pools(&self) -> Result<(), ControllerError> {
        info!("Starting MachinePool watcher");

        let resync = self.resync;

        // Error policy: requeue with a short backoff; the next attempt
        // re-fetches everything, so no state is carried over.
        let error_policy = |obj: Arc<MachinePool>, error: &ControllerError, _ctx: Arc<Reconciler>| {
            error!(
                "Reconciliation error for MachinePool {}: {}",
                obj.metadata.name.as_deref().unwrap_or("<unknown>"),
                error
            );
            Action::requeue(Duration::from_secs(60))
        };

        let reconcile = move |obj: Arc<MachinePool>, ctx: Arc<Reconciler>| async move {
            ctx.reconcile(&obj).await?;
            Ok(Action::requeue(resync))
        };

        // Debounce batches bursts of events; concurrency bounds how
        // many pools reconcile at once (the per-cluster lock still
        // serializes allocation itself).
        let controller_config = ControllerConfig::default()
            .debounce(Duration::from_secs(5))
            .concurrency(3);

        Controller::new(self.pool_api.clone(), watcher::Config::default())
            .with_config(controller_config)
            .run(reconcile, error_policy, self.reconciler.clone())
            .for_each(|res| async move {
                if let Err(e) = res {
                    error!("Controller error for MachinePool: {}", e);
                }
            })
            .await;

        Ok(())
    }
}
