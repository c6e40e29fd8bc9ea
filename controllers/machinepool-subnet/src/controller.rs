//! Main controller implementation.
//!
//! This module contains the `Controller` struct that wires the typed
//! API clients, the VPC client, the cluster lock, and the reconciler
//! together and runs the MachinePool watcher.

use crate::config::Config;
use crate::error::ControllerError;
use crate::lock::KubeLeaseLock;
use crate::reconciler::Reconciler;
use crate::store::KubeStore;
use crate::watcher::Watcher;
use crds::{ClusterNetwork, MachinePool};
use k8s_openapi::api::coordination::v1::Lease;
use kube::{Api, Client};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};
use vpc_client::VpcClient;

/// Main controller for MachinePool subnet management.
pub struct Controller {
    pool_watcher: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Creates a new controller instance.
    pub async fn new(config: Config) -> Result<Self, ControllerError> {
        info!("Initializing MachinePool Subnet Controller");

        // Create Kubernetes client
        let kube_client = Client::try_default().await?;

        // Create VPC client and validate connectivity before watching
        let vpc_client = VpcClient::new(config.vpc_api_url.clone(), config.vpc_api_token.clone())?;
        vpc_client.validate_token().await.map_err(|e| {
            error!("Failed to validate VPC API token: {}", e);
            error!("Please ensure VPC_API_TOKEN is set and the API is reachable at {}", config.vpc_api_url);
            ControllerError::Vpc(e)
        })?;
        info!("VPC API token validated and connectivity established");

        // Register typed API clients explicitly
        let ns = config.namespace.as_str();
        let pool_api: Api<MachinePool> = Api::namespaced(kube_client.clone(), ns);
        let network_api: Api<ClusterNetwork> = Api::namespaced(kube_client.clone(), ns);
        let lease_api: Api<Lease> = Api::namespaced(kube_client, ns);

        let store = Arc::new(KubeStore::new(pool_api.clone(), network_api));
        let lock = Arc::new(KubeLeaseLock::new(lease_api, config.lock_lease_seconds));
        let reconciler = Arc::new(Reconciler::new(
            store,
            Arc::new(vpc_client),
            lock,
            config.allocation,
        ));

        let watcher = Watcher::new(reconciler, pool_api, config.resync_interval);
        let pool_watcher = tokio::spawn(async move { watcher.watch_machine_pools().await });

        Ok(Self { pool_watcher })
    }

    /// Runs the controller until shutdown.
    pub async fn run(self) -> Result<(), ControllerError> {
        info!("MachinePool Subnet Controller running");

        self.pool_watcher
            .await
            .map_err(|e| ControllerError::Watch(format!("MachinePool watcher panicked: {e}")))??;

        Ok(())
    }
}
