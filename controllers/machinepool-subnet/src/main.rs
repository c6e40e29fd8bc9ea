//! MachinePool Subnet Controller
//!
//! Allocates non-overlapping CIDR blocks to machine pools sharing a
//! cluster network, associates each block with the cluster VPC, and
//! publishes per-zone subnets to the ClusterNetwork record.
//!
//! Assignments are persisted as a machine pool annotation and are
//! never recomputed while the pool is live; deletion reclaims the
//! block by disassociating it cloud-side first.

mod config;
mod controller;
mod error;
mod lock;
mod reconciler;
mod store;
#[cfg(test)]
mod test_utils;
mod watcher;

use crate::error::ControllerError;
use config::Config;
use controller::Controller;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt::init();

    info!("Starting MachinePool Subnet Controller");

    let config = Config::from_env()?;

    info!("Configuration:");
    info!("  VPC API URL: {}", config.vpc_api_url);
    info!("  Namespace: {}", config.namespace);
    info!("  Parent CIDR: {}", config.allocation.parent_cidr);
    info!("  Subnet prefix length: /{}", config.allocation.subnet_prefix_len);
    info!("  Resync interval: {:?}", config.resync_interval);

    // Initialize and run controller
    let controller = Controller::new(config).await?;
    controller.run().await?;

    Ok(())
}
