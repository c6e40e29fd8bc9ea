//! Operator configuration.
//!
//! All configuration is operator-wide and loaded once at startup from
//! environment variables; nothing is configurable per-object.

use crate::error::ControllerError;
use ipnet::Ipv4Net;
use std::env;
use std::time::Duration;

/// Default parent range machine pool blocks are carved from.
const DEFAULT_PARENT_CIDR: &str = "10.10.0.0/16";

/// Default prefix length of an allocated block.
const DEFAULT_SUBNET_PREFIX_LEN: &str = "24";

/// Default fixed requeue cadence in seconds.
const DEFAULT_RESYNC_SECS: &str = "300";

/// Default lock lease time-to-live in seconds.
const DEFAULT_LOCK_LEASE_SECS: &str = "60";

/// Complete operator configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Cloud VPC API base URL
    pub vpc_api_url: String,
    /// Cloud VPC API token
    pub vpc_api_token: String,
    /// Namespace to watch
    pub namespace: String,
    /// Address-space allocation parameters
    pub allocation: AllocationConfig,
    /// Fixed requeue cadence; the operator's sole retry mechanism
    pub resync_interval: Duration,
    /// Lock lease time-to-live, bounding how long a crashed holder
    /// can block allocation for a cluster
    pub lock_lease_seconds: i32,
}

/// Parameters of the free-block search.
#[derive(Debug, Clone, Copy)]
pub struct AllocationConfig {
    /// Parent range all machine pool blocks are drawn from
    pub parent_cidr: Ipv4Net,
    /// Prefix length of every allocated block
    pub subnet_prefix_len: u8,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ControllerError> {
        let vpc_api_url = env::var("VPC_API_URL").map_err(|_| {
            ControllerError::InvalidConfig("VPC_API_URL environment variable is required".to_string())
        })?;
        let vpc_api_token = env::var("VPC_API_TOKEN").map_err(|_| {
            ControllerError::InvalidConfig("VPC_API_TOKEN environment variable is required".to_string())
        })?;
        let namespace = env::var("WATCH_NAMESPACE").unwrap_or_else(|_| "default".to_string());

        let parent_raw =
            env::var("SUBNET_PARENT_CIDR").unwrap_or_else(|_| DEFAULT_PARENT_CIDR.to_string());
        let parent_cidr = parent_raw.parse::<Ipv4Net>().map_err(|e| {
            ControllerError::InvalidConfig(format!("SUBNET_PARENT_CIDR '{parent_raw}': {e}"))
        })?;

        let prefix_raw =
            env::var("SUBNET_PREFIX_LEN").unwrap_or_else(|_| DEFAULT_SUBNET_PREFIX_LEN.to_string());
        let subnet_prefix_len = parse_subnet_prefix_len(&prefix_raw)?;

        let resync_raw =
            env::var("RESYNC_INTERVAL_SECS").unwrap_or_else(|_| DEFAULT_RESYNC_SECS.to_string());
        let resync_secs = resync_raw.parse::<u64>().map_err(|e| {
            ControllerError::InvalidConfig(format!("RESYNC_INTERVAL_SECS '{resync_raw}': {e}"))
        })?;

        let lease_raw =
            env::var("LOCK_LEASE_SECONDS").unwrap_or_else(|_| DEFAULT_LOCK_LEASE_SECS.to_string());
        let lock_lease_seconds = lease_raw.parse::<i32>().map_err(|e| {
            ControllerError::InvalidConfig(format!("LOCK_LEASE_SECONDS '{lease_raw}': {e}"))
        })?;

        Ok(Self {
            vpc_api_url,
            vpc_api_token,
            namespace,
            allocation: AllocationConfig {
                parent_cidr,
                subnet_prefix_len,
            },
            resync_interval: Duration::from_secs(resync_secs),
            lock_lease_seconds,
        })
    }
}

/// Parse and validate the subnet prefix length.
fn parse_subnet_prefix_len(raw: &str) -> Result<u8, ControllerError> {
    let len = raw.parse::<u8>().map_err(|e| {
        ControllerError::InvalidConfig(format!("SUBNET_PREFIX_LEN '{raw}': {e}"))
    })?;
    if len > 32 {
        return Err(ControllerError::InvalidConfig(format!(
            "SUBNET_PREFIX_LEN '{raw}': must be at most 32"
        )));
    }
    Ok(len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_len_parses_within_bounds() {
        assert_eq!(parse_subnet_prefix_len("24").unwrap(), 24);
        assert_eq!(parse_subnet_prefix_len("32").unwrap(), 32);
    }

    #[test]
    fn prefix_len_rejects_out_of_range() {
        assert!(parse_subnet_prefix_len("33").is_err());
        assert!(parse_subnet_prefix_len("-1").is_err());
        assert!(parse_subnet_prefix_len("abc").is_err());
    }
}
