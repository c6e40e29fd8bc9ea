//! Cloud VPC API Client
//!
//! A client library for the cloud network API used by the
//! machinepool-subnet controller: look up a VPC with its CIDR
//! association set, associate an additional CIDR block, and
//! disassociate a block by association id.
//!
//! # Example
//!
//! ```no_run
//! use vpc_client::{VpcClient, VpcClientTrait};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = VpcClient::new(
//!     "http://cloud-api:80".to_string(),
//!     "your-api-token".to_string(),
//! )?;
//!
//! let vpc = client.get_vpc("vpc-0a1b2c").await?;
//! if !vpc.has_association("10.10.16.0/24") {
//!     client.associate_cidr_block("vpc-0a1b2c", "10.10.16.0/24").await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod vpc_trait;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use client::VpcClient;
pub use error::VpcError;
pub use models::*;
pub use vpc_trait::VpcClientTrait;
#[cfg(any(test, feature = "test-util"))]
pub use mock::MockVpcClient;
