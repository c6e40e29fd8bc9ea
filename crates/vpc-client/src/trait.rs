//! VpcClient trait for mocking
//!
//! This trait abstracts the VpcClient to enable mocking in unit tests.
//! The concrete VpcClient implements this trait, and tests can use mock
//! implementations.

use crate::error::VpcError;
use crate::models::{CidrAssociation, Vpc};

/// Trait for cloud VPC API operations
///
/// All operations are idempotent from the caller's point of view:
/// associating an already-associated block and disassociating a missing
/// association are handled by the reconciler checking the association
/// set first, but implementations must also tolerate repeats without
/// corrupting state. All async methods must be `Send` to work with
/// Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait VpcClientTrait: Send + Sync {
    /// Fetch a VPC with its current CIDR association set
    async fn get_vpc(&self, vpc_id: &str) -> Result<Vpc, VpcError>;

    /// Associate an additional CIDR block with a VPC
    async fn associate_cidr_block(
        &self,
        vpc_id: &str,
        cidr: &str,
    ) -> Result<CidrAssociation, VpcError>;

    /// Remove a CIDR association by association id
    async fn disassociate_cidr_block(&self, association_id: &str) -> Result<(), VpcError>;
}
