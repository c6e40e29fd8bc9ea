//! Mock VpcClient for unit testing
//!
//! In-memory implementation of [`VpcClientTrait`] that can be seeded
//! with VPCs and configured to fail specific operations, so reconciler
//! tests can exercise both happy paths and cloud-side failures without
//! a running API.

use crate::error::VpcError;
use crate::models::{AssociationState, CidrAssociation, Vpc};
use crate::vpc_trait::VpcClientTrait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Mock VpcClient for testing
///
/// Stores VPCs in memory. Clones share state, so a test can hold a
/// handle for assertions while the reconciler owns another.
#[derive(Debug, Clone, Default)]
pub struct MockVpcClient {
    vpcs: Arc<Mutex<HashMap<String, Vpc>>>,
    next_id: Arc<Mutex<u64>>,
    associate_calls: Arc<Mutex<u64>>,
    fail_disassociate: Arc<Mutex<bool>>,
}

impl MockVpcClient {
    /// Create a new, empty mock client
    pub fn new() -> Self {
        Self {
            vpcs: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(Mutex::new(1)),
            associate_calls: Arc::new(Mutex::new(0)),
            fail_disassociate: Arc::new(Mutex::new(false)),
        }
    }

    /// Add a VPC to the mock store (for test setup)
    pub fn add_vpc(&self, vpc: Vpc) {
        self.vpcs.lock().unwrap().insert(vpc.id.clone(), vpc);
    }

    /// Number of associate calls issued so far
    pub fn associate_call_count(&self) -> u64 {
        *self.associate_calls.lock().unwrap()
    }

    /// Make subsequent disassociate calls fail with an API error
    pub fn set_fail_disassociate(&self, fail: bool) {
        *self.fail_disassociate.lock().unwrap() = fail;
    }

    fn next_association_id(&self) -> String {
        let mut id = self.next_id.lock().unwrap();
        let current = *id;
        *id += 1;
        format!("vpc-cidr-assoc-{current:04}")
    }
}

#[async_trait::async_trait]
impl VpcClientTrait for MockVpcClient {
    async fn get_vpc(&self, vpc_id: &str) -> Result<Vpc, VpcError> {
        self.vpcs
            .lock()
            .unwrap()
            .get(vpc_id)
            .cloned()
            .ok_or_else(|| VpcError::NotFound(format!("VPC {} not found", vpc_id)))
    }

    async fn associate_cidr_block(
        &self,
        vpc_id: &str,
        cidr: &str,
    ) -> Result<CidrAssociation, VpcError> {
        *self.associate_calls.lock().unwrap() += 1;

        let association = CidrAssociation {
            association_id: self.next_association_id(),
            cidr_block: cidr.to_string(),
            state: AssociationState::Associated,
        };

        let mut vpcs = self.vpcs.lock().unwrap();
        let vpc = vpcs
            .get_mut(vpc_id)
            .ok_or_else(|| VpcError::NotFound(format!("VPC {} not found", vpc_id)))?;

        // Re-associating a live block returns the existing association,
        // matching the idempotent contract.
        if let Some(existing) = vpc
            .cidr_associations
            .iter()
            .find(|a| a.cidr_block == cidr && a.state == AssociationState::Associated)
        {
            return Ok(existing.clone());
        }

        vpc.cidr_associations.push(association.clone());
        Ok(association)
    }

    async fn disassociate_cidr_block(&self, association_id: &str) -> Result<(), VpcError> {
        if *self.fail_disassociate.lock().unwrap() {
            return Err(VpcError::Api("disassociation rejected".to_string()));
        }

        let mut vpcs = self.vpcs.lock().unwrap();
        for vpc in vpcs.values_mut() {
            if let Some(a) = vpc
                .cidr_associations
                .iter_mut()
                .find(|a| a.association_id == association_id)
            {
                a.state = AssociationState::Disassociated;
                return Ok(());
            }
        }
        Err(VpcError::NotFound(format!(
            "association {} not found",
            association_id
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed_vpc(client: &MockVpcClient) {
        client.add_vpc(Vpc {
            id: "vpc-1".to_string(),
            cidr_block: "10.10.0.0/20".to_string(),
            cidr_associations: Vec::new(),
        });
    }

    #[tokio::test]
    async fn associate_then_get_reflects_association() {
        let client = MockVpcClient::new();
        seed_vpc(&client);

        let a = client
            .associate_cidr_block("vpc-1", "10.10.16.0/24")
            .await
            .unwrap();
        assert_eq!(a.state, AssociationState::Associated);

        let vpc = client.get_vpc("vpc-1").await.unwrap();
        assert!(vpc.has_association("10.10.16.0/24"));
    }

    #[tokio::test]
    async fn repeated_association_is_idempotent() {
        let client = MockVpcClient::new();
        seed_vpc(&client);

        let a = client
            .associate_cidr_block("vpc-1", "10.10.16.0/24")
            .await
            .unwrap();
        let b = client
            .associate_cidr_block("vpc-1", "10.10.16.0/24")
            .await
            .unwrap();
        assert_eq!(a.association_id, b.association_id);

        let vpc = client.get_vpc("vpc-1").await.unwrap();
        assert_eq!(vpc.cidr_associations.len(), 1);
    }

    #[tokio::test]
    async fn disassociate_removes_live_association() {
        let client = MockVpcClient::new();
        seed_vpc(&client);

        let a = client
            .associate_cidr_block("vpc-1", "10.10.16.0/24")
            .await
            .unwrap();
        client
            .disassociate_cidr_block(&a.association_id)
            .await
            .unwrap();

        let vpc = client.get_vpc("vpc-1").await.unwrap();
        assert!(!vpc.has_association("10.10.16.0/24"));
        assert!(vpc.find_association("10.10.16.0/24").is_none());
    }

    #[tokio::test]
    async fn disassociate_unknown_association_is_not_found() {
        let client = MockVpcClient::new();
        seed_vpc(&client);

        let err = client
            .disassociate_cidr_block("vpc-cidr-assoc-9999")
            .await
            .unwrap_err();
        assert!(matches!(err, VpcError::NotFound(_)));
    }
}
