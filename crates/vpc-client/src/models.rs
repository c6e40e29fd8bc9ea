//! VPC API data models

use serde::{Deserialize, Serialize};

/// A VPC together with its CIDR association set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vpc {
    /// Cloud-side VPC identifier
    pub id: String,

    /// Primary CIDR block
    pub cidr_block: String,

    /// Additional CIDR blocks associated with the VPC
    #[serde(default)]
    pub cidr_associations: Vec<CidrAssociation>,
}

impl Vpc {
    /// Returns true if `cidr` is already associated with this VPC.
    ///
    /// Only live associations count; a block that is disassociating or
    /// already gone must be re-associated.
    pub fn has_association(&self, cidr: &str) -> bool {
        self.cidr_associations
            .iter()
            .any(|a| a.cidr_block == cidr && a.state == AssociationState::Associated)
    }

    /// Finds the live association for `cidr`, if any.
    pub fn find_association(&self, cidr: &str) -> Option<&CidrAssociation> {
        self.cidr_associations
            .iter()
            .find(|a| a.cidr_block == cidr && a.state == AssociationState::Associated)
    }
}

/// One CIDR block association on a VPC
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CidrAssociation {
    /// Association identifier, used for disassociation
    pub association_id: String,

    /// The associated CIDR block
    pub cidr_block: String,

    /// Association lifecycle state
    pub state: AssociationState,
}

/// Lifecycle state of a CIDR association
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum AssociationState {
    /// The block is live on the VPC
    Associated,
    /// Disassociation in progress
    Disassociating,
    /// The block has been removed
    Disassociated,
}
