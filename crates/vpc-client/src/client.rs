//! VPC API client
//!
//! Implements the REST client for the cloud network API:
//! /api/vpcs/{id}/ and /api/cidr-associations/{id}/.

use crate::error::VpcError;
use crate::models::{CidrAssociation, Vpc};
use crate::vpc_trait::VpcClientTrait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Cloud VPC API client
#[derive(Debug)]
pub struct VpcClient {
    client: Client,
    base_url: String,
    token: String,
}

impl VpcClient {
    /// Create a new VPC client
    ///
    /// # Arguments
    /// * `base_url` - API base URL (e.g., "http://cloud-api:80")
    /// * `token` - API token for authentication
    pub fn new(base_url: String, token: String) -> Result<Self, VpcError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(VpcError::Http)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Validate the API token by making a simple authenticated request.
    ///
    /// Tests connectivity and token validity before the controller
    /// starts watching resources.
    pub async fn validate_token(&self) -> Result<(), VpcError> {
        let url = format!("{}/api/status/", self.base_url);
        debug!("Validating VPC API token and connectivity");

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Token {}", self.token))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(VpcError::Http)?;

        let status = response.status();
        if status == 401 || status == 403 {
            let body = response.text().await.unwrap_or_default();
            return Err(VpcError::Authentication(format!(
                "Invalid token: {} - {}",
                status, body
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VpcError::Api(format!(
                "Status check failed: {} - {}",
                status, body
            )));
        }

        Ok(())
    }

    async fn check_response(
        response: reqwest::Response,
        context: &str,
    ) -> Result<reqwest::Response, VpcError> {
        let status = response.status();
        if status == 401 || status == 403 {
            let body = response.text().await.unwrap_or_default();
            return Err(VpcError::Authentication(format!(
                "{}: {} - {}",
                context, status, body
            )));
        }
        if status == 404 {
            return Err(VpcError::NotFound(context.to_string()));
        }
        if status == 400 || status == 422 {
            let body = response.text().await.unwrap_or_default();
            return Err(VpcError::InvalidRequest(format!(
                "{}: {} - {}",
                context, status, body
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VpcError::Api(format!("{}: {} - {}", context, status, body)));
        }
        Ok(response)
    }
}

#[async_trait::async_trait]
impl VpcClientTrait for VpcClient {
    async fn get_vpc(&self, vpc_id: &str) -> Result<Vpc, VpcError> {
        let url = format!(
            "{}/api/vpcs/{}/",
            self.base_url,
            urlencoding::encode(vpc_id)
        );
        debug!("Fetching VPC {}", vpc_id);

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Token {}", self.token))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(VpcError::Http)?;

        let response = Self::check_response(response, &format!("VPC {}", vpc_id)).await?;
        let vpc = response.json::<Vpc>().await.map_err(VpcError::Http)?;
        Ok(vpc)
    }

    async fn associate_cidr_block(
        &self,
        vpc_id: &str,
        cidr: &str,
    ) -> Result<CidrAssociation, VpcError> {
        let url = format!(
            "{}/api/vpcs/{}/cidr-associations/",
            self.base_url,
            urlencoding::encode(vpc_id)
        );
        debug!("Associating {} with VPC {}", cidr, vpc_id);

        let body = serde_json::json!({ "cidr_block": cidr });
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Token {}", self.token))
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(VpcError::Http)?;

        let response =
            Self::check_response(response, &format!("associate {} on VPC {}", cidr, vpc_id))
                .await?;
        let association = response
            .json::<CidrAssociation>()
            .await
            .map_err(VpcError::Http)?;
        Ok(association)
    }

    async fn disassociate_cidr_block(&self, association_id: &str) -> Result<(), VpcError> {
        let url = format!(
            "{}/api/cidr-associations/{}/",
            self.base_url,
            urlencoding::encode(association_id)
        );
        debug!("Disassociating CIDR association {}", association_id);

        let response = self
            .client
            .delete(&url)
            .header("Authorization", format!("Token {}", self.token))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(VpcError::Http)?;

        Self::check_response(response, &format!("association {}", association_id)).await?;
        Ok(())
    }
}
