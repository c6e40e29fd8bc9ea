//! VPC client errors

use thiserror::Error;

/// Errors that can occur when interacting with the cloud VPC API
#[derive(Debug, Error)]
pub enum VpcError {
    /// HTTP request/response error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API returned an error
    #[error("VPC API error: {0}")]
    Api(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Authentication failed (invalid token, expired, etc.)
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request (e.g., malformed CIDR)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}
