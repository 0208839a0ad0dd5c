//! Error type for the data-API façade

use iracing_auth::AuthError;
use thiserror::Error;

/// Error type for authenticated data-API requests
#[derive(Debug, Error)]
pub enum DataApiError {
    /// Obtaining a valid bearer token failed
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// The HTTP request could not be completed
    #[error("request failed: {0}")]
    Request(String),

    /// The data API answered with a non-success status
    #[error("unexpected status {status} from {path}")]
    UnexpectedStatus { status: u16, path: String },

    /// The response body was not valid JSON
    #[error("failed to decode response body: {0}")]
    Decode(String),

    /// Invalid façade configuration
    #[error("configuration error: {0}")]
    Config(String),
}
