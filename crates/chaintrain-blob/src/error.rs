//! Blob store error types.

use chaintrain_crypto::CryptoError;

/// Errors from blob store calls.
#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    /// HTTP transport error.
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },
    /// The blob store returned a non-2xx status.
    #[error("blob store {endpoint} returned {status}: {body}")]
    ApiError {
        endpoint: String,
        status: u16,
        body: String,
    },
    /// Response deserialization failed.
    #[error("failed to deserialize response from {endpoint}: {source}")]
    Deserialization {
        endpoint: String,
        source: reqwest::Error,
    },
    /// The response parsed but lacks required fields.
    #[error("unexpected response from {endpoint}: {reason}")]
    UnexpectedResponse { endpoint: String, reason: String },
    /// No blob with this id.
    #[error("blob not found: {0}")]
    NotFound(String),
    /// Stored bytes do not match their content address.
    #[error("integrity check failed for blob {blob_id}")]
    Integrity { blob_id: String },
    /// Local storage failure.
    #[error("local blob storage error: {0}")]
    Storage(#[from] CryptoError),
    /// The store refused the call (used by the in-memory store).
    #[error("blob store unavailable: {0}")]
    Unavailable(String),
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] super::config::ConfigError),
}

impl BlobError {
    /// Whether the failure lies with the remote service rather than the
    /// request or the data.
    pub fn is_unavailable(&self) -> bool {
        match self {
            Self::Http { .. } | Self::Unavailable(_) => true,
            Self::ApiError { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
