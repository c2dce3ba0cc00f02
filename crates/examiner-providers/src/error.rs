//! Provider error types.

use std::time::Duration;

use thiserror::Error;

use examiner_core::error::SourceError;

/// Errors that can occur when calling a generative collaborator over HTTP.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The API returned a 429 rate limit response.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Authentication failed (invalid API key).
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The requested model was not found.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// The API returned an error response.
    #[error("API error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// A successful response whose body could not be decoded.
    #[error("invalid response body: {0}")]
    InvalidResponse(String),

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    NetworkError(String),
}

impl ProviderError {
    /// Permanent errors are never retried.
    pub fn is_permanent(&self) -> bool {
        match self {
            ProviderError::AuthenticationFailed(_)
            | ProviderError::ModelNotFound(_)
            | ProviderError::InvalidResponse(_) => true,
            ProviderError::ApiError { status, .. } => (400..500).contains(status),
            _ => false,
        }
    }

    /// The server's retry hint, if it gave one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ProviderError::RateLimited { retry_after_ms } => {
                Some(Duration::from_millis(*retry_after_ms))
            }
            _ => None,
        }
    }
}

impl From<ProviderError> for SourceError {
    fn from(err: ProviderError) -> Self {
        SourceError::Transport(err.to_string())
    }
}
