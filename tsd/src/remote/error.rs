//! Remote service error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Remote API key not found. Set the {0} environment variable.")]
    MissingApiKey(String),

    #[error("Remote returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RemoteError {
    /// Whether resending the same request could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            RemoteError::Status { status, .. } => *status == 429 || *status >= 500,
            RemoteError::Network(_) => true,
            RemoteError::MissingApiKey(_) | RemoteError::Json(_) => false,
        }
    }
}
