//! Error types for remote ingestion.

use thiserror::Error;

/// Errors produced by the remote ingestion clients.
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("network error for {url}: {reason}")]
    Network { url: String, reason: String },

    #[error("unexpected response from {url}: {reason}")]
    Decode { url: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("core error: {0}")]
    Core(#[from] terralink_core::Error),
}

impl RemoteError {
    pub fn network(url: impl Into<String>, reason: impl Into<String>) -> Self {
        RemoteError::Network {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub fn decode(url: impl Into<String>, reason: impl Into<String>) -> Self {
        RemoteError::Decode {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

/// Surface remote failures in the pipeline's own taxonomy.
impl From<RemoteError> for terralink_core::Error {
    fn from(e: RemoteError) -> Self {
        match e {
            RemoteError::Core(inner) => inner,
            RemoteError::Network { url, reason } => terralink_core::Error::network(url, reason),
            RemoteError::Decode { url, reason } => terralink_core::Error::format(url, reason),
            RemoteError::Http(inner) => terralink_core::Error::network(
                inner.url().map(|u| u.to_string()).unwrap_or_default(),
                inner.to_string(),
            ),
            RemoteError::Io(inner) => terralink_core::Error::Io(inner),
        }
    }
}

/// Result alias for remote operations.
pub type Result<T> = std::result::Result<T, RemoteError>;
