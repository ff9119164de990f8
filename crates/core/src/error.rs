//! Error types for terralink

use thiserror::Error;

/// Main error type for terralink pipeline operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unparseable source {source_id}: {reason}")]
    Format { source_id: String, reason: String },

    #[error("network failure for {source_id}: {reason}")]
    Network { source_id: String, reason: String },

    #[error("CRS mismatch: {0} vs {1} (reproject explicitly before combining)")]
    CrsMismatch(String, String),

    #[error("unsupported reprojection: {from} -> {to}")]
    UnsupportedCrs { from: String, to: String },

    #[error("model fit failed: {0}")]
    Fit(String),

    #[error("empty result: {0}")]
    EmptyResult(String),

    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("missing field: {0}")]
    MissingField(String),

    #[error("invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },
}

impl Error {
    /// Build a `Format` error for a named source.
    pub fn format(source_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Format {
            source_id: source_id.into(),
            reason: reason.into(),
        }
    }

    /// Build a `Network` error for a named source.
    pub fn network(source_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Network {
            source_id: source_id.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for terralink operations
pub type Result<T> = std::result::Result<T, Error>;
