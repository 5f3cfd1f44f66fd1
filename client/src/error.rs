//! Error types for the lineage client

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for client setup operations
pub type Result<T> = std::result::Result<T, LineageError>;

/// Errors raised while configuring or bootstrapping the client
///
/// None of these are produced on the emission path; `emit` swallows every
/// delivery failure after recording it.
#[derive(Error, Debug)]
pub enum LineageError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML config could not be parsed
    #[error("invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON (de)serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Metrics registration error
    #[error("metrics error: {0}")]
    Metrics(String),

    /// Transport could not be constructed or torn down
    #[error("transport '{transport}' error: {source}")]
    Transport {
        transport: String,
        #[source]
        source: TransportError,
    },
}

impl From<prometheus::Error> for LineageError {
    fn from(err: prometheus::Error) -> Self {
        LineageError::Metrics(err.to_string())
    }
}

/// Error type for transport operations
#[derive(Error, Debug)]
pub enum TransportError {
    /// Initialization failed
    #[error("initialization failed: {0}")]
    Init(String),

    /// Event could not be serialized
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Connection error
    #[error("connection error: {0}")]
    Connection(String),

    /// Backend answered with a non-success status
    #[error("backend rejected event with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Request timed out
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Transport already closed
    #[error("transport closed")]
    Closed,

    /// Teardown error
    #[error("close error: {0}")]
    Close(String),
}

/// Coarse classification of a [`TransportError`]
///
/// Circuit breaker policies name these to choose which failures count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportErrorKind {
    Init,
    Serialization,
    Connection,
    Rejected,
    Timeout,
    Closed,
}

impl TransportError {
    /// Classify this error
    pub fn kind(&self) -> TransportErrorKind {
        match self {
            TransportError::Init(_) => TransportErrorKind::Init,
            TransportError::Serialization(_) => TransportErrorKind::Serialization,
            TransportError::Connection(_) => TransportErrorKind::Connection,
            TransportError::Rejected { .. } => TransportErrorKind::Rejected,
            TransportError::Timeout(_) => TransportErrorKind::Timeout,
            TransportError::Closed | TransportError::Close(_) => TransportErrorKind::Closed,
        }
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        TransportError::Serialization(err.to_string())
    }
}
