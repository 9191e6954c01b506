//! Error types for the grounded retrieval engine.

use thiserror::Error;

/// Result type alias for retrieval operations.
pub type Result<T> = std::result::Result<T, RetrievalError>;

/// Errors that can occur in the retrieval engine.
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// Structured or vector store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Embedding error.
    #[error("embedding error: {0}")]
    Embedding(#[from] supplymind_embeddings::EmbeddingError),

    /// Domain name not recognised.
    #[error("unknown domain: {0}")]
    UnknownDomain(String),

    /// Config file could not be parsed.
    #[error("invalid config file: {0}")]
    Toml(#[from] toml::de::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures of a structured or vector store backend.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No store configured.
    #[error("store not configured")]
    NotConfigured,

    /// The store could not be reached.
    #[error("store unreachable: {0}")]
    Unreachable(String),

    /// The store answered with an error status.
    #[error("store returned {status}: {body}")]
    Backend { status: u16, body: String },

    /// The store answered with something that is not rows.
    #[error("could not decode store response: {0}")]
    Decode(String),

    /// The named remote procedure does not exist.
    #[error("unknown procedure: {0}")]
    UnknownProcedure(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            StoreError::Decode(err.to_string())
        } else {
            StoreError::Unreachable(err.to_string())
        }
    }
}
