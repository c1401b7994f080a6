//! Error types for ML operations

use std::fmt;
use thiserror::Error;

/// Error type for embedding and rerank providers
#[derive(Debug, Error)]
pub enum MLError {
    /// Error during embedding generation
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Error from a rerank provider
    #[error("Rerank error: {0}")]
    Rerank(String),

    /// Error related to provider configuration
    #[error("Model configuration error: {0}")]
    Configuration(String),

    /// Transport error talking to a remote service
    #[error("Remote service error: {0}")]
    Remote(String),

    /// Vector dimensions differ from the configured model
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl MLError {
    /// Create a new embedding error
    pub fn embedding(msg: impl fmt::Display) -> Self {
        Self::Embedding(msg.to_string())
    }

    /// Create a new rerank error
    pub fn rerank(msg: impl fmt::Display) -> Self {
        Self::Rerank(msg.to_string())
    }

    /// Create a new configuration error
    pub fn configuration(msg: impl fmt::Display) -> Self {
        Self::Configuration(msg.to_string())
    }
}

impl From<reqwest::Error> for MLError {
    fn from(err: reqwest::Error) -> Self {
        MLError::Remote(err.to_string())
    }
}

/// Result type for ML operations
pub type Result<T> = std::result::Result<T, MLError>;
