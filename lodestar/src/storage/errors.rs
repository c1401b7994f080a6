//! Error types for storage operations

use std::error::Error;
use std::fmt;

/// Error type for storage operations
#[derive(Debug)]
pub enum StorageError {
    /// Configuration error
    Configuration(String),

    /// Transaction could not be applied (lock poisoned, conflicting state)
    Transaction(String),

    /// Internal error
    Internal(String),

    /// Validation error
    Validation(String),

    /// Data not found
    NotFound(String),

    /// Item already exists; the uniqueness-constraint signal
    AlreadyExists(String),

    /// The write conflicts with the current state of a record
    Conflict(String),

    /// Serialization/deserialization error
    Serialization(String),

    /// File system error
    Io(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            StorageError::Transaction(msg) => write!(f, "Transaction error: {}", msg),
            StorageError::Internal(msg) => write!(f, "Internal error: {}", msg),
            StorageError::Validation(msg) => write!(f, "Validation error: {}", msg),
            StorageError::NotFound(msg) => write!(f, "Not found: {}", msg),
            StorageError::AlreadyExists(msg) => write!(f, "Already exists: {}", msg),
            StorageError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            StorageError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            StorageError::Io(msg) => write!(f, "IO error: {}", msg),
        }
    }
}

impl Error for StorageError {}

/// Convert a JSON error to a storage error
impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

/// Convert a standard IO error to a storage error
impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

// This allows StorageError to be converted to the top-level LodestarError
impl From<StorageError> for crate::LodestarError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(msg) => crate::LodestarError::NotFound(msg),
            StorageError::Validation(msg) => crate::LodestarError::Validation(msg),
            StorageError::Configuration(msg) => crate::LodestarError::Configuration(msg),
            other => crate::LodestarError::Storage(other.to_string()),
        }
    }
}
