//! Client-side storage error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reading or writing persisted client state
#[derive(Error, Debug)]
pub enum StorageError {
    /// I/O operation failed
    #[error("IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Storage file exists but is not a valid key/value document
    #[error("Corrupt storage file {path:?}: {error}")]
    Corrupt { path: PathBuf, error: String },

    /// Serialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
