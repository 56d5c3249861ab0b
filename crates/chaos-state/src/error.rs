//! Error types for chaos-state

use thiserror::Error;

/// Errors produced by a [`ResultStore`](crate::ResultStore) backend.
#[derive(Error, Debug)]
pub enum StorageError {
    /// No result exists under the requested id
    #[error("result not found: {result_id}")]
    NotFound { result_id: String },

    /// A result with this id was already written. Results are append-only,
    /// so this always indicates a broken id generator.
    #[error("duplicate result id: {result_id}")]
    DuplicateResult { result_id: String },

    /// Backend-specific failure (connection, I/O, ...)
    #[error("storage backend failed: {0}")]
    Backend(String),

    /// Serialization error
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}
