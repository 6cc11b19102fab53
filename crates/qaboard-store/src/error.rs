//! Error types for qaboard-store

use thiserror::Error;

/// Errors that can occur in document store operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Document does not exist (only raised by operations that require one)
    #[error("document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    /// Backend query or transport failure
    #[error("backend error: {0}")]
    Backend(String),

    /// Database connection error
    #[error("connection failed: {0}")]
    Connection(String),

    /// Document data could not be encoded or decoded
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// A value that was expected to be a document reference was not one
    #[error("invalid document reference: {0}")]
    InvalidReference(String),

    /// Failure injected by a test fake
    #[error("injected failure: {0}")]
    Injected(String),
}

impl StorageError {
    /// Whether this error reports a missing document.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

impl From<surrealdb::Error> for StorageError {
    fn from(err: surrealdb::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}
