//! Error types for pals-core

use thiserror::Error;

use crate::sync::RemoteError;

/// Result type alias using pals-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in pals-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Domain validation failed; the write never reaches the sync queue
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Local record store error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Remote service error
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl Error {
    /// Whether this error came from the local durable store.
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::LibSql(_) | Self::Io(_) | Self::Storage(_))
    }
}
