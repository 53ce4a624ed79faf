//! Error types for gymbud-core

use thiserror::Error;

use crate::remote::RemoteError;

/// Result type alias using gymbud-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in gymbud-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A stored row could not be mapped onto its record type
    #[error("Invalid {table} record {id}: {reason}")]
    InvalidRecord {
        table: &'static str,
        id: String,
        reason: String,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Remote backend error
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Background operation exceeded its time budget
    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),
}
