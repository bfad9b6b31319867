use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur when interacting with the usage store.
#[derive(Debug, Error)]
pub enum UsageStoreError {
    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A filesystem error occurred while reading or writing a snapshot.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The snapshot destination already exists and would be overwritten.
    #[error("Snapshot destination already exists: {}", .0.display())]
    SnapshotExists(PathBuf),

    /// The single writer task has stopped, so no more records can be accepted.
    #[error("Store writer is no longer running")]
    WriterClosed,

    /// The store was opened read-only and has no writer.
    #[error("Store is read-only")]
    ReadOnly,
}

/// Result type for usage store operations.
pub type Result<T> = std::result::Result<T, UsageStoreError>;
