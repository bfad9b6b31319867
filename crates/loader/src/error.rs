//! Loader error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort a bulk load.
///
/// Bad rows are not errors; they are counted in the report instead.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// An error occurred in a usage store.
    #[error("Usage store error: {0}")]
    Store(#[from] usage_store::UsageStoreError),

    /// The import source could not be opened.
    #[error("Failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading the import source failed part way through.
    #[error("Read error: {0}")]
    Read(#[from] std::io::Error),
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;
