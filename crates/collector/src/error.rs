//! Collector error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that stop the collector from starting or finishing a one-shot run.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// An error occurred in the usage store.
    #[error("Usage store error: {0}")]
    Store(#[from] usage_store::UsageStoreError),

    /// The classifier rules could not be loaded.
    #[error("Classifier error: {0}")]
    Classifier(#[from] classifier::ClassifierError),

    /// A bulk load failed.
    #[error("Loader error: {0}")]
    Loader(#[from] loader::LoaderError),

    /// The listening socket could not be bound.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The Prometheus exporter could not be installed.
    #[error("Metrics exporter error: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    /// A one-shot run would overwrite an existing database.
    #[error("Output database {0} already exists")]
    OutputExists(PathBuf),

    /// An I/O error outside the store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for collector operations.
pub type Result<T> = std::result::Result<T, CollectorError>;
