//! Classifier error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading classification rules.
#[derive(Debug, Error)]
pub enum ClassifierError {
    /// The rules file could not be read.
    #[error("Failed to read rules file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The rules file is not valid TOML for [`ClassifierRules`](crate::ClassifierRules).
    #[error("Invalid rules in {path}: {message}")]
    Parse { path: String, message: String },

    /// A rule parsed but would match everything or produce empty names.
    #[error("Invalid rule {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },
}

/// Result type for classifier operations.
pub type Result<T> = std::result::Result<T, ClassifierError>;
