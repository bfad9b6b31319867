//! Bulk loading for the usage store.
//!
//! Both entry points end in [`Classifier::classify`] followed by
//! [`UsageStore::record`], the same path live notifications take:
//! - [`import_tsv`] reads tab-separated history, optionally gzip-compressed
//! - [`reclassify`] replays another store's raw event log under the current rules
//!
//! [`Classifier::classify`]: classifier::Classifier::classify
//! [`UsageStore::record`]: usage_store::UsageStore::record

pub mod error;
pub mod replay;
pub mod tsv;

pub use error::{LoaderError, Result};
pub use replay::{ReplayReport, reclassify};
pub use tsv::{ImportReport, import_tsv, open_source, parse_row};

/// Records between progress log lines.
pub const PROGRESS_INTERVAL: u64 = 1000;
