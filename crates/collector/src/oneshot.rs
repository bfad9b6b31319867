//! One-shot bulk runs that build a new database and exit.
//!
//! Both stage into a private in-memory store and only snapshot to `output`
//! once loading succeeded, so a failed run leaves no partial file behind.

use std::path::Path;

use classifier::Classifier;
use loader::{ImportReport, ReplayReport};
use usage_store::{SqliteUsageStore, UsageStore};

use crate::{CollectorError, Result};

/// Imports a TSV history file into a new database at `output`.
#[tracing::instrument(skip(classifier), fields(source = %source.display(), output = %output.display()))]
pub async fn import_file(
    source: &Path,
    output: &Path,
    classifier: &Classifier,
) -> Result<ImportReport> {
    ensure_absent(output).await?;

    let staging = SqliteUsageStore::in_memory().await?;
    let reader = loader::open_source(source).await?;

    tracing::info!("importing");
    let report = loader::import_tsv(reader, &staging, classifier).await?;

    tracing::info!("exporting");
    staging.snapshot(output).await?;
    staging.close().await;

    Ok(report)
}

/// Replays the database at `source` into a new database at `output`.
#[tracing::instrument(skip(classifier), fields(source = %source.display(), output = %output.display()))]
pub async fn migrate_store(
    source: &Path,
    output: &Path,
    classifier: &Classifier,
) -> Result<ReplayReport> {
    ensure_absent(output).await?;

    let origin = SqliteUsageStore::open_read_only(source).await?;
    let staging = SqliteUsageStore::in_memory().await?;

    tracing::info!("replaying");
    let report = loader::reclassify(&origin, &staging, classifier).await?;
    origin.close().await;

    tracing::info!("exporting");
    staging.snapshot(output).await?;
    staging.close().await;

    Ok(report)
}

async fn ensure_absent(output: &Path) -> Result<()> {
    if tokio::fs::try_exists(output).await? {
        return Err(CollectorError::OutputExists(output.to_path_buf()));
    }
    Ok(())
}
