//! Store-to-store replay.

use classifier::Classifier;
use futures_util::StreamExt;
use usage_store::UsageStore;

use crate::{PROGRESS_INTERVAL, Result};

/// Outcome of a replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayReport {
    /// Raw events re-recorded into the destination.
    pub replayed: u64,
}

/// Re-records every raw event of `source` into `destination`.
///
/// Stored modules are ignored; each command is classified again with
/// `classifier`, so the destination's aggregates reflect the current rules.
/// The first read or write error aborts the replay.
#[tracing::instrument(skip_all)]
pub async fn reclassify<S, D>(
    source: &S,
    destination: &D,
    classifier: &Classifier,
) -> Result<ReplayReport>
where
    S: UsageStore + ?Sized,
    D: UsageStore + ?Sized,
{
    let mut events = source.read_raw_events().await?;
    let mut report = ReplayReport::default();

    while let Some(result) = events.next().await {
        let event = result?;
        let module = classifier.classify(&event.command);
        destination.record(event, module).await?;

        report.replayed += 1;
        metrics::counter!("loader_events_replayed_total").increment(1);
        if report.replayed % PROGRESS_INTERVAL == 0 {
            tracing::info!(replayed = report.replayed, "replay progress");
        }
    }

    tracing::info!(replayed = report.replayed, "replay complete");

    Ok(report)
}
