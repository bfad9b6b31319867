//! Tab-separated history import.
//!
//! Each row is `timestamp<TAB>command<TAB>user<TAB>ip`, with the timestamp in
//! `YYYY-MM-DD HH:MM:SS` form (UTC). Extra trailing fields are ignored. A
//! field may be wrapped in double quotes, with `""` standing for one quote,
//! so commands containing tabs survive the round trip. A quoted field may
//! also span lines; its line breaks are kept as `\n`.

use std::path::Path;

use async_compression::tokio::bufread::GzipDecoder;
use chrono::NaiveDateTime;
use classifier::Classifier;
use common::RawEvent;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use usage_store::UsageStore;

use crate::{LoaderError, PROGRESS_INTERVAL, Result};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A buffered byte source for [`import_tsv`].
pub type Source = Box<dyn AsyncBufRead + Send + Unpin>;

/// Outcome of a TSV import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Rows recorded into the store.
    pub imported: u64,
    /// Rows that were too short or had an unparsable timestamp.
    pub skipped: u64,
}

/// Opens an import source.
///
/// `-` reads standard input. A path ending in `.gz` is decompressed on the fly.
pub async fn open_source(path: &Path) -> Result<Source> {
    if path == Path::new("-") {
        return Ok(Box::new(BufReader::new(tokio::io::stdin())));
    }

    let file = File::open(path).await.map_err(|source| LoaderError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = BufReader::new(file);

    if path.extension().is_some_and(|ext| ext == "gz") {
        let mut decoder = GzipDecoder::new(reader);
        decoder.multiple_members(true);
        Ok(Box::new(BufReader::new(decoder)))
    } else {
        Ok(Box::new(reader))
    }
}

/// Parses one row into an event, or `None` if the row must be skipped.
///
/// A row whose quoted field is never closed is skipped.
pub fn parse_row(line: &str) -> Option<RawEvent> {
    let (fields, open) = split_fields(line);
    if open {
        return None;
    }
    event_from_fields(&fields)
}

fn event_from_fields(fields: &[String]) -> Option<RawEvent> {
    if fields.len() < 4 {
        return None;
    }

    let timestamp = NaiveDateTime::parse_from_str(&fields[0], TIMESTAMP_FORMAT)
        .ok()?
        .and_utc()
        .timestamp();

    Some(RawEvent::new(
        fields[2].as_str(),
        fields[1].as_str(),
        fields[3].as_str(),
        timestamp,
    ))
}

/// Splits a record on unquoted tabs. The flag is set when the record ends
/// inside a quoted field.
fn split_fields(line: &str) -> (Vec<String>, bool) {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut chars = line.chars().peekable();
    let mut quoted = false;
    let mut at_start = true;

    while let Some(c) = chars.next() {
        match c {
            '"' if at_start => {
                quoted = true;
                at_start = false;
            }
            '"' if quoted => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    quoted = false;
                }
            }
            '\t' if !quoted => {
                fields.push(std::mem::take(&mut field));
                at_start = true;
            }
            c => {
                field.push(c);
                at_start = false;
            }
        }
    }

    fields.push(field);
    (fields, quoted)
}

/// Classifies and records every row of `reader` into `store`.
///
/// Blank lines outside a quoted field are ignored. Bad rows, including one
/// left open by an unterminated quote at the end of input, are counted in
/// the report. The first store error aborts the import.
#[tracing::instrument(skip_all)]
pub async fn import_tsv<R, S>(
    mut reader: R,
    store: &S,
    classifier: &Classifier,
) -> Result<ImportReport>
where
    R: AsyncBufRead + Unpin,
    S: UsageStore + ?Sized,
{
    let mut report = ImportReport::default();
    let mut buf = Vec::new();
    let mut record = String::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }

        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\n', '\r']);
        if record.is_empty() {
            if line.is_empty() {
                continue;
            }
        } else {
            record.push('\n');
        }
        record.push_str(line);

        let (fields, open) = split_fields(&record);
        if open {
            continue;
        }

        let Some(event) = event_from_fields(&fields) else {
            skip_row(&mut report, &record);
            record.clear();
            continue;
        };
        record.clear();

        let module = classifier.classify(&event.command);
        store.record(event, module).await?;

        report.imported += 1;
        metrics::counter!("loader_rows_imported_total").increment(1);
        if report.imported % PROGRESS_INTERVAL == 0 {
            tracing::info!(imported = report.imported, "import progress");
        }
    }

    if !record.is_empty() {
        skip_row(&mut report, &record);
    }

    tracing::info!(
        imported = report.imported,
        skipped = report.skipped,
        "import complete"
    );

    Ok(report)
}

fn skip_row(report: &mut ImportReport, row: &str) {
    report.skipped += 1;
    metrics::counter!("loader_rows_skipped_total").increment(1);
    tracing::debug!(row, "skipping malformed row");
}
