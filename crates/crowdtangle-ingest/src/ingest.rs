//! Reads batches from newline-delimited JSON and hands them to the writer.
//!
//! Each non-blank line is one batch: a JSON array of post records, exactly
//! as the upstream processing stage grouped them. Batches are written one at
//! a time; the first batch that fails stops the run.

use crowdtangle_db::{RecordStore, RecordWriter};
use crowdtangle_types::EncapsulatedPost;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::error::IngestError;

/// Totals for a completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    /// Batches written.
    pub batches: usize,
    /// Post records written across all batches.
    pub records: usize,
}

/// Parse one input line into a batch. Blank lines yield `None`.
pub fn parse_batch(
    line_number: usize,
    line: &str,
) -> Result<Option<Vec<EncapsulatedPost>>, IngestError> {
    if line.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(line)
        .map(Some)
        .map_err(|source| IngestError::Parse {
            line: line_number,
            source,
        })
}

/// Write every batch in `reader` through `writer`.
pub async fn ingest<R, S>(
    reader: R,
    writer: &RecordWriter<S>,
) -> Result<IngestSummary, IngestError>
where
    R: AsyncBufRead + Unpin,
    S: RecordStore,
{
    let mut lines = reader.lines();
    let mut summary = IngestSummary::default();
    let mut line_number: usize = 0;

    while let Some(line) = lines.next_line().await? {
        line_number = line_number.saturating_add(1);
        let Some(batch) = parse_batch(line_number, &line)? else {
            continue;
        };

        writer.process(&batch).await?;

        summary.batches = summary.batches.saturating_add(1);
        summary.records = summary.records.saturating_add(batch.len());
        tracing::debug!(line = line_number, records = batch.len(), "Batch written");
    }

    Ok(summary)
}
