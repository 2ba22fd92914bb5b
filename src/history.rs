//! Deployment history - ordered stream collection and CSV export
//!
//! The history endpoint streams one record per deployment inside a date
//! range. This consumer drains the stream to completion, preserving emission
//! order with nothing dropped or duplicated, and serializes the result as CSV.
//! The history call is one-shot: a stream error propagates instead of
//! retrying.

use std::io::Write;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_stream::StreamExt;
use tracing::debug;

use crate::api::{MessageStream, StreamError};

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("end date {end} is before start date {start}")]
    InvalidRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    #[error(transparent)]
    Stream(#[from] StreamError),
    #[error("csv serialization failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("csv write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Inclusive date range for a history export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl HistoryRange {
    /// Validated construction; an end date before the start date is rejected.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, HistoryError> {
        if end < start {
            return Err(HistoryError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }
}

/// One deployment as emitted by the history stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    pub time: DateTime<Utc>,
    pub application: String,
    pub environment: String,
    pub version: u64,
    pub source_commit_id: String,
}

/// Drain the history stream to completion.
///
/// Records come back in emission order; the first stream error aborts the
/// export and propagates.
pub async fn collect_deployment_history(
    mut stream: MessageStream<DeploymentRecord>,
) -> Result<Vec<DeploymentRecord>, HistoryError> {
    let mut records = Vec::new();
    while let Some(item) = stream.next().await {
        records.push(item?);
    }
    debug!(records = records.len(), "deployment history collected");
    Ok(records)
}

/// Serialize collected records as CSV: a header row, then one row per
/// deployment.
pub fn write_csv<W: Write>(records: &[DeploymentRecord], writer: W) -> Result<(), HistoryError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for record in records {
        csv_writer.serialize(record)?;
    }
    csv_writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, d, 0, 0, 0).unwrap()
    }

    fn record(d: u32, version: u64) -> DeploymentRecord {
        DeploymentRecord {
            time: day(d),
            application: "billing".to_string(),
            environment: "prod".to_string(),
            version,
            source_commit_id: format!("commit-{version}"),
        }
    }

    #[test]
    fn test_range_rejects_end_before_start() {
        assert!(HistoryRange::new(day(10), day(2)).is_err());
        let range = HistoryRange::new(day(2), day(10)).unwrap();
        assert_eq!(range.start(), day(2));
        assert_eq!(range.end(), day(10));
        // a single-day export is allowed
        assert!(HistoryRange::new(day(2), day(2)).is_ok());
    }

    #[tokio::test]
    async fn test_collect_preserves_emission_order() {
        let records: Vec<DeploymentRecord> = (1..=50).map(|v| record(1, v)).collect();
        let stream: MessageStream<DeploymentRecord> =
            Box::pin(tokio_stream::iter(records.clone().into_iter().map(Ok)));

        let collected = collect_deployment_history(stream).await.unwrap();
        assert_eq!(collected, records);
    }

    #[tokio::test]
    async fn test_collect_propagates_stream_error() {
        let items = vec![
            Ok(record(1, 1)),
            Err(StreamError::Status {
                code: 14,
                message: "unavailable".to_string(),
            }),
            Ok(record(2, 2)),
        ];
        let stream: MessageStream<DeploymentRecord> = Box::pin(tokio_stream::iter(items));

        let err = collect_deployment_history(stream).await.unwrap_err();
        assert!(matches!(err, HistoryError::Stream(_)));
    }

    #[test]
    fn test_csv_has_header_and_one_row_per_record() {
        let records = vec![record(1, 1), record(2, 2)];
        let mut out = Vec::new();
        write_csv(&records, &mut out).unwrap();

        let csv = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "time,application,environment,version,sourceCommitId");
        assert!(lines[1].contains("billing"));
        assert!(lines[1].contains("commit-1"));
        assert!(lines[2].contains("commit-2"));
    }
}
