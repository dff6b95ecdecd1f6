//! One-shot historical load of a single stream.

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use kba_feed::{FeedConnector, FeedError, FeedReader, OpenMode, OpenOutcome};
use kba_reconcile::{ImportOutcome, Importer};

#[derive(Debug, Clone)]
pub struct BackfillRequest {
    pub stream_id: String,
    /// Normalized `YYYYMMDDhhmmss`.
    pub from: String,
    pub mode: OpenMode,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
    pub stream_id: String,
    pub fetched: u64,
    pub applied: u64,
    pub skipped: u64,
    pub failed: u64,
    pub files: u64,
    pub last_timestamp: String,
    /// Stopped by the token before the feed completed.
    pub interrupted: bool,
}

/// Open in historical mode, import everything up to completion, close.
///
/// "No data" opens yield an empty report. The session is closed on every
/// path; a fatal read code is returned after the close.
pub async fn backfill(
    connector: &dyn FeedConnector,
    importer: &Importer,
    req: &BackfillRequest,
    token: &CancellationToken,
) -> Result<BackfillReport, FeedError> {
    let mut report = BackfillReport {
        stream_id: req.stream_id.clone(),
        ..BackfillReport::default()
    };

    let mut reader = FeedReader::new(connector.connect()?);
    let outcome = reader.open(&req.stream_id, &req.from, req.mode).await?;
    report.last_timestamp = outcome.summary().last_timestamp.clone();

    let drained = match outcome {
        OpenOutcome::NoData(_) => {
            info!(stream = %req.stream_id, from = %req.from, "no data to backfill");
            Ok(())
        }
        OpenOutcome::Ready(summary) => {
            info!(
                stream = %req.stream_id,
                from = %req.from,
                files = summary.read_count,
                downloads = summary.download_count,
                "backfill opened"
            );
            drain(&mut reader, importer, &mut report, token).await
        }
    };
    report.files = reader.file_switches();

    if let Err(e) = reader.close().await {
        warn!(stream = %req.stream_id, error = %e, "close failed");
    }
    drained?;

    info!(
        stream = %report.stream_id,
        fetched = report.fetched,
        applied = report.applied,
        skipped = report.skipped,
        failed = report.failed,
        "backfill finished"
    );
    Ok(report)
}

async fn drain(
    reader: &mut FeedReader,
    importer: &Importer,
    report: &mut BackfillReport,
    token: &CancellationToken,
) -> Result<(), FeedError> {
    loop {
        if token.is_cancelled() {
            report.interrupted = true;
            return Ok(());
        }
        let Some(record) = reader.next_record().await? else {
            return Ok(());
        };
        report.fetched += 1;
        match importer.import(&record.bytes).await {
            ImportOutcome::Applied(_) => report.applied += 1,
            ImportOutcome::Skipped { .. } => report.skipped += 1,
            ImportOutcome::Failed { record_type, error } => {
                report.failed += 1;
                debug!(?record_type, file = ?record.file_name, error = %error, "record failed");
            }
        }
    }
}
