//! Streaming monitor: one tokio task per stream identifier.
//!
//! Each worker opens its stream in real-time mode, reads to completion,
//! imports every record, closes, waits `poll_interval` and re-opens from the
//! last timestamp the feed reported. Feed failures back off and retry; a
//! worker that exhausts its retries exits and its stream drops out of the
//! monitored set while the others carry on.
//!
//! Cancellation is cooperative. The token is checked between records and
//! between fetch iterations; waits are cancellable, feed calls are not.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use kba_db::{ensure_tables, SchemaManager};
use kba_feed::timestamp::today_stamp;
use kba_feed::{FeedConnector, FeedError, FeedReader, OpenMode, OpenOutcome};
use kba_reconcile::{ImportOutcome, Importer};

use crate::status::{MonitorStatus, StatusSnapshot};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Consecutive failures tolerated before the worker gives up.
    pub max_retries: u32,
    pub step: Duration,
    pub cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            step: Duration::from_secs(5),
            cap: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Wait before the next attempt after `failures` consecutive failures.
    pub fn backoff(&self, failures: u32) -> Duration {
        self.step.saturating_mul(failures).min(self.cap)
    }
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub poll_interval: Duration,
    pub retry: RetryPolicy,
    /// First `from` timestamp for every worker; today 00:00 JST when unset.
    pub start_from: Option<String>,
    pub auto_create_tables: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            retry: RetryPolicy::default(),
            start_from: None,
            auto_create_tables: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorError {
    AlreadyRunning,
    NotRunning,
    DuplicateStream(String),
}

impl fmt::Display for MonitorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorError::AlreadyRunning => write!(f, "monitor is already running"),
            MonitorError::NotRunning => write!(f, "monitor is not running"),
            MonitorError::DuplicateStream(id) => write!(f, "stream {id} is already monitored"),
        }
    }
}

impl std::error::Error for MonitorError {}

// ---------------------------------------------------------------------------
// Monitor
// ---------------------------------------------------------------------------

struct Shared {
    connector: Arc<dyn FeedConnector>,
    importer: Arc<Importer>,
    config: MonitorConfig,
    status: Mutex<MonitorStatus>,
}

struct Control {
    streams: Vec<String>,
    token: CancellationToken,
    workers: Vec<(String, JoinHandle<()>)>,
}

pub struct StreamMonitor {
    shared: Arc<Shared>,
    schema: Option<Arc<dyn SchemaManager>>,
    control: Mutex<Control>,
}

impl StreamMonitor {
    pub fn new(
        streams: Vec<String>,
        connector: Arc<dyn FeedConnector>,
        importer: Arc<Importer>,
        schema: Option<Arc<dyn SchemaManager>>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                connector,
                importer,
                config,
                status: Mutex::new(MonitorStatus::default()),
            }),
            schema,
            control: Mutex::new(Control {
                streams,
                token: CancellationToken::new(),
                workers: Vec::new(),
            }),
        }
    }

    /// Ensure tables, then launch one worker per configured stream.
    pub async fn start(&self) -> Result<(), MonitorError> {
        let mut control = self.control.lock().await;
        let session = {
            let mut status = self.shared.status.lock().await;
            if status.running {
                return Err(MonitorError::AlreadyRunning);
            }
            status.begin(control.streams.iter().cloned())
        };

        if self.shared.config.auto_create_tables {
            if let Some(schema) = &self.schema {
                match ensure_tables(schema.as_ref()).await {
                    Ok(created) if !created.is_empty() => {
                        info!(tables = created.len(), "created missing tables")
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "table creation failed");
                        self.shared
                            .status
                            .lock()
                            .await
                            .push_error("create_tables", e.to_string());
                    }
                }
            }
        }

        control.token = CancellationToken::new();
        let token = control.token.clone();
        let streams = control.streams.clone();
        control.workers = streams
            .into_iter()
            .map(|id| {
                let handle =
                    Worker::spawn(self.shared.clone(), id.clone(), session, token.clone());
                (id, handle)
            })
            .collect();

        info!(workers = control.workers.len(), "monitor started");
        Ok(())
    }

    /// Signal stop and wait for workers, `timeout` split evenly across them.
    /// Workers still busy after their share are left to finish on their own.
    pub async fn stop(&self, timeout: Duration) -> Result<StatusSnapshot, MonitorError> {
        let mut control = self.control.lock().await;
        if !self.shared.status.lock().await.running {
            return Err(MonitorError::NotRunning);
        }

        control.token.cancel();
        let workers = std::mem::take(&mut control.workers);
        let share = match u32::try_from(workers.len()) {
            Ok(0) | Err(_) => timeout,
            Ok(n) => timeout / n,
        };

        for (stream, handle) in workers {
            match tokio::time::timeout(share, handle).await {
                Ok(Ok(())) => debug!(stream = %stream, "worker joined"),
                Ok(Err(e)) => error!(stream = %stream, error = %e, "worker panicked"),
                Err(_) => warn!(stream = %stream, "worker did not stop gracefully"),
            }
        }

        let mut status = self.shared.status.lock().await;
        status.end();
        info!(
            imported = status.records_imported,
            failed = status.records_failed,
            "monitor stopped"
        );
        Ok(status.snapshot())
    }

    /// Start monitoring one more stream in the running session.
    pub async fn add_stream(&self, stream_id: &str) -> Result<(), MonitorError> {
        let mut control = self.control.lock().await;
        let session = {
            let mut status = self.shared.status.lock().await;
            let Some(session) = status.session_id.filter(|_| status.running) else {
                return Err(MonitorError::NotRunning);
            };
            if !status.streams.insert(stream_id.to_string()) {
                return Err(MonitorError::DuplicateStream(stream_id.to_string()));
            }
            session
        };

        if !control.streams.iter().any(|s| s == stream_id) {
            control.streams.push(stream_id.to_string());
        }
        let handle = Worker::spawn(
            self.shared.clone(),
            stream_id.to_string(),
            session,
            control.token.clone(),
        );
        control.workers.push((stream_id.to_string(), handle));
        info!(stream = stream_id, "stream added");
        Ok(())
    }

    pub async fn status(&self) -> StatusSnapshot {
        self.shared.status.lock().await.snapshot()
    }

    pub async fn is_running(&self) -> bool {
        self.shared.status.lock().await.running
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

/// One stream's polling loop, bound to the session that spawned it.
struct Worker {
    shared: Arc<Shared>,
    stream_id: String,
    session: Uuid,
    token: CancellationToken,
}

impl Worker {
    fn spawn(
        shared: Arc<Shared>,
        stream_id: String,
        session: Uuid,
        token: CancellationToken,
    ) -> JoinHandle<()> {
        let worker = Worker {
            shared,
            stream_id,
            session,
            token,
        };
        tokio::spawn(async move {
            worker.run().await;
            if let Some(mut status) = worker.status().await {
                status.streams.remove(&worker.stream_id);
            }
            debug!(stream = %worker.stream_id, "worker exited");
        })
    }

    /// The status lock, or `None` once this worker's session is over.
    async fn status(&self) -> Option<MutexGuard<'_, MonitorStatus>> {
        let status = self.shared.status.lock().await;
        status.is_current(self.session).then_some(status)
    }

    async fn run(&self) {
        let stream_id = self.stream_id.as_str();
        let config = &self.shared.config;
        let retry = config.retry;
        let mut from = config.start_from.clone().unwrap_or_else(today_stamp);
        let mut failures: u32 = 0;

        info!(stream = stream_id, from = %from, "worker started");
        while !self.token.is_cancelled() {
            match self.poll_once(&from, &mut failures).await {
                Ok(next) => {
                    failures = 0;
                    if let Some(next) = next {
                        from = next;
                    }
                    pause(config.poll_interval, &self.token).await;
                }
                Err(e) => {
                    failures += 1;
                    warn!(stream = stream_id, attempt = failures, error = %e, "fetch failed");
                    match self.status().await {
                        Some(mut status) => status.push_error(stream_id, e.to_string()),
                        None => {
                            debug!(stream = stream_id, "session over, dropping error");
                            return;
                        }
                    }
                    if failures > retry.max_retries {
                        error!(stream = stream_id, retries = retry.max_retries, "retries exhausted");
                        return;
                    }
                    pause(retry.backoff(failures), &self.token).await;
                }
            }
        }
    }

    /// One open/read/close cycle. Returns the resume timestamp.
    async fn poll_once(&self, from: &str, failures: &mut u32) -> Result<Option<String>, FeedError> {
        let mut reader = FeedReader::new(self.shared.connector.connect()?);
        let outcome = reader
            .open(&self.stream_id, from, OpenMode::Realtime)
            .await?;

        let drained = match &outcome {
            OpenOutcome::NoData(_) => Ok(()),
            OpenOutcome::Ready(_) => self.drain(&mut reader, failures).await,
        };
        let closed = reader.close().await;
        drained?;
        closed?;

        let last = &outcome.summary().last_timestamp;
        Ok((!last.is_empty()).then(|| last.clone()))
    }

    async fn drain(&self, reader: &mut FeedReader, failures: &mut u32) -> Result<(), FeedError> {
        let stream_id = self.stream_id.as_str();
        while !self.token.is_cancelled() {
            let Some(record) = reader.next_record().await? else {
                break;
            };
            let outcome = self.shared.importer.import(&record.bytes).await;

            let Some(mut status) = self.status().await else {
                break;
            };
            match outcome {
                ImportOutcome::Applied(_) => {
                    status.records_imported += 1;
                    *failures = 0;
                }
                ImportOutcome::Skipped { record_type } => {
                    status.records_skipped += 1;
                    debug!(stream = stream_id, ?record_type, "record skipped");
                }
                ImportOutcome::Failed { record_type, error } => {
                    status.records_failed += 1;
                    let context = match record_type {
                        Some(t) => format!("{stream_id}/{t}"),
                        None => stream_id.to_string(),
                    };
                    debug!(context = %context, error = %error, "record failed");
                    status.push_error(context, error);
                }
            }
        }
        Ok(())
    }
}

/// Sleep for `d` unless cancelled first.
async fn pause(d: Duration, token: &CancellationToken) {
    tokio::select! {
        _ = token.cancelled() => {}
        _ = tokio::time::sleep(d) => {}
    }
}
