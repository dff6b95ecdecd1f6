//! Monitor status aggregate and its read-only snapshot.

use std::collections::{BTreeSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Oldest entries are dropped beyond this many.
pub const ERROR_RING_CAPACITY: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorEntry {
    pub timestamp: DateTime<Utc>,
    pub context: String,
    pub message: String,
}

/// Mutable status, guarded by the monitor's single status lock.
#[derive(Debug, Default)]
pub struct MonitorStatus {
    pub running: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub session_id: Option<Uuid>,
    pub records_imported: u64,
    pub records_failed: u64,
    pub records_skipped: u64,
    pub errors: VecDeque<ErrorEntry>,
    pub streams: BTreeSet<String>,
}

impl MonitorStatus {
    pub fn push_error(&mut self, context: impl Into<String>, message: impl Into<String>) {
        if self.errors.len() == ERROR_RING_CAPACITY {
            self.errors.pop_front();
        }
        self.errors.push_back(ErrorEntry {
            timestamp: Utc::now(),
            context: context.into(),
            message: message.into(),
        });
    }

    /// Begin a new session: counters and history start over.
    pub fn begin(&mut self, streams: impl IntoIterator<Item = String>) -> Uuid {
        let session = Uuid::new_v4();
        *self = MonitorStatus {
            running: true,
            started_at: Some(Utc::now()),
            session_id: Some(session),
            streams: streams.into_iter().collect(),
            ..MonitorStatus::default()
        };
        session
    }

    /// Whether `session` is the one currently running. Workers left over
    /// from an earlier session must not touch counters, errors or streams.
    pub fn is_current(&self, session: Uuid) -> bool {
        self.running && self.session_id == Some(session)
    }

    pub fn end(&mut self) {
        self.running = false;
        self.stopped_at = Some(Utc::now());
        self.streams.clear();
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let uptime_secs = match (self.running, self.started_at) {
            (true, Some(t)) => Some((Utc::now() - t).num_seconds()),
            (false, Some(t)) => self.stopped_at.map(|s| (s - t).num_seconds()),
            _ => None,
        };
        StatusSnapshot {
            running: self.running,
            started_at: self.started_at,
            stopped_at: self.stopped_at,
            session_id: self.session_id,
            uptime_secs,
            records_imported: self.records_imported,
            records_failed: self.records_failed,
            records_skipped: self.records_skipped,
            errors: self.errors.iter().cloned().collect(),
            streams: self.streams.iter().cloned().collect(),
        }
    }
}

/// Point-in-time copy of [`MonitorStatus`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub running: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub session_id: Option<Uuid>,
    pub uptime_secs: Option<i64>,
    pub records_imported: u64,
    pub records_failed: u64,
    pub records_skipped: u64,
    pub errors: Vec<ErrorEntry>,
    pub streams: Vec<String>,
}
