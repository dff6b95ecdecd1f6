//! Scripted feed: per-stream queues of canned sessions.
//!
//! Every `open` pops the next [`Session`] queued for that stream. An empty
//! queue behaves like a quiet feed: "no data", resume timestamp unchanged.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use kba_codec::marshal;
use kba_feed::{FeedClient, FeedConnector, FeedError, OpenMode, OpenSummary, RawRead};

#[derive(Debug, Clone)]
pub enum Session {
    /// `open` itself fails.
    Fail(FeedError),
    Open {
        summary: OpenSummary,
        reads: Vec<RawRead>,
    },
    /// `open` sleeps for the delay, then behaves like the inner session.
    Stall(Duration, Box<Session>),
}

impl Session {
    /// One file holding `records`, then completion.
    pub fn records(last_timestamp: &str, records: &[Vec<u8>]) -> Self {
        Self::files(last_timestamp, &[records.to_vec()])
    }

    /// Several files; a file switch (-1) separates them.
    pub fn files(last_timestamp: &str, files: &[Vec<Vec<u8>>]) -> Self {
        let mut reads = Vec::new();
        for (i, file) in files.iter().enumerate() {
            if i > 0 {
                reads.push(RawRead::code(-1));
            }
            let name = format!("file{}", i + 1);
            reads.extend(
                file.iter()
                    .map(|r| RawRead::data(marshal(r), Some(name.clone()))),
            );
        }
        reads.push(RawRead::code(0));
        Self::Open {
            summary: summary(0, files.len(), last_timestamp),
            reads,
        }
    }

    /// Explicit read sequence after a successful open.
    pub fn reads(last_timestamp: &str, reads: Vec<RawRead>) -> Self {
        Self::Open {
            summary: summary(0, 1, last_timestamp),
            reads,
        }
    }

    pub fn no_data(last_timestamp: &str) -> Self {
        Self::Open {
            summary: summary(-1, 0, last_timestamp),
            reads: Vec::new(),
        }
    }

    pub fn fail(message: &str) -> Self {
        Self::Fail(FeedError::Io(message.to_string()))
    }

    pub fn stalled(delay: Duration, then: Session) -> Self {
        Self::Stall(delay, Box::new(then))
    }
}

fn summary(code: i32, files: usize, last_timestamp: &str) -> OpenSummary {
    OpenSummary {
        code,
        read_count: u32::try_from(files).unwrap_or(u32::MAX),
        download_count: 0,
        last_timestamp: last_timestamp.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenCall {
    pub stream_id: String,
    pub from: String,
    pub mode: OpenMode,
}

#[derive(Debug, Default)]
struct Inner {
    scripts: Mutex<HashMap<String, VecDeque<Session>>>,
    opens: Mutex<Vec<OpenCall>>,
    closes: Mutex<u64>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// Connector handing out clients that share one script book.
#[derive(Debug, Clone, Default)]
pub struct ScriptedFeed {
    inner: Arc<Inner>,
}

impl ScriptedFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, stream_id: &str, session: Session) -> &Self {
        lock(&self.inner.scripts)
            .entry(stream_id.to_string())
            .or_default()
            .push_back(session);
        self
    }

    pub fn opens(&self) -> Vec<OpenCall> {
        lock(&self.inner.opens).clone()
    }

    pub fn opens_for(&self, stream_id: &str) -> Vec<OpenCall> {
        lock(&self.inner.opens)
            .iter()
            .filter(|c| c.stream_id == stream_id)
            .cloned()
            .collect()
    }

    pub fn closes(&self) -> u64 {
        *lock(&self.inner.closes)
    }

    /// Sessions still queued for `stream_id`.
    pub fn remaining(&self, stream_id: &str) -> usize {
        lock(&self.inner.scripts)
            .get(stream_id)
            .map_or(0, VecDeque::len)
    }
}

impl FeedConnector for ScriptedFeed {
    fn connect(&self) -> Result<Box<dyn FeedClient>, FeedError> {
        Ok(Box::new(ScriptedClient {
            inner: self.inner.clone(),
            reads: None,
        }))
    }
}

struct ScriptedClient {
    inner: Arc<Inner>,
    reads: Option<VecDeque<RawRead>>,
}

#[async_trait]
impl FeedClient for ScriptedClient {
    async fn open(
        &mut self,
        stream_id: &str,
        from_timestamp: &str,
        mode: OpenMode,
    ) -> Result<OpenSummary, FeedError> {
        lock(&self.inner.opens).push(OpenCall {
            stream_id: stream_id.to_string(),
            from: from_timestamp.to_string(),
            mode,
        });
        let mut next = lock(&self.inner.scripts)
            .get_mut(stream_id)
            .and_then(VecDeque::pop_front);

        loop {
            match next {
                Some(Session::Stall(delay, then)) => {
                    tokio::time::sleep(delay).await;
                    next = Some(*then);
                }
                Some(Session::Fail(e)) => return Err(e),
                Some(Session::Open { summary, reads }) => {
                    self.reads = Some(reads.into());
                    return Ok(summary);
                }
                None => {
                    self.reads = Some(VecDeque::new());
                    return Ok(summary(-1, 0, from_timestamp));
                }
            }
        }
    }

    async fn read(&mut self) -> Result<RawRead, FeedError> {
        let reads = self.reads.as_mut().ok_or(FeedError::NotOpen)?;
        Ok(reads.pop_front().unwrap_or_else(|| RawRead::code(0)))
    }

    async fn close(&mut self) -> Result<(), FeedError> {
        self.reads.take().ok_or(FeedError::NotOpen)?;
        *lock(&self.inner.closes) += 1;
        Ok(())
    }
}
