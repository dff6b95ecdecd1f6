//! Directory-backed feed client.
//!
//! Serves raw dump files through the same contract as the vendor feed, so
//! backfill and the monitor run unchanged against recorded data.
//!
//! Layout: `<dir>/<STREAM>_<YYYYMMDDhhmmss><anything>`, each file a run of
//! CRLF-terminated raw records. `open` selects files stamped strictly after
//! the requested timestamp, oldest first.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use kba_codec::marshal;

use crate::client::{
    FeedClient, FeedConnector, FeedError, OpenMode, OpenSummary, RawRead, OPEN_OK,
    READ_COMPLETE, READ_FILE_SWITCH,
};
use crate::timestamp::leading_stamp;

struct ReplayFile {
    stamp: String,
    name: String,
    path: PathBuf,
}

struct OpenFile {
    name: String,
    records: VecDeque<Vec<u8>>,
}

pub struct ReplayFeed {
    dir: PathBuf,
    open: bool,
    pending: VecDeque<ReplayFile>,
    current: Option<OpenFile>,
}

impl ReplayFeed {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            open: false,
            pending: VecDeque::new(),
            current: None,
        }
    }

    async fn scan(&self, stream_id: &str, from: &str) -> Result<Vec<ReplayFile>, FeedError> {
        let prefix = format!("{stream_id}_");
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| io_err(&self.dir, e))?;

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| io_err(&self.dir, e))? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(stamp) = name.strip_prefix(&prefix).and_then(leading_stamp) else {
                continue;
            };
            if stamp <= from {
                continue;
            }
            files.push(ReplayFile {
                stamp: stamp.to_string(),
                name: name.clone(),
                path: entry.path(),
            });
        }
        files.sort_by(|a, b| a.stamp.cmp(&b.stamp).then_with(|| a.name.cmp(&b.name)));
        Ok(files)
    }
}

fn io_err(path: &Path, e: std::io::Error) -> FeedError {
    FeedError::Io(format!("{}: {e}", path.display()))
}

/// Split a dump into records, each keeping its CRLF terminator.
pub fn split_records(bytes: &[u8]) -> VecDeque<Vec<u8>> {
    let mut out = VecDeque::new();
    let mut start = 0;
    let mut i = 0;
    while i + 1 < bytes.len() {
        if bytes[i] == b'\r' && bytes[i + 1] == b'\n' {
            out.push_back(bytes[start..i + 2].to_vec());
            i += 2;
            start = i;
        } else {
            i += 1;
        }
    }
    if start < bytes.len() {
        out.push_back(bytes[start..].to_vec());
    }
    out
}

#[async_trait]
impl FeedClient for ReplayFeed {
    async fn open(
        &mut self,
        stream_id: &str,
        from_timestamp: &str,
        mode: OpenMode,
    ) -> Result<OpenSummary, FeedError> {
        let files = self.scan(stream_id, from_timestamp).await?;
        debug!(stream = stream_id, from = from_timestamp, ?mode, files = files.len(), "replay open");

        self.open = true;
        self.current = None;
        let last_timestamp = files
            .last()
            .map(|f| f.stamp.clone())
            .unwrap_or_else(|| from_timestamp.to_string());
        let read_count = u32::try_from(files.len()).unwrap_or(u32::MAX);
        let code = if files.is_empty() { -1 } else { OPEN_OK };
        self.pending = files.into();

        Ok(OpenSummary {
            code,
            read_count,
            download_count: 0,
            last_timestamp,
        })
    }

    async fn read(&mut self) -> Result<RawRead, FeedError> {
        if !self.open {
            return Err(FeedError::NotOpen);
        }
        loop {
            if let Some(file) = self.current.as_mut() {
                if let Some(record) = file.records.pop_front() {
                    return Ok(RawRead::data(marshal(&record), Some(file.name.clone())));
                }
                self.current = None;
                let code = if self.pending.is_empty() {
                    READ_COMPLETE
                } else {
                    READ_FILE_SWITCH
                };
                return Ok(RawRead::code(code));
            }

            let Some(next) = self.pending.pop_front() else {
                return Ok(RawRead::code(READ_COMPLETE));
            };
            let bytes = tokio::fs::read(&next.path)
                .await
                .map_err(|e| io_err(&next.path, e))?;
            self.current = Some(OpenFile {
                name: next.name,
                records: split_records(&bytes),
            });
        }
    }

    async fn close(&mut self) -> Result<(), FeedError> {
        if !self.open {
            return Err(FeedError::NotOpen);
        }
        self.open = false;
        self.pending.clear();
        self.current = None;
        Ok(())
    }
}

/// One [`ReplayFeed`] per session over a shared directory.
#[derive(Debug, Clone)]
pub struct ReplayConnector {
    dir: PathBuf,
}

impl ReplayConnector {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl FeedConnector for ReplayConnector {
    fn connect(&self) -> Result<Box<dyn FeedClient>, FeedError> {
        Ok(Box::new(ReplayFeed::new(self.dir.clone())))
    }
}
