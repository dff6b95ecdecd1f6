//! Result-code interpretation and byte recovery on top of a [`FeedClient`].

use tracing::{debug, info, warn};

use kba_codec::recover_bytes;

use crate::client::{
    FeedClient, FeedError, OpenMode, OpenSummary, OPEN_DOWNLOAD_PENDING, OPEN_NOT_SUBSCRIBED,
    OPEN_NO_DATA, OPEN_OK, READ_COMPLETE, READ_FILE_SWITCH,
};

/// A recovered raw record, ready for the parser registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedRecord {
    pub bytes: Vec<u8>,
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenOutcome {
    /// Nothing to read; the session is still open and must be closed.
    NoData(OpenSummary),
    Ready(OpenSummary),
}

impl OpenOutcome {
    pub fn summary(&self) -> &OpenSummary {
        match self {
            OpenOutcome::NoData(s) | OpenOutcome::Ready(s) => s,
        }
    }
}

pub struct FeedReader {
    client: Box<dyn FeedClient>,
    files: u64,
    records: u64,
}

impl FeedReader {
    pub fn new(client: Box<dyn FeedClient>) -> Self {
        Self {
            client,
            files: 0,
            records: 0,
        }
    }

    pub async fn open(
        &mut self,
        stream_id: &str,
        from_timestamp: &str,
        mode: OpenMode,
    ) -> Result<OpenOutcome, FeedError> {
        self.files = 0;
        self.records = 0;

        let summary = self.client.open(stream_id, from_timestamp, mode).await?;
        let code = summary.code;

        if OPEN_NO_DATA.contains(&code) {
            debug!(stream = stream_id, from = from_timestamp, code, "no data");
            return Ok(OpenOutcome::NoData(summary));
        }
        if OPEN_NOT_SUBSCRIBED.contains(&code) {
            warn!(stream = stream_id, code, "stream not included in subscription");
            return Ok(OpenOutcome::NoData(summary));
        }
        if OPEN_DOWNLOAD_PENDING.contains(&code) {
            info!(stream = stream_id, code, "download pending");
            return Ok(OpenOutcome::Ready(summary));
        }
        if code < OPEN_OK {
            return Err(FeedError::Open {
                stream_id: stream_id.to_string(),
                code,
            });
        }
        if !mode.is_realtime() && summary.read_count == 0 {
            debug!(stream = stream_id, "open reported zero files");
            return Ok(OpenOutcome::NoData(summary));
        }
        Ok(OpenOutcome::Ready(summary))
    }

    /// Next record, skipping file switches. `Ok(None)` once the stream completes.
    pub async fn next_record(&mut self) -> Result<Option<FeedRecord>, FeedError> {
        loop {
            let read = self.client.read().await?;
            match read.code {
                READ_COMPLETE => return Ok(None),
                READ_FILE_SWITCH => {
                    self.files += 1;
                    continue;
                }
                code if code < READ_FILE_SWITCH => return Err(FeedError::Read { code }),
                code => {
                    let buffer = read.buffer.ok_or(FeedError::MissingBuffer { code })?;
                    self.records += 1;
                    return Ok(Some(FeedRecord {
                        bytes: recover_bytes(&buffer),
                        file_name: read.file_name,
                    }));
                }
            }
        }
    }

    pub async fn close(&mut self) -> Result<(), FeedError> {
        self.client.close().await
    }

    /// File switches seen since the last `open`.
    pub fn file_switches(&self) -> u64 {
        self.files
    }

    pub fn records_read(&self) -> u64 {
        self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::RawRead;
    use async_trait::async_trait;
    use std::collections::VecDeque;

    struct Canned {
        open_code: i32,
        read_count: u32,
        reads: VecDeque<RawRead>,
    }

    #[async_trait]
    impl FeedClient for Canned {
        async fn open(&mut self, _: &str, from: &str, _: OpenMode) -> Result<OpenSummary, FeedError> {
            Ok(OpenSummary {
                code: self.open_code,
                read_count: self.read_count,
                download_count: 0,
                last_timestamp: from.to_string(),
            })
        }

        async fn read(&mut self) -> Result<RawRead, FeedError> {
            Ok(self.reads.pop_front().unwrap_or(RawRead::code(0)))
        }

        async fn close(&mut self) -> Result<(), FeedError> {
            Ok(())
        }
    }

    fn reader(open_code: i32, read_count: u32, reads: Vec<RawRead>) -> FeedReader {
        FeedReader::new(Box::new(Canned {
            open_code,
            read_count,
            reads: reads.into(),
        }))
    }

    #[tokio::test]
    async fn no_data_codes_are_not_errors() {
        for code in [-1, -2, -111, -114] {
            let mut r = reader(code, 0, vec![]);
            let out = r.open("RACE", "20240101000000", OpenMode::Normal).await.unwrap();
            assert!(matches!(out, OpenOutcome::NoData(_)), "code {code}");
        }
        let mut r = reader(0, 0, vec![]);
        let out = r.open("RACE", "20240101000000", OpenMode::Normal).await.unwrap();
        assert!(matches!(out, OpenOutcome::NoData(_)));
    }

    #[tokio::test]
    async fn fatal_open_code_is_error() {
        let mut r = reader(-100, 0, vec![]);
        let err = r.open("RACE", "20240101000000", OpenMode::Normal).await.unwrap_err();
        assert_eq!(
            err,
            FeedError::Open {
                stream_id: "RACE".into(),
                code: -100
            }
        );
    }

    #[tokio::test]
    async fn file_switches_are_skipped_and_bytes_recovered() {
        let mut r = reader(
            0,
            2,
            vec![
                RawRead::data("WE1\u{0152}".into(), Some("a".into())),
                RawRead::code(-1),
                RawRead::data("WE2x".into(), Some("b".into())),
                RawRead::code(0),
            ],
        );
        assert!(matches!(
            r.open("0B16", "20240101000000", OpenMode::Realtime).await.unwrap(),
            OpenOutcome::Ready(_)
        ));

        let first = r.next_record().await.unwrap().unwrap();
        assert_eq!(first.bytes, vec![b'W', b'E', b'1', 0x8C]);
        let second = r.next_record().await.unwrap().unwrap();
        assert_eq!(second.bytes, b"WE2x".to_vec());
        assert_eq!(second.file_name.as_deref(), Some("b"));
        assert_eq!(r.next_record().await.unwrap(), None);
        assert_eq!(r.file_switches(), 1);
        assert_eq!(r.records_read(), 2);
    }

    #[tokio::test]
    async fn fatal_read_code_is_error() {
        let mut r = reader(0, 1, vec![RawRead::code(-203)]);
        r.open("RACE", "20240101000000", OpenMode::Normal).await.unwrap();
        assert_eq!(r.next_record().await.unwrap_err(), FeedError::Read { code: -203 });
    }

    #[tokio::test]
    async fn data_code_without_buffer_is_error() {
        let mut r = reader(0, 1, vec![RawRead::code(42)]);
        r.open("RACE", "20240101000000", OpenMode::Normal).await.unwrap();
        assert_eq!(
            r.next_record().await.unwrap_err(),
            FeedError::MissingBuffer { code: 42 }
        );
    }
}
