//! Fetch boundary contract.
//!
//! A [`FeedClient`] is one session against the vendor feed: open a stream,
//! read raw records one at a time, close. Result codes are passed through
//! unchanged; [`crate::FeedReader`] interprets them.

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;

// ---------------------------------------------------------------------------
// Result codes
// ---------------------------------------------------------------------------

/// `open` succeeded and data follows.
pub const OPEN_OK: i32 = 0;
/// `open`: nothing newer than the requested timestamp (both codes are used).
pub const OPEN_NO_DATA: [i32; 2] = [-1, -2];
/// `open`: download still in progress / queued. Reading may proceed.
pub const OPEN_DOWNLOAD_PENDING: [i32; 2] = [-301, -302];
/// `open`: the stream is not part of the subscription.
pub const OPEN_NOT_SUBSCRIBED: [i32; 2] = [-111, -114];

/// `read`: the stream is complete.
pub const READ_COMPLETE: i32 = 0;
/// `read`: current file exhausted, continue with the next one.
pub const READ_FILE_SWITCH: i32 = -1;

// ---------------------------------------------------------------------------
// Session types
// ---------------------------------------------------------------------------

/// How a stream is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenMode {
    /// Live change notices; the timestamp is the resume key.
    Realtime,
    /// Historical differential data (option 1).
    Normal,
    /// Only the current week's races (option 2).
    ThisWeek,
    /// Full setup load (option 3).
    Setup,
    /// Split setup load, dialog on first run only (option 4).
    SplitSetup,
}

impl OpenMode {
    /// Historical open option number -> mode.
    pub fn from_option(option: u8) -> Option<Self> {
        match option {
            1 => Some(OpenMode::Normal),
            2 => Some(OpenMode::ThisWeek),
            3 => Some(OpenMode::Setup),
            4 => Some(OpenMode::SplitSetup),
            _ => None,
        }
    }

    pub fn is_realtime(&self) -> bool {
        matches!(self, OpenMode::Realtime)
    }
}

/// What the boundary reports back from `open`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpenSummary {
    pub code: i32,
    pub read_count: u32,
    pub download_count: u32,
    /// `YYYYMMDDhhmmss` of the newest file the stream covers.
    pub last_timestamp: String,
}

/// One `read` call as the boundary hands it over.
///
/// `buffer` is the marshalled string (one code point per byte, 0x80..0x9F
/// partly substituted), not yet recovered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRead {
    pub code: i32,
    pub buffer: Option<String>,
    pub file_name: Option<String>,
}

impl RawRead {
    pub fn data(buffer: String, file_name: Option<String>) -> Self {
        let code = i32::try_from(buffer.chars().count()).unwrap_or(i32::MAX);
        Self {
            code,
            buffer: Some(buffer),
            file_name,
        }
    }

    pub fn code(code: i32) -> Self {
        Self {
            code,
            buffer: None,
            file_name: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedError {
    /// `open` returned a fatal result code.
    Open { stream_id: String, code: i32 },
    /// `read` returned a fatal result code.
    Read { code: i32 },
    /// A positive read code arrived without a buffer.
    MissingBuffer { code: i32 },
    /// `read` or `close` without an open session.
    NotOpen,
    /// A timestamp argument is not `YYYYMMDD` or `YYYYMMDDhhmmss`.
    InvalidTimestamp(String),
    /// Local I/O of a file-backed client.
    Io(String),
}

impl fmt::Display for FeedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedError::Open { stream_id, code } => {
                write!(f, "feed open failed for {stream_id}: code={code}")
            }
            FeedError::Read { code } => write!(f, "feed read failed: code={code}"),
            FeedError::MissingBuffer { code } => {
                write!(f, "feed read reported {code} bytes but returned no buffer")
            }
            FeedError::NotOpen => write!(f, "feed session is not open"),
            FeedError::InvalidTimestamp(s) => {
                write!(f, "invalid feed timestamp '{s}' (expected YYYYMMDD or YYYYMMDDhhmmss)")
            }
            FeedError::Io(msg) => write!(f, "feed io error: {msg}"),
        }
    }
}

impl std::error::Error for FeedError {}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// One session against the vendor feed.
#[async_trait]
pub trait FeedClient: Send {
    async fn open(
        &mut self,
        stream_id: &str,
        from_timestamp: &str,
        mode: OpenMode,
    ) -> Result<OpenSummary, FeedError>;

    async fn read(&mut self) -> Result<RawRead, FeedError>;

    async fn close(&mut self) -> Result<(), FeedError>;
}

/// Creates sessions. Each monitor worker and each backfill run gets its own.
pub trait FeedConnector: Send + Sync {
    fn connect(&self) -> Result<Box<dyn FeedClient>, FeedError>;
}
