//! kba-feed
//!
//! Fetch boundary for the vendor feed: the [`FeedClient`] session contract,
//! [`FeedReader`] (result codes + byte recovery), a directory-backed
//! [`ReplayFeed`] and JST timestamp helpers.

pub mod client;
pub mod reader;
pub mod replay;
pub mod timestamp;

pub use client::{FeedClient, FeedConnector, FeedError, OpenMode, OpenSummary, RawRead};
pub use reader::{FeedReader, FeedRecord, OpenOutcome};
pub use replay::{ReplayConnector, ReplayFeed};
