//! kba-testkit
//!
//! Shared fakes for scenario tests:
//! - [`MemoryStorage`]: storage + schema collaborator that records calls
//! - [`ScriptedFeed`]: feed connector replaying canned sessions per stream
//! - [`RecordBuilder`]: raw records laid out by the registered layouts

use std::future::Future;
use std::time::Duration;

mod memory;
mod record;
mod scripted;

pub use memory::{MemoryStorage, StorageCall};
pub use record::RecordBuilder;
pub use scripted::{OpenCall, ScriptedFeed, Session};

/// Poll `check` every 10ms until it holds or `within` elapses.
pub async fn eventually<F, Fut>(within: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + within;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
