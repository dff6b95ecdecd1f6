//! Scenario: monitor start / stop / add-stream lifecycle.
//!
//! GREEN when:
//! - start() with two streams followed at once by stop() leaves
//!   `running = false`, both workers joined well within the timeout.
//! - A second start() while running is refused without side effects.
//! - stop() and add_stream() on a stopped monitor are refused.
//! - add_stream() rejects a stream already monitored and starts a new one.
//! - start() creates missing tables before any worker runs.
//! - A restart opens a fresh session with counters back at zero.
//! - Workers resume each open from the last timestamp the feed reported.

use std::sync::Arc;
use std::time::{Duration, Instant};

use kba_codec::{ChangeKind, ParserRegistry};
use kba_feed::OpenMode;
use kba_reconcile::{Importer, Reconciler, TableRoute};
use kba_runtime::{MonitorConfig, MonitorError, RetryPolicy, StreamMonitor};
use kba_testkit::{eventually, MemoryStorage, RecordBuilder, ScriptedFeed, Session};

const FROM: &str = "20240526000000";

fn config() -> MonitorConfig {
    MonitorConfig {
        poll_interval: Duration::from_millis(20),
        retry: RetryPolicy {
            max_retries: 3,
            step: Duration::from_millis(10),
            cap: Duration::from_millis(20),
        },
        start_from: Some(FROM.to_string()),
        auto_create_tables: true,
    }
}

fn monitor(streams: &[&str], feed: &ScriptedFeed, storage: &Arc<MemoryStorage>) -> StreamMonitor {
    let registry = Arc::new(ParserRegistry::new());
    let importer = Importer::new(
        registry,
        Reconciler::new(storage.clone(), TableRoute::realtime()),
    );
    StreamMonitor::new(
        streams.iter().map(|s| s.to_string()).collect(),
        Arc::new(feed.clone()),
        Arc::new(importer),
        Some(storage.clone()),
        config(),
    )
}

#[tokio::test]
async fn start_then_immediate_stop_joins_both_workers() {
    let feed = ScriptedFeed::new();
    let storage = Arc::new(MemoryStorage::new().with_missing_tables(["RT_RA", "RT_SE"]));
    let m = monitor(&["0B12", "0B15"], &feed, &storage);

    m.start().await.unwrap();
    assert_eq!(storage.created_tables(), vec!["RT_RA", "RT_SE"]);
    assert_eq!(storage.indexed_tables(), vec!["RT_RA", "RT_SE"]);

    let status = m.status().await;
    assert!(status.running);
    assert_eq!(status.streams, vec!["0B12", "0B15"]);

    let t0 = Instant::now();
    let stopped = m.stop(Duration::from_secs(2)).await.unwrap();
    assert!(t0.elapsed() < Duration::from_secs(2));
    assert!(!stopped.running);
    assert!(stopped.streams.is_empty());
    assert!(stopped.stopped_at.is_some());
    assert!(!m.is_running().await);
}

#[tokio::test]
async fn conflicting_calls_are_refused() {
    let feed = ScriptedFeed::new();
    let storage = Arc::new(MemoryStorage::new());
    let m = monitor(&["0B12"], &feed, &storage);

    assert_eq!(m.stop(Duration::from_secs(1)).await, Err(MonitorError::NotRunning));
    assert_eq!(m.add_stream("0B15").await, Err(MonitorError::NotRunning));

    m.start().await.unwrap();
    let session = m.status().await.session_id;
    assert_eq!(m.start().await, Err(MonitorError::AlreadyRunning));
    assert_eq!(m.status().await.session_id, session);

    assert_eq!(
        m.add_stream("0B12").await,
        Err(MonitorError::DuplicateStream("0B12".into()))
    );
    m.add_stream("0B15").await.unwrap();
    assert_eq!(m.status().await.streams, vec!["0B12", "0B15"]);
    assert!(
        eventually(Duration::from_secs(2), || async { !feed.opens_for("0B15").is_empty() }).await
    );

    m.stop(Duration::from_secs(2)).await.unwrap();
    assert_eq!(m.stop(Duration::from_secs(1)).await, Err(MonitorError::NotRunning));
}

#[tokio::test]
async fn restart_begins_a_fresh_session() {
    let registry = ParserRegistry::new();
    let mut rec = RecordBuilder::new(&registry, "RA", ChangeKind::New).unwrap();
    rec.set("MakeDate", "20240101").unwrap();

    let feed = ScriptedFeed::new();
    feed.push("0B12", Session::records("20240526093000", &[rec.build()]));
    let storage = Arc::new(MemoryStorage::new());
    let m = monitor(&["0B12"], &feed, &storage);

    m.start().await.unwrap();
    assert!(eventually(Duration::from_secs(2), || async { m.status().await.records_imported == 1 }).await);
    let first = m.stop(Duration::from_secs(2)).await.unwrap();
    assert_eq!(first.records_imported, 1);

    m.start().await.unwrap();
    let second = m.status().await;
    assert!(second.running);
    assert_eq!(second.records_imported, 0);
    assert_ne!(second.session_id, first.session_id);
    m.stop(Duration::from_secs(2)).await.unwrap();
}

#[tokio::test]
async fn opens_resume_from_reported_timestamp() {
    let feed = ScriptedFeed::new();
    feed.push("0B12", Session::no_data("20240526100000"));
    let storage = Arc::new(MemoryStorage::new());
    let m = monitor(&["0B12"], &feed, &storage);

    m.start().await.unwrap();
    assert!(eventually(Duration::from_secs(2), || async { feed.opens_for("0B12").len() >= 2 }).await);
    m.stop(Duration::from_secs(2)).await.unwrap();

    let opens = feed.opens_for("0B12");
    assert_eq!(opens[0].from, FROM);
    assert_eq!(opens[0].mode, OpenMode::Realtime);
    assert_eq!(opens[1].from, "20240526100000");
    // Every opened session was closed.
    assert_eq!(feed.closes(), u64::try_from(opens.len()).unwrap());
}
