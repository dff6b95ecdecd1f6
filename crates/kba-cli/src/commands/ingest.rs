use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use kba_codec::ParserRegistry;
use kba_config::AppConfig;
use kba_db::{PgSchema, PgStorage, SchemaManager, Storage};
use kba_feed::{timestamp, FeedConnector, OpenMode, ReplayConnector};
use kba_reconcile::{Importer, TableRoute};
use kba_runtime::settings::reconciler;
use kba_runtime::{BackfillRequest, MonitorConfig, StreamMonitor};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{acquire_lock, connect};

// ---------------------------------------------------------------------------
// backfill
// ---------------------------------------------------------------------------

pub async fn backfill(settings: &AppConfig, stream: &str, from: &str, mode: u8) -> Result<()> {
    let mode = OpenMode::from_option(mode)
        .ok_or_else(|| anyhow!("invalid open mode {mode}; expected 1..=4"))?;
    let from = timestamp::normalize_from(from).context("invalid --from")?;

    let _lock = acquire_lock(settings).await?;
    let pool = connect(settings).await?;

    let registry = Arc::new(ParserRegistry::new());
    let route = TableRoute::historical();
    let schema = PgSchema::new(pool.clone(), route.table_defs(&registry));
    let created = kba_db::ensure_tables(&schema).await?;
    if !created.is_empty() {
        info!(tables = created.len(), "created historical tables");
    }

    let storage: Arc<dyn Storage> = Arc::new(PgStorage::new(pool));
    let importer = Importer::new(registry, reconciler(settings, storage, route));
    let connector = ReplayConnector::new(&settings.feed.replay_dir);

    let token = CancellationToken::new();
    let on_signal = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; finishing current record");
            on_signal.cancel();
        }
    });

    let req = BackfillRequest {
        stream_id: stream.to_string(),
        from,
        mode,
    };
    let report = kba_runtime::backfill(&connector, &importer, &req, &token)
        .await
        .with_context(|| format!("backfill of {stream} failed"))?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// monitor
// ---------------------------------------------------------------------------

pub async fn monitor(settings: &AppConfig, streams: Vec<String>, status_every: u64) -> Result<()> {
    let streams = if streams.is_empty() {
        settings.monitor.streams.clone()
    } else {
        streams
    };
    if streams.is_empty() {
        return Err(anyhow!("no streams to monitor"));
    }
    let config = MonitorConfig::from_settings(settings).context("invalid monitor.start_from")?;

    let _lock = acquire_lock(settings).await?;
    let pool = connect(settings).await?;

    let registry = Arc::new(ParserRegistry::new());
    let route = TableRoute::realtime();
    let schema: Arc<dyn SchemaManager> =
        Arc::new(PgSchema::new(pool.clone(), route.table_defs(&registry)));
    let storage: Arc<dyn Storage> = Arc::new(PgStorage::new(pool));
    let importer = Arc::new(Importer::new(registry, reconciler(settings, storage, route)));
    let connector: Arc<dyn FeedConnector> =
        Arc::new(ReplayConnector::new(&settings.feed.replay_dir));

    let monitor = StreamMonitor::new(streams, connector, importer, Some(schema), config);
    monitor.start().await?;

    let mut ticker = tokio::time::interval(Duration::from_secs(status_every.max(1)));
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received; stopping monitor");
                break;
            }
            _ = ticker.tick() => {
                let s = monitor.status().await;
                println!(
                    "running={} imported={} failed={} skipped={} streams={}",
                    s.running,
                    s.records_imported,
                    s.records_failed,
                    s.records_skipped,
                    s.streams.join(",")
                );
                if s.streams.is_empty() {
                    warn!("every stream worker has exited");
                    break;
                }
            }
        }
    }

    let last = monitor.stop(settings.monitor.stop_timeout()).await?;
    println!("{}", serde_json::to_string_pretty(&last)?);
    Ok(())
}
