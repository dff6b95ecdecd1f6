//! kba-daemon entry point.
//!
//! Thin: loads config, sets up tracing, builds the monitor and shared
//! state, wires middleware, and serves HTTP until Ctrl-C.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use kba_codec::ParserRegistry;
use kba_config::AppConfig;
use kba_daemon::{routes, state};
use kba_db::{PgSchema, PgStorage, SchemaManager, Storage};
use kba_feed::{FeedConnector, ReplayConnector};
use kba_reconcile::{Importer, TableRoute};
use kba_runtime::settings::reconciler;
use kba_runtime::{MonitorConfig, ProcessLock, StreamMonitor};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

/// Comma-separated layered config paths; defaults apply when unset.
const ENV_CONFIG: &str = "KBA_CONFIG";
const ENV_ADDR: &str = "KBA_DAEMON_ADDR";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    let settings = load_settings()?;
    init_tracing(&settings.logging.level);

    let _lock = ProcessLock::new(&settings.lock.name, &settings.lock.dir)
        .acquire_async(false, None)
        .await
        .context("another kba pipeline holds the process lock")?;

    let monitor = Arc::new(build_monitor(&settings).await?);
    let shared = Arc::new(state::AppState::new(
        Arc::clone(&monitor),
        settings.monitor.stop_timeout(),
    ));

    state::spawn_heartbeat(shared.bus.clone(), Duration::from_secs(1));
    state::spawn_status_tick(Arc::clone(&shared), Duration::from_secs(5));

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = bind_addr(&settings)?;
    info!("kba-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("server crashed")?;

    if monitor.is_running().await {
        let last = monitor.stop(settings.monitor.stop_timeout()).await?;
        info!(imported = last.records_imported, failed = last.records_failed, "monitor stopped on shutdown");
    }
    Ok(())
}

fn load_settings() -> anyhow::Result<AppConfig> {
    let raw = std::env::var(ENV_CONFIG).unwrap_or_default();
    let paths: Vec<&str> = raw.split(',').map(str::trim).filter(|p| !p.is_empty()).collect();
    let load = kba_config::load_app_config(&paths)?;
    for key in &load.unknown_keys {
        eprintln!("warning: unknown config key {key}");
    }
    eprintln!("config_hash={}", load.config_hash);
    Ok(load.settings)
}

fn init_tracing(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .init();
}

/// Real-time route over Postgres, fed from the replay directory.
async fn build_monitor(settings: &AppConfig) -> anyhow::Result<StreamMonitor> {
    let pool = kba_db::connect_from_env_var(
        &settings.database.url_env,
        settings.database.max_connections,
    )
    .await?;

    let registry = Arc::new(ParserRegistry::new());
    let route = TableRoute::realtime();
    let schema: Arc<dyn SchemaManager> =
        Arc::new(PgSchema::new(pool.clone(), route.table_defs(&registry)));
    let storage: Arc<dyn Storage> = Arc::new(PgStorage::new(pool));

    let importer = Arc::new(Importer::new(registry, reconciler(settings, storage, route)));
    let connector: Arc<dyn FeedConnector> =
        Arc::new(ReplayConnector::new(&settings.feed.replay_dir));

    let config = MonitorConfig::from_settings(settings).context("invalid monitor.start_from")?;
    if settings.monitor.streams.is_empty() {
        warn!("no streams configured; add them with POST /v1/monitor/streams after start");
    }

    Ok(StreamMonitor::new(
        settings.monitor.streams.clone(),
        connector,
        importer,
        Some(schema),
        config,
    ))
}

/// `KBA_DAEMON_ADDR` wins over `daemon.addr`.
fn bind_addr(settings: &AppConfig) -> anyhow::Result<SocketAddr> {
    let raw = std::env::var(ENV_ADDR).unwrap_or_else(|_| settings.daemon.addr.clone());
    raw.parse()
        .with_context(|| format!("invalid daemon bind address {raw:?}"))
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}
