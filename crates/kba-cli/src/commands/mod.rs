pub mod db;
pub mod decode;
pub mod ingest;

use anyhow::{Context, Result};
use kba_config::AppConfig;
use kba_db::PgPool;
use kba_runtime::{LockGuard, ProcessLock};
use tracing::info;

/// Load layered config (none -> all defaults) and log its hash.
pub fn load_settings(paths: &[String]) -> Result<AppConfig> {
    let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
    let load = kba_config::load_app_config(&path_refs)?;
    for key in &load.unknown_keys {
        eprintln!("warning: unknown config key {key}");
    }
    eprintln!("config_hash={}", load.config_hash);
    Ok(load.settings)
}

/// Logs go to stderr so stdout stays machine-readable.
pub fn init_tracing(default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

pub async fn connect(settings: &AppConfig) -> Result<PgPool> {
    kba_db::connect_from_env_var(&settings.database.url_env, settings.database.max_connections)
        .await
}

pub async fn acquire_lock(settings: &AppConfig) -> Result<LockGuard> {
    let lock = ProcessLock::new(&settings.lock.name, &settings.lock.dir);
    let guard = lock
        .acquire_async(false, None)
        .await
        .context("another kba pipeline holds the process lock")?;
    info!(path = %guard.path().display(), "process lock held");
    Ok(guard)
}
