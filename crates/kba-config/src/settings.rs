//! Typed settings. Every key has a default, so an empty document is valid.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseSettings,
    pub feed: FeedSettings,
    pub monitor: MonitorSettings,
    pub lock: LockSettings,
    pub logging: LoggingSettings,
    pub daemon: DaemonSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Name of the env var holding the connection URL.
    pub url_env: String,
    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url_env: "KBA_DATABASE_URL".to_string(),
            max_connections: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedSettings {
    /// Directory of `<STREAM>_<YYYYMMDDhhmmss>*` dump files.
    pub replay_dir: String,
    pub poll_interval_ms: u64,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            replay_dir: "data/feed".to_string(),
            poll_interval_ms: 60_000,
        }
    }
}

impl FeedSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdatePolicySetting {
    #[default]
    Insert,
    Replace,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub step_secs: u64,
    pub cap_secs: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            step_secs: 5,
            cap_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    pub streams: Vec<String>,
    pub stop_timeout_secs: u64,
    pub retry: RetrySettings,
    pub update_policy: UpdatePolicySetting,
    pub auto_create_tables: bool,
    /// `YYYYMMDD` or `YYYYMMDDhhmmss`; today 00:00 JST when unset.
    pub start_from: Option<String>,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            streams: vec!["0B12".to_string()],
            stop_timeout_secs: 10,
            retry: RetrySettings::default(),
            update_policy: UpdatePolicySetting::default(),
            auto_create_tables: true,
            start_from: None,
        }
    }
}

impl MonitorSettings {
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockSettings {
    pub dir: String,
    pub name: String,
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            dir: ".".to_string(),
            name: "kba".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default `EnvFilter` directive when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonSettings {
    pub addr: String,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8899".to_string(),
        }
    }
}
