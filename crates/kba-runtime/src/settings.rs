//! Typed config -> runtime policies.

use std::sync::Arc;
use std::time::Duration;

use kba_config::{AppConfig, RetrySettings, UpdatePolicySetting};
use kba_db::Storage;
use kba_feed::timestamp::normalize_from;
use kba_feed::FeedError;
use kba_reconcile::{Reconciler, TableRoute, UpdatePolicy};

use crate::monitor::{MonitorConfig, RetryPolicy};

impl From<&RetrySettings> for RetryPolicy {
    fn from(r: &RetrySettings) -> Self {
        RetryPolicy {
            max_retries: r.max_retries,
            step: Duration::from_secs(r.step_secs),
            cap: Duration::from_secs(r.cap_secs),
        }
    }
}

impl MonitorConfig {
    /// Fails when `monitor.start_from` is not a valid timestamp.
    pub fn from_settings(settings: &AppConfig) -> Result<Self, FeedError> {
        let start_from = settings
            .monitor
            .start_from
            .as_deref()
            .map(normalize_from)
            .transpose()?;
        Ok(MonitorConfig {
            poll_interval: settings.feed.poll_interval(),
            retry: RetryPolicy::from(&settings.monitor.retry),
            start_from,
            auto_create_tables: settings.monitor.auto_create_tables,
        })
    }
}

pub fn update_policy(setting: UpdatePolicySetting) -> UpdatePolicy {
    match setting {
        UpdatePolicySetting::Insert => UpdatePolicy::Insert,
        UpdatePolicySetting::Replace => UpdatePolicy::Replace,
    }
}

/// Reconciler for `route` under the configured update policy.
pub fn reconciler(settings: &AppConfig, storage: Arc<dyn Storage>, route: TableRoute) -> Reconciler {
    Reconciler::new(storage, route).with_update_policy(update_policy(settings.monitor.update_policy))
}
