//! Import path: raw recovered bytes -> dispatch -> reconcile.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use kba_codec::{record_tag, ParserRegistry};

use crate::engine::{ApplyResult, Reconciler};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ImportOutcome {
    Applied(ApplyResult),
    /// Unknown tag, no layout, or no destination on this route.
    Skipped { record_type: Option<String> },
    /// Decode fault or unsuccessful apply.
    Failed {
        record_type: Option<String>,
        error: String,
    },
}

impl ImportOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ImportOutcome::Applied(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ImportOutcome::Failed { .. })
    }
}

pub struct Importer {
    registry: Arc<ParserRegistry>,
    reconciler: Reconciler,
}

impl Importer {
    pub fn new(registry: Arc<ParserRegistry>, reconciler: Reconciler) -> Self {
        Self {
            registry,
            reconciler,
        }
    }

    pub fn registry(&self) -> &Arc<ParserRegistry> {
        &self.registry
    }

    pub async fn import(&self, raw: &[u8]) -> ImportOutcome {
        let tag = record_tag(raw).map(str::to_string);

        let record = match self.registry.dispatch(raw) {
            Ok(Some(rec)) => rec,
            Ok(None) => return ImportOutcome::Skipped { record_type: tag },
            Err(e) => {
                debug!(record_type = ?tag, error = %e, "decode failed");
                return ImportOutcome::Failed {
                    record_type: tag,
                    error: e.to_string(),
                };
            }
        };

        let result = self.reconciler.apply(&record).await;
        if result.is_skip() {
            ImportOutcome::Skipped {
                record_type: Some(result.record_type),
            }
        } else if result.success {
            ImportOutcome::Applied(result)
        } else {
            ImportOutcome::Failed {
                record_type: Some(result.record_type),
                error: result.error.unwrap_or_default(),
            }
        }
    }
}
