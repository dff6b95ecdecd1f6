//! Change reconciliation: apply one decoded record to storage according to
//! its change kind.
//!
//! Every branch returns an [`ApplyResult`]; storage failures are captured in
//! the result so one bad row never aborts a stream.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use kba_codec::{ChangeKind, DecodedRecord, Value};
use kba_db::{quote_ident, Storage};

use crate::routes::{primary_key, TableRoute};

pub const ERR_NO_PRIMARY_KEY: &str = "no primary key";
pub const ERR_MISSING_KEY_VALUE: &str = "missing key value";

/// What an Update record does.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdatePolicy {
    /// Plain insert, same as New. Fails on tables enforcing their key when
    /// the row already exists.
    #[default]
    Insert,
    /// Keyed delete, then insert. Needs a key like Delete does.
    Replace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Insert,
    Update,
    Delete,
    /// The record type has no destination on this route.
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyResult {
    pub operation: Operation,
    pub table: Option<String>,
    pub record_type: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApplyResult {
    fn ok(operation: Operation, table: &str, record_type: &str) -> Self {
        Self {
            operation,
            table: Some(table.to_string()),
            record_type: record_type.to_string(),
            success: true,
            error: None,
        }
    }

    fn failed(operation: Operation, table: &str, record_type: &str, error: impl Into<String>) -> Self {
        Self {
            operation,
            table: Some(table.to_string()),
            record_type: record_type.to_string(),
            success: false,
            error: Some(error.into()),
        }
    }

    fn skipped(record_type: &str) -> Self {
        Self {
            operation: Operation::Skip,
            table: None,
            record_type: record_type.to_string(),
            success: true,
            error: None,
        }
    }

    pub fn is_skip(&self) -> bool {
        self.operation == Operation::Skip
    }
}

/// `DELETE FROM "t" WHERE "k1" = ? AND ...` plus bind values, in key order.
///
/// `Err` carries the failure message when the table has no key or the
/// record lacks a (non-null) value for one of the key fields.
pub fn keyed_delete(table: &str, record: &DecodedRecord) -> Result<(String, Vec<Value>), &'static str> {
    let keys = primary_key(table);
    if keys.is_empty() {
        return Err(ERR_NO_PRIMARY_KEY);
    }

    let mut conditions = Vec::with_capacity(keys.len());
    let mut params = Vec::with_capacity(keys.len());
    for key in keys {
        match record.get(key) {
            Some(v) if !v.is_null() => {
                conditions.push(format!("{} = ?", quote_ident(key)));
                params.push(v.clone());
            }
            _ => return Err(ERR_MISSING_KEY_VALUE),
        }
    }

    let sql = format!(
        "DELETE FROM {} WHERE {}",
        quote_ident(table),
        conditions.join(" AND ")
    );
    Ok((sql, params))
}

pub struct Reconciler {
    storage: Arc<dyn Storage>,
    route: TableRoute,
    update_policy: UpdatePolicy,
}

impl Reconciler {
    pub fn new(storage: Arc<dyn Storage>, route: TableRoute) -> Self {
        Self {
            storage,
            route,
            update_policy: UpdatePolicy::default(),
        }
    }

    pub fn with_update_policy(mut self, policy: UpdatePolicy) -> Self {
        self.update_policy = policy;
        self
    }

    pub fn route(&self) -> &TableRoute {
        &self.route
    }

    pub async fn apply(&self, record: &DecodedRecord) -> ApplyResult {
        let record_type = record.record_type();
        let Some(table) = self.route.table_for(record_type) else {
            debug!(record_type, "unsupported type on this route");
            return ApplyResult::skipped(record_type);
        };

        let result = match record.change_kind() {
            ChangeKind::New => self.insert(Operation::Insert, &table, record).await,
            ChangeKind::Update => match self.update_policy {
                UpdatePolicy::Insert => self.insert(Operation::Update, &table, record).await,
                UpdatePolicy::Replace => self.replace(&table, record).await,
            },
            ChangeKind::Delete => self.delete(&table, record).await,
        };

        if let Some(err) = &result.error {
            warn!(table = %table, op = ?result.operation, error = %err, "apply failed");
        }
        result
    }

    async fn insert(&self, op: Operation, table: &str, record: &DecodedRecord) -> ApplyResult {
        match self.storage.insert(table, &record.storable_fields()).await {
            Ok(()) => ApplyResult::ok(op, table, record.record_type()),
            Err(e) => ApplyResult::failed(op, table, record.record_type(), e.to_string()),
        }
    }

    async fn delete(&self, table: &str, record: &DecodedRecord) -> ApplyResult {
        let op = Operation::Delete;
        let (sql, params) = match keyed_delete(table, record) {
            Ok(stmt) => stmt,
            Err(msg) => return ApplyResult::failed(op, table, record.record_type(), msg),
        };
        match self.storage.execute(&sql, &params).await {
            Ok(n) => {
                debug!(table, rows = n, "deleted");
                ApplyResult::ok(op, table, record.record_type())
            }
            Err(e) => ApplyResult::failed(op, table, record.record_type(), e.to_string()),
        }
    }

    async fn replace(&self, table: &str, record: &DecodedRecord) -> ApplyResult {
        let op = Operation::Update;
        let (sql, params) = match keyed_delete(table, record) {
            Ok(stmt) => stmt,
            Err(msg) => return ApplyResult::failed(op, table, record.record_type(), msg),
        };
        let fields = record.storable_fields();
        match self.storage.replace(table, &sql, &params, &fields).await {
            Ok(n) => {
                debug!(table, rows = n, "replaced");
                ApplyResult::ok(op, table, record.record_type())
            }
            Err(e) => ApplyResult::failed(op, table, record.record_type(), e.to_string()),
        }
    }
}
