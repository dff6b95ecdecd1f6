//! In-memory [`Storage`] + [`SchemaManager`] that records every call.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use kba_codec::Value;
use kba_db::{Row, SchemaManager, Storage, StorageError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageCall {
    Insert {
        table: String,
        fields: Vec<(String, Value)>,
    },
    Execute {
        sql: String,
        params: Vec<Value>,
    },
    Query {
        sql: String,
        params: Vec<Value>,
    },
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    calls: Mutex<Vec<StorageCall>>,
    failing_tables: Mutex<HashSet<String>>,
    missing: Mutex<Vec<String>>,
    created: Mutex<Vec<String>>,
    indexed: Mutex<Vec<String>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tables the schema side reports missing until created.
    pub fn with_missing_tables<I, S>(self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *lock(&self.missing) = tables.into_iter().map(Into::into).collect();
        self
    }

    /// Inserts into `table` fail with a backend error from now on.
    pub fn fail_inserts_into(&self, table: &str) {
        lock(&self.failing_tables).insert(table.to_string());
    }

    pub fn calls(&self) -> Vec<StorageCall> {
        lock(&self.calls).clone()
    }

    pub fn inserts(&self) -> Vec<(String, Vec<(String, Value)>)> {
        lock(&self.calls)
            .iter()
            .filter_map(|c| match c {
                StorageCall::Insert { table, fields } => Some((table.clone(), fields.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn executed(&self) -> Vec<(String, Vec<Value>)> {
        lock(&self.calls)
            .iter()
            .filter_map(|c| match c {
                StorageCall::Execute { sql, params } => Some((sql.clone(), params.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn created_tables(&self) -> Vec<String> {
        lock(&self.created).clone()
    }

    pub fn indexed_tables(&self) -> Vec<String> {
        lock(&self.indexed).clone()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn insert(&self, table: &str, fields: &[(String, Value)]) -> Result<(), StorageError> {
        lock(&self.calls).push(StorageCall::Insert {
            table: table.to_string(),
            fields: fields.to_vec(),
        });
        if lock(&self.failing_tables).contains(table) {
            return Err(StorageError::Backend(format!("insert into {table} rejected")));
        }
        Ok(())
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, StorageError> {
        lock(&self.calls).push(StorageCall::Execute {
            sql: sql.to_string(),
            params: params.to_vec(),
        });
        Ok(1)
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, StorageError> {
        lock(&self.calls).push(StorageCall::Query {
            sql: sql.to_string(),
            params: params.to_vec(),
        });
        Ok(Vec::new())
    }

    /// Committed replacements show up as the delete then the insert; a
    /// rejected one leaves no trace, as a rolled-back transaction would.
    async fn replace(
        &self,
        table: &str,
        delete_sql: &str,
        params: &[Value],
        fields: &[(String, Value)],
    ) -> Result<u64, StorageError> {
        if lock(&self.failing_tables).contains(table) {
            return Err(StorageError::Backend(format!("insert into {table} rejected")));
        }
        let mut calls = lock(&self.calls);
        calls.push(StorageCall::Execute {
            sql: delete_sql.to_string(),
            params: params.to_vec(),
        });
        calls.push(StorageCall::Insert {
            table: table.to_string(),
            fields: fields.to_vec(),
        });
        Ok(1)
    }
}

#[async_trait]
impl SchemaManager for MemoryStorage {
    async fn missing_tables(&self) -> Result<Vec<String>, StorageError> {
        let created = lock(&self.created);
        Ok(lock(&self.missing)
            .iter()
            .filter(|t| !created.contains(t))
            .cloned()
            .collect())
    }

    async fn create_table(&self, name: &str) -> Result<(), StorageError> {
        lock(&self.created).push(name.to_string());
        Ok(())
    }

    async fn create_indexes(&self, name: &str) -> Result<(), StorageError> {
        lock(&self.indexed).push(name.to_string());
        Ok(())
    }
}
