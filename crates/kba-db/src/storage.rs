//! Storage abstraction used by the reconciliation engine.
//!
//! The engine only ever issues plain inserts and parameterized equality
//! deletes, plus the two combined into one transaction for replacements.

use std::fmt;

use async_trait::async_trait;

use kba_codec::Value;

/// One row as ordered `(column, value)` pairs.
pub type Row = Vec<(String, Value)>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The backend rejected or failed the statement.
    Backend(String),
    /// A result column has a type this layer does not map.
    Decode { column: String, type_name: String },
    /// Schema operation on a table with no definition.
    UnknownTable(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Backend(msg) => write!(f, "storage error: {msg}"),
            StorageError::Decode { column, type_name } => {
                write!(f, "cannot decode column '{column}' of type {type_name}")
            }
            StorageError::UnknownTable(t) => write!(f, "no table definition for {t}"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        StorageError::Backend(e.to_string())
    }
}

/// `?` placeholders in `sql` bind `params` positionally.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn insert(&self, table: &str, fields: &[(String, Value)]) -> Result<(), StorageError>;

    /// Returns the number of affected rows.
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, StorageError>;

    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, StorageError>;

    /// Run `delete_sql` then insert `fields` into `table` in one transaction.
    /// On any error neither statement takes effect. Returns the rows deleted.
    async fn replace(
        &self,
        table: &str,
        delete_sql: &str,
        params: &[Value],
        fields: &[(String, Value)],
    ) -> Result<u64, StorageError>;
}

/// Quote an SQL identifier (`"name"`, embedded quotes doubled).
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Rewrite `?` placeholders to `$1..$n`, leaving quoted text alone.
pub fn numbered_placeholders(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut n = 0;
    let mut in_literal = false;
    let mut in_ident = false;
    for c in sql.chars() {
        match c {
            '\'' if !in_ident => in_literal = !in_literal,
            '"' if !in_literal => in_ident = !in_ident,
            '?' if !in_literal && !in_ident => {
                n += 1;
                out.push('$');
                out.push_str(&n.to_string());
                continue;
            }
            _ => {}
        }
        out.push(c);
    }
    out
}
