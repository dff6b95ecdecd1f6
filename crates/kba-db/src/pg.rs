//! Postgres implementation of [`Storage`].

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{Column, PgPool, Postgres, Row as _, TypeInfo};

use kba_codec::Value;

use crate::storage::{numbered_placeholders, quote_ident, Row, Storage, StorageError};

#[derive(Clone)]
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn bind_value<'q>(
    q: Query<'q, Postgres, PgArguments>,
    v: &'q Value,
) -> Query<'q, Postgres, PgArguments> {
    match v {
        Value::Null => q.bind(None::<String>),
        Value::Text(s) => q.bind(s.as_str()),
        Value::Int(n) => q.bind(*n),
        Value::Decimal(d) => q.bind(*d),
        Value::Date(d) => q.bind(*d),
        Value::Time(t) => q.bind(*t),
    }
}

/// `INSERT` statement for the non-null fields, plus the values to bind.
pub fn insert_sql<'a>(table: &str, fields: &'a [(String, Value)]) -> (String, Vec<&'a Value>) {
    let present: Vec<&(String, Value)> = fields.iter().filter(|(_, v)| !v.is_null()).collect();
    if present.is_empty() {
        return (format!("INSERT INTO {} DEFAULT VALUES", quote_ident(table)), Vec::new());
    }

    let columns: Vec<String> = present.iter().map(|(k, _)| quote_ident(k)).collect();
    let slots: Vec<String> = (1..=present.len()).map(|i| format!("${i}")).collect();
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table),
        columns.join(", "),
        slots.join(", ")
    );
    (sql, present.into_iter().map(|(_, v)| v).collect())
}

fn decode_column(row: &PgRow, idx: usize) -> Result<Value, StorageError> {
    let col = &row.columns()[idx];
    let type_name = col.type_info().name().to_string();
    let decode_err = |_: sqlx::Error| StorageError::Decode {
        column: col.name().to_string(),
        type_name: type_name.clone(),
    };

    let v = match type_name.as_str() {
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => row
            .try_get::<Option<String>, _>(idx)
            .map_err(decode_err)?
            .map(Value::Text),
        "INT8" => row
            .try_get::<Option<i64>, _>(idx)
            .map_err(decode_err)?
            .map(Value::Int),
        "INT4" => row
            .try_get::<Option<i32>, _>(idx)
            .map_err(decode_err)?
            .map(|n| Value::Int(i64::from(n))),
        "INT2" => row
            .try_get::<Option<i16>, _>(idx)
            .map_err(decode_err)?
            .map(|n| Value::Int(i64::from(n))),
        "BOOL" => row
            .try_get::<Option<bool>, _>(idx)
            .map_err(decode_err)?
            .map(|b| Value::Int(i64::from(b))),
        "NUMERIC" => row
            .try_get::<Option<Decimal>, _>(idx)
            .map_err(decode_err)?
            .map(Value::Decimal),
        "DATE" => row
            .try_get::<Option<NaiveDate>, _>(idx)
            .map_err(decode_err)?
            .map(Value::Date),
        "TIME" => row
            .try_get::<Option<NaiveTime>, _>(idx)
            .map_err(decode_err)?
            .map(Value::Time),
        _ => {
            return Err(StorageError::Decode {
                column: col.name().to_string(),
                type_name: type_name.clone(),
            })
        }
    };
    Ok(v.unwrap_or(Value::Null))
}

#[async_trait]
impl Storage for PgStorage {
    async fn insert(&self, table: &str, fields: &[(String, Value)]) -> Result<(), StorageError> {
        let (sql, values) = insert_sql(table, fields);
        let mut q = sqlx::query(&sql);
        for v in values {
            q = bind_value(q, v);
        }
        q.execute(&self.pool).await?;
        Ok(())
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, StorageError> {
        let sql = numbered_placeholders(sql);
        let mut q = sqlx::query(&sql);
        for v in params {
            q = bind_value(q, v);
        }
        let done = q.execute(&self.pool).await?;
        Ok(done.rows_affected())
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, StorageError> {
        let sql = numbered_placeholders(sql);
        let mut q = sqlx::query(&sql);
        for v in params {
            q = bind_value(q, v);
        }
        let rows = q.fetch_all(&self.pool).await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut fields = Vec::with_capacity(row.columns().len());
            for (idx, col) in row.columns().iter().enumerate() {
                fields.push((col.name().to_string(), decode_column(row, idx)?));
            }
            out.push(fields);
        }
        Ok(out)
    }

    async fn replace(
        &self,
        table: &str,
        delete_sql: &str,
        params: &[Value],
        fields: &[(String, Value)],
    ) -> Result<u64, StorageError> {
        // Dropping `tx` before commit rolls back.
        let mut tx = self.pool.begin().await?;

        let delete = numbered_placeholders(delete_sql);
        let mut q = sqlx::query(&delete);
        for v in params {
            q = bind_value(q, v);
        }
        let removed = q.execute(&mut *tx).await?.rows_affected();

        let (sql, values) = insert_sql(table, fields);
        let mut q = sqlx::query(&sql);
        for v in values {
            q = bind_value(q, v);
        }
        q.execute(&mut *tx).await?;

        tx.commit().await?;
        Ok(removed)
    }
}
