//! Destination tables: definitions, DDL, and the schema collaborator the
//! monitor calls before launching workers.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{info, warn};

use kba_codec::{Conversion, RecordLayout};

use crate::storage::{quote_ident, StorageError};

/// One destination table: name, source layout, natural key (may be empty).
#[derive(Debug, Clone)]
pub struct TableDef {
    pub name: String,
    pub layout: Arc<RecordLayout>,
    pub primary_key: Vec<String>,
}

/// Column sets worth indexing, used when the table has all of them.
const INDEX_COLUMN_SETS: &[&[&str]] = &[
    &["MakeDate"],
    &["Year", "MonthDay"],
    &["JyoCD"],
    &["Year", "MonthDay", "JyoCD", "RaceNum"],
    &["KettoNum"],
    &["KisyuCode"],
];

pub fn column_type(conversion: Option<Conversion>) -> &'static str {
    match conversion {
        None => "TEXT",
        Some(Conversion::Int | Conversion::PrizeMoney | Conversion::MonthDay) => "BIGINT",
        Some(
            Conversion::Decimal { .. }
            | Conversion::RaceTime
            | Conversion::LapTime
            | Conversion::Weight
            | Conversion::Odds,
        ) => "NUMERIC",
        Some(Conversion::Date) => "DATE",
        Some(Conversion::Time) => "TIME",
    }
}

impl TableDef {
    fn has_columns(&self, names: &[&str]) -> bool {
        names
            .iter()
            .all(|n| self.layout.columns().any(|f| f.name == *n))
    }

    /// Key columns, or `None` when the key is undefined or not fully present
    /// in the layout.
    pub fn key_columns(&self) -> Option<&[String]> {
        if self.primary_key.is_empty() {
            return None;
        }
        let names: Vec<&str> = self.primary_key.iter().map(String::as_str).collect();
        self.has_columns(&names).then_some(self.primary_key.as_slice())
    }

    pub fn create_table_sql(&self) -> String {
        let mut lines: Vec<String> = self
            .layout
            .columns()
            .map(|f| format!("  {} {}", quote_ident(&f.name), column_type(f.conversion)))
            .collect();
        if let Some(key) = self.key_columns() {
            let cols: Vec<String> = key.iter().map(|k| quote_ident(k)).collect();
            lines.push(format!("  PRIMARY KEY ({})", cols.join(", ")));
        }
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n{}\n)",
            quote_ident(&self.name),
            lines.join(",\n")
        )
    }

    pub fn create_index_sql(&self) -> Vec<String> {
        INDEX_COLUMN_SETS
            .iter()
            .filter(|cols| self.has_columns(cols))
            .map(|cols| {
                let quoted: Vec<String> = cols.iter().map(|c| quote_ident(c)).collect();
                format!(
                    "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
                    quote_ident(&format!("ix_{}_{}", self.name, cols.join("_"))),
                    quote_ident(&self.name),
                    quoted.join(", ")
                )
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Schema collaborator
// ---------------------------------------------------------------------------

#[async_trait]
pub trait SchemaManager: Send + Sync {
    async fn missing_tables(&self) -> Result<Vec<String>, StorageError>;

    async fn create_table(&self, name: &str) -> Result<(), StorageError>;

    async fn create_indexes(&self, name: &str) -> Result<(), StorageError>;
}

/// Create every missing table and its indexes. Returns the tables created.
pub async fn ensure_tables(schema: &dyn SchemaManager) -> Result<Vec<String>, StorageError> {
    let missing = schema.missing_tables().await?;
    if missing.is_empty() {
        return Ok(missing);
    }
    info!(count = missing.len(), "creating missing tables");
    for table in &missing {
        schema.create_table(table).await?;
        schema.create_indexes(table).await?;
    }
    Ok(missing)
}

pub struct PgSchema {
    pool: PgPool,
    defs: BTreeMap<String, TableDef>,
}

impl PgSchema {
    pub fn new(pool: PgPool, defs: Vec<TableDef>) -> Self {
        Self {
            pool,
            defs: defs.into_iter().map(|d| (d.name.clone(), d)).collect(),
        }
    }

    fn def(&self, name: &str) -> Result<&TableDef, StorageError> {
        self.defs
            .get(name)
            .ok_or_else(|| StorageError::UnknownTable(name.to_string()))
    }
}

#[async_trait]
impl SchemaManager for PgSchema {
    async fn missing_tables(&self) -> Result<Vec<String>, StorageError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            select table_name::text
            from information_schema.tables
            where table_schema = current_schema()
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        let present: HashSet<String> = rows.into_iter().map(|(t,)| t).collect();
        Ok(self
            .defs
            .keys()
            .filter(|t| !present.contains(*t))
            .cloned()
            .collect())
    }

    async fn create_table(&self, name: &str) -> Result<(), StorageError> {
        let def = self.def(name)?;
        if !def.primary_key.is_empty() && def.key_columns().is_none() {
            warn!(table = name, "key columns not in layout; table created without primary key");
        }
        sqlx::query(&def.create_table_sql())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn create_indexes(&self, name: &str) -> Result<(), StorageError> {
        for sql in self.def(name)?.create_index_sql() {
            sqlx::query(&sql).execute(&self.pool).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kba_codec::FieldSpec;

    fn def(primary_key: &[&str]) -> TableDef {
        let layout = RecordLayout::new(
            "ZZ",
            27,
            vec![
                FieldSpec::text("RecordSpec", 0, 2),
                FieldSpec::text("DataKubun", 2, 1),
                FieldSpec::typed("MakeDate", 3, 8, Conversion::Date),
                FieldSpec::typed("Year", 11, 4, Conversion::Int),
                FieldSpec::typed("Odds", 15, 4, Conversion::Odds),
                FieldSpec::typed("HassoTime", 19, 4, Conversion::Time),
                FieldSpec::text("_Filler", 23, 2),
                FieldSpec::text("_Delimiter", 25, 2),
            ],
        )
        .unwrap();
        TableDef {
            name: "RT_ZZ".into(),
            layout: Arc::new(layout),
            primary_key: primary_key.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn ddl_maps_conversions_and_skips_internal_fields() {
        let sql = def(&["Year"]).create_table_sql();
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"RT_ZZ\""));
        assert!(sql.contains("\"MakeDate\" DATE"));
        assert!(sql.contains("\"Year\" BIGINT"));
        assert!(sql.contains("\"Odds\" NUMERIC"));
        assert!(sql.contains("\"HassoTime\" TIME"));
        assert!(sql.contains("\"RecordSpec\" TEXT"));
        assert!(!sql.contains("_Filler"));
        assert!(!sql.contains("_Delimiter"));
        assert!(sql.contains("PRIMARY KEY (\"Year\")"));
    }

    #[test]
    fn key_with_absent_column_is_dropped_from_ddl() {
        let d = def(&["Year", "Umaban"]);
        assert!(d.key_columns().is_none());
        assert!(!d.create_table_sql().contains("PRIMARY KEY"));
        assert!(def(&[]).key_columns().is_none());
    }

    #[test]
    fn indexes_only_for_present_columns() {
        let sqls = def(&[]).create_index_sql();
        assert_eq!(sqls.len(), 1);
        assert_eq!(
            sqls[0],
            "CREATE INDEX IF NOT EXISTS \"ix_RT_ZZ_MakeDate\" ON \"RT_ZZ\" (\"MakeDate\")"
        );
    }
}
