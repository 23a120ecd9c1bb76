//! DuckDB sink
//!
//! One schema per dataset, one table per resource. Lists and nested JSON
//! are stored as JSON text in VARCHAR columns. Cursors live in a
//! `_pipeline_state` table next to the data.

use super::{dedupe_by_key, Sink};
use crate::engine::RowBatch;
use crate::error::{Error, Result};
use crate::resource::TableSpec;
use crate::schema::{FieldType, TableSchema};
use crate::state::Cursor;
use crate::types::{JsonValue, Row};
use async_trait::async_trait;
use duckdb::types::Value as SqlValue;
use duckdb::{params, params_from_iter, Connection, OptionalExt};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

const STATE_TABLE: &str = "_pipeline_state";

/// Sink loading into a DuckDB database
pub struct DuckDbSink {
    conn: Mutex<Connection>,
    /// Database file; `None` for in-memory databases
    path: Option<PathBuf>,
}

impl DuckDbSink {
    /// Open (or create) a database file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&path).map_err(|e| {
            Error::sink(format!("Failed to open DuckDB at {}: {e}", path.display()))
        })?;

        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path),
        })
    }

    /// Open an in-memory database
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::sink(format!("Failed to create DuckDB connection: {e}")))?;

        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    /// Database file, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// All rows of a table, in insertion order
    pub async fn rows(&self, table: &TableSpec) -> Result<Vec<Row>> {
        let conn = self.conn.lock().await;
        let columns: Vec<String> = table.schema.fields().iter().map(|f| quote_ident(f.name)).collect();
        let sql = format!(
            "SELECT {} FROM {}",
            columns.join(", "),
            qualified(&table.dataset, table.name)
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| Error::sink(format!("Failed to prepare query: {e}")))?;
        let raw: Vec<Vec<SqlValue>> = stmt
            .query_map([], |row| {
                (0..columns.len())
                    .map(|i| row.get::<_, SqlValue>(i))
                    .collect::<duckdb::Result<Vec<_>>>()
            })
            .map_err(|e| Error::sink(format!("Failed to query {}: {e}", table.name)))?
            .collect::<duckdb::Result<Vec<_>>>()
            .map_err(|e| Error::sink(format!("Failed to read {}: {e}", table.name)))?;

        raw.into_iter()
            .map(|values| row_from_sql(&table.schema, values))
            .collect()
    }

    /// Number of rows in a table
    pub async fn count(&self, table: &TableSpec) -> Result<usize> {
        let conn = self.conn.lock().await;
        let sql = format!("SELECT COUNT(*) FROM {}", qualified(&table.dataset, table.name));
        let count: i64 = conn
            .query_row(&sql, [], |row| row.get(0))
            .map_err(|e| Error::sink(format!("Failed to count {}: {e}", table.name)))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    fn ensure_state_table(conn: &Connection, dataset: &str) -> Result<()> {
        let sql = format!(
            "CREATE SCHEMA IF NOT EXISTS {schema};
             CREATE TABLE IF NOT EXISTS {table} (
                 resource VARCHAR NOT NULL,
                 cursor VARCHAR NOT NULL,
                 updated_at VARCHAR NOT NULL
             );",
            schema = quote_ident(dataset),
            table = qualified(dataset, STATE_TABLE),
        );
        conn.execute_batch(&sql)
            .map_err(|e| Error::state(format!("Failed to create state table: {e}")))
    }
}

impl std::fmt::Debug for DuckDbSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuckDbSink")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Sink for DuckDbSink {
    fn name(&self) -> &'static str {
        "duckdb"
    }

    async fn prepare(&self, table: &TableSpec) -> Result<()> {
        let columns: Vec<String> = table
            .schema
            .fields()
            .iter()
            .map(|f| {
                let null = if f.nullable { "" } else { " NOT NULL" };
                format!("{} {}{null}", quote_ident(f.name), f.field_type.sql_type())
            })
            .collect();

        let sql = format!(
            "CREATE SCHEMA IF NOT EXISTS {schema};
             CREATE TABLE IF NOT EXISTS {table} ({columns});",
            schema = quote_ident(&table.dataset),
            table = qualified(&table.dataset, table.name),
            columns = columns.join(", "),
        );

        let conn = self.conn.lock().await;
        conn.execute_batch(&sql).map_err(|e| {
            Error::sink(format!(
                "Failed to create table {}.{}: {e}",
                table.dataset, table.name
            ))
        })
    }

    async fn accept(&self, table: &TableSpec, batch: &RowBatch) -> Result<usize> {
        let rows = dedupe_by_key(table, batch.rows());
        if rows.is_empty() {
            return Ok(0);
        }

        let target = qualified(&table.dataset, table.name);
        let fields = table.schema.fields();
        let columns: Vec<String> = fields.iter().map(|f| quote_ident(f.name)).collect();
        let placeholders = vec!["?"; fields.len()].join(", ");
        let insert_sql = format!(
            "INSERT INTO {target} ({}) VALUES ({placeholders})",
            columns.join(", ")
        );
        let delete_sql = table.is_keyed().then(|| {
            let predicate: Vec<String> = table
                .primary_key
                .iter()
                .map(|k| format!("{} = ?", quote_ident(k)))
                .collect();
            format!("DELETE FROM {target} WHERE {}", predicate.join(" AND "))
        });

        let mut conn = self.conn.lock().await;
        let tx = conn
            .transaction()
            .map_err(|e| Error::sink(format!("Failed to begin transaction: {e}")))?;

        {
            let mut insert = tx
                .prepare(&insert_sql)
                .map_err(|e| Error::sink(format!("Failed to prepare insert: {e}")))?;
            let mut delete = delete_sql
                .as_deref()
                .map(|sql| tx.prepare(sql))
                .transpose()
                .map_err(|e| Error::sink(format!("Failed to prepare delete: {e}")))?;

            for row in &rows {
                if let Some(delete) = delete.as_mut() {
                    let key = key_values(&table.schema, table.primary_key, row)?;
                    delete
                        .execute(params_from_iter(key))
                        .map_err(|e| Error::sink(format!("Failed to delete existing rows: {e}")))?;
                }

                let values = fields
                    .iter()
                    .map(|f| to_sql(f.field_type, row.get(f.name).unwrap_or(&JsonValue::Null)))
                    .collect::<Result<Vec<_>>>()?;
                insert
                    .execute(params_from_iter(values))
                    .map_err(|e| Error::sink(format!("Failed to insert into {}: {e}", table.name)))?;
            }
        }

        tx.commit()
            .map_err(|e| Error::sink(format!("Failed to commit batch: {e}")))?;

        debug!(table = %target, unit = %batch.unit(), rows = rows.len(), "Batch committed");
        Ok(rows.len())
    }

    async fn load_cursor(&self, dataset: &str, resource: &str) -> Result<Option<Cursor>> {
        let conn = self.conn.lock().await;
        Self::ensure_state_table(&conn, dataset)?;

        let sql = format!(
            "SELECT cursor FROM {} WHERE resource = ?",
            qualified(dataset, STATE_TABLE)
        );
        let raw: Option<String> = conn
            .query_row(&sql, params![resource], |row| row.get(0))
            .optional()
            .map_err(|e| Error::state(format!("Failed to read cursor of {resource}: {e}")))?;

        raw.map(|json| {
            serde_json::from_str(&json)
                .map_err(|e| Error::state(format!("Stored cursor of {resource} is invalid: {e}")))
        })
        .transpose()
    }

    async fn save_cursor(&self, dataset: &str, resource: &str, cursor: &Cursor) -> Result<()> {
        let json = serde_json::to_string(cursor)?;
        let table = qualified(dataset, STATE_TABLE);

        let mut conn = self.conn.lock().await;
        Self::ensure_state_table(&conn, dataset)?;

        let tx = conn
            .transaction()
            .map_err(|e| Error::state(format!("Failed to begin transaction: {e}")))?;
        tx.execute(&format!("DELETE FROM {table} WHERE resource = ?"), params![resource])
            .map_err(|e| Error::state(format!("Failed to replace cursor: {e}")))?;
        tx.execute(
            &format!("INSERT INTO {table} (resource, cursor, updated_at) VALUES (?, ?, ?)"),
            params![resource, json, chrono::Utc::now().to_rfc3339()],
        )
        .map_err(|e| Error::state(format!("Failed to store cursor: {e}")))?;
        tx.commit()
            .map_err(|e| Error::state(format!("Failed to commit cursor: {e}")))
    }

    async fn clear_cursor(&self, dataset: &str, resource: &str) -> Result<bool> {
        let conn = self.conn.lock().await;
        Self::ensure_state_table(&conn, dataset)?;

        let removed = conn
            .execute(
                &format!("DELETE FROM {} WHERE resource = ?", qualified(dataset, STATE_TABLE)),
                params![resource],
            )
            .map_err(|e| Error::state(format!("Failed to clear cursor: {e}")))?;
        Ok(removed > 0)
    }

    async fn cursors(&self, dataset: &str) -> Result<BTreeMap<String, Cursor>> {
        let conn = self.conn.lock().await;
        Self::ensure_state_table(&conn, dataset)?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT resource, cursor FROM {}",
                qualified(dataset, STATE_TABLE)
            ))
            .map_err(|e| Error::state(format!("Failed to prepare query: {e}")))?;
        let pairs: Vec<(String, String)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(|e| Error::state(format!("Failed to read cursors: {e}")))?
            .collect::<duckdb::Result<Vec<_>>>()
            .map_err(|e| Error::state(format!("Failed to read cursors: {e}")))?;

        pairs
            .into_iter()
            .map(|(resource, json)| {
                let cursor = serde_json::from_str(&json).map_err(|e| {
                    Error::state(format!("Stored cursor of {resource} is invalid: {e}"))
                })?;
                Ok((resource, cursor))
            })
            .collect()
    }
}

// ============================================================================
// Value conversion
// ============================================================================

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn qualified(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}

/// SQL parameter for a normalized JSON value
fn to_sql(field_type: FieldType, value: &JsonValue) -> Result<SqlValue> {
    if value.is_null() {
        return Ok(SqlValue::Null);
    }

    let converted = match field_type {
        FieldType::Integer => value.as_i64().map(SqlValue::BigInt),
        FieldType::Float => value.as_f64().map(SqlValue::Double),
        FieldType::Boolean => value.as_bool().map(SqlValue::Boolean),
        FieldType::String => value.as_str().map(|s| SqlValue::Text(s.to_string())),
        FieldType::StringList | FieldType::Json => Some(SqlValue::Text(value.to_string())),
    };

    converted.ok_or_else(|| Error::sink(format!("Cannot store {value} as {field_type}")))
}

/// JSON value read back from a column
fn from_sql(field_type: FieldType, value: SqlValue) -> Result<JsonValue> {
    let json = match value {
        SqlValue::Null => JsonValue::Null,
        SqlValue::Boolean(b) => JsonValue::Bool(b),
        SqlValue::TinyInt(i) => JsonValue::from(i),
        SqlValue::SmallInt(i) => JsonValue::from(i),
        SqlValue::Int(i) => JsonValue::from(i),
        SqlValue::BigInt(i) => JsonValue::from(i),
        SqlValue::Float(f) => JsonValue::from(f),
        SqlValue::Double(f) => JsonValue::from(f),
        SqlValue::Text(s) => match field_type {
            FieldType::StringList | FieldType::Json => serde_json::from_str(&s)?,
            _ => JsonValue::String(s),
        },
        other => {
            return Err(Error::sink(format!(
                "Unexpected {field_type} column value: {other:?}"
            )))
        }
    };
    Ok(json)
}

fn row_from_sql(schema: &TableSchema, values: Vec<SqlValue>) -> Result<Row> {
    schema
        .fields()
        .iter()
        .zip(values)
        .map(|(field, value)| Ok((field.name.to_string(), from_sql(field.field_type, value)?)))
        .collect()
}

fn key_values(schema: &TableSchema, key: &[&str], row: &Row) -> Result<Vec<SqlValue>> {
    key.iter()
        .map(|k| {
            let field_type = schema
                .field(k)
                .map_or(FieldType::String, |f| f.field_type);
            to_sql(field_type, row.get(*k).unwrap_or(&JsonValue::Null))
        })
        .collect()
}
