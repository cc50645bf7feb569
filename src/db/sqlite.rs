//! SQLite database client.
//!
//! Implements [`DatabaseClient`] for SQLite files and in-memory databases
//! using sqlx. Introspection goes through `sqlite_master` and the `PRAGMA`
//! table functions.

use crate::db::{
    Column, ColumnInfo, DatabaseClient, ForeignKey, Index, QueryResult, Row, Schema, Table, Value,
};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column as SqlxColumn, Executor, Row as SqlxRow, TypeInfo, ValueRef};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Query timeout in seconds.
const QUERY_TIMEOUT_SECS: u64 = 30;

/// Row cap applied after execution when none is configured.
const DEFAULT_MAX_ROWS: usize = 1000;

/// How the database file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Existing database, no writes possible at the driver level.
    ReadOnly,
    /// Create the file if missing and allow writes. Used by `init-db`.
    ReadWriteCreate,
}

/// SQLite database client.
#[derive(Debug)]
pub struct SqliteClient {
    pool: SqlitePool,
    max_rows: usize,
    query_timeout: Duration,
}

impl SqliteClient {
    /// Opens the database at `location`.
    ///
    /// `location` is a file path, a `sqlite:` URL, or `:memory:`.
    pub async fn connect(location: &str, mode: OpenMode) -> Result<Self> {
        let in_memory = is_in_memory(location);

        if !in_memory
            && mode == OpenMode::ReadOnly
            && !location.starts_with("sqlite:")
            && !Path::new(location).exists()
        {
            return Err(AppError::connection(format!(
                "Database file not found: {location}. Run `hotel-nlsql init-db` first."
            )));
        }

        let options = SqliteConnectOptions::from_str(&normalize_location(location))
            .map_err(|e| AppError::connection(format!("Invalid SQLite location: {e}")))?
            .read_only(mode == OpenMode::ReadOnly && !in_memory)
            .create_if_missing(mode == OpenMode::ReadWriteCreate)
            .foreign_keys(true);

        // Every connection to :memory: is a separate database, so keep exactly one alive.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(4)
        };

        let pool = pool_options
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(|e| map_connection_error(e, location))?;

        debug!(location, ?mode, "Opened SQLite database");

        Ok(Self {
            pool,
            max_rows: DEFAULT_MAX_ROWS,
            query_timeout: Duration::from_secs(QUERY_TIMEOUT_SECS),
        })
    }

    /// Creates a client from an existing connection pool.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            max_rows: DEFAULT_MAX_ROWS,
            query_timeout: Duration::from_secs(QUERY_TIMEOUT_SECS),
        }
    }

    /// Sets the maximum number of rows kept from a result set.
    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows.max(1);
        self
    }

    /// Sets the query timeout.
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Runs a multi-statement SQL script, e.g. a schema or seed file.
    ///
    /// Bypasses the safety pipeline; only for trusted local scripts.
    pub async fn run_script(&self, script: &str) -> Result<()> {
        sqlx::raw_sql(script)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::query(format_query_error(e)))?;
        Ok(())
    }

    async fn fetch_tables(&self) -> Result<Vec<Table>> {
        let table_names: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT name
            FROM sqlite_master
            WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::query(format!("Failed to fetch tables: {e}")))?;

        let mut tables = Vec::with_capacity(table_names.len());
        for name in table_names {
            let (columns, primary_key) = self.fetch_columns(&name).await?;
            let indexes = self.fetch_indexes(&name).await?;
            tables.push(Table {
                name,
                columns,
                primary_key,
                indexes,
            });
        }

        Ok(tables)
    }

    /// Returns the table's columns and its primary key columns in key order.
    async fn fetch_columns(&self, table_name: &str) -> Result<(Vec<Column>, Vec<String>)> {
        let query = format!("PRAGMA table_info('{}')", escape_literal(table_name));
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::query(format!("Failed to fetch columns for {table_name}: {e}"))
            })?;

        let mut columns = Vec::with_capacity(rows.len());
        let mut key_parts: Vec<(i64, String)> = Vec::new();

        for row in &rows {
            let name: String = row.try_get("name").unwrap_or_default();
            let data_type: String = row.try_get("type").unwrap_or_default();
            let notnull: i64 = row.try_get("notnull").unwrap_or(0);
            let default: Option<String> = row.try_get("dflt_value").ok().flatten();
            let pk: i64 = row.try_get("pk").unwrap_or(0);

            if pk > 0 {
                key_parts.push((pk, name.clone()));
            }

            columns.push(Column {
                name,
                data_type,
                // Primary key columns behave as NOT NULL.
                is_nullable: notnull == 0 && pk == 0,
                default,
            });
        }

        key_parts.sort();
        let primary_key = key_parts.into_iter().map(|(_, name)| name).collect();

        Ok((columns, primary_key))
    }

    async fn fetch_indexes(&self, table_name: &str) -> Result<Vec<Index>> {
        let query = format!("PRAGMA index_list('{}')", escape_literal(table_name));
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::query(format!("Failed to fetch indexes for {table_name}: {e}"))
            })?;

        let mut indexes = Vec::new();
        for row in &rows {
            let origin: String = row.try_get("origin").unwrap_or_default();
            if origin == "pk" {
                continue;
            }
            let name: String = row.try_get("name").unwrap_or_default();
            let unique: i64 = row.try_get("unique").unwrap_or(0);

            let info_query = format!("PRAGMA index_info('{}')", escape_literal(&name));
            let columns: Vec<String> = sqlx::query(&info_query)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| AppError::query(format!("Failed to fetch index {name}: {e}")))?
                .iter()
                .map(|r| r.try_get::<String, _>("name").unwrap_or_default())
                .collect();

            indexes.push(Index {
                name,
                columns,
                is_unique: unique != 0,
            });
        }

        Ok(indexes)
    }

    async fn fetch_foreign_keys(&self, tables: &[Table]) -> Result<Vec<ForeignKey>> {
        let mut foreign_keys = Vec::new();

        for table in tables {
            let query = format!("PRAGMA foreign_key_list('{}')", escape_literal(&table.name));
            let rows = sqlx::query(&query)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    AppError::query(format!(
                        "Failed to fetch foreign keys for {}: {e}",
                        table.name
                    ))
                })?;

            // Composite keys share an id; seq orders their columns.
            let mut grouped: BTreeMap<i64, Vec<(i64, String, String, String)>> = BTreeMap::new();
            for row in &rows {
                let id: i64 = row.try_get("id").unwrap_or(0);
                let seq: i64 = row.try_get("seq").unwrap_or(0);
                let to_table: String = row.try_get("table").unwrap_or_default();
                let from: String = row.try_get("from").unwrap_or_default();
                let to: Option<String> = row.try_get("to").ok().flatten();
                grouped
                    .entry(id)
                    .or_default()
                    .push((seq, to_table, from, to.unwrap_or_default()));
            }

            for (_, mut parts) in grouped {
                parts.sort();
                let to_table = parts
                    .first()
                    .map(|(_, t, _, _)| t.clone())
                    .unwrap_or_default();
                foreign_keys.push(ForeignKey {
                    from_table: table.name.clone(),
                    from_columns: parts.iter().map(|(_, _, f, _)| f.clone()).collect(),
                    to_table,
                    to_columns: parts.iter().map(|(_, _, _, t)| t.clone()).collect(),
                });
            }
        }

        Ok(foreign_keys)
    }

    /// Column names for a statement that produced no rows.
    async fn describe_columns(&self, sql: &str) -> Vec<ColumnInfo> {
        match (&self.pool).describe(sql).await {
            Ok(describe) => describe
                .columns()
                .iter()
                .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
                .collect(),
            Err(e) => {
                debug!("Could not describe empty result: {e}");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl DatabaseClient for SqliteClient {
    async fn introspect_schema(&self) -> Result<Schema> {
        let tables = self.fetch_tables().await?;
        let foreign_keys = self.fetch_foreign_keys(&tables).await?;

        Ok(Schema {
            tables,
            foreign_keys,
        })
    }

    async fn execute_query(&self, sql: &str) -> Result<QueryResult> {
        let start = Instant::now();

        let result = tokio::time::timeout(self.query_timeout, sqlx::query(sql).fetch_all(&self.pool))
            .await
            .map_err(|_| {
                AppError::query(format!(
                    "Query timed out after {} seconds",
                    self.query_timeout.as_secs()
                ))
            })?
            .map_err(|e| AppError::query(format_query_error(e)))?;

        let execution_time = start.elapsed();

        let columns: Vec<ColumnInfo> = match result.first() {
            Some(first_row) => first_row
                .columns()
                .iter()
                .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
                .collect(),
            None => self.describe_columns(sql).await,
        };

        let total_rows = result.len();
        let was_truncated = total_rows > self.max_rows;
        if was_truncated {
            warn!(
                "Query returned {} rows, truncating to {} rows",
                total_rows, self.max_rows
            );
        }

        let rows: Vec<Row> = result.iter().take(self.max_rows).map(convert_row).collect();
        let row_count = rows.len();

        debug!(row_count, ?execution_time, "Query executed");

        Ok(QueryResult {
            columns,
            rows,
            execution_time,
            row_count,
            total_rows: Some(total_rows),
            was_truncated,
        })
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

fn is_in_memory(location: &str) -> bool {
    location.contains(":memory:") || location.contains("mode=memory")
}

/// Converts a path or shorthand into a `sqlite:` URL.
fn normalize_location(location: &str) -> String {
    if location == ":memory:" {
        return "sqlite::memory:".to_string();
    }
    if location.starts_with("sqlite:") {
        return location.to_string();
    }
    format!("sqlite://{location}")
}

fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// Converts a sqlx SqliteRow to our Row type.
fn convert_row(row: &SqliteRow) -> Row {
    (0..row.columns().len())
        .map(|i| convert_value(row, i))
        .collect()
}

/// Decodes one cell by its runtime storage class.
fn convert_value(row: &SqliteRow, index: usize) -> Value {
    let storage_class = match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(raw) => raw.type_info().name().to_uppercase(),
        Err(_) => return Value::Null,
    };

    match storage_class.as_str() {
        "INTEGER" | "BOOLEAN" => row
            .try_get::<Option<i64>, _>(index)
            .ok()
            .flatten()
            .map(Value::Integer)
            .unwrap_or_else(|| decode_any(row, index)),
        "REAL" | "NUMERIC" => row
            .try_get::<Option<f64>, _>(index)
            .ok()
            .flatten()
            .map(Value::Real)
            .unwrap_or_else(|| decode_any(row, index)),
        "BLOB" => row
            .try_get::<Option<Vec<u8>>, _>(index)
            .ok()
            .flatten()
            .map(Value::Blob)
            .unwrap_or(Value::Null),
        _ => decode_any(row, index),
    }
}

/// Tries each supported type in turn.
fn decode_any(row: &SqliteRow, index: usize) -> Value {
    if let Ok(Some(v)) = row.try_get::<Option<String>, _>(index) {
        return Value::Text(v);
    }
    if let Ok(Some(v)) = row.try_get::<Option<i64>, _>(index) {
        return Value::Integer(v);
    }
    if let Ok(Some(v)) = row.try_get::<Option<f64>, _>(index) {
        return Value::Real(v);
    }
    if let Ok(Some(v)) = row.try_get::<Option<Vec<u8>>, _>(index) {
        return Value::Blob(v);
    }
    Value::Null
}

fn map_connection_error(error: sqlx::Error, location: &str) -> AppError {
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("unable to open") {
        AppError::connection(format!("Cannot open SQLite database at {location}"))
    } else if error_str.contains("not a database") {
        AppError::connection(format!("{location} is not a SQLite database"))
    } else if error_str.contains("timed out") {
        AppError::connection(format!("Timed out opening {location}"))
    } else {
        AppError::connection(error.to_string())
    }
}

/// Formats a query error, keeping only the engine message when available.
fn format_query_error(error: sqlx::Error) -> String {
    match error.as_database_error() {
        Some(db_error) => db_error.message().to_string(),
        None => error.to_string(),
    }
}
