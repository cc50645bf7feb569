//! Database access. The ask flow talks to a `DatabaseClient`, backed by
//! SQLite in production and by `MockDatabaseClient` in tests.

pub mod init;
mod mock;
mod schema;
mod sqlite;
mod types;

pub use init::{init_database, InitReport, SCHEMA_SQL, SEED_SQL};
pub use mock::MockDatabaseClient;
pub use schema::{Column, ForeignKey, Index, Schema, Table};
pub use sqlite::{OpenMode, SqliteClient};
pub use types::{ColumnInfo, QueryResult, Row, Value};

use crate::config::Config;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Opens `database.path` read-only, capped at `safety.max_rows` rows per query.
pub async fn connect(config: &Config) -> Result<Arc<dyn DatabaseClient>> {
    let location = config.database.path.to_string_lossy();
    let client = SqliteClient::connect(&location, OpenMode::ReadOnly)
        .await?
        .with_max_rows(config.safety.max_rows as usize);
    Ok(Arc::new(client))
}

#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// Tables, columns, keys and indexes, sorted by table name.
    async fn introspect_schema(&self) -> Result<Schema>;

    /// Runs one statement. Engine failures surface as `AppError::Query`.
    async fn execute_query(&self, sql: &str) -> Result<QueryResult>;

    async fn close(&self) -> Result<()>;
}
