//! Database creation and seeding.
//!
//! The hotel schema and sample data ship inside the binary; callers may
//! point at their own script files instead.

use std::path::Path;

use tracing::info;

use crate::db::sqlite::{OpenMode, SqliteClient};
use crate::db::DatabaseClient;
use crate::error::{AppError, Result};

/// Built-in hotel schema.
pub const SCHEMA_SQL: &str = include_str!("../../db/schema.sql");

/// Built-in sample data.
pub const SEED_SQL: &str = include_str!("../../db/seed.sql");

/// Summary of an initialisation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitReport {
    /// Table names present after initialisation.
    pub tables: Vec<String>,
}

/// Applies the schema script and then the seed script.
pub async fn apply_scripts(client: &SqliteClient, schema_sql: &str, seed_sql: &str) -> Result<()> {
    client.run_script(schema_sql).await?;
    client.run_script(seed_sql).await?;
    Ok(())
}

/// Creates (or updates) the database at `location`.
///
/// `schema` and `seed` override the built-in scripts when given.
pub async fn init_database(
    location: &str,
    schema: Option<&Path>,
    seed: Option<&Path>,
) -> Result<InitReport> {
    let schema_sql = read_script(schema, SCHEMA_SQL)?;
    let seed_sql = read_script(seed, SEED_SQL)?;

    if let Some(parent) = Path::new(location).parent() {
        if !parent.as_os_str().is_empty() && !location.contains(":memory:") {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::connection(format!(
                    "Cannot create directory {}: {e}",
                    parent.display()
                ))
            })?;
        }
    }

    let client = SqliteClient::connect(location, OpenMode::ReadWriteCreate).await?;
    let outcome = async {
        apply_scripts(&client, &schema_sql, &seed_sql).await?;
        client.introspect_schema().await
    }
    .await;
    client.close().await?;

    let tables = outcome?.tables.into_iter().map(|t| t.name).collect();
    info!(location, "Database initialised");
    Ok(InitReport { tables })
}

fn read_script(path: Option<&Path>, builtin: &str) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path).map_err(|e| {
            AppError::invalid_input(format!("Cannot read {}: {e}", path.display()))
        }),
        None => Ok(builtin.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Value;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_init_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("hotel.db");
        let location = path.to_str().unwrap();

        let report = init_database(location, None, None).await.unwrap();
        assert_eq!(
            report.tables,
            vec!["HABITACION", "PERSONA", "RESERVA", "RESERVA_HABITACION"]
        );

        // Idempotent: a second run keeps the same data.
        init_database(location, None, None).await.unwrap();

        let client = SqliteClient::connect(location, OpenMode::ReadOnly)
            .await
            .unwrap();
        let result = client
            .execute_query("SELECT COUNT(*) AS total FROM HABITACION")
            .await
            .unwrap();
        assert_eq!(result.rows, vec![vec![Value::Integer(8)]]);
    }

    #[tokio::test]
    async fn test_read_only_client_cannot_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hotel.db");
        let location = path.to_str().unwrap();
        init_database(location, None, None).await.unwrap();

        let client = SqliteClient::connect(location, OpenMode::ReadOnly)
            .await
            .unwrap();
        let err = client
            .execute_query("DELETE FROM RESERVA")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Query(_)));
    }

    #[tokio::test]
    async fn test_custom_scripts() {
        let dir = tempfile::tempdir().unwrap();
        let schema = dir.path().join("schema.sql");
        let seed = dir.path().join("seed.sql");
        std::fs::write(&schema, "CREATE TABLE t (x INTEGER);").unwrap();
        std::fs::write(&seed, "INSERT INTO t VALUES (1);").unwrap();

        let path = dir.path().join("custom.db");
        let report = init_database(path.to_str().unwrap(), Some(&schema), Some(&seed))
            .await
            .unwrap();
        assert_eq!(report.tables, vec!["t"]);
    }

    #[tokio::test]
    async fn test_missing_script_is_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.db");
        let err = init_database(
            path.to_str().unwrap(),
            Some(&dir.path().join("nope.sql")),
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }
}
