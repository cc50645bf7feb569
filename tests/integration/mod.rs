//! Integration tests for hotel-nlsql.

pub mod agent_test;
pub mod pipeline_test;
pub mod sqlite_test;

use hotel_nlsql::db::init::apply_scripts;
use hotel_nlsql::db::{OpenMode, SqliteClient, SCHEMA_SQL, SEED_SQL};

/// Opens an in-memory database holding the bundled hotel schema and seed data.
pub async fn seeded_client() -> SqliteClient {
    let client = SqliteClient::connect(":memory:", OpenMode::ReadWriteCreate)
        .await
        .expect("in-memory database");
    apply_scripts(&client, SCHEMA_SQL, SEED_SQL)
        .await
        .expect("bundled scripts apply");
    client
}
