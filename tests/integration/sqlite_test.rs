//! SQLite client tests against the bundled hotel database.

use hotel_nlsql::db::{init_database, DatabaseClient, OpenMode, SqliteClient, Value};
use pretty_assertions::assert_eq;

use super::seeded_client;

#[tokio::test]
async fn test_introspects_hotel_schema() {
    let client = seeded_client().await;
    let schema = client.introspect_schema().await.unwrap();

    let names: Vec<&str> = schema.tables.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["HABITACION", "PERSONA", "RESERVA", "RESERVA_HABITACION"]
    );

    let habitacion = schema.table("habitacion").unwrap();
    assert_eq!(habitacion.primary_key, vec!["id"]);
    assert!(habitacion.columns.iter().any(|c| c.name == "frigobar"));

    let prompt = schema.format_for_llm();
    assert!(prompt.contains("### Relaciones"));
    assert!(prompt.contains("- RESERVA.titular_persona_id -> PERSONA.id"));

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_double_rooms_with_minibar() {
    let client = seeded_client().await;
    let result = client
        .execute_query(
            "SELECT h.numero FROM HABITACION h WHERE h.tipo = 'doble' AND h.frigobar = 1 ORDER BY h.numero LIMIT 50",
        )
        .await
        .unwrap();

    let numbers: Vec<String> = result.rows.iter().map(|r| r[0].to_display_string()).collect();
    assert_eq!(numbers, vec!["102", "103", "201"]);
    assert!(!result.was_truncated);
}

#[tokio::test]
async fn test_null_columns_decode() {
    let client = seeded_client().await;
    let result = client
        .execute_query("SELECT tel FROM PERSONA WHERE id = 4")
        .await
        .unwrap();
    assert_eq!(result.rows, vec![vec![Value::Null]]);
}

#[tokio::test]
async fn test_unknown_column_is_query_error() {
    let client = seeded_client().await;
    let err = client
        .execute_query("SELECT precioo FROM HABITACION")
        .await
        .unwrap_err();
    assert_eq!(err.category(), "Query Error");
    assert!(err.to_string().contains("precioo"));
}

#[tokio::test]
async fn test_init_database_then_read_only() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data").join("hotel.db");
    let location = path.to_string_lossy().to_string();

    let report = init_database(&location, None, None).await.unwrap();
    assert_eq!(report.tables.len(), 4);

    let client = SqliteClient::connect(&location, OpenMode::ReadOnly)
        .await
        .unwrap()
        .with_max_rows(2);

    let result = client
        .execute_query("SELECT numero FROM HABITACION ORDER BY numero")
        .await
        .unwrap();
    assert_eq!(result.row_count, 2);
    assert_eq!(result.total_rows, Some(8));
    assert!(result.was_truncated);

    assert!(client.execute_query("DELETE FROM RESERVA").await.is_err());
    client.close().await.unwrap();
}
