//! Safety pipeline tests through the public API.

use hotel_nlsql::db::DatabaseClient;
use hotel_nlsql::safety::{
    make_safe_statement, normalize, validate, MultiStatementPolicy, SafetyPipeline, SafetyPolicy,
    VerdictReason,
};
use pretty_assertions::assert_eq;

use super::seeded_client;

#[test]
fn test_fenced_output_becomes_bounded_statement() {
    let raw = "Aquí tienes:\n```sql\nSELECT * FROM HABITACION WHERE tipo='doble';\n```\nEspero que sirva.";
    assert_eq!(
        make_safe_statement(raw, true, 100).unwrap(),
        "SELECT * FROM HABITACION WHERE tipo='doble' LIMIT 100"
    );
}

#[test]
fn test_prefixed_output() {
    assert_eq!(
        normalize("SQLQuery: SELECT COUNT(*) FROM RESERVA"),
        "SELECT COUNT(*) FROM RESERVA"
    );
    assert_eq!(
        make_safe_statement("Respuesta: SQL: SELECT COUNT(*) FROM RESERVA", true, 100).unwrap(),
        "SELECT COUNT(*) FROM RESERVA LIMIT 100"
    );
}

#[test]
fn test_stacked_statements_rejected() {
    let rejection =
        make_safe_statement("SELECT * FROM HABITACION; DROP TABLE HABITACION;", true, 100)
            .unwrap_err();
    assert_eq!(rejection.reason, VerdictReason::MultipleStatements);
}

#[test]
fn test_keyword_led_explanation_is_not_a_second_statement() {
    assert_eq!(
        make_safe_statement(
            "SELECT numero FROM HABITACION;\nExplain: this lists room numbers.",
            true,
            100
        )
        .unwrap(),
        "SELECT numero FROM HABITACION LIMIT 100"
    );
}

#[test]
fn test_take_first_policy_drops_tail() {
    let pipeline = SafetyPipeline::new(
        SafetyPolicy::default().with_multi_statement(MultiStatementPolicy::TakeFirst),
    );
    assert_eq!(
        pipeline
            .make_safe_statement("SELECT * FROM HABITACION; DROP TABLE HABITACION;")
            .unwrap(),
        "SELECT * FROM HABITACION LIMIT 200"
    );
}

#[test]
fn test_mutations_rejected_in_any_mode() {
    let rejection = make_safe_statement("DELETE FROM RESERVA", true, 100).unwrap_err();
    assert_eq!(rejection.reason, VerdictReason::ReadOnlyRequired);

    let rejection = make_safe_statement("DELETE FROM RESERVA", false, 100).unwrap_err();
    assert_eq!(rejection.reason, VerdictReason::ForbiddenKeyword);

    assert!(!validate("SELECT * FROM PERSONA WHERE nombre = 'drop'", true).safe);
}

#[test]
fn test_existing_limit_preserved() {
    assert_eq!(
        make_safe_statement("SELECT numero FROM HABITACION LIMIT 10", true, 100).unwrap(),
        "SELECT numero FROM HABITACION LIMIT 10"
    );
}

#[tokio::test]
async fn test_semicolon_inside_literal_runs() {
    let client = seeded_client().await;
    let sql = make_safe_statement(
        "SELECT id FROM RESERVA WHERE observaciones = 'Aniversario; decorar suite';",
        true,
        100,
    )
    .unwrap();

    assert_eq!(
        sql,
        "SELECT id FROM RESERVA WHERE observaciones = 'Aniversario; decorar suite' LIMIT 100"
    );

    let result = client.execute_query(&sql).await.unwrap();
    assert_eq!(result.row_count, 1);
    assert_eq!(result.rows[0][0].to_display_string(), "6");
}

#[tokio::test]
async fn test_cte_statement_runs() {
    let client = seeded_client().await;
    let sql = make_safe_statement(
        "WITH dobles AS (SELECT numero FROM HABITACION WHERE tipo = 'doble') SELECT COUNT(*) AS n FROM dobles",
        true,
        100,
    )
    .unwrap();

    let result = client.execute_query(&sql).await.unwrap();
    assert_eq!(result.rows[0][0].to_display_string(), "4");
}

#[tokio::test]
async fn test_trailing_comment_keeps_statement_bounded() {
    let client = seeded_client().await;
    let pipeline = SafetyPipeline::new(
        SafetyPolicy::default()
            .with_default_bound(2)
            .with_comment_markers(false),
    );

    let sql = pipeline
        .make_safe_statement("SELECT id FROM RESERVA -- LIMIT 50, all bookings")
        .unwrap();
    assert_eq!(sql, "SELECT id FROM RESERVA LIMIT 2");

    let result = client.execute_query(&sql).await.unwrap();
    assert_eq!(result.row_count, 2);
    assert!(!result.was_truncated);
}

#[tokio::test]
async fn test_materialized_cte_runs() {
    let client = seeded_client().await;
    let sql = make_safe_statement(
        "SQL: WITH dobles AS MATERIALIZED (SELECT numero FROM HABITACION WHERE tipo = 'doble') SELECT COUNT(*) AS n FROM dobles;",
        true,
        100,
    )
    .unwrap();
    assert_eq!(
        sql,
        "WITH dobles AS MATERIALIZED (SELECT numero FROM HABITACION WHERE tipo = 'doble') SELECT COUNT(*) AS n FROM dobles LIMIT 100"
    );

    let result = client.execute_query(&sql).await.unwrap();
    assert_eq!(result.rows[0][0].to_display_string(), "4");
}
