//! End-to-end ask flow: mock LLM, real SQLite.

use std::sync::Arc;

use hotel_nlsql::agent::{Agent, AskOptions};
use hotel_nlsql::answer::AnswerSource;
use hotel_nlsql::config::Config;
use hotel_nlsql::db::DatabaseClient;
use hotel_nlsql::error::AppError;
use hotel_nlsql::llm::MockLlmClient;
use hotel_nlsql::safety::VerdictReason;
use pretty_assertions::assert_eq;

use super::seeded_client;

async fn agent(llm: MockLlmClient) -> Agent {
    let db: Arc<dyn DatabaseClient> = Arc::new(seeded_client().await);
    Agent::from_config(&Config::default(), db, Arc::new(llm))
}

#[tokio::test]
async fn test_confirmed_bookings_count() {
    let agent = agent(MockLlmClient::new()).await;

    let outcome = agent
        .ask("Cuántas reservas se confirmaron?", AskOptions::default())
        .await
        .unwrap();

    assert!(outcome.sql.ends_with(" LIMIT 200"));
    assert_eq!(outcome.result.column_names(), vec!["total_reservas_confirmadas"]);
    assert_eq!(outcome.result.rows[0][0].to_display_string(), "4");

    let answer = outcome.answer.unwrap();
    assert_eq!(answer.source, AnswerSource::Llm);
    assert_eq!(answer.text, "Resumen simulado: 1 filas devueltas.");
}

#[tokio::test]
async fn test_double_rooms_with_minibar_and_fallback_summary() {
    let agent = agent(MockLlmClient::new().failing_summaries()).await;

    let outcome = agent
        .ask(
            "Listado de habitaciones dobles con frigobar",
            AskOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(
        outcome.sql,
        "SELECT h.numero, h.piso, h.precio\nFROM HABITACION h\nWHERE h.tipo = 'doble' AND h.frigobar = 1 LIMIT 200"
    );
    assert_eq!(outcome.result.row_count, 3);

    let answer = outcome.answer.unwrap();
    assert_eq!(answer.source, AnswerSource::Fallback);
    assert_eq!(
        answer.text,
        "Se encontraron 3 resultados con precio: $62,000 - $70,000, numero: 102-201."
    );
}

#[tokio::test]
async fn test_destructive_question_leaves_data_intact() {
    let agent = agent(MockLlmClient::new()).await;

    let err = agent
        .ask("Borra todas las reservas", AskOptions::default())
        .await
        .unwrap_err();
    match err {
        AppError::Rejected(rejection) => {
            assert_eq!(rejection.reason, VerdictReason::ReadOnlyRequired)
        }
        other => panic!("expected rejection, got {other:?}"),
    }

    let outcome = agent
        .ask("Cuántas reservas se confirmaron?", AskOptions { summarize: false })
        .await
        .unwrap();
    assert_eq!(outcome.result.rows[0][0].to_display_string(), "4");
}

#[tokio::test]
async fn test_custom_generated_sql_error_is_query_error() {
    let agent = agent(
        MockLlmClient::new().with_response("precios", "SELECT precioo FROM HABITACION"),
    )
    .await;

    let err = agent
        .ask("precios de las suites", AskOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Query(_)));
}

#[tokio::test]
async fn test_outcome_serializes() {
    let agent = agent(MockLlmClient::new().with_summary("Seis huéspedes.")).await;

    let outcome = agent
        .ask("Lista de personas", AskOptions::default())
        .await
        .unwrap();
    let json = serde_json::to_value(&outcome).unwrap();

    assert_eq!(json["question"], "Lista de personas");
    assert_eq!(json["sql"], "SELECT nombre, apellido, email FROM PERSONA LIMIT 200");
    assert_eq!(json["result"]["row_count"], 6);
    assert_eq!(json["result"]["rows"][0][0], "Ana");
    assert_eq!(json["answer"]["source"], "llm");
}
