//! The ask flow: question → prompt → LLM → safety pipeline → execute → summary.
//!
//! The agent owns its database and LLM handles; `main` builds them once and
//! passes them in. Generated SQL that the safety pipeline rejects is never
//! sent to the database.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::OnceCell;

use crate::answer::{self, Answer};
use crate::config::{AnswerConfig, Config};
use crate::db::{DatabaseClient, QueryResult, Schema};
use crate::error::{AppError, Result};
use crate::llm::{build_sql_messages, GenerationOptions, LlmClient};
use crate::safety::{Rejection, SafetyPipeline};

/// Everything produced while answering one question.
#[derive(Debug, Clone, Serialize)]
pub struct AskOutcome {
    pub question: String,
    /// Model output before normalization.
    pub raw_response: String,
    /// The bounded statement that was executed.
    pub sql: String,
    pub result: QueryResult,
    /// Absent when summaries were not requested.
    pub answer: Option<Answer>,
}

/// Per-request switches.
#[derive(Debug, Clone, Copy)]
pub struct AskOptions {
    pub summarize: bool,
}

impl Default for AskOptions {
    fn default() -> Self {
        Self { summarize: true }
    }
}

/// Answers natural-language questions against the hotel database.
pub struct Agent {
    db: Arc<dyn DatabaseClient>,
    llm: Arc<dyn LlmClient>,
    pipeline: SafetyPipeline,
    answer: AnswerConfig,
    schema: OnceCell<Schema>,
}

impl Agent {
    /// Creates an agent from explicit parts.
    pub fn new(
        db: Arc<dyn DatabaseClient>,
        llm: Arc<dyn LlmClient>,
        pipeline: SafetyPipeline,
        answer: AnswerConfig,
    ) -> Self {
        Self {
            db,
            llm,
            pipeline,
            answer,
            schema: OnceCell::new(),
        }
    }

    /// Creates an agent using the safety and answer settings of `config`.
    pub fn from_config(
        config: &Config,
        db: Arc<dyn DatabaseClient>,
        llm: Arc<dyn LlmClient>,
    ) -> Self {
        Self::new(
            db,
            llm,
            SafetyPipeline::new(config.safety_policy()),
            config.answer.clone(),
        )
    }

    /// The safety pipeline this agent applies to generated SQL.
    pub fn pipeline(&self) -> &SafetyPipeline {
        &self.pipeline
    }

    /// Returns the database schema, introspecting it on first use.
    pub async fn schema(&self) -> Result<&Schema> {
        self.schema
            .get_or_try_init(|| async {
                let schema = self.db.introspect_schema().await?;
                tracing::debug!(tables = schema.tables.len(), "Schema introspected");
                Ok(schema)
            })
            .await
    }

    /// Runs only the safety pipeline over `raw`.
    pub fn sanitize(&self, raw: &str) -> std::result::Result<String, Rejection> {
        self.pipeline.make_safe_statement(raw)
    }

    /// Answers `question`.
    ///
    /// Fails with `InvalidInput` for a blank question, `Llm` when no SQL
    /// could be generated, `Rejected` when the generated SQL is unsafe and
    /// `Query` when the database refuses it. Summary failures never fail the
    /// request.
    pub async fn ask(&self, question: &str, options: AskOptions) -> Result<AskOutcome> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AppError::invalid_input("Question must not be empty"));
        }

        let start = Instant::now();
        tracing::debug!(question_len = question.len(), "Starting ask");

        let schema = self.schema().await?;
        let max_rows = self.pipeline.policy().default_bound;
        let messages = build_sql_messages(schema, question, max_rows);

        let llm_start = Instant::now();
        let raw_response = self
            .llm
            .complete(&messages, GenerationOptions::sql())
            .await?;
        tracing::debug!(
            llm_duration_ms = llm_start.elapsed().as_millis(),
            response_len = raw_response.len(),
            "Received SQL from LLM"
        );

        let sql = self.pipeline.make_safe_statement(&raw_response)?;
        tracing::info!(sql = %sql, "Executing generated SQL");

        let result = self.db.execute_query(&sql).await?;
        if let Some(warning) = result.truncation_warning() {
            tracing::warn!("{}", warning);
        }

        let answer = if options.summarize {
            Some(answer::summarize(self.llm.as_ref(), question, &sql, &result, &self.answer).await)
        } else {
            None
        };

        tracing::info!(
            total_duration_ms = start.elapsed().as_millis(),
            rows = result.row_count,
            "Ask complete"
        );

        Ok(AskOutcome {
            question: question.to_string(),
            raw_response,
            sql,
            result,
            answer,
        })
    }

    /// Closes the database handle.
    pub async fn close(&self) -> Result<()> {
        self.db.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answer::AnswerSource;
    use crate::db::{
        Column, ColumnInfo, MockDatabaseClient, Table, Value,
    };
    use crate::llm::MockLlmClient;
    use crate::safety::{SafetyPolicy, VerdictReason};
    use pretty_assertions::assert_eq;

    fn hotel_schema() -> Schema {
        Schema {
            tables: vec![Table {
                name: "HABITACION".to_string(),
                columns: vec![
                    Column::new("numero", "VARCHAR(20)").nullable(false),
                    Column::new("tipo", "VARCHAR(20)"),
                ],
                primary_key: vec![],
                indexes: vec![],
            }],
            foreign_keys: vec![],
        }
    }

    fn agent_with(db: Arc<dyn DatabaseClient>, llm: MockLlmClient) -> Agent {
        Agent::new(
            db,
            Arc::new(llm),
            SafetyPipeline::new(SafetyPolicy::default().with_default_bound(100)),
            AnswerConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_ask_executes_bounded_statement() {
        let db = Arc::new(
            MockDatabaseClient::with_schema(hotel_schema()).with_result(
                "from habitacion",
                QueryResult::with_data(
                    vec![ColumnInfo::new("numero", "TEXT"), ColumnInfo::new("tipo", "TEXT")],
                    vec![vec![Value::from("101"), Value::from("simple")]],
                ),
            ),
        );
        let agent = agent_with(db.clone(), MockLlmClient::new().with_summary("Una simple."));

        let outcome = agent
            .ask("¿Qué habitaciones hay?", AskOptions::default())
            .await
            .unwrap();

        assert_eq!(outcome.raw_response, "SQL: SELECT numero, tipo, precio FROM HABITACION");
        assert_eq!(outcome.sql, "SELECT numero, tipo, precio FROM HABITACION LIMIT 100");
        assert_eq!(db.executed(), vec![outcome.sql.clone()]);
        assert_eq!(outcome.result.row_count, 1);
        assert_eq!(outcome.answer.unwrap().text, "Una simple.");
    }

    #[tokio::test]
    async fn test_fenced_response_is_normalized() {
        let db = Arc::new(MockDatabaseClient::new());
        let agent = agent_with(db.clone(), MockLlmClient::new());

        let outcome = agent
            .ask("Cuántas reservas se confirmaron?", AskOptions { summarize: false })
            .await
            .unwrap();

        assert_eq!(
            outcome.sql,
            "SELECT COUNT(*) AS total_reservas_confirmadas\nFROM RESERVA\nWHERE estado = 'confirmada' LIMIT 100"
        );
        assert!(outcome.answer.is_none());
    }

    #[tokio::test]
    async fn test_unsafe_sql_is_never_executed() {
        let db = Arc::new(MockDatabaseClient::new());
        let agent = agent_with(db.clone(), MockLlmClient::new());

        let err = agent
            .ask("Borra todas las reservas", AskOptions::default())
            .await
            .unwrap_err();

        match err {
            AppError::Rejected(rejection) => {
                assert_eq!(rejection.reason, VerdictReason::ReadOnlyRequired);
                assert_eq!(rejection.statement, "DELETE FROM RESERVA");
            }
            other => panic!("expected rejection, got {other:?}"),
        }
        assert!(db.executed().is_empty());
    }

    #[tokio::test]
    async fn test_prose_without_sql_is_rejected() {
        let db = Arc::new(MockDatabaseClient::new());
        let agent = agent_with(db.clone(), MockLlmClient::new());

        let err = agent
            .ask("¿Cuál es el sentido de la vida?", AskOptions::default())
            .await
            .unwrap_err();

        assert!(err.is_rejection());
        assert!(db.executed().is_empty());
    }

    #[tokio::test]
    async fn test_execution_failure_is_query_error() {
        let db = Arc::new(
            MockDatabaseClient::with_schema(hotel_schema()).failing("no such column: precioo"),
        );
        let agent = agent_with(db.clone(), MockLlmClient::new());

        let err = agent
            .ask("¿Qué habitaciones hay?", AskOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Query(_)));
        assert!(!err.is_rejection());
        assert_eq!(db.executed().len(), 1);
    }

    #[tokio::test]
    async fn test_blank_question() {
        let agent = agent_with(Arc::new(MockDatabaseClient::new()), MockLlmClient::new());
        let err = agent.ask("   ", AskOptions::default()).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_summary_failure_uses_fallback() {
        let db = Arc::new(MockDatabaseClient::new().with_result(
            "from persona",
            QueryResult::with_data(
                vec![ColumnInfo::new("nombre", "TEXT")],
                vec![vec![Value::from("Ana")], vec![Value::from("Luis")]],
            ),
        ));
        let agent = agent_with(db, MockLlmClient::new().failing_summaries());

        let outcome = agent
            .ask("Lista de huéspedes", AskOptions::default())
            .await
            .unwrap();

        let answer = outcome.answer.unwrap();
        assert_eq!(answer.source, AnswerSource::Fallback);
        assert_eq!(answer.text, "Se encontraron 2 resultados.");
    }

    #[tokio::test]
    async fn test_sanitize_uses_agent_policy() {
        let agent = agent_with(Arc::new(MockDatabaseClient::new()), MockLlmClient::new());
        assert_eq!(
            agent.sanitize("```sql\nSELECT 1;\n```").unwrap(),
            "SELECT 1 LIMIT 100"
        );
        assert!(agent.sanitize("DROP TABLE PERSONA").is_err());
    }

    #[tokio::test]
    async fn test_schema_is_cached() {
        let agent = agent_with(
            Arc::new(MockDatabaseClient::with_schema(hotel_schema())),
            MockLlmClient::new(),
        );
        let first = agent.schema().await.unwrap() as *const Schema;
        let second = agent.schema().await.unwrap() as *const Schema;
        assert_eq!(first, second);
    }
}
