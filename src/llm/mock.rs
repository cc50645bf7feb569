//! Offline `LlmClient` that answers from the question embedded in the prompt.

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::llm::prompt::{QUESTION_MARKER, SUMMARY_QUESTION_MARKER};
use crate::llm::types::{GenerationOptions, Message, Role};
use crate::llm::LlmClient;

/// Replies with canned SQL for a few hotel questions and a fixed summary.
/// Selected with `--llm mock`; also drives the agent tests.
#[derive(Debug, Clone, Default)]
pub struct MockLlmClient {
    /// (question fragment, reply), checked before the built-in replies.
    custom_responses: Vec<(String, String)>,
    /// Fixed reply to summary prompts.
    summary: Option<String>,
    /// Fail every summary request.
    fail_summaries: bool,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replies `response` when the question contains `pattern`, ignoring case.
    pub fn with_response(
        mut self,
        pattern: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        self.custom_responses.push((pattern.into(), response.into()));
        self
    }

    /// Sets the reply given to summary prompts.
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Makes every summary request fail with an LLM error.
    pub fn failing_summaries(mut self) -> Self {
        self.fail_summaries = true;
        self
    }

    /// Generates a mock SQL response for a question.
    fn mock_sql(&self, question: &str) -> String {
        let q = question.to_lowercase();

        for (pattern, response) in &self.custom_responses {
            if q.contains(&pattern.to_lowercase()) {
                return response.clone();
            }
        }

        if q.contains("borra") || q.contains("elimina") || q.contains("delete") {
            return "DELETE FROM RESERVA;".to_string();
        }

        if q.contains("reservas") && q.contains("confirm") {
            return "```sql\nSELECT COUNT(*) AS total_reservas_confirmadas\nFROM RESERVA\nWHERE estado = 'confirmada';\n```"
                .to_string();
        }

        if q.contains("dobles") && q.contains("frigobar") {
            return "Claro, aquí está la consulta:\n```sql\nSELECT h.numero, h.piso, h.precio\nFROM HABITACION h\nWHERE h.tipo = 'doble' AND h.frigobar = 1;\n```"
                .to_string();
        }

        if q.contains("habitaciones") {
            return "SQL: SELECT numero, tipo, precio FROM HABITACION".to_string();
        }

        if q.contains("huésped") || q.contains("huesped") || q.contains("personas") {
            return "SELECT nombre, apellido, email FROM PERSONA".to_string();
        }

        "Lo siento, no puedo responder esa pregunta con el esquema disponible.".to_string()
    }

    fn mock_summary(&self, prompt: &str) -> Result<String> {
        if self.fail_summaries {
            return Err(AppError::llm("Simulated summary failure"));
        }
        if let Some(summary) = &self.summary {
            return Ok(summary.clone());
        }

        let rows = prompt
            .lines()
            .find_map(|line| line.strip_prefix("Filas devueltas: "))
            .map(str::trim)
            .unwrap_or("0");
        Ok(format!("Resumen simulado: {rows} filas devueltas."))
    }

    /// Content of the last user message; the real question follows few-shots.
    fn extract_user_input(messages: &[Message]) -> &str {
        messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default()
    }
}

/// Returns the question part of an NL→SQL prompt, or the whole input.
fn extract_question(input: &str) -> &str {
    match input.rfind(QUESTION_MARKER) {
        Some(pos) => {
            let rest = &input[pos + QUESTION_MARKER.len()..];
            rest.rsplit_once("SQL:").map_or(rest, |(q, _)| q).trim()
        }
        None => input.trim(),
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message], _options: GenerationOptions) -> Result<String> {
        let input = Self::extract_user_input(messages);
        if input.starts_with(SUMMARY_QUESTION_MARKER) {
            return self.mock_summary(input);
        }
        Ok(self.mock_sql(extract_question(input)))
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        Ok(vec!["mock-nlsql".to_string()])
    }
}
