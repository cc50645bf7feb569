//! In-memory `DatabaseClient` for tests.

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

use super::{DatabaseClient, QueryResult, Schema};
use crate::error::{AppError, Result};

/// Serves a fixed schema and canned results, and records every statement
/// it receives, including ones it fails.
#[derive(Debug, Default)]
pub struct MockDatabaseClient {
    schema: Schema,
    /// First pattern found in the lowercased SQL wins.
    results: Vec<(String, QueryResult)>,
    failure: Option<String>,
    executed: Mutex<Vec<String>>,
}

impl MockDatabaseClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schema(schema: Schema) -> Self {
        Self {
            schema,
            ..Self::default()
        }
    }

    /// Returns `result` for statements containing `pattern`, ignoring case.
    pub fn with_result(mut self, pattern: &str, result: QueryResult) -> Self {
        self.results.push((pattern.to_lowercase(), result));
        self
    }

    /// Makes every execution fail with a query error carrying `message`.
    pub fn failing(self, message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..self
        }
    }

    /// Statements received so far, in order.
    pub fn executed(&self) -> Vec<String> {
        self.executed
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl DatabaseClient for MockDatabaseClient {
    async fn introspect_schema(&self) -> Result<Schema> {
        Ok(self.schema.clone())
    }

    async fn execute_query(&self, sql: &str) -> Result<QueryResult> {
        if let Ok(mut log) = self.executed.lock() {
            log.push(sql.to_string());
        }

        if let Some(message) = &self.failure {
            return Err(AppError::query(message.clone()));
        }

        let sql = sql.to_lowercase();
        let result = self
            .results
            .iter()
            .find_map(|(pattern, result)| sql.contains(pattern.as_str()).then(|| result.clone()))
            .unwrap_or_default();

        Ok(result.with_execution_time(Duration::from_millis(1)))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
