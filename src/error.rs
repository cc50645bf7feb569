//! Error types for hotel-nlsql.
//!
//! A statement refused by the safety pipeline is `Rejected`, never `Query`:
//! it did not reach the database.

use thiserror::Error;

use crate::safety::Rejection;

#[derive(Error, Debug)]
pub enum AppError {
    /// The database file could not be opened.
    #[error("Connection error: {0}")]
    Connection(String),

    /// SQLite refused or failed to run a statement.
    #[error("Query error: {0}")]
    Query(String),

    #[error("Rejected: {0}")]
    Rejected(#[from] Rejection),

    /// Provider failures: auth, rate limits, timeouts, empty or blocked output.
    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Empty question, unreadable script or stdin.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    pub fn llm(msg: impl Into<String>) -> Self {
        Self::Llm(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Short label logged in front of the message.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "Connection Error",
            Self::Query(_) => "Query Error",
            Self::Rejected(_) => "Unsafe SQL",
            Self::Llm(_) => "LLM Error",
            Self::Config(_) => "Configuration Error",
            Self::InvalidInput(_) => "Invalid Input",
            Self::Serialization(_) => "Serialization Error",
        }
    }

    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
