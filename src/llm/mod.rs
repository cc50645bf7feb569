//! Language model access: the client trait, the Gemini and OpenAI REST
//! clients, an offline mock, and the prompts sent to them.

mod factory;
pub mod gemini;
mod http;
pub mod mock;
pub mod openai;
pub mod prompt;
pub mod types;

pub use factory::{create_client, resolve_api_key};
pub use gemini::{GeminiClient, GeminiConfig};
pub use mock::MockLlmClient;
pub use openai::{OpenAiClient, OpenAiConfig};
pub use prompt::{build_sql_messages, build_summary_messages};
pub use types::{GenerationOptions, Message, Role};

use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;

use crate::error::{AppError, Result};

/// A chat model that turns prompt messages into text.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Full response text for `messages`, sampled with `options`.
    async fn complete(&self, messages: &[Message], options: GenerationOptions) -> Result<String>;

    /// Model names this provider can generate with.
    async fn list_models(&self) -> Result<Vec<String>>;
}

/// Provider selected by `llm.provider` / `LLM_PROVIDER`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LlmProvider {
    #[default]
    Gemini,
    OpenAi,
    /// Offline canned replies.
    Mock,
}

impl LlmProvider {
    pub const ALL: [LlmProvider; 3] = [Self::Gemini, Self::OpenAi, Self::Mock];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::OpenAi => "openai",
            Self::Mock => "mock",
        }
    }
}

impl FromStr for LlmProvider {
    type Err = AppError;

    /// Case-insensitive; `google` is an alias for Gemini.
    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim().to_lowercase();
        if name == "google" {
            return Ok(Self::Gemini);
        }
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == name)
            .ok_or_else(|| {
                let known: Vec<_> = Self::ALL.iter().map(|p| p.as_str()).collect();
                AppError::config(format!(
                    "Unknown LLM provider: {} (expected one of {})",
                    s,
                    known.join(", ")
                ))
            })
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
