//! Prompt messages and sampling settings shared by every provider.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    /// Few-shot answers written as if the model produced them.
    Assistant,
}

impl Role {
    /// OpenAI wire name. Gemini maps roles itself.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Sampling settings for a single completion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
}

impl GenerationOptions {
    /// Deterministic settings for SQL generation.
    pub fn sql() -> Self {
        Self {
            temperature: 0.0,
            max_output_tokens: 512,
            top_p: None,
            top_k: None,
        }
    }

    /// Looser settings for result summaries.
    pub fn summary() -> Self {
        Self {
            temperature: 0.3,
            max_output_tokens: 300,
            top_p: Some(0.9),
            top_k: Some(40),
        }
    }
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self::sql()
    }
}
