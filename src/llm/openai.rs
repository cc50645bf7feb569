//! Client for OpenAI-compatible `/chat/completions` endpoints.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{AppError, Result};
use crate::llm::http::{send_with_retry, HttpFailure};
use crate::llm::types::{GenerationOptions, Message};
use crate::llm::LlmClient;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
    /// Without a trailing slash or endpoint path.
    pub base_url: String,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            base_url: OPENAI_API_BASE.to_string(),
        }
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Points the client at another OpenAI-compatible endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    config: OpenAiConfig,
    client: Client,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::llm(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn convert_messages(messages: &[Message]) -> Vec<OpenAiMessage> {
        messages
            .iter()
            .map(|m| OpenAiMessage {
                role: m.role.as_str().to_string(),
                content: Some(m.content.clone()),
            })
            .collect()
    }

    fn build_request(&self, messages: &[Message], options: GenerationOptions) -> OpenAiRequest {
        OpenAiRequest {
            model: self.config.model.clone(),
            messages: Self::convert_messages(messages),
            temperature: options.temperature,
            max_completion_tokens: options.max_output_tokens,
            top_p: options.top_p,
        }
    }

    /// Maps an error response to (error, is_retryable).
    fn parse_error(status: StatusCode, body: &str) -> (AppError, bool) {
        match status {
            StatusCode::UNAUTHORIZED => (
                AppError::llm("Authentication failed. Check your OPENAI_API_KEY."),
                false,
            ),
            StatusCode::TOO_MANY_REQUESTS => (
                AppError::llm("Rate limited. Please wait and try again."),
                true,
            ),
            _ => {
                let error = match serde_json::from_str::<OpenAiErrorResponse>(body) {
                    Ok(response) => {
                        AppError::llm(format!("OpenAI API error: {}", response.error.message))
                    }
                    Err(_) => AppError::llm(format!("OpenAI API error ({}): {}", status, body)),
                };
                (error, status.is_server_error())
            }
        }
    }

    /// First non-empty choice content.
    fn extract_content(response: OpenAiResponse) -> Result<String> {
        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| AppError::llm("No response from OpenAI"))
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, messages: &[Message], options: GenerationOptions) -> Result<String> {
        let request = self.build_request(messages, options);
        let url = format!("{}/chat/completions", self.config.base_url);

        let body = send_with_retry(
            "OpenAI",
            || {
                self.client
                    .post(&url)
                    .bearer_auth(&self.config.api_key)
                    .json(&request)
            },
            Self::parse_error,
        )
        .await
        .map_err(HttpFailure::into_error)?;

        let response: OpenAiResponse = serde_json::from_str(&body)
            .map_err(|e| AppError::llm(format!("Failed to parse response: {}", e)))?;
        Self::extract_content(response)
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/models", self.config.base_url);
        let body = send_with_retry(
            "OpenAI",
            || self.client.get(&url).bearer_auth(&self.config.api_key),
            Self::parse_error,
        )
        .await
        .map_err(HttpFailure::into_error)?;

        let list: OpenAiModelList = serde_json::from_str(&body)
            .map_err(|e| AppError::llm(format!("Failed to parse model list: {}", e)))?;
        let mut ids: Vec<String> = list.data.into_iter().map(|m| m.id).collect();
        ids.sort();
        Ok(ids)
    }
}

// Wire types

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    temperature: f32,
    max_completion_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiModelList {
    #[serde(default)]
    data: Vec<OpenAiModel>,
}

#[derive(Debug, Deserialize)]
struct OpenAiModel {
    id: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorResponse {
    error: OpenAiError,
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    message: String,
}
