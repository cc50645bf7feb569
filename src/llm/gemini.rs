//! Google Gemini LLM client implementation.
//!
//! Implements the LlmClient trait for the Generative Language REST API
//! (`models/{model}:generateContent`). Models are tried in order; a model
//! that is missing, blocked or returns no text falls through to the next.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{AppError, Result};
use crate::llm::http::{send_with_retry, HttpFailure};
use crate::llm::types::{GenerationOptions, Message, Role};
use crate::llm::LlmClient;

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Generative Language API base URL.
const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Page size used when listing models.
const MODELS_PAGE_SIZE: u32 = 1000;

/// Gemini client configuration.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// API key for authentication.
    pub api_key: String,
    /// Primary model (e.g., "gemini-flash-latest").
    pub model: String,
    /// Models tried after the primary one fails.
    pub fallback_models: Vec<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// API base URL.
    pub base_url: String,
}

impl GeminiConfig {
    /// Creates a new config with the given API key and model.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            fallback_models: Vec::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            base_url: GEMINI_API_BASE.to_string(),
        }
    }

    /// Sets the fallback models.
    pub fn with_fallback_models(mut self, models: Vec<String>) -> Self {
        self.fallback_models = models;
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Primary model followed by fallbacks, without duplicates.
    pub fn model_chain(&self) -> Vec<&str> {
        let mut chain: Vec<&str> = Vec::with_capacity(1 + self.fallback_models.len());
        for model in std::iter::once(&self.model).chain(&self.fallback_models) {
            if !model.is_empty() && !chain.contains(&model.as_str()) {
                chain.push(model.as_str());
            }
        }
        chain
    }
}

/// Gemini LLM client.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    config: GeminiConfig,
    client: Client,
}

/// Why a single model attempt failed.
#[derive(Debug)]
enum AttemptError {
    /// Try the next model in the chain.
    NextModel(AppError),
    /// Give up on the whole chain.
    Fatal(AppError),
}

impl GeminiClient {
    /// Creates a new Gemini client with the given configuration.
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::llm(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Builds the request body. System messages become the system instruction.
    fn build_request(messages: &[Message], options: GenerationOptions) -> GeminiRequest {
        let system_text = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let contents = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| GeminiContent {
                role: Some(
                    match m.role {
                        Role::Assistant => "model",
                        _ => "user",
                    }
                    .to_string(),
                ),
                parts: vec![GeminiPart {
                    text: Some(m.content.clone()),
                }],
            })
            .collect();

        GeminiRequest {
            system_instruction: (!system_text.is_empty()).then(|| GeminiContent {
                role: None,
                parts: vec![GeminiPart {
                    text: Some(system_text),
                }],
            }),
            contents,
            generation_config: GeminiGenerationConfig {
                temperature: options.temperature,
                max_output_tokens: options.max_output_tokens,
                top_p: options.top_p,
                top_k: options.top_k,
            },
        }
    }

    /// Extracts the text of the first candidate.
    ///
    /// Safety blocks and empty output are errors so the caller can move on
    /// to the next model.
    fn extract_text(response: GeminiResponse) -> Result<String> {
        if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(AppError::llm(format!("Prompt blocked by Gemini: {reason}")));
        }

        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| AppError::llm("Empty response from Gemini (no candidates)"))?;

        let text = candidate
            .content
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .filter(|t| !t.is_empty())
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default();
        let text = text.trim();

        if !text.is_empty() {
            return Ok(text.to_string());
        }

        match candidate.finish_reason.as_deref() {
            Some("SAFETY") | Some("PROHIBITED_CONTENT") | Some("BLOCKLIST") => {
                Err(AppError::llm("Response blocked by Gemini safety filters"))
            }
            Some(reason) => Err(AppError::llm(format!(
                "Empty response from Gemini (finish reason {reason})"
            ))),
            None => Err(AppError::llm("Empty response from Gemini")),
        }
    }

    /// Invalid or missing keys come back as 401/403, or as a 400 naming the key.
    fn is_auth_failure(status: StatusCode, body: &str) -> bool {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => true,
            StatusCode::BAD_REQUEST => error_message(body)
                .is_some_and(|m| m.to_lowercase().contains("api key")),
            _ => false,
        }
    }

    /// Parses an API error response and returns (error, is_retryable).
    fn parse_error(status: StatusCode, body: &str) -> (AppError, bool) {
        if Self::is_auth_failure(status, body) {
            return (
                AppError::llm("Authentication failed. Check your GEMINI_API_KEY."),
                false,
            );
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            return (
                AppError::llm("Rate limited. Please wait and try again."),
                true,
            );
        }

        let error = match error_message(body) {
            Some(message) => AppError::llm(format!("Gemini API error: {}", message)),
            None => AppError::llm(format!("Gemini API error ({}): {}", status, body)),
        };
        (error, status.is_server_error())
    }

    /// A missing model or any other failure moves on; bad credentials stop the chain.
    fn classify_failure(model: &str, failure: HttpFailure) -> AttemptError {
        let fatal = match &failure {
            HttpFailure::Status { status, body, .. } => {
                if *status == StatusCode::NOT_FOUND {
                    return AttemptError::NextModel(AppError::llm(format!(
                        "Model {model} not found"
                    )));
                }
                Self::is_auth_failure(*status, body)
            }
            HttpFailure::Transport(_) => false,
        };

        if fatal {
            AttemptError::Fatal(failure.into_error())
        } else {
            AttemptError::NextModel(failure.into_error())
        }
    }

    /// Runs one model, retrying transient errors.
    async fn complete_with_model(
        &self,
        model: &str,
        request: &GeminiRequest,
    ) -> std::result::Result<String, AttemptError> {
        let url = format!("{}/models/{}:generateContent", self.config.base_url, model);

        let body = send_with_retry(
            "Gemini",
            || {
                self.client
                    .post(&url)
                    .header("x-goog-api-key", &self.config.api_key)
                    .json(request)
            },
            Self::parse_error,
        )
        .await
        .map_err(|failure| Self::classify_failure(model, failure))?;

        let parsed: GeminiResponse = serde_json::from_str(&body).map_err(|e| {
            AttemptError::NextModel(AppError::llm(format!("Failed to parse response: {}", e)))
        })?;
        Self::extract_text(parsed).map_err(AttemptError::NextModel)
    }
}

/// The `error.message` field of an API error body, if present.
fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<GeminiErrorResponse>(body)
        .map(|r| r.error.message)
        .ok()
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn complete(&self, messages: &[Message], options: GenerationOptions) -> Result<String> {
        let request = Self::build_request(messages, options);
        let mut last_error = None;

        for model in self.config.model_chain() {
            match self.complete_with_model(model, &request).await {
                Ok(text) => {
                    debug!(model, "Gemini completion succeeded");
                    return Ok(text);
                }
                Err(AttemptError::Fatal(e)) => return Err(e),
                Err(AttemptError::NextModel(e)) => {
                    warn!(model, error = %e, "Gemini model failed, trying next");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| AppError::config("No Gemini model configured")))
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/models", self.config.base_url);
        let mut models = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let body = send_with_retry(
                "Gemini",
                || {
                    let request = self
                        .client
                        .get(&url)
                        .header("x-goog-api-key", &self.config.api_key)
                        .query(&[("pageSize", MODELS_PAGE_SIZE.to_string())]);
                    match &page_token {
                        Some(token) => request.query(&[("pageToken", token)]),
                        None => request,
                    }
                },
                Self::parse_error,
            )
            .await
            .map_err(HttpFailure::into_error)?;

            let page: GeminiModelList = serde_json::from_str(&body)
                .map_err(|e| AppError::llm(format!("Failed to parse model list: {}", e)))?;
            models.extend(generate_content_models(page.models));

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(models)
    }
}

/// Names of models supporting `generateContent`, without the `models/` prefix.
fn generate_content_models(models: Vec<GeminiModel>) -> Vec<String> {
    models
        .into_iter()
        .filter(|m| {
            m.supported_generation_methods
                .iter()
                .any(|method| method == "generateContent")
        })
        .map(|m| m.name.strip_prefix("models/").unwrap_or(&m.name).to_string())
        .collect()
}

// Gemini API types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    contents: Vec<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    prompt_feedback: Option<GeminiPromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiModelList {
    #[serde(default)]
    models: Vec<GeminiModel>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiModel {
    name: String,
    #[serde(default)]
    supported_generation_methods: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiError,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
}
