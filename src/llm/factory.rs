//! LLM client factory.
//!
//! Centralizes provider-specific logic for creating LLM clients.

use std::sync::Arc;

use crate::config::LlmConfig;
use crate::error::{AppError, Result};
use crate::llm::{
    GeminiClient, GeminiConfig, LlmClient, LlmProvider, MockLlmClient, OpenAiClient, OpenAiConfig,
};

/// Model used for OpenAI when the configured model is a Gemini one.
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// Environment variables consulted for each provider's API key, in order.
fn key_variables(provider: LlmProvider) -> &'static [&'static str] {
    match provider {
        LlmProvider::Gemini => &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
        LlmProvider::OpenAi => &["OPENAI_API_KEY"],
        LlmProvider::Mock => &[],
    }
}

/// Resolves the API key for `provider`.
///
/// An explicit key wins; otherwise the provider's environment variables are
/// tried in order through `lookup`. Blank values are ignored.
pub fn resolve_api_key<F>(provider: LlmProvider, explicit: Option<String>, lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    explicit
        .into_iter()
        .chain(key_variables(provider).iter().filter_map(|name| lookup(name)))
        .map(|key| key.trim().to_string())
        .find(|key| !key.is_empty())
}

/// Builds the client named by `config.provider`.
///
/// An explicit `api_key` takes precedence over the environment.
pub fn create_client(config: &LlmConfig, api_key: Option<String>) -> Result<Arc<dyn LlmClient>> {
    let provider: LlmProvider = config.provider.parse()?;

    let require_key = || {
        resolve_api_key(provider, api_key.clone(), |name| std::env::var(name).ok()).ok_or_else(
            || {
                AppError::config(format!(
                    "No API key configured for {}. Set {}.",
                    provider,
                    key_variables(provider).join(" or ")
                ))
            },
        )
    };

    let client: Arc<dyn LlmClient> = match provider {
        LlmProvider::Gemini => {
            let gemini = GeminiConfig::new(require_key()?, config.model.clone())
                .with_fallback_models(config.fallback_models.clone())
                .with_timeout(config.timeout_secs);
            Arc::new(GeminiClient::new(gemini)?)
        }
        LlmProvider::OpenAi => {
            // The default model names a Gemini model.
            let model = if config.model.starts_with("gemini") {
                DEFAULT_OPENAI_MODEL.to_string()
            } else {
                config.model.clone()
            };
            let openai = OpenAiConfig::new(require_key()?, model).with_timeout(config.timeout_secs);
            Arc::new(OpenAiClient::new(openai)?)
        }
        LlmProvider::Mock => Arc::new(MockLlmClient::new()),
    };

    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn env(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |name| {
            pairs
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.to_string())
        }
    }

    fn llm_config(provider: &str) -> LlmConfig {
        LlmConfig {
            provider: provider.to_string(),
            ..LlmConfig::default()
        }
    }

    #[test]
    fn test_explicit_key_wins() {
        let key = resolve_api_key(
            LlmProvider::Gemini,
            Some("explicit".to_string()),
            env(&[("GEMINI_API_KEY", "from-env")]),
        );
        assert_eq!(key.as_deref(), Some("explicit"));
    }

    #[test]
    fn test_gemini_key_falls_back_to_google_key() {
        let key = resolve_api_key(
            LlmProvider::Gemini,
            None,
            env(&[("GEMINI_API_KEY", "  "), ("GOOGLE_API_KEY", "g-key")]),
        );
        assert_eq!(key.as_deref(), Some("g-key"));
    }

    #[test]
    fn test_openai_ignores_gemini_key() {
        let key = resolve_api_key(LlmProvider::OpenAi, None, env(&[("GEMINI_API_KEY", "g")]));
        assert_eq!(key, None);
    }

    #[test]
    fn test_create_mock_client() {
        assert!(create_client(&llm_config("mock"), None).is_ok());
    }

    #[test]
    fn test_create_with_provided_key() {
        assert!(create_client(&llm_config("gemini"), Some("test-key".to_string())).is_ok());
        assert!(create_client(&llm_config("openai"), Some("test-key".to_string())).is_ok());
    }

    #[test]
    fn test_unknown_provider_is_config_error() {
        let err = create_client(&llm_config("llama"), None).err().unwrap();
        assert!(matches!(err, AppError::Config(_)));
        assert!(err.to_string().contains("Unknown LLM provider"));
    }
}
