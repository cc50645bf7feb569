//! Configuration management for hotel-nlsql.
//!
//! Settings come from, in increasing precedence: built-in defaults, a TOML
//! config file, environment variables (optionally loaded from `.env`), and
//! command-line flags applied by the caller.

use crate::error::{AppError, Result};
use crate::safety::{MultiStatementPolicy, SafetyPolicy, DEFAULT_BOUND};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Database location.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// LLM provider configuration.
    #[serde(default)]
    pub llm: LlmConfig,

    /// SQL safety policy.
    #[serde(default)]
    pub safety: SafetyConfig,

    /// Natural-language answer generation.
    #[serde(default)]
    pub answer: AnswerConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file, or `:memory:`.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("db").join("hotel.db")
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// LLM provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmConfig {
    /// LLM provider: "gemini", "openai" or "mock".
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model name (e.g., "gemini-flash-latest", "gpt-5").
    #[serde(default = "default_model")]
    pub model: String,

    /// Models tried in order when the primary model fails.
    #[serde(default = "default_fallback_models")]
    pub fallback_models: Vec<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_provider() -> String {
    "gemini".to_string()
}

fn default_model() -> String {
    "gemini-flash-latest".to_string()
}

fn default_fallback_models() -> Vec<String> {
    vec!["gemini-2.0-flash".to_string()]
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            fallback_models: default_fallback_models(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// SQL safety configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SafetyConfig {
    /// Only allow read queries.
    #[serde(default = "default_true")]
    pub strict: bool,

    /// Row cap appended to generated SQL that has none.
    #[serde(default = "default_max_rows")]
    pub max_rows: u32,

    /// Accept `WITH ... SELECT` queries in strict mode.
    #[serde(default = "default_true")]
    pub allow_cte: bool,

    /// Reject `;`, `--` and `/*` outside string literals.
    #[serde(default = "default_true")]
    pub block_comment_markers: bool,

    /// What to do with output holding several statements.
    #[serde(default)]
    pub multi_statement: MultiStatementPolicy,
}

fn default_true() -> bool {
    true
}

fn default_max_rows() -> u32 {
    DEFAULT_BOUND
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            strict: true,
            max_rows: default_max_rows(),
            allow_cte: true,
            block_comment_markers: true,
            multi_statement: MultiStatementPolicy::default(),
        }
    }
}

/// Answer generation configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnswerConfig {
    /// Ask the LLM for a natural-language summary of the results.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Language the summary is written in.
    #[serde(default = "default_language")]
    pub language: String,

    /// Maximum rows included in the summary prompt.
    #[serde(default = "default_max_rows_in_prompt")]
    pub max_rows_in_prompt: usize,
}

fn default_language() -> String {
    "es".to_string()
}

fn default_max_rows_in_prompt() -> usize {
    50
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            language: default_language(),
            max_rows_in_prompt: default_max_rows_in_prompt(),
        }
    }
}

impl Config {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("hotel-nlsql")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file. A missing file yields defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    /// Parses configuration from a TOML string.
    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            AppError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })
    }

    /// Applies overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Applies overrides using `lookup` to read variables.
    ///
    /// Recognised: `DB_PATH`, `MAX_ROWS`, `STRICT_MODE`, `LLM_PROVIDER`,
    /// `MODEL_GEMINI`, `LLM_MODEL`, `DISABLE_SUMMARY`, `ANSWER_LANGUAGE`.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("DB_PATH") {
            self.database.path = PathBuf::from(path);
        }
        if let Some(max_rows) = lookup("MAX_ROWS") {
            self.safety.max_rows = parse_max_rows(&max_rows)?;
        }
        if let Some(strict) = lookup("STRICT_MODE") {
            self.safety.strict = parse_bool("STRICT_MODE", &strict)?;
        }
        if let Some(provider) = lookup("LLM_PROVIDER") {
            self.llm.provider = provider;
        }
        if let Some(model) = lookup("LLM_MODEL").or_else(|| lookup("MODEL_GEMINI")) {
            self.llm.model = model;
        }
        if let Some(disabled) = lookup("DISABLE_SUMMARY") {
            self.answer.enabled = !parse_bool("DISABLE_SUMMARY", &disabled)?;
        }
        if let Some(language) = lookup("ANSWER_LANGUAGE") {
            self.answer.language = language;
        }
        Ok(())
    }

    /// Builds the safety pipeline policy from this configuration.
    pub fn safety_policy(&self) -> SafetyPolicy {
        SafetyPolicy {
            strict: self.safety.strict,
            default_bound: self.safety.max_rows,
            allow_cte: self.safety.allow_cte,
            block_comment_markers: self.safety.block_comment_markers,
            multi_statement: self.safety.multi_statement,
        }
    }
}

/// Parses a positive row cap.
pub fn parse_max_rows(value: &str) -> Result<u32> {
    match value.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(AppError::config(format!(
            "MAX_ROWS must be a positive integer, got '{value}'"
        ))),
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(AppError::config(format!(
            "{name} must be true or false, got '{value}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_parse_valid_config() {
        let toml = r#"
[database]
path = "/var/lib/hotel/hotel.db"

[llm]
provider = "openai"
model = "gpt-5"
fallback_models = []
timeout_secs = 10

[safety]
strict = false
max_rows = 100
allow_cte = false
multi_statement = "take_first"

[answer]
enabled = false
language = "en"
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.database.path, PathBuf::from("/var/lib/hotel/hotel.db"));
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.llm.model, "gpt-5");
        assert!(config.llm.fallback_models.is_empty());
        assert_eq!(config.llm.timeout_secs, 10);
        assert!(!config.safety.strict);
        assert_eq!(config.safety.max_rows, 100);
        assert!(!config.safety.allow_cte);
        assert!(config.safety.block_comment_markers);
        assert_eq!(config.safety.multi_statement, MultiStatementPolicy::TakeFirst);
        assert!(!config.answer.enabled);
        assert_eq!(config.answer.language, "en");
        assert_eq!(config.answer.max_rows_in_prompt, 50);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.database.path, PathBuf::from("db").join("hotel.db"));
        assert_eq!(config.llm.provider, "gemini");
        assert_eq!(config.llm.model, "gemini-flash-latest");
        assert_eq!(config.llm.fallback_models, vec!["gemini-2.0-flash"]);
        assert!(config.safety.strict);
        assert_eq!(config.safety.max_rows, 200);
        assert_eq!(config.answer.language, "es");
    }

    #[test]
    fn test_invalid_toml_reports_path() {
        let err = Config::parse_toml("[safety]\nmax_rows = \"lots\"", Path::new("cfg.toml"))
            .unwrap_err();
        assert!(err.to_string().contains("cfg.toml"));
    }

    #[test]
    fn test_load_missing_file_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from_file(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[safety]\nmax_rows = 25\n").unwrap();

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.safety.max_rows, 25);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_env_with(env(&[
                ("DB_PATH", "/tmp/other.db"),
                ("MAX_ROWS", "75"),
                ("STRICT_MODE", "False"),
                ("LLM_PROVIDER", "mock"),
                ("MODEL_GEMINI", "gemini-2.0-flash"),
                ("DISABLE_SUMMARY", "true"),
                ("ANSWER_LANGUAGE", "en"),
            ]))
            .unwrap();

        assert_eq!(config.database.path, PathBuf::from("/tmp/other.db"));
        assert_eq!(config.safety.max_rows, 75);
        assert!(!config.safety.strict);
        assert_eq!(config.llm.provider, "mock");
        assert_eq!(config.llm.model, "gemini-2.0-flash");
        assert!(!config.answer.enabled);
        assert_eq!(config.answer.language, "en");
    }

    #[test]
    fn test_llm_model_beats_model_gemini() {
        let mut config = Config::default();
        config
            .apply_env_with(env(&[("LLM_MODEL", "gpt-5"), ("MODEL_GEMINI", "gemini-x")]))
            .unwrap();
        assert_eq!(config.llm.model, "gpt-5");
    }

    #[test]
    fn test_env_invalid_values() {
        let mut config = Config::default();
        assert!(config
            .apply_env_with(env(&[("MAX_ROWS", "0")]))
            .is_err());
        assert!(config
            .apply_env_with(env(&[("MAX_ROWS", "many")]))
            .is_err());
        assert!(config
            .apply_env_with(env(&[("STRICT_MODE", "maybe")]))
            .is_err());
    }

    #[test]
    fn test_safety_policy_from_config() {
        let mut config = Config::default();
        config.safety.max_rows = 120;
        config.safety.strict = false;

        let policy = config.safety_policy();
        assert_eq!(policy.default_bound, 120);
        assert!(!policy.strict);
        assert!(policy.allow_cte);
        assert_eq!(policy.multi_statement, MultiStatementPolicy::Reject);
    }
}
