//! Configuration loading, validation, and management for RagBot.
//!
//! Loads configuration from `~/.ragbot/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use ragbot_core::provider::GenerationParams;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.ragbot/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the completion and embedding endpoints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Chat model
    #[serde(default = "default_model")]
    pub model: String,

    /// Base instruction sent ahead of every conversation
    #[serde(default = "default_prompt")]
    pub prompt: String,

    /// The model's maximum context window in tokens
    #[serde(default = "default_context_window")]
    pub context_window: usize,

    /// Sampling parameters; `max_tokens` is also the reserved reply allowance
    #[serde(default)]
    pub generation: GenerationParams,

    /// Conversation memory configuration
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Knowledge base configuration
    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    /// Prompt composer configuration
    #[serde(default)]
    pub composer: ComposerConfig,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-3.5-turbo-0613".into()
}
fn default_prompt() -> String {
    "You're a nice helpful chatbot.".into()
}
fn default_context_window() -> usize {
    16_000
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("prompt", &self.prompt)
            .field("context_window", &self.context_window)
            .field("generation", &self.generation)
            .field("memory", &self.memory)
            .field("knowledge", &self.knowledge)
            .field("composer", &self.composer)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// "window" (in-process) or "sqlite" (persistent sessions)
    #[serde(default = "default_memory_backend")]
    pub backend: String,

    /// Number of messages kept per conversation
    #[serde(default = "default_memory_length")]
    pub length: usize,

    /// SQLite database path (defaults to `~/.ragbot/sessions.sqlite`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

fn default_memory_backend() -> String {
    "window".into()
}
fn default_memory_length() -> usize {
    5
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            backend: default_memory_backend(),
            length: default_memory_length(),
            path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// "none", "in_memory" or "sqlite"
    #[serde(default = "default_knowledge_backend")]
    pub backend: String,

    /// SQLite database path (defaults to `~/.ragbot/knowledge.sqlite`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Embedding model used both at ingestion and at query time
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Embedding dimension produced by `embedding_model`
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Item-type prefix under which knowledge keys are stored
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Neighbours fetched per query
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Append a citation line naming the source key to replies
    #[serde(default = "default_true")]
    pub cite_sources: bool,

    /// Text preceding the source key in the citation line
    #[serde(default = "default_citation_label")]
    pub citation_label: String,
}

fn default_knowledge_backend() -> String {
    "none".into()
}
fn default_embedding_model() -> String {
    "text-embedding-ada-002".into()
}
fn default_dimension() -> usize {
    1536
}
fn default_key_prefix() -> String {
    "doc:".into()
}
fn default_top_k() -> usize {
    1
}
fn default_citation_label() -> String {
    "This link was used to generate an answer".into()
}
fn default_true() -> bool {
    true
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            backend: default_knowledge_backend(),
            path: None,
            embedding_model: default_embedding_model(),
            dimension: default_dimension(),
            key_prefix: default_key_prefix(),
            top_k: default_top_k(),
            cite_sources: true,
            citation_label: default_citation_label(),
        }
    }
}

impl KnowledgeConfig {
    /// Whether a knowledge base should be built at all.
    pub fn is_enabled(&self) -> bool {
        self.backend != "none"
    }
}

/// Which half of the retrieved context survives a halving step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextTruncation {
    /// Keep the first half
    #[default]
    KeepHead,
    /// Keep the last half
    KeepTail,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComposerConfig {
    /// Halving direction when the context must shrink
    #[serde(default)]
    pub context_truncation: ContextTruncation,

    /// Text prefixed to every user query before it is recorded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_append_message: Option<String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.ragbot/config.toml).
    ///
    /// Also checks environment variables:
    /// - `RAGBOT_API_KEY` (highest priority), then `OPENAI_API_KEY`
    /// - `RAGBOT_MODEL`
    /// - `RAGBOT_API_URL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if config.api_key.is_none() {
            config.api_key = std::env::var("RAGBOT_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(model) = std::env::var("RAGBOT_MODEL") {
            config.model = model;
        }

        if let Ok(url) = std::env::var("RAGBOT_API_URL") {
            config.api_url = url;
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".ragbot")
    }

    /// SQLite path for persistent session memory.
    pub fn memory_db_path(&self) -> PathBuf {
        self.memory
            .path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| Self::config_dir().join("sessions.sqlite"))
    }

    /// SQLite path for the knowledge store.
    pub fn knowledge_db_path(&self) -> PathBuf {
        self.knowledge
            .path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| Self::config_dir().join("knowledge.sqlite"))
    }

    /// Token budget for the composed request: context window minus the
    /// reserved reply allowance.
    pub fn token_budget(&self) -> usize {
        self.context_window
            .saturating_sub(self.generation.max_tokens as usize)
    }

    /// The API key, or a configuration error if none is set.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let generation = &self.generation;
        if !(0.0..=2.0).contains(&generation.temperature) {
            return Err(ConfigError::ValidationError(
                "generation.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if !(0.0..=1.0).contains(&generation.top_p) {
            return Err(ConfigError::ValidationError(
                "generation.top_p must be between 0.0 and 1.0".into(),
            ));
        }

        for (name, value) in [
            ("frequency_penalty", generation.frequency_penalty),
            ("presence_penalty", generation.presence_penalty),
        ] {
            if !(-2.0..=2.0).contains(&value) {
                return Err(ConfigError::ValidationError(format!(
                    "generation.{name} must be between -2.0 and 2.0"
                )));
            }
        }

        if generation.max_tokens as usize >= self.context_window {
            return Err(ConfigError::ValidationError(format!(
                "generation.max_tokens ({}) must be smaller than context_window ({})",
                generation.max_tokens, self.context_window
            )));
        }

        if self.memory.length == 0 {
            return Err(ConfigError::ValidationError(
                "memory.length must be at least 1".into(),
            ));
        }

        if !matches!(self.memory.backend.as_str(), "window" | "sqlite") {
            return Err(ConfigError::ValidationError(format!(
                "unknown memory.backend '{}' (expected window or sqlite)",
                self.memory.backend
            )));
        }

        if !matches!(
            self.knowledge.backend.as_str(),
            "none" | "in_memory" | "sqlite"
        ) {
            return Err(ConfigError::ValidationError(format!(
                "unknown knowledge.backend '{}' (expected none, in_memory or sqlite)",
                self.knowledge.backend
            )));
        }

        if self.knowledge.dimension == 0 {
            return Err(ConfigError::ValidationError(
                "knowledge.dimension must be at least 1".into(),
            ));
        }

        if self.knowledge.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "knowledge.top_k must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.require_api_key().is_ok()
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
            model: default_model(),
            prompt: default_prompt(),
            context_window: default_context_window(),
            generation: GenerationParams::default(),
            memory: MemoryConfig::default(),
            knowledge: KnowledgeConfig::default(),
            composer: ComposerConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("No API key configured (set RAGBOT_API_KEY or OPENAI_API_KEY)")]
    MissingApiKey,
}

impl From<ConfigError> for ragbot_core::Error {
    fn from(err: ConfigError) -> Self {
        ragbot_core::Error::config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.model, "gpt-3.5-turbo-0613");
        assert_eq!(config.memory.length, 5);
        assert!(!config.knowledge.is_enabled());
    }

    #[test]
    fn budget_reserves_reply_allowance() {
        let config = AppConfig::default();
        assert_eq!(config.token_budget(), 16_000 - 500);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.model, config.model);
        assert_eq!(parsed.knowledge.dimension, 1536);
        assert_eq!(parsed.composer.context_truncation, ContextTruncation::KeepHead);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = AppConfig::default();
        config.generation.temperature = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn reply_cap_must_fit_context_window() {
        let config = AppConfig {
            context_window: 400,
            ..AppConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_tokens"));
    }

    #[test]
    fn zero_memory_length_rejected() {
        let mut config = AppConfig::default();
        config.memory.length = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_backend_rejected() {
        let mut config = AppConfig::default();
        config.knowledge.backend = "redis".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_api_key_is_config_error() {
        let config = AppConfig::default();
        assert!(matches!(config.require_api_key(), Err(ConfigError::MissingApiKey)));

        let config = AppConfig {
            api_key: Some("sk-test".into()),
            ..AppConfig::default()
        };
        assert_eq!(config.require_api_key().unwrap(), "sk-test");
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = AppConfig {
            api_key: Some("sk-secret-value".into()),
            ..AppConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret-value"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.model, "gpt-3.5-turbo-0613");
    }

    #[test]
    fn partial_file_is_merged_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
prompt = "You answer questions about sonar."

[generation]
max_tokens = 300

[knowledge]
backend = "sqlite"
key_prefix = "blog:"

[composer]
context_truncation = "keep_tail"
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.prompt, "You answer questions about sonar.");
        assert_eq!(config.generation.max_tokens, 300);
        assert!((config.generation.presence_penalty - 0.6).abs() < f32::EPSILON);
        assert!(config.knowledge.is_enabled());
        assert_eq!(config.knowledge.key_prefix, "blog:");
        assert_eq!(config.knowledge.top_k, 1);
        assert_eq!(config.composer.context_truncation, ContextTruncation::KeepTail);
    }

    #[test]
    fn invalid_file_reports_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "context_window = \"lots\"").unwrap();
        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("gpt-3.5-turbo-0613"));
        assert!(toml_str.contains("text-embedding-ada-002"));
    }
}
