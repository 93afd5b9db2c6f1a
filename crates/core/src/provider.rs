//! Provider trait: the abstraction over LLM completion and embedding endpoints.
//!
//! A Provider knows how to send a conversation to an LLM and get a single
//! reply message back, and optionally how to turn text into embeddings.
//!
//! Implementations: OpenAI-compatible endpoints, test doubles.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::ProviderError;
use crate::message::Message;

/// Sampling parameters sent with every completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Temperature (0.0 = deterministic, 2.0 = most random)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate (the reserved reply allowance)
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Nucleus sampling mass
    #[serde(default = "default_top_p")]
    pub top_p: f32,

    /// Penalty on tokens proportional to their frequency so far
    #[serde(default = "default_frequency_penalty")]
    pub frequency_penalty: f32,

    /// Penalty on tokens that already appeared at all
    #[serde(default = "default_presence_penalty")]
    pub presence_penalty: f32,
}

fn default_temperature() -> f32 {
    0.5
}
fn default_max_tokens() -> u32 {
    500
}
fn default_top_p() -> f32 {
    1.0
}
fn default_frequency_penalty() -> f32 {
    0.1
}
fn default_presence_penalty() -> f32 {
    0.6
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            top_p: default_top_p(),
            frequency_penalty: default_frequency_penalty(),
            presence_penalty: default_presence_penalty(),
        }
    }
}

/// A single completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "gpt-3.5-turbo-0613")
    pub model: String,

    /// The conversation messages, oldest first
    pub messages: Vec<Message>,

    /// Sampling parameters
    #[serde(default)]
    pub params: GenerationParams,
}

/// A complete response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The generated message
    pub message: Message,

    /// Token usage statistics
    pub usage: Option<Usage>,

    /// Which model actually responded (may differ from requested)
    pub model: String,
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// An embedding request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    /// The model to use for embeddings (e.g., "text-embedding-ada-002").
    pub model: String,

    /// The texts to embed.
    pub inputs: Vec<String>,
}

/// An embedding response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    /// The embedding vectors, one per input text.
    pub embeddings: Vec<Vec<f32>>,

    /// Which model was used.
    pub model: String,

    /// Token usage.
    pub usage: Option<Usage>,
}

/// The core Provider trait.
///
/// The chatbot calls `complete()` without knowing which backend serves it.
/// Retries and backoff are the caller's business: a provider reports the
/// first failure it sees.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openai").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(&self, request: ProviderRequest) -> std::result::Result<ProviderResponse, ProviderError>;

    /// Generate embeddings for the given texts.
    ///
    /// Default implementation returns an error indicating embeddings aren't supported.
    async fn embed(
        &self,
        _request: EmbeddingRequest,
    ) -> std::result::Result<EmbeddingResponse, ProviderError> {
        Err(ProviderError::NotConfigured(
            format!("Provider '{}' does not support embeddings", self.name()),
        ))
    }

    /// Health check: can we reach the provider?
    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_defaults() {
        let params = GenerationParams::default();
        assert!((params.temperature - 0.5).abs() < f32::EPSILON);
        assert_eq!(params.max_tokens, 500);
        assert!((params.top_p - 1.0).abs() < f32::EPSILON);
        assert!((params.frequency_penalty - 0.1).abs() < f32::EPSILON);
        assert!((params.presence_penalty - 0.6).abs() < f32::EPSILON);
    }

    #[test]
    fn partial_params_fill_defaults() {
        let params: GenerationParams = serde_json::from_str(r#"{"temperature": 0.9}"#).unwrap();
        assert!((params.temperature - 0.9).abs() < f32::EPSILON);
        assert_eq!(params.max_tokens, 500);
    }

    struct CompletionOnly;

    #[async_trait]
    impl Provider for CompletionOnly {
        fn name(&self) -> &str {
            "completion_only"
        }

        async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            Ok(ProviderResponse {
                message: Message::assistant("ok"),
                usage: None,
                model: request.model,
            })
        }
    }

    #[tokio::test]
    async fn embed_is_unsupported_by_default() {
        let err = CompletionOnly
            .embed(EmbeddingRequest {
                model: "text-embedding-ada-002".into(),
                inputs: vec!["hello".into()],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
        assert!(err.to_string().contains("completion_only"));
    }
}
