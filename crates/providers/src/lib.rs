//! Completion and embedding providers for RagBot.
//!
//! All providers implement the `ragbot_core::Provider` trait.
//! [`build_from_config`] creates the configured provider.

pub mod embedder;
pub mod openai_compat;

pub use embedder::ProviderEmbedder;
pub use openai_compat::OpenAiCompatProvider;

use ragbot_config::{AppConfig, ConfigError};
use std::sync::Arc;

/// Build the completion provider described by the configuration.
///
/// Fails with [`ConfigError::MissingApiKey`] when no key is configured.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<OpenAiCompatProvider>, ConfigError> {
    let api_key = config.require_api_key()?;
    Ok(Arc::new(OpenAiCompatProvider::new(
        provider_name(&config.api_url),
        &config.api_url,
        api_key,
    )))
}

/// Derive a short provider name from a base URL, for logs.
fn provider_name(base_url: &str) -> &'static str {
    if base_url.contains("api.openai.com") {
        "openai"
    } else if base_url.contains("localhost:11434") {
        "ollama"
    } else {
        "openai_compat"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragbot_core::Provider;

    #[test]
    fn build_requires_api_key() {
        let config = AppConfig::default();
        assert!(matches!(
            build_from_config(&config),
            Err(ConfigError::MissingApiKey)
        ));
    }

    #[test]
    fn build_from_default_url() {
        let config = AppConfig {
            api_key: Some("sk-test".into()),
            ..AppConfig::default()
        };
        let provider = build_from_config(&config).unwrap();
        assert_eq!(provider.name(), "openai");
    }

    #[test]
    fn custom_url_gets_generic_name() {
        assert_eq!(provider_name("http://localhost:4000/v1"), "openai_compat");
        assert_eq!(provider_name("http://localhost:11434/v1"), "ollama");
    }
}
