//! `ragbot status`: show configuration, endpoint reachability and
//! knowledge store size.

use ragbot_config::AppConfig;
use ragbot_core::knowledge::KnowledgeStore;
use ragbot_core::provider::Provider;
use ragbot_knowledge::SqliteKnowledgeStore;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    println!("RagBot Status");
    println!("=============");
    println!("  Config dir:     {}", AppConfig::config_dir().display());
    println!("  API URL:        {}", config.api_url);
    println!("  API key:        {}", if config.has_api_key() { "set" } else { "missing" });
    match ragbot_providers::build_from_config(&config) {
        Ok(provider) => println!("  Endpoint:       {}", endpoint_status(provider.as_ref()).await),
        Err(_) => println!("  Endpoint:       not checked (no API key)"),
    }
    println!("  Model:          {}", config.model);
    println!("  Context window: {}", config.context_window);
    println!("  Reply cap:      {}", config.generation.max_tokens);
    println!("  Token budget:   {}", config.token_budget());
    println!("  Memory:         {} (length {})", config.memory.backend, config.memory.length);
    println!("  Knowledge:      {}", config.knowledge.backend);

    if config.knowledge.backend == "sqlite" {
        let path = config.knowledge_db_path();
        if path.exists() {
            let url = format!("sqlite://{}", path.display());
            match SqliteKnowledgeStore::new(&url, config.knowledge.dimension).await {
                Ok(store) => {
                    let store = store.with_prefix(&config.knowledge.key_prefix);
                    println!("  Items:          {}", store.count().await?);
                }
                Err(e) => println!("  Items:          unavailable ({e})"),
            }
        } else {
            println!("  Items:          0 (no store at {})", path.display());
        }
    }

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  Config file found");
    } else {
        println!("\n  No config file: run `ragbot init` first");
    }

    Ok(())
}

/// One-word reachability summary for the completion endpoint.
async fn endpoint_status(provider: &dyn Provider) -> String {
    match provider.health_check().await {
        Ok(true) => "reachable".to_string(),
        Ok(false) => "responded with an error status".to_string(),
        Err(e) => format!("unreachable ({e})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragbot_core::error::ProviderError;
    use ragbot_core::provider::{ProviderRequest, ProviderResponse};

    struct HealthStub(Result<bool, fn() -> ProviderError>);

    #[async_trait::async_trait]
    impl Provider for HealthStub {
        fn name(&self) -> &str {
            "health"
        }

        async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            Err(ProviderError::Network("unused".into()))
        }

        async fn health_check(&self) -> Result<bool, ProviderError> {
            self.0.map_err(|e| e())
        }
    }

    #[tokio::test]
    async fn endpoint_status_reports_each_outcome() {
        assert_eq!(endpoint_status(&HealthStub(Ok(true))).await, "reachable");
        assert_eq!(
            endpoint_status(&HealthStub(Ok(false))).await,
            "responded with an error status"
        );
        let down = endpoint_status(&HealthStub(Err(|| ProviderError::Network("refused".into())))).await;
        assert!(down.starts_with("unreachable ("));
        assert!(down.contains("refused"));
    }
}
