//! Wiring: build the chatbot and its collaborators from an [`AppConfig`].

use ragbot_config::AppConfig;
use ragbot_core::error::KnowledgeError;
use ragbot_core::knowledge::{Embedder, KnowledgeBase, KnowledgeStore};
use ragbot_core::provider::Provider;
use ragbot_knowledge::{InMemoryKnowledgeStore, SqliteKnowledgeStore, VectorKnowledgeBase};
use ragbot_memory::SqliteSessionStore;
use ragbot_providers::ProviderEmbedder;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::chatbot::ChatBot;
use crate::context::{PromptComposer, TokenCounter};
use crate::session::{MemoryFactory, SessionRegistry, SqliteMemoryFactory, WindowMemoryFactory};

/// Build the chatbot described by `config`.
pub fn build_chatbot(
    config: &AppConfig,
    provider: Arc<dyn Provider>,
    knowledge: Option<Arc<dyn KnowledgeBase>>,
) -> ragbot_core::Result<ChatBot> {
    config.validate()?;

    let counter = TokenCounter::for_model(&config.model)?;
    let composer = PromptComposer::new(Arc::new(counter), &config.prompt, config.token_budget())
        .with_truncation(config.composer.context_truncation);

    let citation_label = config
        .knowledge
        .cite_sources
        .then(|| config.knowledge.citation_label.clone());

    let mut chatbot = ChatBot::new(provider, &config.model, composer)
        .with_generation(config.generation.clone())
        .with_citation_label(citation_label)
        .with_custom_append_message(config.composer.custom_append_message.clone());

    if let Some(knowledge) = knowledge {
        chatbot = chatbot.with_knowledge(knowledge);
    }

    info!(
        model = %config.model,
        budget = config.token_budget(),
        knowledge = chatbot.has_knowledge(),
        "Chatbot ready"
    );
    Ok(chatbot)
}

/// Build the configured knowledge base, or `None` when retrieval is off.
///
/// A store created with a different embedding dimension is a configuration
/// error.
pub async fn build_knowledge_base(
    config: &AppConfig,
    provider: Arc<dyn Provider>,
) -> ragbot_core::Result<Option<Arc<VectorKnowledgeBase>>> {
    let knowledge = &config.knowledge;
    if !knowledge.is_enabled() {
        return Ok(None);
    }

    let embedder: Arc<dyn Embedder> = Arc::new(ProviderEmbedder::new(
        provider,
        &knowledge.embedding_model,
        knowledge.dimension,
    ));

    let store: Arc<dyn KnowledgeStore> = match knowledge.backend.as_str() {
        "in_memory" => Arc::new(InMemoryKnowledgeStore::with_prefix(
            knowledge.dimension,
            &knowledge.key_prefix,
        )),
        "sqlite" => {
            let path = config.knowledge_db_path();
            ensure_parent_dir(&path)?;
            let store = SqliteKnowledgeStore::new(&sqlite_url(&path), knowledge.dimension)
                .await
                .map_err(|e| match e {
                    KnowledgeError::DimensionMismatch { .. } => ragbot_core::Error::config(format!(
                        "knowledge store at {}: {e}",
                        path.display()
                    )),
                    other => other.into(),
                })?;
            Arc::new(store.with_prefix(&knowledge.key_prefix))
        }
        other => {
            return Err(ragbot_core::Error::config(format!(
                "unknown knowledge backend '{other}'"
            )));
        }
    };

    let base = VectorKnowledgeBase::new(embedder, store)?.with_top_k(knowledge.top_k);
    info!(backend = %knowledge.backend, model = %knowledge.embedding_model, "Knowledge base ready");
    Ok(Some(Arc::new(base)))
}

/// Build the memory factory for new sessions.
pub async fn build_memory_factory(config: &AppConfig) -> ragbot_core::Result<Arc<dyn MemoryFactory>> {
    let length = config.memory.length;
    match config.memory.backend.as_str() {
        "window" => Ok(Arc::new(WindowMemoryFactory::new(length)?)),
        "sqlite" => {
            if length == 0 {
                return Err(ragbot_core::MemoryError::InvalidCapacity(length).into());
            }
            let path = config.memory_db_path();
            ensure_parent_dir(&path)?;
            let store = SqliteSessionStore::new(&sqlite_url(&path)).await?;
            Ok(Arc::new(SqliteMemoryFactory::new(store, length)))
        }
        other => Err(ragbot_core::Error::config(format!(
            "unknown memory backend '{other}'"
        ))),
    }
}

/// Build everything: provider-backed knowledge base, chatbot and registry.
pub async fn build_registry(
    config: &AppConfig,
    provider: Arc<dyn Provider>,
) -> ragbot_core::Result<SessionRegistry> {
    let knowledge = build_knowledge_base(config, provider.clone())
        .await?
        .map(|kb| kb as Arc<dyn KnowledgeBase>);
    let chatbot = build_chatbot(config, provider, knowledge)?;
    let factory = build_memory_factory(config).await?;
    Ok(SessionRegistry::new(Arc::new(chatbot), factory))
}

fn sqlite_url(path: &Path) -> String {
    format!("sqlite://{}", path.display())
}

fn ensure_parent_dir(path: &Path) -> ragbot_core::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            ragbot_core::Error::config(format!("cannot create {}: {e}", parent.display()))
        })?;
    }
    Ok(())
}
