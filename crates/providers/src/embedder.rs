//! Embedding client: adapts a [`Provider`]'s embedding endpoint to the
//! single-text [`Embedder`] seam used by the knowledge base.

use async_trait::async_trait;
use ragbot_core::error::KnowledgeError;
use ragbot_core::knowledge::Embedder;
use ragbot_core::provider::{EmbeddingRequest, Provider};
use std::sync::Arc;
use tracing::debug;

/// Embeds text through a provider with a fixed model and dimension.
pub struct ProviderEmbedder {
    provider: Arc<dyn Provider>,
    model: String,
    dimension: usize,
}

impl ProviderEmbedder {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, dimension: usize) -> Self {
        Self {
            provider,
            model: model.into(),
            dimension,
        }
    }
}

#[async_trait]
impl Embedder for ProviderEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, KnowledgeError> {
        let response = self
            .provider
            .embed(EmbeddingRequest {
                model: self.model.clone(),
                inputs: vec![text.to_string()],
            })
            .await
            .map_err(|e| KnowledgeError::EmbeddingFailed(e.to_string()))?;

        let embedding = response.embeddings.into_iter().next().ok_or_else(|| {
            KnowledgeError::EmbeddingFailed("provider returned no embeddings".into())
        })?;

        if embedding.len() != self.dimension {
            return Err(KnowledgeError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }

        debug!(model = %self.model, dimension = embedding.len(), "Embedded text");
        Ok(embedding)
    }
}
