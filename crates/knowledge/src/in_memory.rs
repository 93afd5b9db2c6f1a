//! In-memory knowledge store. Fast, not persistent; lost on restart.

use async_trait::async_trait;
use ragbot_core::error::KnowledgeError;
use ragbot_core::knowledge::{KnowledgeItem, KnowledgeStore, ScoredItem};
use tokio::sync::RwLock;
use tracing::debug;

use crate::DEFAULT_KEY_PREFIX;
use crate::vector::k_nearest;

/// Knowledge items held in a `Vec` in insertion order.
///
/// Keys are stored with the item-type prefix; searches only consider keys
/// under that prefix and strip it from the results.
pub struct InMemoryKnowledgeStore {
    dimension: usize,
    prefix: String,
    items: RwLock<Vec<KnowledgeItem>>,
}

impl InMemoryKnowledgeStore {
    pub fn new(dimension: usize) -> Self {
        Self::with_prefix(dimension, DEFAULT_KEY_PREFIX)
    }

    pub fn with_prefix(dimension: usize, prefix: impl Into<String>) -> Self {
        Self {
            dimension,
            prefix: prefix.into(),
            items: RwLock::new(Vec::new()),
        }
    }

    fn check_dimension(&self, actual: usize) -> Result<(), KnowledgeError> {
        if actual != self.dimension {
            return Err(KnowledgeError::DimensionMismatch {
                expected: self.dimension,
                actual,
            });
        }
        Ok(())
    }

    fn stored_key(&self, key: &str) -> String {
        format!("{}{key}", self.prefix)
    }
}

#[async_trait]
impl KnowledgeStore for InMemoryKnowledgeStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn insert(&self, item: KnowledgeItem) -> Result<(), KnowledgeError> {
        self.check_dimension(item.embedding.len())?;

        let stored_key = self.stored_key(&item.key);
        let mut items = self.items.write().await;
        if items.iter().any(|existing| existing.key == stored_key) {
            return Err(KnowledgeError::DuplicateKey(item.key));
        }

        debug!(key = %item.key, "Stored knowledge item");
        items.push(KnowledgeItem {
            key: stored_key,
            ..item
        });
        Ok(())
    }

    async fn nearest(&self, embedding: &[f32], k: usize) -> Result<Vec<ScoredItem>, KnowledgeError> {
        self.check_dimension(embedding.len())?;

        let items = self.items.read().await;
        let candidates = items.iter().filter_map(|item| {
            item.key
                .strip_prefix(self.prefix.as_str())
                .map(|key| ((key, item.content.as_str()), item.embedding.as_slice()))
        });

        Ok(k_nearest(candidates, embedding, k)
            .into_iter()
            .map(|((key, content), distance)| ScoredItem {
                key: key.to_string(),
                content: content.to_string(),
                distance,
            })
            .collect())
    }

    async fn contains(&self, key: &str) -> Result<bool, KnowledgeError> {
        let stored_key = self.stored_key(key);
        Ok(self.items.read().await.iter().any(|item| item.key == stored_key))
    }

    async fn count(&self) -> Result<usize, KnowledgeError> {
        Ok(self.items.read().await.len())
    }
}
