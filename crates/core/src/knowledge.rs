//! Knowledge traits: vector storage and nearest-neighbour retrieval.
//!
//! Ingestion turns `(key, text)` into a [`KnowledgeItem`] by embedding the
//! text. Retrieval embeds the user query with the same model and returns the
//! closest stored items by cosine distance.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;
use crate::error::KnowledgeError;

/// A stored piece of knowledge. Immutable once stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeItem {
    /// Unique identifier across the corpus (URL, FAQ number, ...)
    pub key: String,

    /// The raw text
    pub content: String,

    /// Embedding of `content`
    #[serde(skip)]
    pub embedding: Vec<f32>,
}

/// A stored item ranked against a query vector.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredItem {
    /// Originating key, without the store's item-type prefix
    pub key: String,

    /// The raw text
    pub content: String,

    /// Cosine distance to the query (0.0 = same direction, 2.0 = opposite)
    pub distance: f32,
}

/// Output of a similarity query. Transient, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedContext {
    /// Originating key of the knowledge item
    pub source_key: String,

    /// The item's raw text
    pub content: String,

    /// Cosine distance to the query
    pub distance: f32,
}

impl From<ScoredItem> for RetrievedContext {
    fn from(item: ScoredItem) -> Self {
        Self {
            source_key: item.key,
            content: item.content,
            distance: item.distance,
        }
    }
}

/// Turns text into a fixed-dimension vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embedding model name (e.g., "text-embedding-ada-002").
    fn model(&self) -> &str;

    /// Length of every vector this embedder produces.
    fn dimension(&self) -> usize;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, KnowledgeError>;
}

/// A key → (text, vector) store supporting k-NN by cosine distance.
///
/// Implementations: in-memory, SQLite.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// The backend name (e.g., "in_memory", "sqlite").
    fn name(&self) -> &str;

    /// Dimension every stored embedding must have.
    fn dimension(&self) -> usize;

    /// Store a new item. Keys are unique; re-inserting a key fails with
    /// [`KnowledgeError::DuplicateKey`].
    async fn insert(&self, item: KnowledgeItem) -> Result<(), KnowledgeError>;

    /// The `k` items closest to `embedding`, nearest first. Equal distances
    /// keep insertion order.
    async fn nearest(&self, embedding: &[f32], k: usize) -> Result<Vec<ScoredItem>, KnowledgeError>;

    /// Whether an item with this key exists.
    async fn contains(&self, key: &str) -> Result<bool, KnowledgeError>;

    /// Number of stored items.
    async fn count(&self) -> Result<usize, KnowledgeError>;
}

/// Maps a free-text query to the most relevant stored knowledge.
#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    /// The knowledge base name, used in logs.
    fn name(&self) -> &str;

    /// How many neighbours `get_context` asks for.
    fn default_k(&self) -> usize {
        1
    }

    /// The `k` closest items to `query`, nearest first.
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedContext>, KnowledgeError>;

    /// The single closest item, or `None`.
    ///
    /// Search and embedding failures are logged and reported as "no context".
    /// Only fatal errors (dimension mismatch) are returned.
    async fn get_context(&self, query: &str) -> Result<Option<RetrievedContext>, KnowledgeError> {
        match self.retrieve(query, self.default_k()).await {
            Ok(results) => Ok(results.into_iter().next()),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!(knowledge_base = %self.name(), error = %e, "Retrieval failed, continuing without context");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Scripted(Result<Vec<RetrievedContext>, fn() -> KnowledgeError>);

    #[async_trait]
    impl KnowledgeBase for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn retrieve(&self, _query: &str, k: usize) -> Result<Vec<RetrievedContext>, KnowledgeError> {
            match &self.0 {
                Ok(items) => Ok(items.iter().take(k).cloned().collect()),
                Err(make) => Err(make()),
            }
        }
    }

    fn ctx(key: &str, distance: f32) -> RetrievedContext {
        RetrievedContext {
            source_key: key.into(),
            content: format!("content of {key}"),
            distance,
        }
    }

    #[tokio::test]
    async fn get_context_returns_closest() {
        let kb = Scripted(Ok(vec![ctx("faq-1", 0.1), ctx("faq-2", 0.4)]));
        let found = kb.get_context("question").await.unwrap().unwrap();
        assert_eq!(found.source_key, "faq-1");
    }

    #[tokio::test]
    async fn get_context_empty_store_is_none() {
        let kb = Scripted(Ok(vec![]));
        assert!(kb.get_context("question").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn search_failure_degrades_to_none() {
        let kb = Scripted(Err(|| KnowledgeError::SearchFailed("unreachable".into())));
        assert!(kb.get_context("question").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn dimension_mismatch_is_returned() {
        let kb = Scripted(Err(|| KnowledgeError::DimensionMismatch {
            expected: 1536,
            actual: 3,
        }));
        let err = kb.get_context("question").await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn scored_item_converts_to_context() {
        let ctx: RetrievedContext = ScoredItem {
            key: "blog/post".into(),
            content: "text".into(),
            distance: 0.25,
        }
        .into();
        assert_eq!(ctx.source_key, "blog/post");
        assert_eq!(ctx.content, "text");
    }
}
