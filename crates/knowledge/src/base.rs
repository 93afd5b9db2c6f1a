//! The embedding-backed knowledge base: embed, then search the store.

use async_trait::async_trait;
use ragbot_core::error::KnowledgeError;
use ragbot_core::knowledge::{Embedder, KnowledgeBase, KnowledgeItem, KnowledgeStore, RetrievedContext};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::ingest::IngestReport;

/// Knowledge base over an [`Embedder`] and a [`KnowledgeStore`].
///
/// Queries are embedded with the same model used at ingestion. Every call
/// performs a fresh embed and search; nothing is cached.
pub struct VectorKnowledgeBase {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn KnowledgeStore>,
    top_k: usize,
}

impl std::fmt::Debug for VectorKnowledgeBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorKnowledgeBase")
            .field("embedder", &self.embedder.model())
            .field("store", &self.store.name())
            .field("top_k", &self.top_k)
            .finish()
    }
}

impl VectorKnowledgeBase {
    /// Pair an embedder with a store. Their dimensions must agree.
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn KnowledgeStore>) -> ragbot_core::Result<Self> {
        if embedder.dimension() != store.dimension() {
            return Err(ragbot_core::Error::config(format!(
                "embedding model {} produces {}-dimensional vectors but the {} store holds {}",
                embedder.model(),
                embedder.dimension(),
                store.name(),
                store.dimension()
            )));
        }
        Ok(Self {
            embedder,
            store,
            top_k: 1,
        })
    }

    /// Number of neighbours `get_context` considers. Clamped to at least 1.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub fn store(&self) -> &Arc<dyn KnowledgeStore> {
        &self.store
    }

    /// Embed `text` and store it under `key`. Keys are unique.
    pub async fn ingest(&self, key: &str, text: &str) -> Result<(), KnowledgeError> {
        if key.trim().is_empty() {
            return Err(KnowledgeError::InvalidKey("key must not be empty".into()));
        }
        if self.store.contains(key).await? {
            return Err(KnowledgeError::DuplicateKey(key.to_string()));
        }

        let embedding = self.embedder.embed(text).await?;
        self.store
            .insert(KnowledgeItem {
                key: key.to_string(),
                content: text.to_string(),
                embedding,
            })
            .await
    }

    /// Ingest many items in order. Duplicate keys are skipped and counted;
    /// any other error stops the load.
    pub async fn ingest_all(
        &self,
        items: impl IntoIterator<Item = (String, String)>,
    ) -> Result<IngestReport, KnowledgeError> {
        let mut report = IngestReport::default();
        for (key, text) in items {
            match self.ingest(&key, &text).await {
                Ok(()) => report.ingested += 1,
                Err(KnowledgeError::DuplicateKey(key)) => {
                    warn!(%key, "Skipping duplicate knowledge key");
                    report.skipped_duplicates += 1;
                }
                Err(e) => return Err(e),
            }
        }
        info!(
            ingested = report.ingested,
            skipped = report.skipped_duplicates,
            store = %self.store.name(),
            "Knowledge ingestion complete"
        );
        Ok(report)
    }
}

#[async_trait]
impl KnowledgeBase for VectorKnowledgeBase {
    fn name(&self) -> &str {
        self.store.name()
    }

    fn default_k(&self) -> usize {
        self.top_k
    }

    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedContext>, KnowledgeError> {
        let embedding = self.embedder.embed(query).await?;
        if embedding.len() != self.store.dimension() {
            return Err(KnowledgeError::DimensionMismatch {
                expected: self.store.dimension(),
                actual: embedding.len(),
            });
        }

        let results = self.store.nearest(&embedding, k).await?;
        debug!(found = results.len(), k, "Knowledge search complete");
        Ok(results.into_iter().map(RetrievedContext::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryKnowledgeStore;
    use std::collections::HashMap;

    /// Embeds by table lookup; unknown text is an embedding failure.
    struct TableEmbedder {
        dimension: usize,
        table: HashMap<&'static str, Vec<f32>>,
    }

    #[async_trait]
    impl Embedder for TableEmbedder {
        fn model(&self) -> &str {
            "table"
        }

        fn dimension(&self) -> usize {
            self.dimension
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>, KnowledgeError> {
            self.table
                .get(text)
                .cloned()
                .ok_or_else(|| KnowledgeError::EmbeddingFailed(format!("no vector for {text:?}")))
        }
    }

    fn knowledge_base() -> VectorKnowledgeBase {
        let table = HashMap::from([
            ("How do I reset my password?", vec![1.0, 0.0, 0.0]),
            ("Shipping takes 3-5 days.", vec![0.0, 1.0, 0.0]),
            ("Go to settings and click reset.", vec![0.9, 0.1, 0.0]),
            ("tilted", vec![0.0, 0.0, 1.0, 0.0]),
        ]);
        VectorKnowledgeBase::new(
            Arc::new(TableEmbedder { dimension: 3, table }),
            Arc::new(InMemoryKnowledgeStore::new(3)),
        )
        .unwrap()
    }

    #[test]
    fn mismatched_dimensions_rejected_at_construction() {
        let embedder = TableEmbedder {
            dimension: 1536,
            table: HashMap::new(),
        };
        let result = VectorKnowledgeBase::new(Arc::new(embedder), Arc::new(InMemoryKnowledgeStore::new(3)));
        assert!(matches!(result, Err(ragbot_core::Error::Config { .. })));
    }

    #[tokio::test]
    async fn retrieves_closest_item() {
        let kb = knowledge_base();
        kb.ingest("faq-3", "Go to settings and click reset.").await.unwrap();
        kb.ingest("faq-7", "Shipping takes 3-5 days.").await.unwrap();

        let ctx = kb.get_context("How do I reset my password?").await.unwrap().unwrap();
        assert_eq!(ctx.source_key, "faq-3");
        assert_eq!(ctx.content, "Go to settings and click reset.");
    }

    #[tokio::test]
    async fn empty_store_gives_no_context() {
        let kb = knowledge_base();
        assert!(kb.get_context("How do I reset my password?").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn embedding_failure_degrades_to_none() {
        let kb = knowledge_base();
        kb.ingest("faq-7", "Shipping takes 3-5 days.").await.unwrap();
        assert!(kb.get_context("unknown question").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn wrong_query_dimension_is_fatal() {
        let kb = knowledge_base();
        let err = kb.get_context("tilted").await.unwrap_err();
        assert!(matches!(err, KnowledgeError::DimensionMismatch { expected: 3, actual: 4 }));
    }

    #[tokio::test]
    async fn duplicate_and_empty_keys_rejected() {
        let kb = knowledge_base();
        kb.ingest("faq-7", "Shipping takes 3-5 days.").await.unwrap();
        assert!(matches!(
            kb.ingest("faq-7", "Shipping takes 3-5 days.").await,
            Err(KnowledgeError::DuplicateKey(_))
        ));
        assert!(matches!(
            kb.ingest("  ", "Shipping takes 3-5 days.").await,
            Err(KnowledgeError::InvalidKey(_))
        ));
    }

    #[tokio::test]
    async fn ingest_all_counts_duplicates() {
        let kb = knowledge_base();
        let report = kb
            .ingest_all(vec![
                ("faq-3".to_string(), "Go to settings and click reset.".to_string()),
                ("faq-7".to_string(), "Shipping takes 3-5 days.".to_string()),
                ("faq-3".to_string(), "Go to settings and click reset.".to_string()),
            ])
            .await
            .unwrap();
        assert_eq!(
            report,
            IngestReport {
                ingested: 2,
                skipped_duplicates: 1
            }
        );
        assert_eq!(kb.store().count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn top_k_is_clamped() {
        assert_eq!(knowledge_base().with_top_k(0).default_k(), 1);
        assert_eq!(knowledge_base().with_top_k(4).default_k(), 4);
    }
}
