//! SQLite-backed knowledge store.
//!
//! Schema:
//! - `knowledge_items`: one row per item, embedding as a little-endian f32 blob
//! - `knowledge_meta`: the embedding dimension the database was created with
//!
//! Search is exact: every embedding under the key prefix is loaded and ranked
//! by cosine distance, ordered by `iid` so ties keep insertion order.

use async_trait::async_trait;
use ragbot_core::error::KnowledgeError;
use ragbot_core::knowledge::{KnowledgeItem, KnowledgeStore, ScoredItem};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

use crate::DEFAULT_KEY_PREFIX;
use crate::vector::k_nearest;

/// Knowledge items persisted in SQLite.
pub struct SqliteKnowledgeStore {
    pool: SqlitePool,
    dimension: usize,
    prefix: String,
}

impl SqliteKnowledgeStore {
    /// Open (or create) the knowledge database at `path`.
    ///
    /// A database created with a different embedding dimension is rejected
    /// with [`KnowledgeError::DimensionMismatch`].
    pub async fn new(path: &str, dimension: usize) -> Result<Self, KnowledgeError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| KnowledgeError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        // Every connection to an in-memory database sees its own database.
        let max_connections = if path.contains(":memory:") { 1 } else { 4 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| KnowledgeError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self::from_pool(pool, dimension).await?;
        info!("SQLite knowledge store initialized at {path}");
        Ok(store)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool, dimension: usize) -> Result<Self, KnowledgeError> {
        let store = Self {
            pool,
            dimension,
            prefix: DEFAULT_KEY_PREFIX.to_string(),
        };
        store.run_migrations().await?;
        store.check_stored_dimension().await?;
        Ok(store)
    }

    /// Use a different item-type prefix for stored keys.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    async fn run_migrations(&self) -> Result<(), KnowledgeError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS knowledge_items (
                iid        INTEGER PRIMARY KEY AUTOINCREMENT,
                key        TEXT NOT NULL UNIQUE,
                content    TEXT NOT NULL,
                embedding  BLOB NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| KnowledgeError::Storage(format!("knowledge_items table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS knowledge_meta (
                name   TEXT PRIMARY KEY,
                value  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| KnowledgeError::Storage(format!("knowledge_meta table: {e}")))?;

        debug!("SQLite knowledge migrations complete");
        Ok(())
    }

    async fn check_stored_dimension(&self) -> Result<(), KnowledgeError> {
        let row = sqlx::query("SELECT value FROM knowledge_meta WHERE name = 'dimension'")
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| KnowledgeError::Storage(format!("read dimension: {e}")))?;

        let Some(row) = row else {
            sqlx::query("INSERT INTO knowledge_meta (name, value) VALUES ('dimension', ?1)")
                .bind(self.dimension.to_string())
                .execute(&self.pool)
                .await
                .map_err(|e| KnowledgeError::Storage(format!("write dimension: {e}")))?;
            return Ok(());
        };

        let value: String = row
            .try_get("value")
            .map_err(|e| KnowledgeError::Storage(format!("value column: {e}")))?;
        let stored: usize = value
            .parse()
            .map_err(|e| KnowledgeError::Storage(format!("corrupt stored dimension {value:?}: {e}")))?;

        if stored != self.dimension {
            return Err(KnowledgeError::DimensionMismatch {
                expected: stored,
                actual: self.dimension,
            });
        }
        Ok(())
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

    /// Serialize an embedding vector to bytes.
    fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
        blob.chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }
}

#[async_trait]
impl KnowledgeStore for SqliteKnowledgeStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn insert(&self, item: KnowledgeItem) -> Result<(), KnowledgeError> {
        self.check_dimension(item.embedding.len())?;

        let result = sqlx::query("INSERT INTO knowledge_items (key, content, embedding) VALUES (?1, ?2, ?3)")
            .bind(format!("{}{}", self.prefix, item.key))
            .bind(&item.content)
            .bind(Self::embedding_to_blob(&item.embedding))
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => {
                debug!(key = %item.key, "Stored knowledge item");
                Ok(())
            }
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(KnowledgeError::DuplicateKey(item.key))
            }
            Err(e) => Err(KnowledgeError::Storage(format!("INSERT failed: {e}"))),
        }
    }

    async fn nearest(&self, embedding: &[f32], k: usize) -> Result<Vec<ScoredItem>, KnowledgeError> {
        self.check_dimension(embedding.len())?;

        let rows = sqlx::query(
            r#"
            SELECT key, content, embedding FROM knowledge_items
            WHERE substr(key, 1, length(?1)) = ?1
            ORDER BY iid
            "#,
        )
        .bind(&self.prefix)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| KnowledgeError::SearchFailed(format!("SELECT items: {e}")))?;

        let mut loaded = Vec::with_capacity(rows.len());
        for row in &rows {
            let key: String = row
                .try_get("key")
                .map_err(|e| KnowledgeError::SearchFailed(format!("key column: {e}")))?;
            let content: String = row
                .try_get("content")
                .map_err(|e| KnowledgeError::SearchFailed(format!("content column: {e}")))?;
            let blob: Vec<u8> = row
                .try_get("embedding")
                .map_err(|e| KnowledgeError::SearchFailed(format!("embedding column: {e}")))?;

            let key = key
                .strip_prefix(self.prefix.as_str())
                .map(str::to_string)
                .unwrap_or(key);
            loaded.push((key, content, Self::blob_to_embedding(&blob)));
        }

        let candidates = loaded
            .iter()
            .map(|(key, content, vector)| ((key, content), vector.as_slice()));

        Ok(k_nearest(candidates, embedding, k)
            .into_iter()
            .map(|((key, content), distance)| ScoredItem {
                key: key.clone(),
                content: content.clone(),
                distance,
            })
            .collect())
    }

    async fn contains(&self, key: &str) -> Result<bool, KnowledgeError> {
        let row = sqlx::query("SELECT 1 FROM knowledge_items WHERE key = ?1")
            .bind(format!("{}{key}", self.prefix))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| KnowledgeError::Storage(format!("lookup failed: {e}")))?;
        Ok(row.is_some())
    }

    async fn count(&self) -> Result<usize, KnowledgeError> {
        let row = sqlx::query(
            "SELECT COUNT(*) as cnt FROM knowledge_items WHERE substr(key, 1, length(?1)) = ?1",
        )
        .bind(&self.prefix)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| KnowledgeError::Storage(format!("COUNT: {e}")))?;

        let cnt: i64 = row
            .try_get("cnt")
            .map_err(|e| KnowledgeError::Storage(format!("cnt column: {e}")))?;
        Ok(cnt as usize)
    }
}
