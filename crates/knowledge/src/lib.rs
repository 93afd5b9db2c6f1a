//! Knowledge base implementations for RagBot.
//!
//! - [`vector`]: cosine distance and stable k-nearest ranking
//! - [`InMemoryKnowledgeStore`] / [`SqliteKnowledgeStore`]: item storage
//! - [`VectorKnowledgeBase`]: embed the query, search the store
//! - [`ingest`]: the `key|text` bulk-load format

pub mod base;
pub mod in_memory;
pub mod ingest;
pub mod vector;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use base::VectorKnowledgeBase;
pub use in_memory::InMemoryKnowledgeStore;
pub use ingest::{IngestReport, parse_ingest_line, parse_ingest_source};
pub use vector::{cosine_distance, cosine_similarity, k_nearest};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteKnowledgeStore;

/// Item-type prefix applied to stored keys when none is configured.
pub const DEFAULT_KEY_PREFIX: &str = "doc:";
