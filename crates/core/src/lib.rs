//! # RagBot Core
//!
//! Domain types, traits, and error definitions for the RagBot pipeline.
//! This crate has **zero framework dependencies**: it defines the domain model
//! that all other crates implement against.
//!
//! ## Seams
//!
//! - [`Provider`]: completion + embedding endpoint
//! - [`MessageMemory`]: bounded conversation window (append, list, trim)
//! - [`KnowledgeStore`] / [`KnowledgeBase`]: vector storage and retrieval
//! - [`Embedder`]: text → fixed-dimension vector

pub mod error;
pub mod knowledge;
pub mod memory;
pub mod message;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use error::{ComposeError, Error, KnowledgeError, MemoryError, ProviderError, Result};
pub use knowledge::{
    Embedder, KnowledgeBase, KnowledgeItem, KnowledgeStore, RetrievedContext, ScoredItem,
};
pub use memory::MessageMemory;
pub use message::{Message, Role, SessionId};
pub use provider::{GenerationParams, Provider, ProviderRequest, ProviderResponse, Usage};
