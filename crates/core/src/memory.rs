//! Message Memory trait: the bounded conversation window.
//!
//! A window holds the most recent turns of one conversation, oldest first.
//! Eviction is strict FIFO: no deduplication, no relevance ranking.
//!
//! Mutating methods take `&mut self`, so a window has exactly one writer at
//! a time. Sessions shared between tasks wrap their window in a mutex.

use async_trait::async_trait;
use crate::error::MemoryError;
use crate::message::Message;

/// The core MessageMemory trait.
///
/// Implementations: in-process window, SQLite-backed session store.
#[async_trait]
pub trait MessageMemory: Send + Sync {
    /// The backend name (e.g., "window", "sqlite").
    fn name(&self) -> &str;

    /// Maximum number of messages retained after a trim.
    fn capacity(&self) -> usize;

    /// Append a user message. Does not trim: the window may exceed capacity
    /// until the next bot response arrives.
    async fn add_user_query(&mut self, text: &str) -> Result<(), MemoryError>;

    /// Append an assistant message, then trim to capacity.
    async fn add_bot_response(&mut self, message: Message) -> Result<(), MemoryError>;

    /// All retained messages in conversational order (oldest first).
    async fn messages(&self) -> Result<Vec<Message>, MemoryError>;

    /// Evict the oldest messages until the size is within capacity.
    async fn trim(&mut self) -> Result<(), MemoryError>;

    /// Current number of retained messages.
    async fn len(&self) -> Result<usize, MemoryError> {
        Ok(self.messages().await?.len())
    }

    /// Whether the window holds no messages.
    async fn is_empty(&self) -> Result<bool, MemoryError> {
        Ok(self.len().await? == 0)
    }

    /// Drop every message.
    async fn clear(&mut self) -> Result<(), MemoryError>;
}
