//! In-process window: the default Message Memory for a live session.

use async_trait::async_trait;
use ragbot_core::error::MemoryError;
use ragbot_core::memory::MessageMemory;
use ragbot_core::message::Message;
use std::collections::VecDeque;
use tracing::debug;

/// Default number of messages kept per conversation.
pub const DEFAULT_MEMORY_LENGTH: usize = 5;

/// A bounded FIFO window of conversation turns held in a `VecDeque`.
#[derive(Debug, Clone)]
pub struct WindowMemory {
    capacity: usize,
    messages: VecDeque<Message>,
}

impl WindowMemory {
    /// Create an empty window. `capacity` must be at least 1.
    pub fn new(capacity: usize) -> Result<Self, MemoryError> {
        if capacity == 0 {
            return Err(MemoryError::InvalidCapacity(capacity));
        }
        Ok(Self {
            capacity,
            messages: VecDeque::with_capacity(capacity + 1),
        })
    }

    fn evict_overflow(&mut self) {
        let mut evicted = 0;
        while self.messages.len() > self.capacity {
            if self.messages.pop_front().is_none() {
                break;
            }
            evicted += 1;
        }
        if evicted > 0 {
            debug!(evicted, capacity = self.capacity, "Trimmed message window");
        }
    }
}

impl Default for WindowMemory {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_MEMORY_LENGTH,
            messages: VecDeque::with_capacity(DEFAULT_MEMORY_LENGTH + 1),
        }
    }
}

#[async_trait]
impl MessageMemory for WindowMemory {
    fn name(&self) -> &str {
        "window"
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    async fn add_user_query(&mut self, text: &str) -> Result<(), MemoryError> {
        self.messages.push_back(Message::user(text));
        Ok(())
    }

    async fn add_bot_response(&mut self, message: Message) -> Result<(), MemoryError> {
        self.messages.push_back(message);
        self.evict_overflow();
        Ok(())
    }

    async fn messages(&self) -> Result<Vec<Message>, MemoryError> {
        Ok(self.messages.iter().cloned().collect())
    }

    async fn trim(&mut self) -> Result<(), MemoryError> {
        self.evict_overflow();
        Ok(())
    }

    async fn len(&self) -> Result<usize, MemoryError> {
        Ok(self.messages.len())
    }

    async fn clear(&mut self) -> Result<(), MemoryError> {
        self.messages.clear();
        Ok(())
    }
}
