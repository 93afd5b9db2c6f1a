//! Session registry: one message memory per conversation.
//!
//! Sessions are created on their first message and live until
//! [`SessionRegistry::end_session`]. Each session sits behind its own
//! `tokio::sync::Mutex`, held for the whole request: two messages on the
//! same session are answered one after the other, while different sessions
//! proceed in parallel.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ragbot_core::error::MemoryError;
use ragbot_core::memory::MessageMemory;
use ragbot_core::message::{Message, SessionId};
use ragbot_memory::WindowMemory;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::chatbot::ChatBot;

/// Creates the message memory for a new session.
#[async_trait]
pub trait MemoryFactory: Send + Sync {
    /// Backend name, for logs.
    fn name(&self) -> &str;

    async fn create(&self, session_id: &SessionId) -> Result<Box<dyn MessageMemory>, MemoryError>;

    /// Release anything the backend keeps for an ended session.
    async fn destroy(&self, _session_id: &SessionId) -> Result<(), MemoryError> {
        Ok(())
    }
}

/// Fresh in-process windows of a fixed capacity.
pub struct WindowMemoryFactory {
    capacity: usize,
}

impl WindowMemoryFactory {
    pub fn new(capacity: usize) -> Result<Self, MemoryError> {
        if capacity == 0 {
            return Err(MemoryError::InvalidCapacity(capacity));
        }
        Ok(Self { capacity })
    }
}

#[async_trait]
impl MemoryFactory for WindowMemoryFactory {
    fn name(&self) -> &str {
        "window"
    }

    async fn create(&self, _session_id: &SessionId) -> Result<Box<dyn MessageMemory>, MemoryError> {
        Ok(Box::new(WindowMemory::new(self.capacity)?))
    }
}

/// Session windows persisted in a shared SQLite database.
pub struct SqliteMemoryFactory {
    store: ragbot_memory::SqliteSessionStore,
    capacity: usize,
}

impl SqliteMemoryFactory {
    pub fn new(store: ragbot_memory::SqliteSessionStore, capacity: usize) -> Self {
        Self { store, capacity }
    }
}

#[async_trait]
impl MemoryFactory for SqliteMemoryFactory {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn create(&self, session_id: &SessionId) -> Result<Box<dyn MessageMemory>, MemoryError> {
        Ok(Box::new(self.store.session(session_id, self.capacity)?))
    }

    async fn destroy(&self, session_id: &SessionId) -> Result<(), MemoryError> {
        let removed = self.store.delete_session(session_id).await?;
        debug!(session = %session_id, removed, "Deleted persisted session rows");
        Ok(())
    }
}

/// A live conversation.
pub struct Session {
    pub id: SessionId,
    pub memory: Box<dyn MessageMemory>,
    pub created_at: DateTime<Utc>,
    /// Set by `end_session`; requests queued on this lock start over.
    closed: bool,
}

/// Routes queries to per-session memories.
pub struct SessionRegistry {
    chatbot: Arc<ChatBot>,
    factory: Arc<dyn MemoryFactory>,
    sessions: RwLock<HashMap<SessionId, Arc<Mutex<Session>>>>,
}

impl SessionRegistry {
    pub fn new(chatbot: Arc<ChatBot>, factory: Arc<dyn MemoryFactory>) -> Self {
        Self {
            chatbot,
            factory,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn chatbot(&self) -> &Arc<ChatBot> {
        &self.chatbot
    }

    /// Answer `query` in the given session, creating it if needed.
    ///
    /// A request that was waiting on a session ended in the meantime runs in
    /// a fresh session instead.
    pub async fn get_reply(&self, session_id: &SessionId, query: &str) -> ragbot_core::Result<String> {
        loop {
            let session = self.session(session_id).await?;
            let mut session = session.lock().await;
            if session.closed {
                debug!(session = %session_id, "Session ended while waiting, starting over");
                continue;
            }
            return self.chatbot.get_reply(session.memory.as_mut(), query).await;
        }
    }

    /// The session's current window, oldest first. `None` if it does not exist.
    pub async fn history(&self, session_id: &SessionId) -> ragbot_core::Result<Option<Vec<Message>>> {
        let Some(session) = self.sessions.read().await.get(session_id).cloned() else {
            return Ok(None);
        };
        let session = session.lock().await;
        if session.closed {
            return Ok(None);
        }
        Ok(Some(session.memory.messages().await?))
    }

    /// Destroy a session. Returns whether it existed.
    pub async fn end_session(&self, session_id: &SessionId) -> ragbot_core::Result<bool> {
        let Some(session) = self.sessions.read().await.get(session_id).cloned() else {
            return Ok(false);
        };

        // Waits for any in-flight request on this session to finish.
        let mut guard = session.lock().await;
        if guard.closed {
            return Ok(false);
        }
        guard.closed = true;

        // The entry leaves the map before the lock is released, so queued
        // requests retry against a new session.
        let result = self.factory.destroy(session_id).await;
        let mut sessions = self.sessions.write().await;
        if sessions.get(session_id).is_some_and(|s| Arc::ptr_eq(s, &session)) {
            sessions.remove(session_id);
        }
        drop(sessions);
        drop(guard);

        result?;
        info!(session = %session_id, "Session ended");
        Ok(true)
    }

    /// Ids of all live sessions.
    pub async fn active_sessions(&self) -> Vec<SessionId> {
        self.sessions.read().await.keys().cloned().collect()
    }

    async fn session(&self, session_id: &SessionId) -> ragbot_core::Result<Arc<Mutex<Session>>> {
        if let Some(session) = self.sessions.read().await.get(session_id) {
            return Ok(session.clone());
        }

        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get(session_id) {
            return Ok(session.clone());
        }

        let memory = self.factory.create(session_id).await?;
        let session = Arc::new(Mutex::new(Session {
            id: session_id.clone(),
            memory,
            created_at: Utc::now(),
            closed: false,
        }));
        sessions.insert(session_id.clone(), session.clone());
        info!(session = %session_id, backend = %self.factory.name(), "Session created");
        Ok(session)
    }
}
