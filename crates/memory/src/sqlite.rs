//! SQLite-backed session memory.
//!
//! A single database holds the windows of many sessions in one table:
//! - `session_messages` keyed by an autoincrement `iid`, which fixes the
//!   conversational order of each session's rows
//!
//! [`SqliteSessionStore`] owns the pool; each [`SqliteSessionMemory`] is a
//! handle onto one session's rows with its own capacity.

use async_trait::async_trait;
use chrono::Utc;
use ragbot_core::error::MemoryError;
use ragbot_core::memory::MessageMemory;
use ragbot_core::message::{Message, Role, SessionId};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

/// Owner of the session database.
#[derive(Clone)]
pub struct SqliteSessionStore {
    pool: SqlitePool,
}

impl SqliteSessionStore {
    /// Open (or create) the session database at `path`.
    ///
    /// Pass `"sqlite::memory:"` for an ephemeral database (useful for tests).
    pub async fn new(path: &str) -> Result<Self, MemoryError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| MemoryError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        // Every connection to an in-memory database sees its own database.
        let max_connections = if path.contains(":memory:") { 1 } else { 4 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| MemoryError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite session store initialized at {path}");
        Ok(store)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, MemoryError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), MemoryError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS session_messages (
                iid          INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id   TEXT NOT NULL,
                id           TEXT NOT NULL,
                role         TEXT NOT NULL,
                content      TEXT NOT NULL,
                name         TEXT,
                created_at   TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::MigrationFailed(format!("session_messages table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_session_messages_session ON session_messages(session_id, iid)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::MigrationFailed(format!("session index: {e}")))?;

        debug!("SQLite session migrations complete");
        Ok(())
    }

    /// A memory handle for one session. Rows already stored for the session
    /// are picked up as-is.
    pub fn session(&self, session_id: &SessionId, capacity: usize) -> Result<SqliteSessionMemory, MemoryError> {
        if capacity == 0 {
            return Err(MemoryError::InvalidCapacity(capacity));
        }
        Ok(SqliteSessionMemory {
            pool: self.pool.clone(),
            session_id: session_id.0.clone(),
            capacity,
        })
    }

    /// Delete every stored message of a session. Returns the number removed.
    pub async fn delete_session(&self, session_id: &SessionId) -> Result<u64, MemoryError> {
        let result = sqlx::query("DELETE FROM session_messages WHERE session_id = ?1")
            .bind(&session_id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| MemoryError::Storage(format!("DELETE session failed: {e}")))?;
        Ok(result.rows_affected())
    }

    /// Ids of every session with stored messages.
    pub async fn sessions(&self) -> Result<Vec<SessionId>, MemoryError> {
        let rows = sqlx::query("SELECT DISTINCT session_id FROM session_messages ORDER BY session_id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MemoryError::QueryFailed(format!("list sessions: {e}")))?;

        rows.iter()
            .map(|row| {
                row.try_get::<String, _>("session_id")
                    .map(SessionId)
                    .map_err(|e| MemoryError::QueryFailed(format!("session_id column: {e}")))
            })
            .collect()
    }
}

/// One session's window, persisted in SQLite.
pub struct SqliteSessionMemory {
    pool: SqlitePool,
    session_id: String,
    capacity: usize,
}

impl SqliteSessionMemory {
    async fn insert(&self, message: &Message) -> Result<(), MemoryError> {
        sqlx::query(
            r#"
            INSERT INTO session_messages (session_id, id, role, content, name, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&self.session_id)
        .bind(&message.id)
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(&message.name)
        .bind(message.timestamp.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::Storage(format!("INSERT failed: {e}")))?;
        Ok(())
    }

    fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Result<Message, MemoryError> {
        let id: String = row
            .try_get("id")
            .map_err(|e| MemoryError::QueryFailed(format!("id column: {e}")))?;
        let role_str: String = row
            .try_get("role")
            .map_err(|e| MemoryError::QueryFailed(format!("role column: {e}")))?;
        let content: String = row
            .try_get("content")
            .map_err(|e| MemoryError::QueryFailed(format!("content column: {e}")))?;
        let name: Option<String> = row
            .try_get("name")
            .map_err(|e| MemoryError::QueryFailed(format!("name column: {e}")))?;
        let created_at_str: String = row
            .try_get("created_at")
            .map_err(|e| MemoryError::QueryFailed(format!("created_at column: {e}")))?;

        let role = Role::from_str(&role_str).map_err(MemoryError::QueryFailed)?;

        let timestamp = chrono::DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Ok(Message {
            id,
            role,
            content,
            name,
            timestamp,
        })
    }
}

#[async_trait]
impl MessageMemory for SqliteSessionMemory {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    async fn add_user_query(&mut self, text: &str) -> Result<(), MemoryError> {
        self.insert(&Message::user(text)).await
    }

    async fn add_bot_response(&mut self, message: Message) -> Result<(), MemoryError> {
        self.insert(&message).await?;
        self.trim().await
    }

    async fn messages(&self) -> Result<Vec<Message>, MemoryError> {
        let rows = sqlx::query("SELECT * FROM session_messages WHERE session_id = ?1 ORDER BY iid")
            .bind(&self.session_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MemoryError::QueryFailed(format!("SELECT messages: {e}")))?;

        rows.iter().map(Self::row_to_message).collect()
    }

    async fn trim(&mut self) -> Result<(), MemoryError> {
        let result = sqlx::query(
            r#"
            DELETE FROM session_messages
            WHERE session_id = ?1
              AND iid NOT IN (
                  SELECT iid FROM session_messages
                  WHERE session_id = ?1
                  ORDER BY iid DESC
                  LIMIT ?2
              )
            "#,
        )
        .bind(&self.session_id)
        .bind(self.capacity as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::Storage(format!("TRIM failed: {e}")))?;

        if result.rows_affected() > 0 {
            debug!(
                session = %self.session_id,
                evicted = result.rows_affected(),
                capacity = self.capacity,
                "Trimmed session window"
            );
        }
        Ok(())
    }

    async fn len(&self) -> Result<usize, MemoryError> {
        let row = sqlx::query("SELECT COUNT(*) as cnt FROM session_messages WHERE session_id = ?1")
            .bind(&self.session_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| MemoryError::QueryFailed(format!("COUNT: {e}")))?;

        let cnt: i64 = row
            .try_get("cnt")
            .map_err(|e| MemoryError::QueryFailed(format!("cnt column: {e}")))?;

        Ok(cnt as usize)
    }

    async fn clear(&mut self) -> Result<(), MemoryError> {
        sqlx::query("DELETE FROM session_messages WHERE session_id = ?1")
            .bind(&self.session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| MemoryError::Storage(format!("CLEAR failed: {e}")))?;
        Ok(())
    }
}
