//! Error types for the RagBot domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all RagBot operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Memory errors ---
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    // --- Knowledge base errors ---
    #[error("Knowledge error: {0}")]
    Knowledge(#[from] KnowledgeError),

    // --- Prompt composition errors ---
    #[error("Compose error: {0}")]
    Compose(#[from] ComposeError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Invalid memory capacity: {0} (must be at least 1)")]
    InvalidCapacity(usize),
}

#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),

    #[error("Search failed: {0}")]
    SearchFailed(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Knowledge item already exists: {0}")]
    DuplicateKey(String),

    #[error("Invalid knowledge key: {0}")]
    InvalidKey(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid ingest line {line}: {reason}")]
    InvalidIngestLine { line: usize, reason: String },
}

impl KnowledgeError {
    /// Whether this error must abort the request instead of degrading to
    /// "no context". Only configuration mismatches qualify.
    pub fn is_fatal(&self) -> bool {
        matches!(self, KnowledgeError::DimensionMismatch { .. })
    }
}

#[derive(Debug, Clone, Error)]
pub enum ComposeError {
    #[error(
        "Token budget exhausted: {tokens} tokens exceed budget of {budget} with nothing left to trim"
    )]
    BudgetExhausted { tokens: usize, budget: usize },
}
