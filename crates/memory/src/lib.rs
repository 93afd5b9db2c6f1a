//! Message Memory implementations for RagBot.

pub mod window;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use window::WindowMemory;

#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteSessionMemory, SqliteSessionStore};
