//! The RagBot request pipeline.
//!
//! 1. **Record** the user query in the session's message memory
//! 2. **Retrieve** supporting context from the knowledge base (optional)
//! 3. **Compose** the instruction prompt and history within the token budget
//! 4. **Complete** through the configured provider
//! 5. **Record** the reply and return it, citing the source when one was used

pub mod bootstrap;
pub mod chatbot;
pub mod context;
pub mod session;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use bootstrap::{build_chatbot, build_knowledge_base, build_memory_factory, build_registry};
pub use chatbot::{ChatBot, DEFAULT_CITATION_LABEL};
pub use context::{ComposedPrompt, PromptComposer, TiktokenEncoding, TokenCounter, TokenEncoding};
pub use session::{MemoryFactory, Session, SessionRegistry, SqliteMemoryFactory, WindowMemoryFactory};
