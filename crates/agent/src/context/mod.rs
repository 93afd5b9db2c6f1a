//! Context assembly for a single request.
//!
//! | Piece | Source | Shrink strategy |
//! |-------|--------|-----------------|
//! | Instruction | Configured prompt | Never trimmed |
//! | Retrieved context | Knowledge base | Halved once history is down to one message |
//! | Conversation history | Message memory | Oldest message dropped first |

pub mod composer;
pub mod token;

pub use composer::{ComposedPrompt, PromptComposer};
pub use token::{TiktokenEncoding, TokenCounter, TokenEncoding};
