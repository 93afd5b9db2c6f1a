//! Token counting for chat requests.
//!
//! Counts follow the chat wire format: every message costs 4 tokens of
//! framing plus the encoded length of each field value sent (role, content,
//! and name when present). A named message omits the role framing token, so
//! it deducts 1. The reply is primed with 2 more tokens. The instruction
//! prompt is counted un-framed on top.

use ragbot_core::message::Message;
use tiktoken_rs::CoreBPE;
use tracing::{debug, warn};

/// Framing tokens around every message.
const TOKENS_PER_MESSAGE: usize = 4;

/// Tokens priming the assistant's reply.
const REPLY_PRIMER_TOKENS: usize = 2;

/// A text encoding that can report how many tokens a string takes.
pub trait TokenEncoding: Send + Sync {
    fn encoded_len(&self, text: &str) -> usize;
}

/// BPE encoding from `tiktoken-rs`.
pub struct TiktokenEncoding {
    bpe: CoreBPE,
}

impl TiktokenEncoding {
    /// The encoding used by `model`, or `cl100k_base` when the model is
    /// unknown. The flag reports whether the fallback was taken.
    pub fn for_model(model: &str) -> ragbot_core::Result<(Self, bool)> {
        match tiktoken_rs::get_bpe_from_model(model) {
            Ok(bpe) => Ok((Self { bpe }, false)),
            Err(e) => {
                warn!(%model, error = %e, "No tokenizer for model, falling back to cl100k_base");
                let bpe = tiktoken_rs::cl100k_base()
                    .map_err(|e| ragbot_core::Error::config(format!("cl100k_base unavailable: {e}")))?;
                Ok((Self { bpe }, true))
            }
        }
    }
}

impl TokenEncoding for TiktokenEncoding {
    fn encoded_len(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        self.bpe.encode_ordinary(text).len()
    }
}

/// Counts the tokens a composed request will consume.
pub struct TokenCounter {
    encoding: Box<dyn TokenEncoding>,
    fallback: bool,
}

impl TokenCounter {
    /// Counter using the BPE encoding of `model`.
    pub fn for_model(model: &str) -> ragbot_core::Result<Self> {
        let (encoding, fallback) = TiktokenEncoding::for_model(model)?;
        Ok(Self {
            encoding: Box::new(encoding),
            fallback,
        })
    }

    /// Counter over an arbitrary encoding.
    pub fn with_encoding(encoding: impl TokenEncoding + 'static) -> Self {
        Self {
            encoding: Box::new(encoding),
            fallback: false,
        }
    }

    /// Whether the model was unknown and `cl100k_base` is used instead.
    pub fn is_fallback(&self) -> bool {
        self.fallback
    }

    /// Encoded length of a bare string.
    pub fn count_text(&self, text: &str) -> usize {
        self.encoding.encoded_len(text)
    }

    /// Tokens for one framed message.
    pub fn count_message(&self, message: &Message) -> usize {
        let mut tokens = TOKENS_PER_MESSAGE
            + self.count_text(message.role.as_str())
            + self.count_text(&message.content);
        if let Some(name) = &message.name {
            tokens = (tokens + self.count_text(name)).saturating_sub(1);
        }
        tokens
    }

    /// Total tokens for `messages` plus the un-framed `prompt`.
    pub fn count(&self, messages: &[Message], prompt: &str) -> usize {
        let framed: usize = messages.iter().map(|m| self.count_message(m)).sum();
        let total = framed + REPLY_PRIMER_TOKENS + self.count_text(prompt);
        debug!(messages = messages.len(), total, "Counted request tokens");
        total
    }
}
