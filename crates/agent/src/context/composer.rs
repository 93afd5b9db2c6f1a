//! Prompt composition under a token budget.
//!
//! Builds the instruction prompt (with retrieved context woven in when
//! present) and shrinks the request until it fits:
//!
//! 1. drop the oldest history message while more than one remains
//! 2. then halve the context while it is longer than one character
//! 3. then give up with [`ComposeError::BudgetExhausted`]
//!
//! The caller's history is never touched; trimming works on a copy.

use ragbot_config::ContextTruncation;
use ragbot_core::error::ComposeError;
use ragbot_core::message::Message;
use std::sync::Arc;
use tracing::debug;

use crate::context::token::TokenCounter;

/// A request that fits the budget.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedPrompt {
    /// The instruction prompt, context included
    pub prompt: String,
    /// Retrieved context after any truncation
    pub context: Option<String>,
    /// Conversation history after any trimming, oldest first
    pub history: Vec<Message>,
    /// `count(history, prompt)`, at most the budget
    pub token_count: usize,
}

/// Assembles instruction, context and history within a token budget.
pub struct PromptComposer {
    counter: Arc<TokenCounter>,
    instruction: String,
    budget: usize,
    truncation: ContextTruncation,
}

impl PromptComposer {
    pub fn new(counter: Arc<TokenCounter>, instruction: impl Into<String>, budget: usize) -> Self {
        Self {
            counter,
            instruction: instruction.into(),
            budget,
            truncation: ContextTruncation::default(),
        }
    }

    pub fn with_truncation(mut self, truncation: ContextTruncation) -> Self {
        self.truncation = truncation;
        self
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    pub fn counter(&self) -> &TokenCounter {
        &self.counter
    }

    /// Tokens the prompt costs beyond its un-framed count once it is sent
    /// as a leading `system` message. The budget does not include them.
    pub fn system_framing(&self) -> usize {
        self.counter.count_message(&Message::system(""))
    }

    /// The instruction prompt for `context`.
    pub fn build_prompt(&self, context: Option<&str>) -> String {
        match context {
            Some(context) if !context.is_empty() => format!(
                "{}\nThe information enclosed in backticks will help you answer the query: `{}`\nThe user says:",
                self.instruction, context
            ),
            _ => self.instruction.clone(),
        }
    }

    /// Fit `history` and `context` into the budget.
    pub fn compose(&self, history: &[Message], context: Option<&str>) -> Result<ComposedPrompt, ComposeError> {
        let mut history = history.to_vec();
        let mut context = context.filter(|c| !c.is_empty()).map(str::to_string);
        let mut prompt = self.build_prompt(context.as_deref());
        let mut total = self.counter.count(&history, &prompt);

        while total > self.budget {
            if history.len() > 1 {
                history.remove(0);
                debug!(total, budget = self.budget, remaining = history.len(), "Dropped oldest history message");
            } else if let Some(text) = context.as_mut().filter(|c| c.chars().count() > 1) {
                *text = halve(text, self.truncation);
                prompt = self.build_prompt(Some(text.as_str()));
                debug!(total, budget = self.budget, chars = text.chars().count(), "Halved context");
            } else {
                return Err(ComposeError::BudgetExhausted {
                    tokens: total,
                    budget: self.budget,
                });
            }
            total = self.counter.count(&history, &prompt);
        }

        Ok(ComposedPrompt {
            prompt,
            context,
            history,
            token_count: total,
        })
    }
}

/// Half of `text` by characters, never splitting a code point.
fn halve(text: &str, truncation: ContextTruncation) -> String {
    let keep = text.chars().count() / 2;
    match truncation {
        ContextTruncation::KeepHead => text.chars().take(keep).collect(),
        ContextTruncation::KeepTail => {
            let skip = text.chars().count() - keep;
            text.chars().skip(skip).collect()
        }
    }
}
