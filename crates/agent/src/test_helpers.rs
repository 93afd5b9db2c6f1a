//! Shared test doubles for chatbot and session tests.

use async_trait::async_trait;
use ragbot_core::error::{KnowledgeError, ProviderError};
use ragbot_core::knowledge::{KnowledgeBase, RetrievedContext};
use ragbot_core::message::Message;
use ragbot_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use std::sync::{Arc, Mutex};

use crate::context::{PromptComposer, TokenCounter, TokenEncoding};

/// One token per whitespace-separated word.
pub struct Words;

impl TokenEncoding for Words {
    fn encoded_len(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }
}

pub fn word_composer(instruction: &str, budget: usize) -> PromptComposer {
    PromptComposer::new(Arc::new(TokenCounter::with_encoding(Words)), instruction, budget)
}

/// Replies `reply-N` to the N-th call and records every request.
#[derive(Default)]
pub struct RecordingProvider {
    requests: Mutex<Vec<ProviderRequest>>,
    fail_with: Option<ProviderError>,
}

impl RecordingProvider {
    pub fn failing(error: ProviderError) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            fail_with: Some(error),
        }
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for RecordingProvider {
    fn name(&self) -> &str {
        "recording"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        requests.push(request.clone());
        if let Some(error) = &self.fail_with {
            return Err(error.clone());
        }
        Ok(ProviderResponse {
            message: Message::assistant(format!("reply-{}", requests.len())),
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 1,
                total_tokens: 11,
            }),
            model: request.model,
        })
    }
}

/// Returns the same retrieval outcome for every query.
pub struct FixedKnowledge(pub Result<Option<RetrievedContext>, fn() -> KnowledgeError>);

impl FixedKnowledge {
    pub fn hit(key: &str, content: &str) -> Self {
        Self(Ok(Some(RetrievedContext {
            source_key: key.into(),
            content: content.into(),
            distance: 0.1,
        })))
    }
}

#[async_trait]
impl KnowledgeBase for FixedKnowledge {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn retrieve(&self, _query: &str, _k: usize) -> Result<Vec<RetrievedContext>, KnowledgeError> {
        match &self.0 {
            Ok(found) => Ok(found.iter().cloned().collect()),
            Err(make) => Err(make()),
        }
    }
}
