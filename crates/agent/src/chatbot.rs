//! Request orchestration: one user query in, one reply out.
//!
//! Flow per request:
//!
//! 1. record the query in the session's message memory
//! 2. snapshot the window
//! 3. look up supporting context, if a knowledge base is attached
//! 4. compose the prompt within the token budget
//! 5. ask the provider for a completion
//! 6. record the reply (which trims the window)
//! 7. return the reply, with a citation when context was used

use ragbot_core::knowledge::KnowledgeBase;
use ragbot_core::memory::MessageMemory;
use ragbot_core::message::Message;
use ragbot_core::provider::{GenerationParams, Provider, ProviderRequest};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::context::PromptComposer;

/// Default label placed before the cited source key.
pub const DEFAULT_CITATION_LABEL: &str = "This link was used to generate an answer";

/// The chatbot: provider, composer and optional knowledge base.
///
/// Stateless between requests; the conversation lives in the
/// [`MessageMemory`] passed to [`ChatBot::get_reply`].
pub struct ChatBot {
    /// The LLM provider to use
    provider: Arc<dyn Provider>,

    /// The model to use
    model: String,

    /// Sampling parameters sent with every completion
    params: GenerationParams,

    /// Budget-aware prompt builder
    composer: PromptComposer,

    /// Optional retrieval source
    knowledge: Option<Arc<dyn KnowledgeBase>>,

    /// Label for the appended source key; `None` disables citations
    citation_label: Option<String>,

    /// Prefixed to every user query before it is recorded
    custom_append_message: Option<String>,
}

impl ChatBot {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, composer: PromptComposer) -> Self {
        Self {
            provider,
            model: model.into(),
            params: GenerationParams::default(),
            composer,
            knowledge: None,
            citation_label: Some(DEFAULT_CITATION_LABEL.to_string()),
            custom_append_message: None,
        }
    }

    pub fn with_generation(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    /// Attach a knowledge base for context retrieval.
    pub fn with_knowledge(mut self, knowledge: Arc<dyn KnowledgeBase>) -> Self {
        self.knowledge = Some(knowledge);
        self
    }

    /// Set the citation label, or disable citations with `None`.
    pub fn with_citation_label(mut self, label: Option<String>) -> Self {
        self.citation_label = label;
        self
    }

    pub fn with_custom_append_message(mut self, message: Option<String>) -> Self {
        self.custom_append_message = message.filter(|m| !m.is_empty());
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn has_knowledge(&self) -> bool {
        self.knowledge.is_some()
    }

    pub fn composer(&self) -> &PromptComposer {
        &self.composer
    }

    /// Answer `query` within the conversation held by `memory`.
    ///
    /// Retrieval failures degrade to "no context" except a dimension
    /// mismatch. Budget exhaustion and completion failures are returned
    /// as-is; the query stays recorded but no reply is.
    pub async fn get_reply(&self, memory: &mut dyn MessageMemory, query: &str) -> ragbot_core::Result<String> {
        let latest = match &self.custom_append_message {
            Some(prefix) => format!("{prefix}{query}"),
            None => query.to_string(),
        };
        memory.add_user_query(&latest).await?;

        let history = memory.messages().await?;

        // Retrieval sees the raw query, without the custom prefix.
        let context = match &self.knowledge {
            Some(knowledge) => knowledge.get_context(query).await?,
            None => None,
        };
        if let Some(ctx) = &context {
            debug!(source = %ctx.source_key, distance = ctx.distance, "Retrieved context");
        }

        let composed = self
            .composer
            .compose(&history, context.as_ref().map(|c| c.content.as_str()))?;
        debug!(
            tokens = composed.token_count,
            request_tokens = composed.token_count + self.composer.system_framing(),
            budget = self.composer.budget(),
            history = composed.history.len(),
            "Composed prompt"
        );

        let mut messages = Vec::with_capacity(composed.history.len() + 1);
        messages.push(Message::system(composed.prompt));
        messages.extend(composed.history);

        let request = ProviderRequest {
            model: self.model.clone(),
            messages,
            params: self.params.clone(),
        };

        let response = match self.provider.complete(request).await {
            Ok(response) => response,
            Err(e) => {
                error!(provider = %self.provider.name(), model = %self.model, error = %e, "Completion failed");
                return Err(e.into());
            }
        };

        if let Some(usage) = &response.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Provider usage"
            );
        }

        let mut reply = response.message.content.clone();
        memory.add_bot_response(response.message).await?;
        info!(model = %response.model, chars = reply.len(), "Reply generated");

        if let (Some(ctx), Some(label)) = (&context, &self.citation_label) {
            reply.push_str(&format!("\n\n{label}: {}", ctx.source_key));
        }

        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use ragbot_core::error::{ComposeError, KnowledgeError, ProviderError};
    use ragbot_core::message::Role;
    use ragbot_memory::WindowMemory;

    fn chatbot(provider: Arc<RecordingProvider>) -> ChatBot {
        ChatBot::new(provider, "test-model", word_composer("Be helpful.", 10_000))
    }

    #[tokio::test]
    async fn reply_is_recorded_after_query() {
        let provider = Arc::new(RecordingProvider::default());
        let bot = chatbot(provider.clone());
        let mut memory = WindowMemory::new(5).unwrap();

        let reply = bot.get_reply(&mut memory, "hello").await.unwrap();
        assert_eq!(reply, "reply-1");

        let messages = memory.messages().await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content, "hello");
        assert_eq!(messages[1].content, "reply-1");
    }

    #[tokio::test]
    async fn request_starts_with_system_prompt() {
        let provider = Arc::new(RecordingProvider::default());
        let bot = chatbot(provider.clone()).with_generation(GenerationParams {
            temperature: 0.2,
            ..GenerationParams::default()
        });
        let mut memory = WindowMemory::new(5).unwrap();
        bot.get_reply(&mut memory, "hello").await.unwrap();

        let request = &provider.requests()[0];
        assert_eq!(request.model, "test-model");
        assert_eq!(request.params.temperature, 0.2);
        assert_eq!(request.messages[0].role, Role::System);
        assert_eq!(request.messages[0].content, "Be helpful.");
        assert_eq!(request.messages[1].content, "hello");
    }

    #[tokio::test]
    async fn context_adds_citation() {
        let provider = Arc::new(RecordingProvider::default());
        let bot = chatbot(provider.clone())
            .with_knowledge(Arc::new(FixedKnowledge::hit("faq-3", "Reset it in settings.")));
        let mut memory = WindowMemory::new(5).unwrap();

        let reply = bot.get_reply(&mut memory, "How do I reset my password?").await.unwrap();
        assert_eq!(
            reply,
            "reply-1\n\nThis link was used to generate an answer: faq-3"
        );
        assert!(provider.requests()[0].messages[0].content.contains("`Reset it in settings.`"));

        // The stored reply carries no citation.
        assert_eq!(memory.messages().await.unwrap()[1].content, "reply-1");
    }

    #[tokio::test]
    async fn citations_can_be_disabled() {
        let provider = Arc::new(RecordingProvider::default());
        let bot = chatbot(provider)
            .with_knowledge(Arc::new(FixedKnowledge::hit("faq-3", "text")))
            .with_citation_label(None);
        let mut memory = WindowMemory::new(5).unwrap();
        assert_eq!(bot.get_reply(&mut memory, "q").await.unwrap(), "reply-1");
    }

    #[tokio::test]
    async fn retrieval_failure_continues_without_context() {
        let provider = Arc::new(RecordingProvider::default());
        let bot = chatbot(provider.clone())
            .with_knowledge(Arc::new(FixedKnowledge(Err(|| KnowledgeError::SearchFailed("down".into())))));
        let mut memory = WindowMemory::new(5).unwrap();

        assert_eq!(bot.get_reply(&mut memory, "q").await.unwrap(), "reply-1");
        assert_eq!(provider.requests()[0].messages[0].content, "Be helpful.");
    }

    #[tokio::test]
    async fn dimension_mismatch_aborts() {
        let provider = Arc::new(RecordingProvider::default());
        let bot = chatbot(provider.clone()).with_knowledge(Arc::new(FixedKnowledge(Err(|| {
            KnowledgeError::DimensionMismatch {
                expected: 1536,
                actual: 3,
            }
        }))));
        let mut memory = WindowMemory::new(5).unwrap();

        let err = bot.get_reply(&mut memory, "q").await.unwrap_err();
        assert!(matches!(
            err,
            ragbot_core::Error::Knowledge(KnowledgeError::DimensionMismatch { .. })
        ));
        assert!(provider.requests().is_empty());
    }

    #[tokio::test]
    async fn completion_failure_is_returned_unchanged() {
        let provider = Arc::new(RecordingProvider::failing(ProviderError::RateLimited {
            retry_after_secs: 30,
        }));
        let bot = chatbot(provider);
        let mut memory = WindowMemory::new(5).unwrap();

        let err = bot.get_reply(&mut memory, "q").await.unwrap_err();
        assert!(matches!(
            err,
            ragbot_core::Error::Provider(ProviderError::RateLimited { retry_after_secs: 30 })
        ));
        // Only the query was recorded.
        assert_eq!(memory.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn exhausted_budget_is_fatal() {
        let provider = Arc::new(RecordingProvider::default());
        let bot = ChatBot::new(provider.clone(), "m", word_composer("Be helpful.", 3));
        let mut memory = WindowMemory::new(5).unwrap();

        let err = bot.get_reply(&mut memory, "hello").await.unwrap_err();
        assert!(matches!(err, ragbot_core::Error::Compose(ComposeError::BudgetExhausted { .. })));
        assert!(provider.requests().is_empty());
    }

    #[tokio::test]
    async fn custom_append_message_prefixes_query() {
        let provider = Arc::new(RecordingProvider::default());
        let bot = chatbot(provider).with_custom_append_message(Some("As a pirate: ".into()));
        let mut memory = WindowMemory::new(5).unwrap();
        bot.get_reply(&mut memory, "hello").await.unwrap();

        assert_eq!(memory.messages().await.unwrap()[0].content, "As a pirate: hello");
    }

    /// Records every query it is asked about.
    #[derive(Default)]
    struct QueryLog(std::sync::Mutex<Vec<String>>);

    #[async_trait::async_trait]
    impl KnowledgeBase for QueryLog {
        fn name(&self) -> &str {
            "query_log"
        }

        async fn retrieve(
            &self,
            query: &str,
            _k: usize,
        ) -> Result<Vec<ragbot_core::knowledge::RetrievedContext>, KnowledgeError> {
            self.0.lock().unwrap().push(query.to_string());
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn retrieval_uses_query_without_custom_prefix() {
        let knowledge = Arc::new(QueryLog::default());
        let bot = chatbot(Arc::new(RecordingProvider::default()))
            .with_knowledge(knowledge.clone())
            .with_custom_append_message(Some("Answer as a pirate: ".into()));
        let mut memory = WindowMemory::new(5).unwrap();

        bot.get_reply(&mut memory, "How do I reset my password?").await.unwrap();

        assert_eq!(*knowledge.0.lock().unwrap(), vec!["How do I reset my password?"]);
        assert_eq!(
            memory.messages().await.unwrap()[0].content,
            "Answer as a pirate: How do I reset my password?"
        );
    }

    #[tokio::test]
    async fn submitted_request_adds_only_system_framing() {
        let provider = Arc::new(RecordingProvider::default());
        let bot = ChatBot::new(provider.clone(), "m", word_composer("Be helpful.", 12));
        let mut memory = WindowMemory::new(5).unwrap();
        bot.get_reply(&mut memory, "hello").await.unwrap();

        let request = &provider.requests()[0];
        let counter = bot.composer().counter();
        let budgeted = counter.count(&request.messages[1..], &request.messages[0].content);
        assert!(budgeted <= 12);
        // 4 framing + 1 role token for the system message
        assert_eq!(bot.composer().system_framing(), 5);
        assert_eq!(
            counter.count(&request.messages, ""),
            budgeted + bot.composer().system_framing()
        );
    }
}
