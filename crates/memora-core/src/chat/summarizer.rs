//! Rollover summaries.
//!
//! `ConversationSummarizer` condenses a full conversation into the single
//! assistant message that seeds its successor. The remote provider is tried
//! first; any failure yields the deterministic fallback, so summarizing
//! never fails.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use memora_types::conversation::{ChatRole, Conversation};
use memora_types::llm::{CompletionRequest, LlmError, Message, MessageRole};

use crate::llm::box_provider::BoxLlmProvider;
use crate::memory::extractor::RuleBasedExtractor;

const SUMMARY_SYSTEM_PROMPT: &str = r#"You are continuing a long personal conversation in a fresh session. Summarize the conversation below so you can pick it up naturally. Preserve:
1. What the user shared about their life, goals, and feelings
2. Any open threads the user may want to return to
3. The tone of the conversation

Write in second person, addressed to the user (e.g., "You told me about..."). Keep it under 150 words."#;

const SUMMARY_REQUEST: &str = "Please summarize our conversation so far.";

#[derive(Clone)]
pub struct ConversationSummarizer {
    provider: Option<Arc<BoxLlmProvider>>,
    model: String,
    timeout: Duration,
}

impl ConversationSummarizer {
    pub fn rule_based() -> Self {
        Self {
            provider: None,
            model: String::new(),
            timeout: Duration::ZERO,
        }
    }

    pub fn with_provider(
        provider: Arc<BoxLlmProvider>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            provider: Some(provider),
            model: model.into(),
            timeout,
        }
    }

    /// Summarize `conversation`, falling back to [`Self::fallback_summary`].
    #[tracing::instrument(
        name = "summarize_conversation",
        skip_all,
        fields(conversation_id = %conversation.id, message_count = conversation.messages.len())
    )]
    pub async fn summarize(&self, conversation: &Conversation) -> String {
        let Some(provider) = &self.provider else {
            return Self::fallback_summary(conversation);
        };

        match self.summarize_remote(provider, conversation).await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::warn!(
                    provider = provider.name(),
                    error = %e,
                    "Summarization unavailable; using deterministic fallback"
                );
                Self::fallback_summary(conversation)
            }
        }
    }

    async fn summarize_remote(
        &self,
        provider: &BoxLlmProvider,
        conversation: &Conversation,
    ) -> Result<String, LlmError> {
        // The transcript goes over as ordered turns, then one closing request.
        let messages = conversation
            .messages
            .iter()
            .map(|m| Message {
                role: MessageRole::from(m.role),
                content: m.content.clone(),
            })
            .chain(std::iter::once(Message {
                role: MessageRole::User,
                content: SUMMARY_REQUEST.to_string(),
            }))
            .collect();

        let request = CompletionRequest {
            model: self.model.clone(),
            messages,
            system: Some(SUMMARY_SYSTEM_PROMPT.to_string()),
            max_tokens: 512,
            temperature: Some(0.0),
        };

        let response = provider.complete_with_timeout(&request, self.timeout).await?;
        let summary = response.content.trim();
        if summary.is_empty() {
            return Err(LlmError::Deserialization("empty summary".to_string()));
        }
        Ok(summary.to_string())
    }

    /// Deterministic summary built from message count, topic tags of the
    /// user's messages, and the user's last message.
    pub fn fallback_summary(conversation: &Conversation) -> String {
        let mut summary = format!(
            "Summary of our previous conversation ({} messages).",
            conversation.messages.len()
        );

        let user_messages: Vec<&str> = conversation
            .messages
            .iter()
            .filter(|m| m.role == ChatRole::User)
            .map(|m| m.content.as_str())
            .collect();

        let topics: BTreeSet<String> = user_messages
            .iter()
            .flat_map(|text| RuleBasedExtractor::topic_tags(text))
            .collect();
        if !topics.is_empty() {
            let joined = topics.into_iter().collect::<Vec<_>>().join(", ");
            summary.push_str(&format!(" Topics: {joined}."));
        }

        if let Some(last) = user_messages.last() {
            summary.push_str(&format!(
                " Last thing you shared: {}",
                RuleBasedExtractor::summarize(last)
            ));
        }

        summary
    }
}

impl std::fmt::Debug for ConversationSummarizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationSummarizer")
            .field("remote", &self.provider.is_some())
            .field("model", &self.model)
            .finish()
    }
}
