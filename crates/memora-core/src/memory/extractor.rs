//! Memory extraction: raw message text in, a scored and tagged memory out.
//!
//! `RuleBasedExtractor` is a pure keyword scorer and always succeeds.
//! `MemoryExtractor` optionally asks a text-generation provider first and
//! falls back to the rule-based result on any failure (timeout, transport
//! error, unparseable reply).

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use memora_types::llm::{CompletionRequest, LlmError, Message, MessageRole};
use memora_types::memory::{
    EmotionalTone, Memory, MemoryKind, MemoryMetadata, clamp_importance,
};

use crate::llm::box_provider::BoxLlmProvider;

/// Tag used when the text matched no topic and no emotion.
pub const DEFAULT_TAG: &str = "conversation";

/// Maximum summary length in characters before truncation.
const SUMMARY_CHAR_LIMIT: usize = 100;

/// Importance tiers, highest first. The first tier with a matching keyword wins.
const IMPORTANCE_TIERS: &[(u8, &[&str])] = &[
    (8, &["important", "significant", "major"]),
    (7, &["family", "relationship", "love"]),
    (6, &["goal", "achievement", "milestone"]),
];

const BASELINE_IMPORTANCE: u8 = 5;

/// Topic rules: any keyword adds every tag in the rule.
const TOPIC_RULES: &[(&[&str], &[&str])] = &[
    (&["work", "job", "career"], &["work", "career"]),
    (&["family", "parent", "child"], &["family"]),
    (&["friend", "social"], &["relationships", "social"]),
    (&["health", "exercise", "wellness"], &["health", "wellness"]),
    (&["travel", "trip", "vacation"], &["travel", "experience"]),
];

const POSITIVE_KEYWORDS: &[&str] = &["happy", "joy", "excited"];
const CHALLENGING_KEYWORDS: &[&str] = &["sad", "upset", "worried"];

const EXTRACTION_SYSTEM_PROMPT: &str = r#"You score a single message from a personal journal-style chat for long-term memory.

Return ONLY a JSON object with exactly these fields:
- "importance": integer 1-10 (10 = life-defining, 1 = trivial)
- "tags": array of short lowercase topic strings (e.g. "work", "family", "health")
- "summary": string, one sentence of at most 100 characters
- "emotionalContext": "positive", "challenging", or null

Example:
{"importance": 7, "tags": ["family"], "summary": "Visited parents for the weekend.", "emotionalContext": "positive"}"#;

/// Scores produced for one piece of text, before it becomes a [`Memory`].
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedMemory {
    pub importance: u8,
    pub tags: BTreeSet<String>,
    pub summary: String,
    pub emotion: Option<EmotionalTone>,
}

impl ExtractedMemory {
    /// Build a new memory record owned by `user_id`.
    pub fn into_memory(
        self,
        user_id: Uuid,
        kind: MemoryKind,
        content: impl Into<String>,
        source_conversation_id: Option<Uuid>,
    ) -> Memory {
        let now = Utc::now();
        let metadata = self.emotion.map(|emotion| MemoryMetadata {
            emotion: Some(emotion),
            ..MemoryMetadata::default()
        });
        Memory {
            id: Uuid::now_v7(),
            user_id,
            kind,
            content: content.into(),
            summary: self.summary,
            importance: self.importance,
            tags: self.tags,
            metadata,
            source_conversation_id,
            created_at: now,
            updated_at: now,
        }
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// Deterministic keyword scorer. Matching is case-insensitive substring.
pub struct RuleBasedExtractor;

impl RuleBasedExtractor {
    pub fn extract(text: &str) -> ExtractedMemory {
        let lowered = text.to_lowercase();

        let importance = IMPORTANCE_TIERS
            .iter()
            .find(|(_, keywords)| contains_any(&lowered, keywords))
            .map(|(score, _)| *score)
            .unwrap_or(BASELINE_IMPORTANCE);

        let mut tags = Self::topic_tags_lowered(&lowered);

        let emotion = if contains_any(&lowered, POSITIVE_KEYWORDS) {
            tags.insert("positive".to_string());
            Some(EmotionalTone::Positive)
        } else if contains_any(&lowered, CHALLENGING_KEYWORDS) {
            tags.insert("emotional".to_string());
            Some(EmotionalTone::Challenging)
        } else {
            None
        };

        if tags.is_empty() {
            tags.insert(DEFAULT_TAG.to_string());
        }

        ExtractedMemory {
            importance,
            tags,
            summary: Self::summarize(text),
            emotion,
        }
    }

    /// Topic tags only (no emotion tags, no default tag).
    pub fn topic_tags(text: &str) -> BTreeSet<String> {
        Self::topic_tags_lowered(&text.to_lowercase())
    }

    fn topic_tags_lowered(lowered: &str) -> BTreeSet<String> {
        TOPIC_RULES
            .iter()
            .filter(|(keywords, _)| contains_any(lowered, keywords))
            .flat_map(|(_, tags)| tags.iter().map(|t| t.to_string()))
            .collect()
    }

    /// First 100 characters, with "..." appended when truncated.
    pub fn summarize(text: &str) -> String {
        let mut chars = text.chars();
        let head: String = chars.by_ref().take(SUMMARY_CHAR_LIMIT).collect();
        if chars.next().is_some() {
            format!("{head}...")
        } else {
            head
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawExtraction {
    importance: i64,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    summary: String,
    #[serde(default, rename = "emotionalContext")]
    emotional_context: Option<String>,
}

/// Strip a surrounding Markdown code fence, if the model added one.
pub(crate) fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn parse_remote(raw: &str, text: &str) -> Result<ExtractedMemory, LlmError> {
    let parsed: RawExtraction = serde_json::from_str(strip_code_fence(raw))
        .map_err(|e| LlmError::Deserialization(e.to_string()))?;

    let mut tags: BTreeSet<String> = parsed
        .tags
        .into_iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    if tags.is_empty() {
        tags.insert(DEFAULT_TAG.to_string());
    }

    let summary = match parsed.summary.trim() {
        "" => RuleBasedExtractor::summarize(text),
        s => s.to_string(),
    };

    Ok(ExtractedMemory {
        importance: clamp_importance(parsed.importance),
        tags,
        summary,
        emotion: parsed
            .emotional_context
            .and_then(|e| e.parse::<EmotionalTone>().ok()),
    })
}

/// Remote-first extractor with a deterministic fallback.
#[derive(Clone)]
pub struct MemoryExtractor {
    provider: Option<Arc<BoxLlmProvider>>,
    model: String,
    timeout: Duration,
}

impl MemoryExtractor {
    /// An extractor that never calls out.
    pub fn rule_based() -> Self {
        Self {
            provider: None,
            model: String::new(),
            timeout: Duration::ZERO,
        }
    }

    pub fn with_provider(provider: Arc<BoxLlmProvider>, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            provider: Some(provider),
            model: model.into(),
            timeout,
        }
    }

    pub fn is_remote(&self) -> bool {
        self.provider.is_some()
    }

    /// Score `text`. Never fails: remote errors degrade to rule-based mode.
    #[tracing::instrument(name = "extract_memory", skip_all, fields(chars = text.chars().count()))]
    pub async fn extract(&self, text: &str) -> ExtractedMemory {
        let Some(provider) = &self.provider else {
            return RuleBasedExtractor::extract(text);
        };

        match self.extract_remote(provider, text).await {
            Ok(extracted) => extracted,
            Err(e) => {
                tracing::warn!(
                    provider = provider.name(),
                    error = %e,
                    "Remote memory extraction unavailable; using rule-based fallback"
                );
                RuleBasedExtractor::extract(text)
            }
        }
    }

    async fn extract_remote(
        &self,
        provider: &BoxLlmProvider,
        text: &str,
    ) -> Result<ExtractedMemory, LlmError> {
        let request = CompletionRequest {
            model: self.model.clone(),
            messages: vec![Message {
                role: MessageRole::User,
                content: text.to_string(),
            }],
            system: Some(EXTRACTION_SYSTEM_PROMPT.to_string()),
            max_tokens: 256,
            temperature: Some(0.0),
        };
        let response = provider.complete_with_timeout(&request, self.timeout).await?;
        parse_remote(&response.content, text)
    }
}

impl std::fmt::Debug for MemoryExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryExtractor")
            .field("remote", &self.is_remote())
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::box_provider::testing::{Script, ScriptedProvider};

    fn tags(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_promotion_message_scores_high_with_career_tags() {
        let extracted = RuleBasedExtractor::extract(
            "I got a big promotion, such an important day for my career!",
        );
        assert_eq!(extracted.importance, 8);
        assert!(extracted.tags.is_superset(&tags(&["work", "career"])));
        assert_eq!(extracted.emotion, None);
    }

    #[test]
    fn test_importance_tiers_take_first_match() {
        assert_eq!(RuleBasedExtractor::extract("A MAJOR family event").importance, 8);
        assert_eq!(RuleBasedExtractor::extract("I love my dog").importance, 7);
        assert_eq!(RuleBasedExtractor::extract("Reached my goal").importance, 6);
        assert_eq!(RuleBasedExtractor::extract("Had lunch").importance, 5);
    }

    #[test]
    fn test_no_matches_gets_default_tag() {
        let extracted = RuleBasedExtractor::extract("Had lunch");
        assert_eq!(extracted.tags, tags(&["conversation"]));
        assert_eq!(extracted.summary, "Had lunch");
    }

    #[test]
    fn test_emotion_tag_suppresses_default_tag() {
        let extracted = RuleBasedExtractor::extract("I'm so happy today");
        assert_eq!(extracted.emotion, Some(EmotionalTone::Positive));
        assert_eq!(extracted.tags, tags(&["positive"]));
    }

    #[test]
    fn test_positive_wins_over_challenging() {
        let extracted = RuleBasedExtractor::extract("Happy but also a bit worried");
        assert_eq!(extracted.emotion, Some(EmotionalTone::Positive));
        assert!(!extracted.tags.contains("emotional"));
    }

    #[test]
    fn test_challenging_adds_emotional_tag() {
        let extracted = RuleBasedExtractor::extract("Worried about my parent's health");
        assert_eq!(extracted.emotion, Some(EmotionalTone::Challenging));
        assert_eq!(
            extracted.tags,
            tags(&["emotional", "family", "health", "wellness"])
        );
    }

    #[test]
    fn test_summary_truncates_on_char_boundary() {
        let text = "é".repeat(150);
        let summary = RuleBasedExtractor::summarize(&text);
        assert_eq!(summary.chars().count(), 103);
        assert!(summary.ends_with("..."));

        let exact = "a".repeat(100);
        assert_eq!(RuleBasedExtractor::summarize(&exact), exact);
    }

    #[test]
    fn test_into_memory_sets_metadata_only_for_emotion() {
        let user_id = Uuid::now_v7();
        let memory = RuleBasedExtractor::extract("Had lunch").into_memory(
            user_id,
            MemoryKind::Conversation,
            "Had lunch",
            None,
        );
        assert_eq!(memory.user_id, user_id);
        assert!(memory.metadata.is_none());

        let memory = RuleBasedExtractor::extract("So excited!").into_memory(
            user_id,
            MemoryKind::Conversation,
            "So excited!",
            None,
        );
        assert_eq!(
            memory.metadata.and_then(|m| m.emotion),
            Some(EmotionalTone::Positive)
        );
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("  {\"a\":1} "), "{\"a\":1}");
    }

    #[tokio::test]
    async fn test_remote_reply_is_parsed_and_clamped() {
        let provider = ScriptedProvider::boxed(Script::Reply(
            r#"```json
{"importance": 14, "tags": ["Music", ""], "summary": "Joined a choir.", "emotionalContext": "positive"}
```"#
                .to_string(),
        ));
        let extractor =
            MemoryExtractor::with_provider(Arc::new(provider), "m", Duration::from_secs(5));

        let extracted = extractor.extract("I joined a choir").await;
        assert_eq!(extracted.importance, 10);
        assert_eq!(extracted.tags, tags(&["music"]));
        assert_eq!(extracted.summary, "Joined a choir.");
        assert_eq!(extracted.emotion, Some(EmotionalTone::Positive));
    }

    #[tokio::test]
    async fn test_remote_garbage_falls_back_to_rules() {
        let provider = ScriptedProvider::boxed(Script::Reply("I cannot do that".to_string()));
        let extractor =
            MemoryExtractor::with_provider(Arc::new(provider), "m", Duration::from_secs(5));

        let text = "I got a big promotion, such an important day for my career!";
        assert_eq!(extractor.extract(text).await, RuleBasedExtractor::extract(text));
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_timeout_falls_back_to_rules() {
        let provider = ScriptedProvider::boxed(Script::Stall(Duration::from_secs(120)));
        let extractor =
            MemoryExtractor::with_provider(Arc::new(provider), "m", Duration::from_secs(2));

        assert_eq!(
            extractor.extract("Had lunch").await,
            RuleBasedExtractor::extract("Had lunch")
        );
    }

    #[test]
    fn test_extraction_prompt_names_contract_fields() {
        for field in ["\"importance\"", "\"tags\"", "\"summary\"", "\"emotionalContext\""] {
            assert!(EXTRACTION_SYSTEM_PROMPT.contains(field));
        }
    }
}
