//! Memory types for Memora.
//!
//! A memory is a scored, tagged record distilled from conversation text or
//! entered by the user. Memories survive rollover of their source
//! conversation; deleting that conversation deletes them with it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::record::{Collection, Record};

/// Lowest allowed importance score.
pub const MIN_IMPORTANCE: u8 = 1;
/// Highest allowed importance score.
pub const MAX_IMPORTANCE: u8 = 10;

/// Tag carried by the memory written on every conversation rollover.
pub const CONVERSATION_SUMMARY_TAG: &str = "conversation-summary";
/// Importance of the memory written on every conversation rollover.
pub const CONVERSATION_SUMMARY_IMPORTANCE: u8 = 7;

/// Clamp an arbitrary score into `MIN_IMPORTANCE..=MAX_IMPORTANCE`.
pub fn clamp_importance(raw: i64) -> u8 {
    raw.clamp(MIN_IMPORTANCE as i64, MAX_IMPORTANCE as i64) as u8
}

/// Category of a memory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryKind {
    Conversation,
    Personal,
    Goal,
    Reflection,
    Relationship,
    Milestone,
}

impl fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryKind::Conversation => write!(f, "conversation"),
            MemoryKind::Personal => write!(f, "personal"),
            MemoryKind::Goal => write!(f, "goal"),
            MemoryKind::Reflection => write!(f, "reflection"),
            MemoryKind::Relationship => write!(f, "relationship"),
            MemoryKind::Milestone => write!(f, "milestone"),
        }
    }
}

impl FromStr for MemoryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "conversation" => Ok(MemoryKind::Conversation),
            "personal" => Ok(MemoryKind::Personal),
            "goal" => Ok(MemoryKind::Goal),
            "reflection" => Ok(MemoryKind::Reflection),
            "relationship" => Ok(MemoryKind::Relationship),
            "milestone" => Ok(MemoryKind::Milestone),
            other => Err(format!("invalid memory kind: '{other}'")),
        }
    }
}

/// Emotional tone detected in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionalTone {
    Positive,
    Challenging,
}

impl fmt::Display for EmotionalTone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmotionalTone::Positive => write!(f, "positive"),
            EmotionalTone::Challenging => write!(f, "challenging"),
        }
    }
}

impl FromStr for EmotionalTone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "positive" => Ok(EmotionalTone::Positive),
            "challenging" => Ok(EmotionalTone::Challenging),
            other => Err(format!("invalid emotional tone: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryMetadata {
    pub context: Option<String>,
    pub location: Option<String>,
    pub emotion: Option<EmotionalTone>,
    #[serde(default)]
    pub related_people: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: MemoryKind,
    pub content: String,
    pub summary: String,
    /// Importance score from 1 (trivial) to 10 (critical).
    pub importance: u8,
    pub tags: BTreeSet<String>,
    pub metadata: Option<MemoryMetadata>,
    /// Conversation this memory was extracted from (None for manual entries).
    #[serde(default)]
    pub source_conversation_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Memory {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

/// Partial update for a [`Memory`].
#[derive(Debug, Clone, Default)]
pub struct MemoryPatch {
    pub kind: Option<MemoryKind>,
    pub content: Option<String>,
    pub summary: Option<String>,
    pub importance: Option<u8>,
    pub tags: Option<BTreeSet<String>>,
    pub metadata: Option<Option<MemoryMetadata>>,
}

impl Record for Memory {
    type Patch = MemoryPatch;

    const COLLECTION: Collection = Collection::Memories;

    fn id(&self) -> Uuid {
        self.id
    }

    fn owner_id(&self) -> Uuid {
        self.user_id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn apply_patch(&mut self, patch: &MemoryPatch, now: DateTime<Utc>) {
        if let Some(kind) = patch.kind {
            self.kind = kind;
        }
        if let Some(content) = &patch.content {
            self.content = content.clone();
        }
        if let Some(summary) = &patch.summary {
            self.summary = summary.clone();
        }
        if let Some(importance) = patch.importance {
            self.importance = clamp_importance(importance as i64);
        }
        if let Some(tags) = &patch.tags {
            self.tags = tags.clone();
        }
        if let Some(metadata) = &patch.metadata {
            self.metadata = metadata.clone();
        }
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_memory() -> Memory {
        let now = Utc::now();
        Memory {
            id: Uuid::now_v7(),
            user_id: Uuid::now_v7(),
            kind: MemoryKind::Personal,
            content: "Started learning the cello".to_string(),
            summary: "Started learning the cello".to_string(),
            importance: 5,
            tags: BTreeSet::from(["music".to_string()]),
            metadata: None,
            source_conversation_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_memory_kind_roundtrip() {
        for kind in [
            MemoryKind::Conversation,
            MemoryKind::Personal,
            MemoryKind::Goal,
            MemoryKind::Reflection,
            MemoryKind::Relationship,
            MemoryKind::Milestone,
        ] {
            let parsed: MemoryKind = kind.to_string().parse().unwrap();
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn test_clamp_importance() {
        assert_eq!(clamp_importance(0), 1);
        assert_eq!(clamp_importance(-4), 1);
        assert_eq!(clamp_importance(7), 7);
        assert_eq!(clamp_importance(42), 10);
    }

    #[test]
    fn test_patch_clamps_importance() {
        let mut memory = sample_memory();
        memory.apply_patch(
            &MemoryPatch {
                importance: Some(99),
                ..MemoryPatch::default()
            },
            Utc::now(),
        );
        assert_eq!(memory.importance, MAX_IMPORTANCE);
        assert_eq!(memory.content, "Started learning the cello");
    }

    #[test]
    fn test_tags_serialize_sorted() {
        let mut memory = sample_memory();
        memory.tags = BTreeSet::from(["work".to_string(), "career".to_string()]);
        let json = serde_json::to_value(&memory).unwrap();
        assert_eq!(json["tags"], serde_json::json!(["career", "work"]));
    }

    #[test]
    fn test_emotion_serde() {
        let metadata = MemoryMetadata {
            emotion: Some(EmotionalTone::Challenging),
            ..MemoryMetadata::default()
        };
        let json = serde_json::to_string(&metadata).unwrap();
        assert!(json.contains("\"emotion\":\"challenging\""));
    }
}
