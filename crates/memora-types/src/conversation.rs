//! Conversation and message types for Memora.
//!
//! A conversation is an append-only, timestamp-ordered list of messages.
//! It is never truncated: when it grows past the hard threshold it is
//! superseded by a fresh conversation seeded with a summary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

use crate::record::{Collection, Record};

/// Who wrote a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatRole::User => write!(f, "user"),
            ChatRole::Assistant => write!(f, "assistant"),
        }
    }
}

impl FromStr for ChatRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(ChatRole::User),
            "assistant" => Ok(ChatRole::Assistant),
            other => Err(format!("invalid chat role: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub messages: Vec<ChatMessage>,
    /// Set once this conversation has been rolled over into a successor.
    #[serde(default)]
    pub superseded_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Create an empty conversation owned by `user_id`.
    pub fn new(user_id: Uuid, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            user_id,
            title: title.into(),
            messages: Vec::new(),
            superseded_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn message_count(&self) -> u32 {
        self.messages.len() as u32
    }

    pub fn is_superseded(&self) -> bool {
        self.superseded_by.is_some()
    }

    /// Append a message, keeping timestamps non-decreasing.
    ///
    /// A message stamped earlier than the current tail (clock skew) is
    /// re-stamped with the tail's timestamp so send order is preserved.
    pub fn push_message(&mut self, mut message: ChatMessage) {
        if let Some(last) = self.messages.last() {
            if message.timestamp < last.timestamp {
                message.timestamp = last.timestamp;
            }
        }
        self.messages.push(message);
    }
}

/// Partial update for a [`Conversation`].
///
/// Messages can only be appended; there is no way to express removal or
/// reordering of history.
#[derive(Debug, Clone, Default)]
pub struct ConversationPatch {
    pub title: Option<String>,
    pub append: Vec<ChatMessage>,
    pub superseded_by: Option<Uuid>,
}

impl ConversationPatch {
    pub fn append(message: ChatMessage) -> Self {
        Self {
            append: vec![message],
            ..Self::default()
        }
    }
}

impl Record for Conversation {
    type Patch = ConversationPatch;

    const COLLECTION: Collection = Collection::Conversations;

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

    fn apply_patch(&mut self, patch: &ConversationPatch, now: DateTime<Utc>) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        for message in &patch.append {
            self.push_message(message.clone());
        }
        if let Some(successor) = patch.superseded_by {
            self.superseded_by = Some(successor);
        }
        self.updated_at = now;
    }
}

/// Growth state of a conversation relative to the configured thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Below the soft threshold.
    Normal,
    /// At or past the soft threshold; sending is still allowed.
    Warning,
    /// At or past the hard threshold; the next send rolls over.
    Critical,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Normal => write!(f, "normal"),
            SessionState::Warning => write!(f, "warning"),
            SessionState::Critical => write!(f, "critical"),
        }
    }
}
