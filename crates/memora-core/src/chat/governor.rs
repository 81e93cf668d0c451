//! Session governor: bounded conversations with summarize-and-roll-over.
//!
//! Every user send is checked against the thresholds *before* the message
//! is appended. Below the hard threshold the message is appended and a
//! memory extracted from it, in one batch. At the hard threshold the send
//! rolls the conversation over instead:
//!
//! 1. the old conversation is summarized (remote, else deterministic),
//! 2. a successor conversation is created holding one assistant message
//!    with the summary,
//! 3. the user's active-conversation pointer moves to the successor,
//! 4. a `conversation-summary` memory (importance 7) is written,
//! 5. the old conversation is marked `superseded_by` the successor.
//!
//! Steps 2-5 are a single atomic batch. The triggering message is not
//! appended anywhere; callers resubmit it against the successor.
//!
//! Within a process, sends to one conversation are serialized by
//! [`ConversationLocks`]. Across processes the batches themselves re-check
//! the conversation: an append or rollover that finds it superseded (or an
//! append that finds it full) fails with `Conflict`, and the send starts
//! over from a fresh read. A second send racing a rollover therefore sees
//! the superseded marker and fails with [`ChatError::Superseded`] rather
//! than rolling over twice.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use memora_types::conversation::{ChatMessage, Conversation, ConversationPatch, SessionState};
use memora_types::error::{ChatError, StoreError};
use memora_types::memory::{
    CONVERSATION_SUMMARY_IMPORTANCE, CONVERSATION_SUMMARY_TAG, Memory, MemoryKind,
};
use memora_types::record::Collection;
use memora_types::user::{User, UserPatch};

use super::locks::ConversationLocks;
use super::session::{SessionStatus, SessionThresholds};
use super::summarizer::ConversationSummarizer;
use crate::memory::extractor::{ExtractedMemory, MemoryExtractor, RuleBasedExtractor};
use crate::store::batch::WriteBatch;
use crate::store::repository::RecordStore;

const CONTINUED_PREFIX: &str = "Continued: ";

/// Fresh reads a send may take before giving up on a conversation that
/// keeps changing under it.
const MAX_SEND_ATTEMPTS: usize = 3;

/// Result of a user send.
#[derive(Debug, Clone)]
pub enum SendOutcome {
    /// The message was appended and a memory extracted from it.
    Appended {
        conversation: Conversation,
        /// State after the append.
        state: SessionState,
        memory: Memory,
    },
    /// The conversation was full. Nothing was appended; resubmit the message
    /// to `conversation`.
    RolledOver {
        previous_id: Uuid,
        conversation: Conversation,
        summary_memory: Memory,
    },
}

impl SendOutcome {
    /// The conversation the caller should continue in.
    pub fn conversation(&self) -> &Conversation {
        match self {
            SendOutcome::Appended { conversation, .. } => conversation,
            SendOutcome::RolledOver { conversation, .. } => conversation,
        }
    }

    pub fn is_rollover(&self) -> bool {
        matches!(self, SendOutcome::RolledOver { .. })
    }
}

/// An assistant reply and the memory extracted from it.
#[derive(Debug, Clone)]
pub struct AppendedReply {
    pub conversation: Conversation,
    pub memory: Memory,
}

fn conflict(conversation_id: Uuid) -> StoreError {
    StoreError::Conflict {
        collection: Collection::Conversations,
        id: conversation_id,
    }
}

fn is_conflict(result: &Result<impl Sized, ChatError>) -> bool {
    matches!(result, Err(ChatError::Store(StoreError::Conflict { .. })))
}

pub struct SessionGovernor<S: RecordStore> {
    store: Arc<S>,
    thresholds: SessionThresholds,
    extractor: MemoryExtractor,
    summarizer: ConversationSummarizer,
    locks: ConversationLocks,
}

impl<S: RecordStore> SessionGovernor<S> {
    pub fn new(
        store: Arc<S>,
        thresholds: SessionThresholds,
        extractor: MemoryExtractor,
        summarizer: ConversationSummarizer,
    ) -> Self {
        Self {
            store,
            thresholds,
            extractor,
            summarizer,
            locks: ConversationLocks::new(),
        }
    }

    pub fn thresholds(&self) -> &SessionThresholds {
        &self.thresholds
    }

    /// The lock registry sends go through. Hand a clone to
    /// `ConversationService::with_locks` so deletes wait for in-flight sends.
    pub fn locks(&self) -> &ConversationLocks {
        &self.locks
    }

    async fn load_owned(
        &self,
        user_id: &Uuid,
        conversation_id: &Uuid,
    ) -> Result<Conversation, ChatError> {
        self.store
            .get_by_id(conversation_id)
            .await?
            .filter(|c: &Conversation| c.user_id == *user_id)
            .ok_or(ChatError::ConversationNotFound(*conversation_id))
    }

    /// Load a conversation the user owns and that is still accepting messages.
    async fn load_open(
        &self,
        user_id: &Uuid,
        conversation_id: &Uuid,
    ) -> Result<Conversation, ChatError> {
        let conversation = self.load_owned(user_id, conversation_id).await?;
        if let Some(successor) = conversation.superseded_by {
            return Err(ChatError::Superseded {
                conversation_id: *conversation_id,
                successor,
            });
        }
        Ok(conversation)
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), ChatError> {
        self.store.apply_batch(batch).await.map_err(|e| match e {
            StoreError::NotFound {
                collection: Collection::Conversations,
                id,
            } => ChatError::ConversationNotFound(id),
            StoreError::NotFound {
                collection: Collection::Users,
                id,
            } => ChatError::UserNotFound(id),
            other => ChatError::Store(other),
        })
    }

    /// Send a user message to a conversation.
    #[tracing::instrument(
        name = "send_message",
        skip(self, content),
        fields(user_id = %user_id, conversation_id = %conversation_id)
    )]
    pub async fn send_message(
        &self,
        user_id: Uuid,
        conversation_id: Uuid,
        content: &str,
    ) -> Result<SendOutcome, ChatError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let _guard = self.locks.acquire(conversation_id).await;

        let mut extracted: Option<ExtractedMemory> = None;
        for attempt in 1..=MAX_SEND_ATTEMPTS {
            let conversation = self.load_open(&user_id, &conversation_id).await?;

            let result = if self.thresholds.classify(conversation.message_count())
                == SessionState::Critical
            {
                self.roll_over(user_id, conversation).await
            } else {
                let memory = match extracted.clone() {
                    Some(memory) => memory,
                    None => {
                        let memory = self.extractor.extract(content).await;
                        extracted = Some(memory.clone());
                        memory
                    }
                };
                self.append_user_message(user_id, conversation_id, content, memory)
                    .await
            };

            if !is_conflict(&result) {
                return result;
            }
            debug!(attempt, "Conversation changed during send; re-reading");
        }
        Err(ChatError::Store(conflict(conversation_id)))
    }

    async fn append_user_message(
        &self,
        user_id: Uuid,
        conversation_id: Uuid,
        content: &str,
        extracted: ExtractedMemory,
    ) -> Result<SendOutcome, ChatError> {
        let memory =
            extracted.into_memory(user_id, MemoryKind::Conversation, content, Some(conversation_id));
        let hard = self.thresholds.hard();
        let message = ChatMessage::user(content);

        let mut batch = WriteBatch::new();
        batch.patch_with::<Conversation>(conversation_id, move |current| {
            if current.is_superseded() || current.message_count() >= hard {
                return Err(conflict(conversation_id));
            }
            Ok(Some(ConversationPatch::append(message)))
        });
        batch.insert(&memory)?;
        self.commit(batch).await?;

        let conversation = self.load_owned(&user_id, &conversation_id).await?;
        let state = self.thresholds.classify(conversation.message_count());
        info!(
            message_count = conversation.message_count(),
            state = %state,
            importance = memory.importance,
            "Message appended"
        );
        Ok(SendOutcome::Appended {
            conversation,
            state,
            memory,
        })
    }

    async fn roll_over(
        &self,
        user_id: Uuid,
        previous: Conversation,
    ) -> Result<SendOutcome, ChatError> {
        let summary = self.summarizer.summarize(&previous).await;

        let base_title = previous
            .title
            .strip_prefix(CONTINUED_PREFIX)
            .unwrap_or(&previous.title);
        let mut successor = Conversation::new(user_id, format!("{CONTINUED_PREFIX}{base_title}"));
        successor.push_message(ChatMessage::assistant(summary.as_str()));

        let summary_memory = ExtractedMemory {
            importance: CONVERSATION_SUMMARY_IMPORTANCE,
            tags: BTreeSet::from([CONVERSATION_SUMMARY_TAG.to_string()]),
            summary: RuleBasedExtractor::summarize(&summary),
            emotion: None,
        }
        .into_memory(user_id, MemoryKind::Conversation, summary, Some(previous.id));

        // The summary call can be slow, so every existing record is patched
        // from its stored version rather than from what was read before it.
        let previous_id = previous.id;
        let successor_id = successor.id;
        let mut batch = WriteBatch::new();
        batch.insert(&successor)?;
        batch.patch_with::<Conversation>(previous_id, move |current| {
            if current.is_superseded() {
                return Err(conflict(previous_id));
            }
            Ok(Some(ConversationPatch {
                superseded_by: Some(successor_id),
                ..ConversationPatch::default()
            }))
        });
        batch.update::<User>(user_id, UserPatch::active_conversation(successor_id));
        batch.insert(&summary_memory)?;
        self.commit(batch).await?;

        info!(
            previous_id = %previous_id,
            successor_id = %successor_id,
            archived_messages = previous.message_count(),
            "Conversation rolled over"
        );
        Ok(SendOutcome::RolledOver {
            previous_id,
            conversation: successor,
            summary_memory,
        })
    }

    /// Append an assistant reply and extract a memory from it. Replies are
    /// not threshold-checked.
    #[tracing::instrument(
        name = "append_assistant_reply",
        skip(self, content),
        fields(user_id = %user_id, conversation_id = %conversation_id)
    )]
    pub async fn append_assistant_reply(
        &self,
        user_id: Uuid,
        conversation_id: Uuid,
        content: &str,
    ) -> Result<AppendedReply, ChatError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let _guard = self.locks.acquire(conversation_id).await;
        self.load_open(&user_id, &conversation_id).await?;

        let memory = self.extractor.extract(content).await.into_memory(
            user_id,
            MemoryKind::Conversation,
            content,
            Some(conversation_id),
        );
        let message = ChatMessage::assistant(content);

        let mut batch = WriteBatch::new();
        batch.patch_with::<Conversation>(conversation_id, move |current| {
            if current.is_superseded() {
                return Err(conflict(conversation_id));
            }
            Ok(Some(ConversationPatch::append(message)))
        });
        batch.insert(&memory)?;
        let result = self.commit(batch).await;
        if is_conflict(&result) {
            // Superseded since the first read; report the successor.
            self.load_open(&user_id, &conversation_id).await?;
        }
        result?;

        let conversation = self.load_owned(&user_id, &conversation_id).await?;
        Ok(AppendedReply {
            conversation,
            memory,
        })
    }

    /// Current state of a conversation the user owns. Superseded
    /// conversations are reported with their successor rather than as an error.
    pub async fn status(
        &self,
        user_id: &Uuid,
        conversation_id: &Uuid,
    ) -> Result<SessionStatus, ChatError> {
        let conversation = self.load_owned(user_id, conversation_id).await?;
        Ok(SessionStatus::new(
            &self.thresholds,
            conversation.id,
            conversation.message_count(),
            conversation.superseded_by,
        ))
    }
}
