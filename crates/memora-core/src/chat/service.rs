//! Conversation lifecycle: starting, resolving, listing, and deleting
//! conversations. Message traffic goes through the governor.

use std::sync::Arc;

use memora_types::conversation::Conversation;
use memora_types::error::{ChatError, StoreError};
use memora_types::memory::Memory;
use memora_types::record::ListOrder;
use memora_types::user::{User, UserPatch};
use tracing::{debug, info};
use uuid::Uuid;

use super::locks::ConversationLocks;
use crate::store::batch::WriteBatch;
use crate::store::repository::RecordStore;

const DEFAULT_TITLE: &str = "New conversation";

pub struct ConversationService<S: RecordStore> {
    store: Arc<S>,
    locks: ConversationLocks,
}

impl<S: RecordStore> ConversationService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            locks: ConversationLocks::new(),
        }
    }

    /// Share the governor's lock registry so deletes wait for in-flight sends.
    pub fn with_locks(mut self, locks: ConversationLocks) -> Self {
        self.locks = locks;
        self
    }

    async fn load_user(&self, user_id: &Uuid) -> Result<User, ChatError> {
        self.store
            .get_by_id(user_id)
            .await?
            .ok_or(ChatError::UserNotFound(*user_id))
    }

    /// Create an empty conversation and make it the user's active one.
    #[tracing::instrument(skip(self, title), fields(user_id = %user_id))]
    pub async fn start_conversation(
        &self,
        user_id: Uuid,
        title: Option<&str>,
    ) -> Result<Conversation, ChatError> {
        self.load_user(&user_id).await?;
        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_TITLE);
        let conversation = Conversation::new(user_id, title);

        let mut batch = WriteBatch::new();
        batch.insert(&conversation)?;
        batch.update::<User>(user_id, UserPatch::active_conversation(conversation.id));
        self.store.apply_batch(batch).await.map_err(|e| match e {
            StoreError::NotFound { .. } => ChatError::UserNotFound(user_id),
            other => ChatError::Store(other),
        })?;

        info!(conversation_id = %conversation.id, "Conversation started");
        Ok(conversation)
    }

    /// The user's active conversation, starting a new one when the pointer
    /// is empty, dangling, or points at a superseded conversation.
    pub async fn active_conversation(&self, user_id: Uuid) -> Result<Conversation, ChatError> {
        let user = self.load_user(&user_id).await?;
        if let Some(id) = user.active_conversation_id() {
            let current: Option<Conversation> = self.store.get_by_id(&id).await?;
            match current {
                Some(c) if c.user_id == user_id && !c.is_superseded() => return Ok(c),
                _ => debug!(conversation_id = %id, "Active pointer is stale; starting fresh"),
            }
        }
        self.start_conversation(user_id, None).await
    }

    pub async fn get_conversation(
        &self,
        user_id: &Uuid,
        conversation_id: &Uuid,
    ) -> Result<Conversation, ChatError> {
        let conversation: Option<Conversation> = self.store.get_by_id(conversation_id).await?;
        conversation
            .filter(|c| c.user_id == *user_id)
            .ok_or(ChatError::ConversationNotFound(*conversation_id))
    }

    /// Most recently updated first.
    pub async fn list_conversations(&self, user_id: &Uuid) -> Result<Vec<Conversation>, ChatError> {
        Ok(self.store.list_by_user(user_id, ListOrder::default()).await?)
    }

    /// Delete a conversation together with the memories extracted from it.
    /// Missing or foreign ids are a no-op.
    #[tracing::instrument(skip(self), fields(user_id = %user_id, conversation_id = %conversation_id))]
    pub async fn delete_conversation(
        &self,
        user_id: Uuid,
        conversation_id: Uuid,
    ) -> Result<(), ChatError> {
        let _guard = self.locks.acquire(conversation_id).await;
        match self.get_conversation(&user_id, &conversation_id).await {
            Ok(_) => {}
            Err(ChatError::ConversationNotFound(_)) => return Ok(()),
            Err(e) => return Err(e),
        }

        // Children and the pointer are matched inside the batch, so memories
        // written by another process after this point are not orphaned.
        let mut batch = WriteBatch::new();
        batch.delete::<Conversation>(conversation_id);
        batch.delete_owned_where::<Memory>(user_id, move |m| {
            m.source_conversation_id == Some(conversation_id)
        });
        batch.patch_with::<User>(user_id, move |user| {
            Ok((user.active_conversation_id() == Some(conversation_id))
                .then(UserPatch::clear_active_conversation))
        });
        match self.store.apply_batch(batch).await {
            Ok(()) => {}
            // The owner vanished with the whole account; nothing left to do.
            Err(StoreError::NotFound { .. }) => return Ok(()),
            Err(e) => return Err(e.into()),
        }

        info!("Conversation deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::governor::SessionGovernor;
    use crate::chat::session::SessionThresholds;
    use crate::chat::summarizer::ConversationSummarizer;
    use crate::memory::extractor::MemoryExtractor;
    use crate::store::in_memory::InMemoryRecordStore;
    use memora_types::memory::MemoryKind;
    use memora_types::record::Collection;

    async fn setup() -> (Arc<InMemoryRecordStore>, ConversationService<InMemoryRecordStore>, User) {
        let store = Arc::new(InMemoryRecordStore::new());
        let user = User::new("Ada", None);
        store.create(&user).await.unwrap();
        (Arc::clone(&store), ConversationService::new(store), user)
    }

    #[tokio::test]
    async fn test_start_sets_active_pointer() {
        let (store, service, user) = setup().await;
        let conversation = service.start_conversation(user.id, Some("  Morning ")).await.unwrap();
        assert_eq!(conversation.title, "Morning");

        let reloaded: User = store.get_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(reloaded.active_conversation_id(), Some(conversation.id));
        assert_eq!(service.active_conversation(user.id).await.unwrap().id, conversation.id);
    }

    #[tokio::test]
    async fn test_active_conversation_created_on_demand() {
        let (_store, service, user) = setup().await;
        let first = service.active_conversation(user.id).await.unwrap();
        assert_eq!(first.title, DEFAULT_TITLE);
        let again = service.active_conversation(user.id).await.unwrap();
        assert_eq!(first.id, again.id);
    }

    #[tokio::test]
    async fn test_unknown_user_is_rejected() {
        let (_store, service, _user) = setup().await;
        let err = service.start_conversation(Uuid::now_v7(), None).await.unwrap_err();
        assert!(matches!(err, ChatError::UserNotFound(_)));
    }

    #[tokio::test]
    async fn test_list_is_owner_scoped() {
        let (store, service, user) = setup().await;
        let other = User::new("Grace", None);
        store.create(&other).await.unwrap();

        service.start_conversation(user.id, Some("Mine")).await.unwrap();
        service.start_conversation(other.id, Some("Theirs")).await.unwrap();

        let mine = service.list_conversations(&user.id).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].title, "Mine");
    }

    #[tokio::test]
    async fn test_delete_cascades_memories_and_clears_pointer() {
        let (store, service, user) = setup().await;
        let governor = SessionGovernor::new(
            Arc::clone(&store),
            SessionThresholds::default(),
            MemoryExtractor::rule_based(),
            ConversationSummarizer::rule_based(),
        );
        let doomed = service.start_conversation(user.id, Some("Doomed")).await.unwrap();
        governor.send_message(user.id, doomed.id, "I love hiking").await.unwrap();
        governor.send_message(user.id, doomed.id, "My job is fine").await.unwrap();

        store.create(&Conversation::new(user.id, "Keeper")).await.unwrap();
        let manual = crate::memory::extractor::RuleBasedExtractor::extract("Note to self")
            .into_memory(user.id, MemoryKind::Personal, "Note to self", None);
        store.create(&manual).await.unwrap();

        service.delete_conversation(user.id, doomed.id).await.unwrap();

        assert!(store.get_by_id::<Conversation>(&doomed.id).await.unwrap().is_none());
        assert_eq!(store.count(Collection::Memories).await.unwrap(), 1);
        assert_eq!(store.count(Collection::Conversations).await.unwrap(), 1);
        let reloaded: User = store.get_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(reloaded.active_conversation_id(), None);

        // Second delete and foreign delete are no-ops.
        service.delete_conversation(user.id, doomed.id).await.unwrap();
        let stranger = Uuid::now_v7();
        let others = service.list_conversations(&user.id).await.unwrap();
        service.delete_conversation(stranger, others[0].id).await.unwrap();
        assert_eq!(store.count(Collection::Conversations).await.unwrap(), 1);
    }
}
