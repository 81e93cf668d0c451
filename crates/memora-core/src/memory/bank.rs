//! Memory bank: owner-scoped listing and editing of stored memories.

use std::sync::Arc;

use memora_types::error::StoreError;
use memora_types::memory::{Memory, MemoryKind, MemoryPatch};
use memora_types::record::{Collection, ListOrder, Record};
use tracing::{debug, info};
use uuid::Uuid;

use super::extractor::MemoryExtractor;
use crate::store::repository::RecordStore;

/// Owner-scoped CRUD over a user's memories.
///
/// Every operation takes the acting user's id; a memory owned by someone
/// else behaves exactly like a missing one.
pub struct MemoryBank<S: RecordStore> {
    store: Arc<S>,
    extractor: MemoryExtractor,
}

impl<S: RecordStore> MemoryBank<S> {
    pub fn new(store: Arc<S>, extractor: MemoryExtractor) -> Self {
        Self { store, extractor }
    }

    /// All memories of `user_id`, most important first, then most recently
    /// updated.
    pub async fn list_memories(&self, user_id: &Uuid) -> Result<Vec<Memory>, StoreError> {
        let mut memories: Vec<Memory> = self
            .store
            .list_by_user(user_id, ListOrder::default())
            .await?;
        // Stable sort keeps the store's recency order within a tier.
        memories.sort_by(|a, b| b.importance.cmp(&a.importance));
        Ok(memories)
    }

    pub async fn get_memory(
        &self,
        user_id: &Uuid,
        memory_id: &Uuid,
    ) -> Result<Option<Memory>, StoreError> {
        let memory: Option<Memory> = self.store.get_by_id(memory_id).await?;
        Ok(memory.filter(|m| m.user_id == *user_id))
    }

    /// Apply a typed patch. Importance is clamped to 1..=10.
    #[tracing::instrument(skip(self, patch), fields(user_id = %user_id, memory_id = %memory_id))]
    pub async fn update_memory(
        &self,
        user_id: &Uuid,
        memory_id: &Uuid,
        patch: &MemoryPatch,
    ) -> Result<Memory, StoreError> {
        if self.get_memory(user_id, memory_id).await?.is_none() {
            return Err(StoreError::NotFound {
                collection: Memory::COLLECTION,
                id: *memory_id,
            });
        }
        self.store.update(memory_id, patch).await
    }

    /// Delete a memory. Missing or foreign ids are a no-op.
    #[tracing::instrument(skip(self), fields(user_id = %user_id, memory_id = %memory_id))]
    pub async fn delete_memory(&self, user_id: &Uuid, memory_id: &Uuid) -> Result<(), StoreError> {
        if self.get_memory(user_id, memory_id).await?.is_none() {
            debug!("Memory absent or not owned by user; nothing to delete");
            return Ok(());
        }
        self.store.delete(Collection::Memories, memory_id).await?;
        info!("Memory deleted");
        Ok(())
    }

    /// Record a memory the user entered by hand, scored by the extractor.
    #[tracing::instrument(skip(self, content), fields(user_id = %user_id, kind = %kind))]
    pub async fn remember(
        &self,
        user_id: Uuid,
        kind: MemoryKind,
        content: &str,
    ) -> Result<Memory, StoreError> {
        let memory = self
            .extractor
            .extract(content)
            .await
            .into_memory(user_id, kind, content, None);
        self.store.create(&memory).await?;
        info!(memory_id = %memory.id, importance = memory.importance, "Memory saved");
        Ok(memory)
    }
}
