//! In-process `RecordStore` backed by a `BTreeMap`.
//!
//! Holds records in their stored (JSON) form so it behaves exactly like the
//! SQLite store with respect to serialization. An optional record quota
//! simulates a full disk.

use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::Utc;
use memora_types::error::StoreError;
use memora_types::record::{Collection, ListOrder, OrderField, Record, SortDirection};
use uuid::Uuid;

use super::batch::{StoredRecord, WriteBatch, WriteOp};
use super::repository::RecordStore;

type Table = BTreeMap<(Collection, Uuid), StoredRecord>;

#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    records: Mutex<Table>,
    quota: Option<usize>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that refuses to hold more than `max_records` records.
    pub fn with_quota(max_records: usize) -> Self {
        Self {
            records: Mutex::new(Table::new()),
            quota: Some(max_records),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Table>, StoreError> {
        self.records.lock().map_err(|_| StoreError::Connection)
    }

    fn check_quota(&self, table: &Table) -> Result<(), StoreError> {
        match self.quota {
            Some(max) if table.len() > max => Err(StoreError::QuotaExceeded),
            _ => Ok(()),
        }
    }

    fn apply_op(table: &mut Table, op: WriteOp) -> Result<(), StoreError> {
        match op {
            WriteOp::Insert(stored) => {
                let key = (stored.collection, stored.id);
                if table.contains_key(&key) {
                    return Err(StoreError::DuplicateKey {
                        collection: stored.collection,
                        id: stored.id,
                    });
                }
                table.insert(key, stored);
            }
            WriteOp::Upsert(stored) => {
                table.insert((stored.collection, stored.id), stored);
            }
            WriteOp::Delete { collection, id } => {
                table.remove(&(collection, id));
            }
            WriteOp::DeleteOwnedBy {
                collection,
                user_id,
            } => {
                table.retain(|(c, _), stored| !(*c == collection && stored.user_id == user_id));
            }
            WriteOp::Patch {
                collection,
                id,
                apply,
            } => {
                let stored = table
                    .get(&(collection, id))
                    .ok_or(StoreError::NotFound { collection, id })?;
                if let Some(next) = apply(stored)? {
                    table.insert((collection, id), next);
                }
            }
            WriteOp::DeleteOwnedWhere {
                collection,
                user_id,
                matches,
            } => {
                let mut doomed = Vec::new();
                for (key, stored) in table
                    .iter()
                    .filter(|((c, _), s)| *c == collection && s.user_id == user_id)
                {
                    if matches(stored)? {
                        doomed.push(*key);
                    }
                }
                for key in doomed {
                    table.remove(&key);
                }
            }
            WriteOp::ClearAll => table.clear(),
        }
        Ok(())
    }
}

impl RecordStore for InMemoryRecordStore {
    async fn create<R: Record>(&self, record: &R) -> Result<(), StoreError> {
        let stored = StoredRecord::encode(record)?;
        let mut table = self.lock()?;
        let key = (stored.collection, stored.id);
        if table.contains_key(&key) {
            return Err(StoreError::DuplicateKey {
                collection: stored.collection,
                id: stored.id,
            });
        }
        if self.quota.is_some_and(|max| table.len() + 1 > max) {
            return Err(StoreError::QuotaExceeded);
        }
        table.insert(key, stored);
        Ok(())
    }

    async fn get_by_id<R: Record>(&self, id: &Uuid) -> Result<Option<R>, StoreError> {
        let table = self.lock()?;
        table
            .get(&(R::COLLECTION, *id))
            .map(|stored| stored.decode())
            .transpose()
    }

    async fn list_by_user<R: Record>(
        &self,
        user_id: &Uuid,
        order: ListOrder,
    ) -> Result<Vec<R>, StoreError> {
        let table = self.lock()?;
        let mut owned: Vec<&StoredRecord> = table
            .values()
            .filter(|s| s.collection == R::COLLECTION && s.user_id == *user_id)
            .collect();

        let sort_key = |s: &StoredRecord| match order.field {
            OrderField::CreatedAt => s.created_at_us,
            OrderField::UpdatedAt => s.updated_at_us,
        };
        owned.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)).then_with(|| a.id.cmp(&b.id)));
        if order.direction == SortDirection::Descending {
            owned.reverse();
        }

        owned.into_iter().map(|s| s.decode()).collect()
    }

    async fn update<R: Record>(&self, id: &Uuid, patch: &R::Patch) -> Result<R, StoreError> {
        let mut table = self.lock()?;
        let stored = table
            .get(&(R::COLLECTION, *id))
            .ok_or(StoreError::NotFound {
                collection: R::COLLECTION,
                id: *id,
            })?;
        let mut record: R = stored.decode()?;
        record.apply_patch(patch, Utc::now());
        let encoded = StoredRecord::encode(&record)?;
        table.insert((R::COLLECTION, *id), encoded);
        Ok(record)
    }

    async fn delete(&self, collection: Collection, id: &Uuid) -> Result<(), StoreError> {
        self.lock()?.remove(&(collection, *id));
        Ok(())
    }

    async fn clear_all(&self) -> Result<(), StoreError> {
        self.lock()?.clear();
        Ok(())
    }

    async fn dump_collection<R: Record>(&self) -> Result<Vec<R>, StoreError> {
        let table = self.lock()?;
        table
            .values()
            .filter(|s| s.collection == R::COLLECTION)
            .map(|s| s.decode())
            .collect()
    }

    async fn apply_batch(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut table = self.lock()?;
        let mut next = table.clone();
        for op in batch.into_ops() {
            Self::apply_op(&mut next, op)?;
        }
        self.check_quota(&next)?;
        *table = next;
        Ok(())
    }

    async fn count(&self, collection: Collection) -> Result<u64, StoreError> {
        let table = self.lock()?;
        Ok(table.keys().filter(|(c, _)| *c == collection).count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memora_types::conversation::{ChatMessage, Conversation, ConversationPatch};
    use crate::memory::extractor::RuleBasedExtractor;
    use memora_types::memory::{Memory, MemoryKind};
    use memora_types::user::User;

    #[tokio::test]
    async fn test_create_rejects_duplicate_id() {
        let store = InMemoryRecordStore::new();
        let user = User::new("Ada", None);
        store.create(&user).await.unwrap();

        let err = store.create(&user).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey { collection: Collection::Users, .. }));
    }

    #[tokio::test]
    async fn test_same_id_in_different_collections_is_allowed() {
        let store = InMemoryRecordStore::new();
        let user = User::new("Ada", None);
        let mut conversation = Conversation::new(user.id, "Chat");
        conversation.id = user.id;

        store.create(&user).await.unwrap();
        store.create(&conversation).await.unwrap();
        assert_eq!(store.count(Collection::Users).await.unwrap(), 1);
        assert_eq!(store.count(Collection::Conversations).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let store = InMemoryRecordStore::new();
        let result = store
            .update::<Conversation>(&Uuid::now_v7(), &ConversationPatch::default())
            .await;
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_update_appends_and_persists() {
        let store = InMemoryRecordStore::new();
        let conversation = Conversation::new(Uuid::now_v7(), "Chat");
        store.create(&conversation).await.unwrap();

        let updated: Conversation = store
            .update(&conversation.id, &ConversationPatch::append(ChatMessage::user("hi")))
            .await
            .unwrap();
        assert_eq!(updated.message_count(), 1);

        let loaded: Conversation = store.get_by_id(&conversation.id).await.unwrap().unwrap();
        assert_eq!(loaded, updated);
    }

    #[tokio::test]
    async fn test_quota_exceeded_leaves_store_unchanged() {
        let store = InMemoryRecordStore::with_quota(1);
        store.create(&User::new("Ada", None)).await.unwrap();

        let err = store.create(&User::new("Grace", None)).await.unwrap_err();
        assert!(matches!(err, StoreError::QuotaExceeded));
        assert_eq!(store.count(Collection::Users).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failed_batch_is_all_or_nothing() {
        let store = InMemoryRecordStore::new();
        let existing = User::new("Ada", None);
        store.create(&existing).await.unwrap();

        let fresh = User::new("Grace", None);
        let mut batch = WriteBatch::new();
        batch.insert(&fresh).unwrap();
        batch.insert(&existing).unwrap();

        let err = store.apply_batch(batch).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey { .. }));
        assert!(store.get_by_id::<User>(&fresh.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_within_quota_fills_to_the_limit() {
        let store = InMemoryRecordStore::with_quota(2);
        store.create(&User::new("Ada", None)).await.unwrap();
        store.create(&User::new("Grace", None)).await.unwrap();
        assert_eq!(store.count(Collection::Users).await.unwrap(), 2);

        let err = store.create(&User::new("Alan", None)).await.unwrap_err();
        assert!(matches!(err, StoreError::QuotaExceeded));
    }

    #[tokio::test]
    async fn test_patch_of_missing_record_fails_whole_batch() {
        let store = InMemoryRecordStore::new();
        let fresh = User::new("Ada", None);

        let mut batch = WriteBatch::new();
        batch.insert(&fresh).unwrap();
        batch.update::<Conversation>(Uuid::now_v7(), ConversationPatch::default());

        let err = store.apply_batch(batch).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::NotFound {
                collection: Collection::Conversations,
                ..
            }
        ));
        assert_eq!(store.count(Collection::Users).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_owned_where_reads_current_rows() {
        let store = InMemoryRecordStore::new();
        let user = User::new("Ada", None);
        let source = Uuid::now_v7();
        let mut from_chat = RuleBasedExtractor::extract("I love hiking").into_memory(
            user.id,
            MemoryKind::Conversation,
            "I love hiking",
            Some(source),
        );
        store.create(&from_chat).await.unwrap();
        from_chat.id = Uuid::now_v7();
        store.create(&from_chat).await.unwrap();
        let manual = RuleBasedExtractor::extract("Note").into_memory(
            user.id,
            MemoryKind::Personal,
            "Note",
            None,
        );
        store.create(&manual).await.unwrap();

        let mut batch = WriteBatch::new();
        batch.delete_owned_where::<Memory>(user.id, move |m| {
            m.source_conversation_id == Some(source)
        });
        store.apply_batch(batch).await.unwrap();

        let left: Vec<Memory> = store.list_by_user(&user.id, ListOrder::default()).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].id, manual.id);
    }
}
