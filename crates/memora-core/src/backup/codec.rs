//! Backup codec: the whole record store as one encrypted, base64 blob.
//!
//! Export: dump every collection -> JSON snapshot -> seal -> base64.
//!
//! Import runs every check before the store is touched:
//! base64 -> open (authenticated) -> JSON object with at least one known
//! collection key -> typed decode of every record -> no duplicate ids ->
//! memory importance within 1..=10.
//! Only then is the store cleared and refilled, in one atomic batch. Any
//! check failing yields `CorruptBackup` and leaves the store as it was.

use std::collections::HashSet;
use std::sync::Arc;

use base64::Engine;
use memora_types::backup::BackupSnapshot;
use memora_types::conversation::Conversation;
use memora_types::error::BackupError;
use memora_types::memory::{MAX_IMPORTANCE, MIN_IMPORTANCE, Memory};
use memora_types::record::{Collection, Record};
use memora_types::user::User;
use tracing::info;
use uuid::Uuid;

use super::cipher::SnapshotCipher;
use crate::store::batch::WriteBatch;
use crate::store::repository::RecordStore;

fn corrupt(reason: impl Into<String>) -> BackupError {
    BackupError::CorruptBackup(reason.into())
}

fn ensure_unique<R: Record>(records: &[R]) -> Result<(), BackupError> {
    let mut seen: HashSet<Uuid> = HashSet::with_capacity(records.len());
    for record in records {
        if !seen.insert(record.id()) {
            return Err(corrupt(format!(
                "duplicate id '{}' in {}",
                record.id(),
                R::COLLECTION
            )));
        }
    }
    Ok(())
}

fn ensure_importance_in_range(memories: &[Memory]) -> Result<(), BackupError> {
    match memories
        .iter()
        .find(|m| !(MIN_IMPORTANCE..=MAX_IMPORTANCE).contains(&m.importance))
    {
        Some(memory) => Err(corrupt(format!(
            "memory '{}' has importance {} outside {MIN_IMPORTANCE}..={MAX_IMPORTANCE}",
            memory.id, memory.importance
        ))),
        None => Ok(()),
    }
}

pub struct BackupCodec<S: RecordStore, C: SnapshotCipher> {
    store: Arc<S>,
    cipher: Arc<C>,
}

impl<S: RecordStore, C: SnapshotCipher> BackupCodec<S, C> {
    pub fn new(store: Arc<S>, cipher: Arc<C>) -> Self {
        Self { store, cipher }
    }

    /// Read every collection into a snapshot.
    pub async fn snapshot(&self) -> Result<BackupSnapshot, BackupError> {
        Ok(BackupSnapshot {
            users: self.store.dump_collection::<User>().await?,
            conversations: self.store.dump_collection::<Conversation>().await?,
            memories: self.store.dump_collection::<Memory>().await?,
        })
    }

    /// Serialize, encrypt, and base64-encode a snapshot.
    pub fn encode(&self, snapshot: &BackupSnapshot) -> Result<String, BackupError> {
        let json = serde_json::to_vec(snapshot).map_err(|_| BackupError::Encryption)?;
        let sealed = self.cipher.seal(&json)?;
        Ok(base64::engine::general_purpose::STANDARD.encode(sealed))
    }

    /// Reverse [`Self::encode`] and validate, without touching the store.
    pub fn decode(&self, artifact: &str) -> Result<BackupSnapshot, BackupError> {
        let sealed = base64::engine::general_purpose::STANDARD
            .decode(artifact.trim())
            .map_err(|e| corrupt(format!("not base64: {e}")))?;
        let plaintext = self.cipher.open(&sealed)?;

        let document: serde_json::Value = serde_json::from_slice(&plaintext)
            .map_err(|e| corrupt(format!("not JSON: {e}")))?;
        let Some(object) = document.as_object() else {
            return Err(corrupt("top level is not a JSON object"));
        };
        if !Collection::ALL
            .iter()
            .any(|c| object.contains_key(c.as_str()))
        {
            return Err(corrupt("no known collection present"));
        }

        let snapshot: BackupSnapshot =
            serde_json::from_value(document).map_err(|e| corrupt(format!("invalid record: {e}")))?;
        ensure_unique(&snapshot.users)?;
        ensure_unique(&snapshot.conversations)?;
        ensure_unique(&snapshot.memories)?;
        ensure_importance_in_range(&snapshot.memories)?;
        Ok(snapshot)
    }

    /// Produce the encrypted artifact for the whole store.
    #[tracing::instrument(name = "backup_export", skip(self))]
    pub async fn export(&self) -> Result<String, BackupError> {
        let snapshot = self.snapshot().await?;
        let artifact = self.encode(&snapshot)?;
        info!(records = snapshot.record_count(), "Backup exported");
        Ok(artifact)
    }

    /// Replace the store's contents with the artifact's. Returns the number
    /// of records restored.
    #[tracing::instrument(name = "backup_import", skip_all)]
    pub async fn import(&self, artifact: &str) -> Result<usize, BackupError> {
        let snapshot = self.decode(artifact)?;
        self.restore(&snapshot).await?;
        info!(records = snapshot.record_count(), "Backup imported");
        Ok(snapshot.record_count())
    }

    /// Clear the store and insert every record of `snapshot`, atomically.
    pub async fn restore(&self, snapshot: &BackupSnapshot) -> Result<(), BackupError> {
        let mut batch = WriteBatch::new();
        batch.clear_all();
        for user in &snapshot.users {
            batch.insert(user)?;
        }
        for conversation in &snapshot.conversations {
            batch.insert(conversation)?;
        }
        for memory in &snapshot.memories {
            batch.insert(memory)?;
        }
        self.store.apply_batch(batch).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::cipher::testing::ReversingCipher;
    use crate::store::in_memory::InMemoryRecordStore;
    use memora_types::conversation::ChatMessage;
    use memora_types::memory::MemoryKind;
    use memora_types::record::ListOrder;

    use crate::memory::extractor::RuleBasedExtractor;

    type Codec = BackupCodec<InMemoryRecordStore, ReversingCipher>;

    async fn seeded() -> (Arc<InMemoryRecordStore>, Codec, User) {
        let store = Arc::new(InMemoryRecordStore::new());
        let user = User::new("Ada", Some("ada@example.com".to_string()));
        let mut conversation = Conversation::new(user.id, "Chat");
        conversation.push_message(ChatMessage::user("I love travel"));
        conversation.push_message(ChatMessage::assistant("Where to next?"));
        let memory = RuleBasedExtractor::extract("I love travel").into_memory(
            user.id,
            MemoryKind::Conversation,
            "I love travel",
            Some(conversation.id),
        );
        store.create(&user).await.unwrap();
        store.create(&conversation).await.unwrap();
        store.create(&memory).await.unwrap();

        let codec = BackupCodec::new(Arc::clone(&store), Arc::new(ReversingCipher));
        (store, codec, user)
    }

    fn sealed_b64(plaintext: &str) -> String {
        let sealed = ReversingCipher.seal(plaintext.as_bytes()).unwrap();
        base64::engine::general_purpose::STANDARD.encode(sealed)
    }

    #[tokio::test]
    async fn test_round_trip_restores_identical_records() {
        let (store, codec, _user) = seeded().await;
        let before = codec.snapshot().await.unwrap();
        let artifact = codec.export().await.unwrap();

        store.clear_all().await.unwrap();
        assert_eq!(store.count(Collection::Users).await.unwrap(), 0);

        assert_eq!(codec.import(&artifact).await.unwrap(), 3);
        let after = codec.snapshot().await.unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_import_replaces_existing_records() {
        let (store, codec, user) = seeded().await;
        let artifact = codec.export().await.unwrap();

        let extra = User::new("Grace", None);
        store.create(&extra).await.unwrap();
        codec.import(&artifact).await.unwrap();

        assert!(store.get_by_id::<User>(&extra.id).await.unwrap().is_none());
        let users: Vec<User> = store.list_by_user(&user.id, ListOrder::default()).await.unwrap();
        assert_eq!(users.len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_artifacts_leave_store_unchanged() {
        let (_store, codec, user) = seeded().await;
        let before = codec.snapshot().await.unwrap();

        let dup = serde_json::to_string(&serde_json::json!({
            "users": [user.clone(), user.clone()],
        }))
        .unwrap();
        let cases = [
            "%%% not base64 %%%".to_string(),
            base64::engine::general_purpose::STANDARD.encode(b"unsealed bytes"),
            sealed_b64("not json at all"),
            sealed_b64("[1, 2, 3]"),
            sealed_b64(r#"{"photos": []}"#),
            sealed_b64(r#"{"users": [{"id": "not-a-uuid"}]}"#),
            sealed_b64(&dup),
        ];

        for artifact in &cases {
            let err = codec.import(artifact).await.unwrap_err();
            assert!(
                matches!(err, BackupError::CorruptBackup(_)),
                "expected CorruptBackup for {artifact:?}, got {err:?}"
            );
            assert_eq!(codec.snapshot().await.unwrap(), before);
        }
    }

    #[tokio::test]
    async fn test_out_of_range_importance_rejected() {
        let (store, codec, _user) = seeded().await;
        let before = codec.snapshot().await.unwrap();

        for importance in [0u8, 11, 200] {
            let mut snapshot = before.clone();
            snapshot.memories[0].importance = importance;
            let artifact = codec.encode(&snapshot).unwrap();

            let err = codec.import(&artifact).await.unwrap_err();
            assert!(
                matches!(&err, BackupError::CorruptBackup(reason) if reason.contains("importance")),
                "expected CorruptBackup for importance {importance}, got {err:?}"
            );
            assert_eq!(codec.snapshot().await.unwrap(), before);
        }
        assert_eq!(store.count(Collection::Memories).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_missing_collections_import_empty_and_unknown_keys_ignored() {
        let (store, codec, user) = seeded().await;
        let doc = serde_json::to_string(&serde_json::json!({
            "users": [user],
            "settings": {"theme": "dark"},
        }))
        .unwrap();

        assert_eq!(codec.import(&sealed_b64(&doc)).await.unwrap(), 1);
        assert_eq!(store.count(Collection::Users).await.unwrap(), 1);
        assert_eq!(store.count(Collection::Conversations).await.unwrap(), 0);
        assert_eq!(store.count(Collection::Memories).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_empty_store_round_trips() {
        let store = Arc::new(InMemoryRecordStore::new());
        let codec = BackupCodec::new(Arc::clone(&store), Arc::new(ReversingCipher));
        let artifact = codec.export().await.unwrap();
        assert_eq!(codec.import(&artifact).await.unwrap(), 0);
    }
}
