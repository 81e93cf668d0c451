//! SQLite record store implementation.
//!
//! Implements `RecordStore` from `memora-core` on a single `records` table
//! keyed by `(collection, id)`. Bodies are the records' JSON; identity and
//! timestamp columns are lifted out for owner-scoped, ordered listing.
//! Batches and read-modify-write updates run in one `BEGIN IMMEDIATE`
//! transaction on the writer, which takes SQLite's write lock before the
//! first read. Another process sharing the file waits on `busy_timeout`.

use chrono::Utc;
use memora_core::store::batch::{StoredRecord, WriteBatch, WriteOp};
use memora_core::store::repository::RecordStore;
use memora_types::error::StoreError;
use memora_types::record::{Collection, ListOrder, OrderField, Record, SortDirection};
use sqlx::pool::PoolConnection;
use sqlx::{Row, Sqlite, SqliteConnection};
use tracing::warn;
use uuid::Uuid;

use super::pool::DatabasePool;

/// SQLITE_FULL: the database or disk is full.
const SQLITE_FULL: &str = "13";

/// SQLite-backed implementation of `RecordStore`.
pub struct SqliteRecordStore {
    pool: DatabasePool,
}

impl SqliteRecordStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }
}

// ---------------------------------------------------------------------------
// Private Row type for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct RecordRow {
    collection: String,
    id: String,
    user_id: String,
    created_at_us: i64,
    updated_at_us: i64,
    body: String,
}

impl RecordRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            collection: row.try_get("collection")?,
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            created_at_us: row.try_get("created_at_us")?,
            updated_at_us: row.try_get("updated_at_us")?,
            body: row.try_get("body")?,
        })
    }

    fn into_stored(self) -> Result<StoredRecord, StoreError> {
        let collection: Collection = self
            .collection
            .parse()
            .map_err(|e: String| StoreError::Query(e))?;
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| StoreError::Query(format!("invalid id: {e}")))?;
        let user_id = Uuid::parse_str(&self.user_id)
            .map_err(|e| StoreError::Query(format!("invalid user_id: {e}")))?;
        Ok(StoredRecord {
            collection,
            id,
            user_id,
            created_at_us: self.created_at_us,
            updated_at_us: self.updated_at_us,
            body: self.body,
        })
    }
}

fn decode_row<R: Record>(row: &sqlx::sqlite::SqliteRow) -> Result<R, StoreError> {
    RecordRow::from_row(row)
        .map_err(|e| StoreError::Query(e.to_string()))?
        .into_stored()?
        .decode()
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.code().as_deref() == Some(SQLITE_FULL) => {
            StoreError::QuotaExceeded
        }
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Connection
        }
        _ => StoreError::Query(err.to_string()),
    }
}

fn map_insert_error(err: sqlx::Error, collection: Collection, id: Uuid) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return StoreError::DuplicateKey { collection, id };
        }
    }
    map_sqlx_error(err)
}

fn list_sql(order: ListOrder) -> &'static str {
    match (order.field, order.direction) {
        (OrderField::CreatedAt, SortDirection::Ascending) => {
            "SELECT * FROM records WHERE collection = ? AND user_id = ? ORDER BY created_at_us ASC, id ASC"
        }
        (OrderField::CreatedAt, SortDirection::Descending) => {
            "SELECT * FROM records WHERE collection = ? AND user_id = ? ORDER BY created_at_us DESC, id DESC"
        }
        (OrderField::UpdatedAt, SortDirection::Ascending) => {
            "SELECT * FROM records WHERE collection = ? AND user_id = ? ORDER BY updated_at_us ASC, id ASC"
        }
        (OrderField::UpdatedAt, SortDirection::Descending) => {
            "SELECT * FROM records WHERE collection = ? AND user_id = ? ORDER BY updated_at_us DESC, id DESC"
        }
    }
}

async fn insert_stored(conn: &mut SqliteConnection, stored: &StoredRecord) -> Result<(), StoreError> {
    sqlx::query(
        r#"INSERT INTO records (collection, id, user_id, created_at_us, updated_at_us, body)
           VALUES (?, ?, ?, ?, ?, ?)"#,
    )
    .bind(stored.collection.as_str())
    .bind(stored.id.to_string())
    .bind(stored.user_id.to_string())
    .bind(stored.created_at_us)
    .bind(stored.updated_at_us)
    .bind(&stored.body)
    .execute(conn)
    .await
    .map_err(|e| map_insert_error(e, stored.collection, stored.id))?;
    Ok(())
}

async fn upsert_stored(conn: &mut SqliteConnection, stored: &StoredRecord) -> Result<(), StoreError> {
    sqlx::query(
        r#"INSERT INTO records (collection, id, user_id, created_at_us, updated_at_us, body)
           VALUES (?, ?, ?, ?, ?, ?)
           ON CONFLICT (collection, id) DO UPDATE SET
               user_id = excluded.user_id,
               created_at_us = excluded.created_at_us,
               updated_at_us = excluded.updated_at_us,
               body = excluded.body"#,
    )
    .bind(stored.collection.as_str())
    .bind(stored.id.to_string())
    .bind(stored.user_id.to_string())
    .bind(stored.created_at_us)
    .bind(stored.updated_at_us)
    .bind(&stored.body)
    .execute(conn)
    .await
    .map_err(map_sqlx_error)?;
    Ok(())
}

async fn fetch_stored(
    conn: &mut SqliteConnection,
    collection: Collection,
    id: Uuid,
) -> Result<StoredRecord, StoreError> {
    let row = sqlx::query("SELECT * FROM records WHERE collection = ? AND id = ?")
        .bind(collection.as_str())
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await
        .map_err(map_sqlx_error)?
        .ok_or(StoreError::NotFound { collection, id })?;
    RecordRow::from_row(&row)
        .map_err(|e| StoreError::Query(e.to_string()))?
        .into_stored()
}

async fn delete_stored(
    conn: &mut SqliteConnection,
    collection: Collection,
    id: Uuid,
) -> Result<(), StoreError> {
    sqlx::query("DELETE FROM records WHERE collection = ? AND id = ?")
        .bind(collection.as_str())
        .bind(id.to_string())
        .execute(conn)
        .await
        .map_err(map_sqlx_error)?;
    Ok(())
}

async fn execute_op(conn: &mut SqliteConnection, op: WriteOp) -> Result<(), StoreError> {
    match op {
        WriteOp::Insert(stored) => insert_stored(conn, &stored).await,
        WriteOp::Upsert(stored) => upsert_stored(conn, &stored).await,
        WriteOp::Delete { collection, id } => delete_stored(conn, collection, id).await,
        WriteOp::DeleteOwnedBy {
            collection,
            user_id,
        } => {
            sqlx::query("DELETE FROM records WHERE collection = ? AND user_id = ?")
                .bind(collection.as_str())
                .bind(user_id.to_string())
                .execute(conn)
                .await
                .map_err(map_sqlx_error)?;
            Ok(())
        }
        WriteOp::Patch {
            collection,
            id,
            apply,
        } => {
            let current = fetch_stored(conn, collection, id).await?;
            match apply(&current)? {
                Some(next) => upsert_stored(conn, &next).await,
                None => Ok(()),
            }
        }
        WriteOp::DeleteOwnedWhere {
            collection,
            user_id,
            matches,
        } => {
            let rows = sqlx::query("SELECT * FROM records WHERE collection = ? AND user_id = ?")
                .bind(collection.as_str())
                .bind(user_id.to_string())
                .fetch_all(&mut *conn)
                .await
                .map_err(map_sqlx_error)?;
            for row in &rows {
                let stored = RecordRow::from_row(row)
                    .map_err(|e| StoreError::Query(e.to_string()))?
                    .into_stored()?;
                if matches(&stored)? {
                    delete_stored(conn, collection, stored.id).await?;
                }
            }
            Ok(())
        }
        WriteOp::ClearAll => {
            sqlx::query("DELETE FROM records")
                .execute(conn)
                .await
                .map_err(map_sqlx_error)?;
            Ok(())
        }
    }
}

async fn execute_ops(conn: &mut SqliteConnection, ops: Vec<WriteOp>) -> Result<(), StoreError> {
    for op in ops {
        execute_op(conn, op).await?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Immediate transactions
// ---------------------------------------------------------------------------

/// Acquire the writer and open a transaction holding SQLite's write lock.
async fn begin_immediate(pool: &sqlx::SqlitePool) -> Result<PoolConnection<Sqlite>, StoreError> {
    let mut conn = pool.acquire().await.map_err(map_sqlx_error)?;
    sqlx::query("BEGIN IMMEDIATE")
        .execute(&mut *conn)
        .await
        .map_err(map_sqlx_error)?;
    Ok(conn)
}

/// Commit when `result` is Ok, roll back otherwise.
async fn finish<T>(
    mut conn: PoolConnection<Sqlite>,
    result: Result<T, StoreError>,
) -> Result<T, StoreError> {
    match result {
        Ok(value) => match sqlx::query("COMMIT").execute(&mut *conn).await {
            Ok(_) => Ok(value),
            Err(e) => {
                rollback(conn).await;
                Err(map_sqlx_error(e))
            }
        },
        Err(e) => {
            rollback(conn).await;
            Err(e)
        }
    }
}

async fn rollback(mut conn: PoolConnection<Sqlite>) {
    if let Err(e) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
        // A connection stuck inside a transaction must not go back to the pool.
        warn!(error = %e, "Rollback failed; discarding writer connection");
        drop(conn.detach());
    }
}

// ---------------------------------------------------------------------------
// RecordStore implementation
// ---------------------------------------------------------------------------

impl RecordStore for SqliteRecordStore {
    async fn create<R: Record>(&self, record: &R) -> Result<(), StoreError> {
        let stored = StoredRecord::encode(record)?;
        let mut conn = self.pool.writer.acquire().await.map_err(map_sqlx_error)?;
        insert_stored(&mut conn, &stored).await
    }

    async fn get_by_id<R: Record>(&self, id: &Uuid) -> Result<Option<R>, StoreError> {
        let row = sqlx::query("SELECT * FROM records WHERE collection = ? AND id = ?")
            .bind(R::COLLECTION.as_str())
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(map_sqlx_error)?;

        row.as_ref().map(decode_row::<R>).transpose()
    }

    async fn list_by_user<R: Record>(
        &self,
        user_id: &Uuid,
        order: ListOrder,
    ) -> Result<Vec<R>, StoreError> {
        let rows = sqlx::query(list_sql(order))
            .bind(R::COLLECTION.as_str())
            .bind(user_id.to_string())
            .fetch_all(&self.pool.reader)
            .await
            .map_err(map_sqlx_error)?;

        rows.iter().map(decode_row::<R>).collect()
    }

    async fn update<R: Record>(&self, id: &Uuid, patch: &R::Patch) -> Result<R, StoreError> {
        let mut conn = begin_immediate(&self.pool.writer).await?;
        let result = async {
            let mut record: R = fetch_stored(&mut conn, R::COLLECTION, *id).await?.decode()?;
            record.apply_patch(patch, Utc::now());
            upsert_stored(&mut conn, &StoredRecord::encode(&record)?).await?;
            Ok::<R, StoreError>(record)
        }
        .await;
        finish(conn, result).await
    }

    async fn delete(&self, collection: Collection, id: &Uuid) -> Result<(), StoreError> {
        let mut conn = self.pool.writer.acquire().await.map_err(map_sqlx_error)?;
        delete_stored(&mut conn, collection, *id).await
    }

    async fn clear_all(&self) -> Result<(), StoreError> {
        let mut conn = self.pool.writer.acquire().await.map_err(map_sqlx_error)?;
        execute_op(&mut conn, WriteOp::ClearAll).await
    }

    async fn dump_collection<R: Record>(&self) -> Result<Vec<R>, StoreError> {
        let rows = sqlx::query("SELECT * FROM records WHERE collection = ? ORDER BY created_at_us ASC, id ASC")
            .bind(R::COLLECTION.as_str())
            .fetch_all(&self.pool.reader)
            .await
            .map_err(map_sqlx_error)?;

        rows.iter().map(decode_row::<R>).collect()
    }

    async fn apply_batch(&self, batch: WriteBatch) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut conn = begin_immediate(&self.pool.writer).await?;
        let result = execute_ops(&mut conn, batch.into_ops()).await;
        finish(conn, result).await
    }

    async fn count(&self, collection: Collection) -> Result<u64, StoreError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM records WHERE collection = ?")
            .bind(collection.as_str())
            .fetch_one(&self.pool.reader)
            .await
            .map_err(map_sqlx_error)?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use memora_core::chat::governor::{SendOutcome, SessionGovernor};
    use memora_core::chat::session::SessionThresholds;
    use memora_core::chat::summarizer::ConversationSummarizer;
    use memora_core::memory::extractor::MemoryExtractor;
    use memora_types::conversation::{ChatMessage, Conversation, ConversationPatch};
    use memora_types::error::ChatError;
    use memora_types::memory::{Memory, MemoryKind};
    use memora_types::user::User;

    async fn test_store() -> (tempfile::TempDir, SqliteRecordStore) {
        let dir = tempfile::tempdir().unwrap();
        let pool = DatabasePool::open_in(dir.path()).await.unwrap();
        (dir, SqliteRecordStore::new(pool))
    }

    /// Two stores on one database file, as two CLI processes would open it.
    async fn shared_stores() -> (tempfile::TempDir, Arc<SqliteRecordStore>, Arc<SqliteRecordStore>) {
        let dir = tempfile::tempdir().unwrap();
        let first = SqliteRecordStore::new(DatabasePool::open_in(dir.path()).await.unwrap());
        let second = SqliteRecordStore::new(DatabasePool::open_in(dir.path()).await.unwrap());
        (dir, Arc::new(first), Arc::new(second))
    }

    fn governor(store: &Arc<SqliteRecordStore>, max_messages: u32) -> Arc<SessionGovernor<SqliteRecordStore>> {
        Arc::new(SessionGovernor::new(
            Arc::clone(store),
            SessionThresholds::new(max_messages, 0.8),
            MemoryExtractor::rule_based(),
            ConversationSummarizer::rule_based(),
        ))
    }

    fn memory(user_id: Uuid, content: &str) -> Memory {
        let now = Utc::now();
        Memory {
            id: Uuid::now_v7(),
            user_id,
            kind: MemoryKind::Personal,
            content: content.to_string(),
            summary: content.to_string(),
            importance: 5,
            tags: Default::default(),
            metadata: None,
            source_conversation_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_roundtrip() {
        let (_dir, store) = test_store().await;
        let user = User::new("Ada", Some("ada@example.com".to_string()));
        store.create(&user).await.unwrap();

        let loaded: User = store.get_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(loaded, user);
        assert!(store.get_by_id::<User>(&Uuid::now_v7()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_duplicate_is_duplicate_key() {
        let (_dir, store) = test_store().await;
        let user = User::new("Ada", None);
        store.create(&user).await.unwrap();

        let err = store.create(&user).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::DuplicateKey { collection: Collection::Users, id } if id == user.id
        ));
    }

    #[tokio::test]
    async fn test_list_by_user_is_owner_scoped_and_ordered() {
        let (_dir, store) = test_store().await;
        let ada = Uuid::now_v7();
        let grace = Uuid::now_v7();

        let first = memory(ada, "first");
        let mut second = memory(ada, "second");
        second.updated_at = first.updated_at + chrono::Duration::seconds(5);
        store.create(&first).await.unwrap();
        store.create(&second).await.unwrap();
        store.create(&memory(grace, "not yours")).await.unwrap();

        let newest_first: Vec<Memory> = store.list_by_user(&ada, ListOrder::default()).await.unwrap();
        let contents: Vec<&str> = newest_first.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["second", "first"]);

        let oldest_first: Vec<Memory> = store
            .list_by_user(&ada, ListOrder::oldest_created())
            .await
            .unwrap();
        assert_eq!(oldest_first[0].content, "first");
    }

    #[tokio::test]
    async fn test_update_patches_and_bumps_updated_at() {
        let (_dir, store) = test_store().await;
        let conversation = Conversation::new(Uuid::now_v7(), "Chat");
        store.create(&conversation).await.unwrap();

        let updated: Conversation = store
            .update(&conversation.id, &ConversationPatch::append(ChatMessage::user("hello")))
            .await
            .unwrap();
        assert_eq!(updated.message_count(), 1);
        assert!(updated.updated_at >= conversation.updated_at);

        let err = store
            .update::<Conversation>(&Uuid::now_v7(), &ConversationPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (_dir, store) = test_store().await;
        let user = User::new("Ada", None);
        store.create(&user).await.unwrap();

        store.delete(Collection::Users, &user.id).await.unwrap();
        store.delete(Collection::Users, &user.id).await.unwrap();
        assert_eq!(store.count(Collection::Users).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_batch_rolls_back_on_failure() {
        let (_dir, store) = test_store().await;
        let existing = User::new("Ada", None);
        store.create(&existing).await.unwrap();

        let fresh = User::new("Grace", None);
        let mut batch = WriteBatch::new();
        batch.clear_all();
        batch.insert(&fresh).unwrap();
        batch.insert(&fresh).unwrap();

        let err = store.apply_batch(batch).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey { .. }));
        assert!(store.get_by_id::<User>(&existing.id).await.unwrap().is_some());
        assert!(store.get_by_id::<User>(&fresh.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_owned_by_and_dump() {
        let (_dir, store) = test_store().await;
        let ada = Uuid::now_v7();
        let grace = Uuid::now_v7();
        store.create(&memory(ada, "a1")).await.unwrap();
        store.create(&memory(ada, "a2")).await.unwrap();
        store.create(&memory(grace, "g1")).await.unwrap();

        let mut batch = WriteBatch::new();
        batch.delete_owned_by::<Memory>(ada);
        store.apply_batch(batch).await.unwrap();

        let all: Vec<Memory> = store.dump_collection().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].user_id, grace);
    }

    #[tokio::test]
    async fn test_clear_all_truncates_every_collection() {
        let (_dir, store) = test_store().await;
        let user = User::new("Ada", None);
        store.create(&user).await.unwrap();
        store.create(&Conversation::new(user.id, "Chat")).await.unwrap();

        store.clear_all().await.unwrap();
        for collection in Collection::ALL {
            assert_eq!(store.count(collection).await.unwrap(), 0);
        }
    }

    #[tokio::test]
    async fn test_guarded_patch_sees_committed_state() {
        let (_dir, store) = test_store().await;
        let conversation = Conversation::new(Uuid::now_v7(), "Chat");
        store.create(&conversation).await.unwrap();
        let id = conversation.id;

        let mut batch = WriteBatch::new();
        batch.update::<Conversation>(
            id,
            ConversationPatch {
                superseded_by: Some(Uuid::now_v7()),
                ..ConversationPatch::default()
            },
        );
        store.apply_batch(batch).await.unwrap();

        let mut batch = WriteBatch::new();
        batch.patch_with::<Conversation>(id, move |c| {
            if c.is_superseded() {
                return Err(StoreError::Conflict {
                    collection: Collection::Conversations,
                    id,
                });
            }
            Ok(Some(ConversationPatch::append(ChatMessage::user("late"))))
        });
        let err = store.apply_batch(batch).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));

        let stored: Conversation = store.get_by_id(&id).await.unwrap().unwrap();
        assert_eq!(stored.message_count(), 0);

        // The writer connection is usable again after the rollback.
        store.create(&User::new("Ada", None)).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_owned_where_only_removes_matches() {
        let (_dir, store) = test_store().await;
        let ada = Uuid::now_v7();
        let source = Uuid::now_v7();
        let mut linked = memory(ada, "from chat");
        linked.source_conversation_id = Some(source);
        store.create(&linked).await.unwrap();
        store.create(&memory(ada, "manual")).await.unwrap();

        let mut batch = WriteBatch::new();
        batch.delete_owned_where::<Memory>(ada, move |m| m.source_conversation_id == Some(source));
        store.apply_batch(batch).await.unwrap();

        let left: Vec<Memory> = store.list_by_user(&ada, ListOrder::default()).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].content, "manual");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_updates_from_two_stores_are_not_lost() {
        let (_dir, first, second) = shared_stores().await;
        let conversation = Conversation::new(Uuid::now_v7(), "Shared");
        first.create(&conversation).await.unwrap();
        let id = conversation.id;

        let mut handles = Vec::new();
        for i in 0..20 {
            let store = Arc::clone(if i % 2 == 0 { &first } else { &second });
            handles.push(tokio::spawn(async move {
                store
                    .update::<Conversation>(
                        &id,
                        &ConversationPatch::append(ChatMessage::user(format!("message {i}"))),
                    )
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let stored: Conversation = second.get_by_id(&id).await.unwrap().unwrap();
        assert_eq!(stored.message_count(), 20);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_sends_through_two_stores_keep_every_message() {
        let (_dir, first, second) = shared_stores().await;
        let user = User::new("Ada", None);
        let conversation = Conversation::new(user.id, "Shared");
        first.create(&user).await.unwrap();
        first.create(&conversation).await.unwrap();
        let (user_id, conversation_id) = (user.id, conversation.id);

        let governors = [governor(&first, 100), governor(&second, 100)];
        let mut handles = Vec::new();
        for i in 0..20 {
            let governor = Arc::clone(&governors[i % 2]);
            handles.push(tokio::spawn(async move {
                governor
                    .send_message(user_id, conversation_id, &format!("message {i}"))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let stored: Conversation = first.get_by_id(&conversation_id).await.unwrap().unwrap();
        assert_eq!(stored.message_count(), 20);
        assert_eq!(second.count(Collection::Memories).await.unwrap(), 20);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_rollover_through_two_stores_happens_once() {
        let (_dir, first, second) = shared_stores().await;
        let user = User::new("Ada", None);
        let mut conversation = Conversation::new(user.id, "Shared");
        for i in 0..3 {
            conversation.push_message(ChatMessage::user(format!("message {i}")));
        }
        first.create(&user).await.unwrap();
        first.create(&conversation).await.unwrap();
        let (user_id, conversation_id) = (user.id, conversation.id);

        let governors = [governor(&first, 3), governor(&second, 3)];
        let mut handles = Vec::new();
        for i in 0..8 {
            let governor = Arc::clone(&governors[i % 2]);
            handles.push(tokio::spawn(async move {
                governor.send_message(user_id, conversation_id, "one more").await
            }));
        }
        let mut rollovers = 0;
        let mut superseded = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(SendOutcome::RolledOver { .. }) => rollovers += 1,
                Err(ChatError::Superseded { .. }) => superseded += 1,
                other => panic!("unexpected send result: {other:?}"),
            }
        }
        assert_eq!(rollovers, 1);
        assert_eq!(superseded, 7);
        assert_eq!(first.count(Collection::Conversations).await.unwrap(), 2);
        assert_eq!(first.count(Collection::Memories).await.unwrap(), 1);
    }
}
