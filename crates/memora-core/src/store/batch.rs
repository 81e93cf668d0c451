//! Write batches for multi-record operations.
//!
//! A `WriteBatch` is an ordered list of pending writes that a `RecordStore`
//! applies all-or-nothing. Cascading deletes, rollover, and backup import
//! all go through a batch so a crash can never leave orphaned children.
//!
//! Guarded ops ([`WriteBatch::patch_with`], [`WriteBatch::delete_owned_where`])
//! carry closures that the store evaluates against the rows it reads inside
//! the batch's transaction, so they see every write committed before it.

use std::fmt;

use chrono::Utc;
use memora_types::error::StoreError;
use memora_types::record::{Collection, Record};
use uuid::Uuid;

/// A record in its stored form: identity columns plus the JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub collection: Collection,
    pub id: Uuid,
    pub user_id: Uuid,
    pub created_at_us: i64,
    pub updated_at_us: i64,
    pub body: String,
}

impl StoredRecord {
    /// Serialize a typed record, lifting its identity and timestamps into columns.
    pub fn encode<R: Record>(record: &R) -> Result<Self, StoreError> {
        let body = serde_json::to_string(record)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(Self {
            collection: R::COLLECTION,
            id: record.id(),
            user_id: record.owner_id(),
            created_at_us: record.created_at().timestamp_micros(),
            updated_at_us: record.updated_at().timestamp_micros(),
            body,
        })
    }

    pub fn decode<R: Record>(&self) -> Result<R, StoreError> {
        serde_json::from_str(&self.body).map_err(|e| {
            StoreError::Serialization(format!(
                "invalid {} record '{}': {e}",
                self.collection, self.id
            ))
        })
    }
}

/// Computes the replacement for a stored record, `None` to leave it as is.
pub type PatchFn =
    Box<dyn FnOnce(&StoredRecord) -> Result<Option<StoredRecord>, StoreError> + Send>;

/// Selects stored records for removal.
pub type MatchFn = Box<dyn Fn(&StoredRecord) -> Result<bool, StoreError> + Send>;

/// A single pending write.
pub enum WriteOp {
    /// Insert; fails the whole batch with `DuplicateKey` if the id exists.
    Insert(StoredRecord),
    /// Insert or replace by id.
    Upsert(StoredRecord),
    /// Remove by id; absent ids are not an error.
    Delete { collection: Collection, id: Uuid },
    /// Remove every record in a collection owned by `user_id`.
    DeleteOwnedBy { collection: Collection, user_id: Uuid },
    /// Re-read a record and replace it with what `apply` returns. Fails the
    /// batch with `NotFound` if the record is absent.
    Patch {
        collection: Collection,
        id: Uuid,
        apply: PatchFn,
    },
    /// Remove the records owned by `user_id` that `matches` selects.
    DeleteOwnedWhere {
        collection: Collection,
        user_id: Uuid,
        matches: MatchFn,
    },
    /// Truncate every collection.
    ClearAll,
}

impl fmt::Debug for WriteOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteOp::Insert(stored) => f.debug_tuple("Insert").field(stored).finish(),
            WriteOp::Upsert(stored) => f.debug_tuple("Upsert").field(stored).finish(),
            WriteOp::Delete { collection, id } => f
                .debug_struct("Delete")
                .field("collection", collection)
                .field("id", id)
                .finish(),
            WriteOp::DeleteOwnedBy {
                collection,
                user_id,
            } => f
                .debug_struct("DeleteOwnedBy")
                .field("collection", collection)
                .field("user_id", user_id)
                .finish(),
            WriteOp::Patch { collection, id, .. } => f
                .debug_struct("Patch")
                .field("collection", collection)
                .field("id", id)
                .finish_non_exhaustive(),
            WriteOp::DeleteOwnedWhere {
                collection,
                user_id,
                ..
            } => f
                .debug_struct("DeleteOwnedWhere")
                .field("collection", collection)
                .field("user_id", user_id)
                .finish_non_exhaustive(),
            WriteOp::ClearAll => f.write_str("ClearAll"),
        }
    }
}

/// Ordered list of writes applied atomically by [`super::repository::RecordStore::apply_batch`].
#[derive(Debug, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<R: Record>(&mut self, record: &R) -> Result<&mut Self, StoreError> {
        self.ops.push(WriteOp::Insert(StoredRecord::encode(record)?));
        Ok(self)
    }

    pub fn upsert<R: Record>(&mut self, record: &R) -> Result<&mut Self, StoreError> {
        self.ops.push(WriteOp::Upsert(StoredRecord::encode(record)?));
        Ok(self)
    }

    pub fn delete<R: Record>(&mut self, id: Uuid) -> &mut Self {
        self.ops.push(WriteOp::Delete {
            collection: R::COLLECTION,
            id,
        });
        self
    }

    pub fn delete_owned_by<R: Record>(&mut self, user_id: Uuid) -> &mut Self {
        self.ops.push(WriteOp::DeleteOwnedBy {
            collection: R::COLLECTION,
            user_id,
        });
        self
    }

    /// Merge `patch` into the current stored version of a record.
    pub fn update<R: Record>(&mut self, id: Uuid, patch: R::Patch) -> &mut Self {
        self.patch_with::<R>(id, move |_| Ok(Some(patch)))
    }

    /// Decide the patch from the current stored version of a record.
    ///
    /// `decide` runs inside the batch. Returning `Ok(None)` leaves the record
    /// untouched; returning an error (typically `Conflict`) fails the whole
    /// batch.
    pub fn patch_with<R: Record>(
        &mut self,
        id: Uuid,
        decide: impl FnOnce(&R) -> Result<Option<R::Patch>, StoreError> + Send + 'static,
    ) -> &mut Self {
        let apply: PatchFn = Box::new(move |stored: &StoredRecord| {
            let mut record: R = stored.decode()?;
            match decide(&record)? {
                Some(patch) => {
                    record.apply_patch(&patch, Utc::now());
                    StoredRecord::encode(&record).map(Some)
                }
                None => Ok(None),
            }
        });
        self.ops.push(WriteOp::Patch {
            collection: R::COLLECTION,
            id,
            apply,
        });
        self
    }

    /// Remove the records of `user_id` that `predicate` selects, as they
    /// stand when the batch runs.
    pub fn delete_owned_where<R: Record>(
        &mut self,
        user_id: Uuid,
        predicate: impl Fn(&R) -> bool + Send + 'static,
    ) -> &mut Self {
        let matches: MatchFn =
            Box::new(move |stored: &StoredRecord| Ok(predicate(&stored.decode::<R>()?)));
        self.ops.push(WriteOp::DeleteOwnedWhere {
            collection: R::COLLECTION,
            user_id,
            matches,
        });
        self
    }

    pub fn clear_all(&mut self) -> &mut Self {
        self.ops.push(WriteOp::ClearAll);
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}
