//! RecordStore trait definition.
//!
//! Generic keyed CRUD over the named collections, scoped by owning user.
//! Follows the RPITIT repository pattern: native async fn in traits.

use memora_types::error::StoreError;
use memora_types::record::{Collection, ListOrder, Record};
use uuid::Uuid;

use super::batch::WriteBatch;

/// Durable, per-collection keyed storage with owner-scoped queries.
///
/// Every write is persisted before the returned future resolves; there is
/// no buffering layer. Writes spanning several records must go through
/// [`RecordStore::apply_batch`], which is all-or-nothing.
///
/// Implementations live in memora-infra (e.g., `SqliteRecordStore`).
pub trait RecordStore: Send + Sync {
    /// Insert a new record. Fails with `DuplicateKey` if the id exists.
    fn create<R: Record>(
        &self,
        record: &R,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Get a record by id.
    fn get_by_id<R: Record>(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<R>, StoreError>> + Send;

    /// List every record owned by `user_id`, in the requested order.
    ///
    /// This is the only query path higher-level features use; there is no
    /// cross-user listing.
    fn list_by_user<R: Record>(
        &self,
        user_id: &Uuid,
        order: ListOrder,
    ) -> impl std::future::Future<Output = Result<Vec<R>, StoreError>> + Send;

    /// Merge a typed patch into an existing record and return the result.
    ///
    /// The read and the write are one atomic step, also against other
    /// processes sharing the store. Fails with `NotFound` if the id is absent.
    fn update<R: Record>(
        &self,
        id: &Uuid,
        patch: &R::Patch,
    ) -> impl std::future::Future<Output = Result<R, StoreError>> + Send;

    /// Remove a record. Removing an absent id is not an error.
    fn delete(
        &self,
        collection: Collection,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Truncate every collection.
    fn clear_all(&self) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Read an entire collection across all users. Used only by the backup codec.
    fn dump_collection<R: Record>(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<R>, StoreError>> + Send;

    /// Apply every write in `batch` atomically.
    ///
    /// Guarded ops see the records as they stand inside the batch, and no
    /// other writer, in this process or another, can interleave with it.
    fn apply_batch(
        &self,
        batch: WriteBatch,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Number of records in a collection.
    fn count(
        &self,
        collection: Collection,
    ) -> impl std::future::Future<Output = Result<u64, StoreError>> + Send;
}
