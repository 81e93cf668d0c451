//! Per-collection record counts.

use memora_types::error::StoreError;
use memora_types::record::Collection;
use serde::Serialize;

use super::repository::RecordStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub users: u64,
    pub conversations: u64,
    pub memories: u64,
}

impl StoreStats {
    pub async fn collect<S: RecordStore>(store: &S) -> Result<Self, StoreError> {
        Ok(Self {
            users: store.count(Collection::Users).await?,
            conversations: store.count(Collection::Conversations).await?,
            memories: store.count(Collection::Memories).await?,
        })
    }

    pub fn total(&self) -> u64 {
        self.users + self.conversations + self.memories
    }
}
