//! Per-conversation mutexes shared by the governor and the conversation
//! service.
//!
//! Entries exist only while someone holds or waits for a conversation's
//! lock; the last guard to drop removes its entry.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

type LockTable = DashMap<Uuid, Arc<Mutex<()>>>;

/// Registry of per-conversation locks. Clones share the same registry.
#[derive(Debug, Clone, Default)]
pub struct ConversationLocks {
    table: Arc<LockTable>,
}

impl ConversationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `conversation_id`.
    pub async fn acquire(&self, conversation_id: Uuid) -> ConversationGuard {
        // Cloned under the shard lock, so `remove_if` in Drop never drops
        // a mutex someone is about to wait on.
        let mutex = self.table.entry(conversation_id).or_default().clone();
        let guard = mutex.lock_owned().await;
        ConversationGuard {
            conversation_id,
            table: Arc::clone(&self.table),
            guard: Some(guard),
        }
    }

    /// Number of conversations with a held or awaited lock.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// Holds a conversation's lock until dropped.
#[derive(Debug)]
pub struct ConversationGuard {
    conversation_id: Uuid,
    table: Arc<LockTable>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ConversationGuard {
    fn drop(&mut self) {
        self.guard.take();
        self.table
            .remove_if(&self.conversation_id, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_entry_removed_after_last_guard() {
        let locks = ConversationLocks::new();
        let id = Uuid::now_v7();

        let guard = locks.acquire(id).await;
        assert_eq!(locks.len(), 1);
        drop(guard);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_entry_kept_while_waiter_queued() {
        let locks = ConversationLocks::new();
        let id = Uuid::now_v7();

        let first = locks.acquire(id).await;
        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(id).await;
            })
        };
        tokio::task::yield_now().await;
        while locks
            .table
            .get(&id)
            .is_some_and(|m| Arc::strong_count(&m) < 3)
        {
            tokio::task::yield_now().await;
        }

        drop(first);
        assert_eq!(locks.len(), 1);
        waiter.await.unwrap();
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_clones_share_the_registry() {
        let locks = ConversationLocks::new();
        let other = locks.clone();
        let id = Uuid::now_v7();

        let _guard = locks.acquire(id).await;
        let blocked = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            other.acquire(id),
        )
        .await;
        assert!(blocked.is_err());
    }
}
