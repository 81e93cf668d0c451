//! The generic record pattern shared by every stored entity.
//!
//! Every entity lives in exactly one named [`Collection`], has a globally
//! unique id, and is owned by a user. Mutation goes through a statically
//! typed patch so identity fields can never be rewritten by an update.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// A named table of records of one entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Users,
    Conversations,
    Memories,
}

impl Collection {
    /// Every collection, in the order they appear in a backup snapshot.
    pub const ALL: [Collection; 3] = [
        Collection::Users,
        Collection::Conversations,
        Collection::Memories,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Conversations => "conversations",
            Collection::Memories => "memories",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "users" => Ok(Collection::Users),
            "conversations" => Ok(Collection::Conversations),
            "memories" => Ok(Collection::Memories),
            other => Err(format!("invalid collection: '{other}'")),
        }
    }
}

/// A typed entity stored in a [`Collection`].
///
/// `owner_id` is the `user_id` foreign key; for `User` itself it is the
/// user's own id, which keeps owner-scoped queries uniform across
/// collections.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Field-set describing a partial update. Never carries `id` or `user_id`.
    type Patch: Send + Sync + 'static;

    const COLLECTION: Collection;

    fn id(&self) -> Uuid;

    fn owner_id(&self) -> Uuid;

    fn created_at(&self) -> DateTime<Utc>;

    fn updated_at(&self) -> DateTime<Utc>;

    /// Merge `patch` into the record, stamping `updated_at` with `now`.
    fn apply_patch(&mut self, patch: &Self::Patch, now: DateTime<Utc>);
}

/// Timestamp a listing is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderField {
    CreatedAt,
    #[default]
    UpdatedAt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Ascending,
    #[default]
    Descending,
}

/// Ordering for `list_by_user`. The default is most-recent-first by
/// `updated_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ListOrder {
    pub field: OrderField,
    pub direction: SortDirection,
}

impl ListOrder {
    pub fn newest_created() -> Self {
        Self {
            field: OrderField::CreatedAt,
            direction: SortDirection::Descending,
        }
    }

    pub fn oldest_created() -> Self {
        Self {
            field: OrderField::CreatedAt,
            direction: SortDirection::Ascending,
        }
    }
}
