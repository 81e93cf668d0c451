//! User identity types.
//!
//! A `User` is the identity anchor every other record points back to via
//! its `user_id`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::record::{Collection, Record};

/// Per-user settings blob.
///
/// `active_conversation_id` is the "current conversation" pointer. It lives
/// on the user record so callers always pass the user explicitly instead of
/// reading ambient state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserSettings {
    #[serde(default)]
    pub active_conversation_id: Option<Uuid>,
    /// Free-form client preferences, stored verbatim.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub preferences: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub display_name: String,
    pub email: Option<String>,
    pub settings: Option<UserSettings>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(display_name: impl Into<String>, email: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            display_name: display_name.into(),
            email,
            settings: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The conversation the user is currently chatting in, if any.
    pub fn active_conversation_id(&self) -> Option<Uuid> {
        self.settings
            .as_ref()
            .and_then(|s| s.active_conversation_id)
    }
}

/// Partial update for a [`User`].
///
/// `Some(None)` clears `email` or the active-conversation pointer; `None`
/// leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub display_name: Option<String>,
    pub email: Option<Option<String>>,
    pub active_conversation_id: Option<Option<Uuid>>,
    pub preferences: Option<serde_json::Map<String, serde_json::Value>>,
}

impl UserPatch {
    pub fn active_conversation(conversation_id: Uuid) -> Self {
        Self {
            active_conversation_id: Some(Some(conversation_id)),
            ..Self::default()
        }
    }

    pub fn clear_active_conversation() -> Self {
        Self {
            active_conversation_id: Some(None),
            ..Self::default()
        }
    }
}

impl Record for User {
    type Patch = UserPatch;

    const COLLECTION: Collection = Collection::Users;

    fn id(&self) -> Uuid {
        self.id
    }

    fn owner_id(&self) -> Uuid {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn apply_patch(&mut self, patch: &UserPatch, now: DateTime<Utc>) {
        if let Some(name) = &patch.display_name {
            self.display_name = name.clone();
        }
        if let Some(email) = &patch.email {
            self.email = email.clone();
        }
        match patch.active_conversation_id {
            Some(Some(conversation_id)) => {
                self.settings
                    .get_or_insert_with(UserSettings::default)
                    .active_conversation_id = Some(conversation_id);
            }
            Some(None) => {
                if let Some(settings) = self.settings.as_mut() {
                    settings.active_conversation_id = None;
                }
            }
            None => {}
        }
        if let Some(preferences) = &patch.preferences {
            self.settings
                .get_or_insert_with(UserSettings::default)
                .preferences = preferences.clone();
        }
        self.updated_at = now;
    }
}
