//! Account lifecycle: profile management, whole-account export/import, and
//! account deletion.

use std::sync::Arc;

use chrono::Utc;
use memora_types::backup::{AccountExport, EXPORT_FORMAT_VERSION};
use memora_types::conversation::Conversation;
use memora_types::error::{AccountError, BackupError};
use memora_types::memory::Memory;
use memora_types::user::{User, UserPatch};
use tracing::info;
use uuid::Uuid;

use crate::backup::cipher::SnapshotCipher;
use crate::backup::codec::BackupCodec;
use crate::store::batch::WriteBatch;
use crate::store::repository::RecordStore;

fn validate_display_name(name: &str) -> Result<String, AccountError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AccountError::InvalidName("display name cannot be empty".to_string()));
    }
    if trimmed.chars().count() > 100 {
        return Err(AccountError::InvalidName(
            "display name must be at most 100 characters".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

pub struct AccountService<S: RecordStore, C: SnapshotCipher> {
    store: Arc<S>,
    codec: BackupCodec<S, C>,
}

impl<S: RecordStore, C: SnapshotCipher> AccountService<S, C> {
    pub fn new(store: Arc<S>, cipher: Arc<C>) -> Self {
        Self {
            codec: BackupCodec::new(Arc::clone(&store), cipher),
            store,
        }
    }

    pub fn codec(&self) -> &BackupCodec<S, C> {
        &self.codec
    }

    #[tracing::instrument(skip_all)]
    pub async fn create_user(
        &self,
        display_name: &str,
        email: Option<String>,
    ) -> Result<User, AccountError> {
        let user = User::new(validate_display_name(display_name)?, email);
        self.store.create(&user).await?;
        info!(user_id = %user.id, "User created");
        Ok(user)
    }

    pub async fn get_user(&self, user_id: &Uuid) -> Result<User, AccountError> {
        self.store
            .get_by_id(user_id)
            .await?
            .ok_or(AccountError::UserNotFound(*user_id))
    }

    #[tracing::instrument(skip(self, patch), fields(user_id = %user_id))]
    pub async fn update_user(&self, user_id: &Uuid, patch: UserPatch) -> Result<User, AccountError> {
        let mut patch = patch;
        if let Some(name) = &patch.display_name {
            patch.display_name = Some(validate_display_name(name)?);
        }
        self.get_user(user_id).await?;
        Ok(self.store.update(user_id, &patch).await?)
    }

    /// Export envelope holding the user profile and the encrypted store.
    #[tracing::instrument(skip(self), fields(user_id = %user_id))]
    pub async fn export_account(&self, user_id: &Uuid) -> Result<AccountExport, AccountError> {
        let user = self.get_user(user_id).await?;
        let database = self.codec.export().await?;
        Ok(AccountExport {
            version: EXPORT_FORMAT_VERSION.to_string(),
            user,
            database,
            exported_at: Utc::now().timestamp_millis(),
        })
    }

    /// Restore from an export envelope. The envelope's user must be present
    /// in its database; all checks run before the store is replaced.
    #[tracing::instrument(skip_all, fields(user_id = %export.user.id))]
    pub async fn import_account(&self, export: &AccountExport) -> Result<usize, AccountError> {
        if export.version != EXPORT_FORMAT_VERSION {
            return Err(BackupError::UnsupportedVersion(export.version.clone()).into());
        }
        let snapshot = self.codec.decode(&export.database)?;
        if !snapshot.users.iter().any(|u| u.id == export.user.id) {
            return Err(BackupError::CorruptBackup(
                "envelope user is missing from its database".to_string(),
            )
            .into());
        }
        self.codec.restore(&snapshot).await?;
        info!(records = snapshot.record_count(), "Account imported");
        Ok(snapshot.record_count())
    }

    /// Delete the user with every conversation and memory they own.
    ///
    /// Returns a backup artifact taken just before the deletion, which
    /// [`BackupCodec::import`] accepts to roll it back.
    #[tracing::instrument(skip(self), fields(user_id = %user_id))]
    pub async fn delete_account(&self, user_id: &Uuid) -> Result<String, AccountError> {
        self.get_user(user_id).await?;
        let rollback = self.codec.export().await?;

        let mut batch = WriteBatch::new();
        batch
            .delete_owned_by::<Memory>(*user_id)
            .delete_owned_by::<Conversation>(*user_id)
            .delete::<User>(*user_id);
        self.store.apply_batch(batch).await?;

        info!("Account deleted");
        Ok(rollback)
    }
}
