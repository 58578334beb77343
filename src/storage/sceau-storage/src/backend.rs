//! Key store trait definition.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StorageError;
use crate::model::{KeyStatus, MasterKey};

/// Durable mapping from key identity to master key record.
///
/// Implementations must make [`atomic_rotate`](KeyStore::atomic_rotate)
/// all-or-nothing: no reader may ever observe the old key marked `ROTATED`
/// without the new key present, or the reverse.
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Durably creates a key and returns its storage row id.
    ///
    /// Fails with [`StorageError::AlreadyExists`] on a duplicate identity or version.
    async fn insert(&self, key: &MasterKey) -> Result<i64, StorageError>;

    /// Point lookup by key identity.
    async fn find_by_key_id(&self, key_id: &Uuid) -> Result<Option<MasterKey>, StorageError>;

    /// All `ACTIVE` keys, newest created first.
    async fn find_active(&self) -> Result<Vec<MasterKey>, StorageError>;

    /// The `ACTIVE` key with the highest version.
    async fn find_current_active(&self) -> Result<Option<MasterKey>, StorageError>;

    /// Every key regardless of status, ordered by ascending version.
    async fn find_all_versions(&self) -> Result<Vec<MasterKey>, StorageError>;

    /// Highest version ever stored, if any key exists.
    async fn latest_version(&self) -> Result<Option<u32>, StorageError>;

    /// Transactionally marks `old_key_id` as `ROTATED` and inserts `new_key`.
    ///
    /// The old key must still be `ACTIVE` when the transaction commits;
    /// otherwise [`StorageError::Conflict`] is returned and nothing changes.
    /// Returns the row id of the new key.
    async fn atomic_rotate(&self, old_key_id: &Uuid, new_key: &MasterKey)
        -> Result<i64, StorageError>;

    /// Compare-and-set status update.
    ///
    /// Fails with [`StorageError::Conflict`] if the key's status is no longer `expected`.
    async fn update_status(
        &self,
        key_id: &Uuid,
        expected: KeyStatus,
        status: KeyStatus,
    ) -> Result<(), StorageError>;

    /// Returns the name of this backend for logging/debugging.
    fn name(&self) -> &'static str;
}
