//! Master key lifecycle manager.
//!
//! Owns creation, lookup, rotation and status changes of master keys, and
//! routes envelope operations to the right key.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{debug, info, warn};
use uuid::Uuid;
use zeroize::Zeroizing;

use sceau_crypto::KeyMaterial;
use sceau_storage::{KeyStatus, KeyStore, MasterKey, StorageError};

use crate::envelope::{self, EnvelopeBundle, KeySource, KeyVersions};
use crate::error::KmsError;

/// Default advisory lifetime of a master key.
pub const DEFAULT_KEY_LIFETIME: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Default deadline applied to each store call.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Tunables for [`KeyManager`].
#[derive(Debug, Clone)]
pub struct KeyManagerConfig {
    /// Added to the creation time to compute `expires_at`.
    pub key_lifetime: Duration,
    /// Deadline for each store call. `None` waits forever.
    pub store_timeout: Option<Duration>,
}

impl Default for KeyManagerConfig {
    fn default() -> Self {
        Self {
            key_lifetime: DEFAULT_KEY_LIFETIME,
            store_timeout: Some(DEFAULT_STORE_TIMEOUT),
        }
    }
}

/// Result of an envelope encryption.
#[derive(Debug, Clone)]
pub struct SealedEnvelope {
    /// Sealed message and wrapped data key.
    pub bundle: EnvelopeBundle,
    /// Identity of the master key that wrapped the data key.
    pub key_id: Uuid,
    /// Version of that master key.
    pub key_version: u32,
}

/// Manages versioned master keys on top of a [`KeyStore`].
///
/// Holds no key state of its own: every call reads through to the store.
pub struct KeyManager {
    store: Arc<dyn KeyStore>,
    config: KeyManagerConfig,
}

impl KeyManager {
    /// Creates a manager with the default configuration.
    pub fn new(store: Arc<dyn KeyStore>) -> Self {
        Self::with_config(store, KeyManagerConfig::default())
    }

    /// Creates a manager with an explicit configuration.
    pub fn with_config(store: Arc<dyn KeyStore>, config: KeyManagerConfig) -> Self {
        info!(
            backend = store.name(),
            timeout = ?config.store_timeout,
            "Key manager initialized"
        );
        Self { store, config }
    }

    /// Name of the underlying store backend.
    pub fn backend_name(&self) -> &'static str {
        self.store.name()
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn now() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }

    /// Runs a store call under the configured deadline.
    ///
    /// The outer error is the deadline; the inner one is the store's own.
    async fn bounded<T, F>(
        &self,
        op: &'static str,
        call: F,
    ) -> Result<Result<T, StorageError>, KmsError>
    where
        F: Future<Output = Result<T, StorageError>>,
    {
        match self.config.store_timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
                warn!(op, backend = self.store.name(), "Store call timed out");
                KmsError::DeadlineExceeded(op.to_string())
            }),
            None => Ok(call.await),
        }
    }

    /// Next unused version: one past both the highest stored version and `floor`.
    async fn next_version(&self, floor: u32) -> Result<Option<u32>, KmsError> {
        let latest = self.bounded("latest_version", self.store.latest_version()).await??;
        Ok(latest.unwrap_or(0).max(floor).checked_add(1))
    }

    fn new_key(&self, version: u32) -> Result<MasterKey, KmsError> {
        let material =
            KeyMaterial::generate().map_err(|e| KmsError::KeyGeneration(e.to_string()))?;
        let created_at = Self::now();

        Ok(MasterKey {
            id: None,
            key_id: Uuid::new_v4(),
            material,
            version,
            status: KeyStatus::Active,
            created_at,
            expires_at: created_at.saturating_add(self.config.key_lifetime.as_secs()),
        })
    }

    // ========================================================================
    // Key Lifecycle
    // ========================================================================

    /// Creates a new `ACTIVE` key with the next unused version.
    ///
    /// The first key of an empty store gets version 1. Refused with
    /// [`KmsError::ActiveKeyExists`] while another key is `ACTIVE`; use
    /// [`rotate_key`](Self::rotate_key) to replace it. As with reactivation,
    /// the check and the insert are two store calls.
    pub async fn create_key(&self) -> Result<MasterKey, KmsError> {
        let current = self
            .bounded("find_current_active", self.store.find_current_active())
            .await??;
        if let Some(active) = current {
            return Err(KmsError::ActiveKeyExists {
                key_id: active.key_id.to_string(),
                version: active.version,
            });
        }

        let version = self
            .next_version(0)
            .await?
            .ok_or_else(|| KmsError::StoreWrite("version space exhausted".into()))?;

        let mut key = self.new_key(version)?;
        let id = self
            .bounded("insert", self.store.insert(&key))
            .await?
            .map_err(|e| KmsError::StoreWrite(e.to_string()))?;
        key.id = Some(id);

        info!(key_id = %key.key_id, version = key.version, "Master key created");

        Ok(key)
    }

    /// Looks up a key by identity regardless of status.
    pub async fn get_key(&self, key_id: &Uuid) -> Result<MasterKey, KmsError> {
        debug!(key_id = %key_id, "Looking up master key");

        self.bounded("find_by_key_id", self.store.find_by_key_id(key_id))
            .await??
            .ok_or_else(|| KmsError::KeyNotFound(key_id.to_string()))
    }

    /// All `ACTIVE` keys, newest created first. Possibly empty.
    pub async fn list_active_keys(&self) -> Result<Vec<MasterKey>, KmsError> {
        let active = self.bounded("find_active", self.store.find_active()).await??;

        if active.len() > 1 {
            warn!(count = active.len(), "More than one master key is ACTIVE");
        }

        Ok(active)
    }

    /// The `ACTIVE` key with the highest version.
    pub async fn get_current_active_key(&self) -> Result<MasterKey, KmsError> {
        self.bounded("find_current_active", self.store.find_current_active())
            .await??
            .ok_or(KmsError::NoActiveKey)
    }

    /// Every key regardless of status, indexed by version.
    pub async fn get_all_key_versions(&self) -> Result<KeyVersions, KmsError> {
        let keys = self
            .bounded("find_all_versions", self.store.find_all_versions())
            .await??;

        Ok(keys.into_iter().map(|k| (k.version, k)).collect())
    }

    /// Replaces the current active key with a fresh one, atomically.
    ///
    /// The new key gets the previous active version + 1, or one past the
    /// highest stored version when a parked key already holds that number.
    /// On any failure the previous key is still `ACTIVE` and no new key
    /// exists; losing a race to another writer yields
    /// [`KmsError::RotationConflict`].
    pub async fn rotate_key(&self) -> Result<MasterKey, KmsError> {
        let current = self.get_current_active_key().await?;

        let version = self
            .next_version(current.version)
            .await?
            .ok_or_else(|| KmsError::Rotation("version space exhausted".into()))?;
        let mut key = self.new_key(version)?;

        let id = self
            .bounded("atomic_rotate", self.store.atomic_rotate(&current.key_id, &key))
            .await?
            .map_err(|e| match e {
                StorageError::Conflict(_) | StorageError::AlreadyExists(_) => {
                    KmsError::RotationConflict(e.to_string())
                },
                other => KmsError::Rotation(other.to_string()),
            })?;
        key.id = Some(id);

        info!(
            old_key_id = %current.key_id,
            old_version = current.version,
            key_id = %key.key_id,
            version = key.version,
            "Master key rotated"
        );

        Ok(key)
    }

    /// Administrative status change.
    ///
    /// Allowed moves are `ACTIVE -> INACTIVE`, `ROTATED -> INACTIVE` and
    /// `INACTIVE -> ACTIVE` while no other key is `ACTIVE`. `ROTATED` is
    /// only ever reached through [`rotate_key`](Self::rotate_key). Setting
    /// the current status again is a no-op.
    ///
    /// The "no other ACTIVE key" check and the write are two store calls; a
    /// concurrent create or reactivation can slip between them.
    pub async fn set_key_status(
        &self,
        key_id: &Uuid,
        status: KeyStatus,
    ) -> Result<MasterKey, KmsError> {
        let mut key = self.get_key(key_id).await?;
        let from = key.status;

        if from == status {
            return Ok(key);
        }

        match (from, status) {
            (_, KeyStatus::Rotated) => {
                return Err(KmsError::InvalidStatusTransition {
                    from,
                    to: status,
                    reason: "ROTATED is only reachable through rotation",
                });
            },
            (KeyStatus::Rotated, KeyStatus::Active) => {
                return Err(KmsError::InvalidStatusTransition {
                    from,
                    to: status,
                    reason: "a rotated key can only be parked as INACTIVE",
                });
            },
            (KeyStatus::Inactive, KeyStatus::Active) => {
                let current = self
                    .bounded("find_current_active", self.store.find_current_active())
                    .await??;
                if current.is_some() {
                    return Err(KmsError::InvalidStatusTransition {
                        from,
                        to: status,
                        reason: "another key is already ACTIVE",
                    });
                }
            },
            _ => {},
        }

        self.bounded("update_status", self.store.update_status(key_id, from, status))
            .await?
            .map_err(|e| match e {
                StorageError::NotFound(_) => KmsError::KeyNotFound(key_id.to_string()),
                other => KmsError::StoreWrite(other.to_string()),
            })?;

        info!(key_id = %key_id, from = %from, status = %status, "Master key status changed");

        key.status = status;
        Ok(key)
    }

    // ========================================================================
    // Envelope Operations
    // ========================================================================

    /// Seals `plaintext` under the pinned key, or the current active key.
    ///
    /// Pinning a non-`ACTIVE` key is allowed and logged. Expiration is
    /// advisory: an expired key still seals, with a warning.
    pub async fn encrypt(
        &self,
        plaintext: &[u8],
        key_id: Option<&Uuid>,
    ) -> Result<SealedEnvelope, KmsError> {
        let key = match key_id {
            Some(id) => {
                let key = self.get_key(id).await?;
                if !key.is_active() {
                    warn!(key_id = %id, status = %key.status, "Encrypting with a non-active key");
                }
                key
            },
            None => self.get_current_active_key().await?,
        };

        if key.is_expired_at(Self::now()) {
            warn!(
                key_id = %key.key_id,
                version = key.version,
                expires_at = key.expires_at,
                "Encrypting with an expired key, rotate it"
            );
        }

        let bundle = envelope::encrypt(plaintext, &key)?;

        debug!(key_id = %key.key_id, version = key.version, "Message sealed");

        Ok(SealedEnvelope {
            bundle,
            key_id: key.key_id,
            key_version: key.version,
        })
    }

    /// Opens a bundle with the pinned key, or by trying every known version.
    pub async fn decrypt(
        &self,
        bundle: &EnvelopeBundle,
        key_id: Option<&Uuid>,
    ) -> Result<Zeroizing<Vec<u8>>, KmsError> {
        let result = match key_id {
            Some(id) => {
                let key = self.get_key(id).await?;
                envelope::decrypt(bundle, KeySource::Single(&key))
            },
            None => {
                let versions = self.get_all_key_versions().await?;
                envelope::decrypt(bundle, KeySource::Versions(&versions))
            },
        };

        if let Err(KmsError::DecryptionFailed { last_failure }) = &result {
            debug!(pinned = key_id.is_some(), cause = ?last_failure, "Envelope decryption failed");
        }

        result
    }
}
