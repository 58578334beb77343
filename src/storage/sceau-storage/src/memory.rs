//! In-memory key store.
//!
//! Holds every record behind a single async lock. Each mutating call
//! validates all of its preconditions before touching the state, so a
//! failed call leaves the store exactly as it found it.

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::backend::KeyStore;
use crate::error::StorageError;
use crate::model::{KeyStatus, MasterKey};

#[derive(Default)]
struct State {
    last_id: i64,
    keys: Vec<MasterKey>,
}

impl State {
    fn check_unique(&self, key: &MasterKey) -> Result<(), StorageError> {
        if self.keys.iter().any(|k| k.key_id == key.key_id) {
            return Err(StorageError::AlreadyExists(format!("key {}", key.key_id)));
        }
        if self.keys.iter().any(|k| k.version == key.version) {
            return Err(StorageError::AlreadyExists(format!(
                "version {}",
                key.version
            )));
        }
        Ok(())
    }

    fn push(&mut self, key: &MasterKey) -> i64 {
        self.last_id += 1;
        let mut record = key.clone();
        record.id = Some(self.last_id);
        self.keys.push(record);
        self.last_id
    }
}

/// Process-local [`KeyStore`]. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryKeyStore {
    state: RwLock<State>,
}

impl MemoryKeyStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyStore for MemoryKeyStore {
    async fn insert(&self, key: &MasterKey) -> Result<i64, StorageError> {
        let mut state = self.state.write().await;
        state.check_unique(key)?;
        Ok(state.push(key))
    }

    async fn find_by_key_id(&self, key_id: &Uuid) -> Result<Option<MasterKey>, StorageError> {
        let state = self.state.read().await;
        Ok(state.keys.iter().find(|k| k.key_id == *key_id).cloned())
    }

    async fn find_active(&self) -> Result<Vec<MasterKey>, StorageError> {
        let state = self.state.read().await;
        let mut active: Vec<MasterKey> = state
            .keys
            .iter()
            .filter(|k| k.is_active())
            .cloned()
            .collect();
        active.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then(b.version.cmp(&a.version))
        });
        Ok(active)
    }

    async fn find_current_active(&self) -> Result<Option<MasterKey>, StorageError> {
        let state = self.state.read().await;
        Ok(state
            .keys
            .iter()
            .filter(|k| k.is_active())
            .max_by_key(|k| k.version)
            .cloned())
    }

    async fn find_all_versions(&self) -> Result<Vec<MasterKey>, StorageError> {
        let state = self.state.read().await;
        let mut all = state.keys.clone();
        all.sort_by_key(|k| k.version);
        Ok(all)
    }

    async fn latest_version(&self) -> Result<Option<u32>, StorageError> {
        let state = self.state.read().await;
        Ok(state.keys.iter().map(|k| k.version).max())
    }

    async fn atomic_rotate(
        &self,
        old_key_id: &Uuid,
        new_key: &MasterKey,
    ) -> Result<i64, StorageError> {
        let mut state = self.state.write().await;

        let old_index = state
            .keys
            .iter()
            .position(|k| k.key_id == *old_key_id)
            .ok_or_else(|| StorageError::NotFound(format!("key {old_key_id}")))?;

        if !state.keys[old_index].is_active() {
            return Err(StorageError::Conflict(format!(
                "key {old_key_id} is no longer ACTIVE"
            )));
        }
        state.check_unique(new_key)?;

        state.keys[old_index].status = KeyStatus::Rotated;
        Ok(state.push(new_key))
    }

    async fn update_status(
        &self,
        key_id: &Uuid,
        expected: KeyStatus,
        status: KeyStatus,
    ) -> Result<(), StorageError> {
        let mut state = self.state.write().await;

        let key = state
            .keys
            .iter_mut()
            .find(|k| k.key_id == *key_id)
            .ok_or_else(|| StorageError::NotFound(format!("key {key_id}")))?;

        if key.status != expected {
            return Err(StorageError::Conflict(format!(
                "key {key_id} is {}, expected {expected}",
                key.status
            )));
        }

        key.status = status;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
