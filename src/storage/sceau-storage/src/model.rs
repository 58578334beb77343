//! Master key records.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sceau_crypto::KeyMaterial;

use crate::error::StorageError;

/// Lifecycle status of a master key.
///
/// Keys start `Active`. Rotation moves the previous key to `Rotated`;
/// an administrator may park any key as `Inactive`. No status is terminal
/// and every status remains a candidate for decryption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeyStatus {
    /// Usable for new encryptions.
    Active,
    /// Administratively disabled.
    Inactive,
    /// Superseded by a newer key through rotation.
    Rotated,
}

impl KeyStatus {
    /// Storage and wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Inactive => "INACTIVE",
            Self::Rotated => "ROTATED",
        }
    }
}

impl std::fmt::Display for KeyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyStatus {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(Self::Active),
            "INACTIVE" => Ok(Self::Inactive),
            "ROTATED" => Ok(Self::Rotated),
            _ => Err(StorageError::InvalidInput(format!("unknown key status: {s}"))),
        }
    }
}

/// A versioned master key as persisted by a [`KeyStore`](crate::KeyStore).
///
/// Values are never mutated after loading; a status change is a store
/// operation that produces a new record on the next read.
#[derive(Debug, Clone)]
pub struct MasterKey {
    /// Storage-internal row id, assigned on insert.
    pub id: Option<i64>,
    /// Opaque unique identity.
    pub key_id: Uuid,
    /// Raw 256-bit secret.
    pub material: KeyMaterial,
    /// Unique, never reused, strictly increasing with each rotation.
    pub version: u32,
    /// Current lifecycle status.
    pub status: KeyStatus,
    /// Creation timestamp (Unix seconds).
    pub created_at: u64,
    /// Advisory expiration timestamp (Unix seconds).
    pub expires_at: u64,
}

impl MasterKey {
    /// Whether the key is the kind used for new encryptions.
    pub fn is_active(&self) -> bool {
        self.status == KeyStatus::Active
    }

    /// Whether the advisory expiration has passed at `now`.
    pub fn is_expired_at(&self, now: u64) -> bool {
        now >= self.expires_at
    }
}
