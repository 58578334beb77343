//! KMS engine error types.

use thiserror::Error;

use sceau_crypto::CryptoError;
use sceau_storage::{KeyStatus, StorageError};

/// Errors that can occur in the KMS Engine.
#[derive(Debug, Error)]
pub enum KmsError {
    /// Key material could not be generated.
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    /// Secure random source unavailable.
    #[error("secure random generation failed: {0}")]
    Randomness(String),

    /// Cipher could not be initialized.
    #[error("cipher setup failed: {0}")]
    CipherSetup(String),

    /// Authentication failed or no candidate key matched.
    ///
    /// The display text never says which key or which stage failed.
    #[error("decryption failed")]
    DecryptionFailed {
        /// Last underlying failure, for diagnostics only.
        last_failure: Option<CryptoError>,
    },

    /// Key not found.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// No key is currently ACTIVE.
    #[error("no active key")]
    NoActiveKey,

    /// Creation refused because a key is already ACTIVE; rotate instead.
    #[error("key {key_id} (version {version}) is already ACTIVE, rotate it instead")]
    ActiveKeyExists {
        /// Identity of the ACTIVE key.
        key_id: String,
        /// Version of the ACTIVE key.
        version: u32,
    },

    /// Status change not permitted by the key state machine.
    #[error("cannot move key from {from} to {to}: {reason}")]
    InvalidStatusTransition {
        /// Current status.
        from: KeyStatus,
        /// Requested status.
        to: KeyStatus,
        /// Why the change was refused.
        reason: &'static str,
    },

    /// A create or status write failed; nothing was applied.
    #[error("store write failed: {0}")]
    StoreWrite(String),

    /// Rotation failed; the previous state is untouched.
    #[error("rotation failed: {0}")]
    Rotation(String),

    /// Another rotation or status change won the race; the previous state is untouched.
    #[error("rotation conflict: {0}")]
    RotationConflict(String),

    /// A store read failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// A store call exceeded the configured deadline.
    #[error("deadline exceeded: {0}")]
    DeadlineExceeded(String),
}

impl KmsError {
    pub(crate) fn decryption(failure: CryptoError) -> Self {
        KmsError::DecryptionFailed {
            last_failure: Some(failure),
        }
    }
}

impl From<CryptoError> for KmsError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::Randomness(msg) => KmsError::Randomness(msg),
            CryptoError::CipherSetup(msg) | CryptoError::EncryptionFailed(msg) => {
                KmsError::CipherSetup(msg)
            },
            e @ (CryptoError::DecryptionFailed(_) | CryptoError::InvalidInput(_)) => {
                KmsError::decryption(e)
            },
        }
    }
}

impl From<StorageError> for KmsError {
    fn from(e: StorageError) -> Self {
        KmsError::Storage(e.to_string())
    }
}
