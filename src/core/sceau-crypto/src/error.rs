//! Cryptographic error types.

use thiserror::Error;

/// Errors that can occur during cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The secure random source could not produce bytes.
    #[error("secure random generation failed: {0}")]
    Randomness(String),

    /// The cipher could not be initialized (wrong key length, bad configuration).
    #[error("cipher setup failed: {0}")]
    CipherSetup(String),

    /// Encryption failed.
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// Decryption or authentication failed.
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    /// Invalid input data.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}
