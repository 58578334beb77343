//! # Sceau KMS Engine
//!
//! Master key lifecycle and envelope encryption.
//!
//! ## Features
//!
//! - Versioned master keys with atomic rotation
//! - Per-message data keys wrapped by a master key (AES-256-GCM)
//! - Decryption by a pinned key or by searching every known key version
//! - Administrative status changes (ACTIVE / INACTIVE)
//!
//! ## Sealed Message Format
//!
//! `sealed_message = nonce || AES-GCM(data_key, version_be32 || plaintext)`
//!
//! `sealed_data_key = nonce || AES-GCM(master_key, data_key)`

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod envelope;
pub mod error;
pub mod lifecycle;

pub use envelope::{EnvelopeBundle, KeySource, KeyVersions};
pub use error::KmsError;
pub use lifecycle::{KeyManager, KeyManagerConfig, SealedEnvelope};
pub use sceau_storage::{KeyStatus, MasterKey};
