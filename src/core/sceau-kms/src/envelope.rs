//! Envelope encryption.
//!
//! A fresh 256-bit data key seals the message; the master key seals the
//! data key. The master key version active at seal time travels inside the
//! authenticated message as a 4-byte big-endian prefix and is stripped on open.

use std::collections::BTreeMap;

use tracing::debug;
use zeroize::Zeroizing;

use sceau_crypto::{aead, random, CryptoError};
use sceau_storage::MasterKey;

use crate::error::KmsError;

/// Size of the version frame inside a sealed message.
pub const VERSION_PREFIX_SIZE: usize = 4;

/// Every known master key, indexed by version.
pub type KeyVersions = BTreeMap<u32, MasterKey>;

/// Self-describing ciphertext of one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeBundle {
    /// `nonce || AES-GCM(data_key, version_be32 || plaintext)`
    pub sealed_message: Vec<u8>,
    /// `nonce || AES-GCM(master_key, data_key)`
    pub sealed_data_key: Vec<u8>,
}

/// Master key(s) offered for decryption.
#[derive(Debug, Clone, Copy)]
pub enum KeySource<'a> {
    /// The caller pinned the exact key.
    Single(&'a MasterKey),
    /// Try every known version until one opens the bundle.
    Versions(&'a KeyVersions),
}

/// Seals `plaintext` under a fresh data key wrapped by `master_key`.
///
/// # Errors
///
/// - [`KmsError::Randomness`] if the data key or a nonce cannot be drawn
/// - [`KmsError::CipherSetup`] if a cipher cannot be initialized
pub fn encrypt(plaintext: &[u8], master_key: &MasterKey) -> Result<EnvelopeBundle, KmsError> {
    let data_key = random::generate_key()?;

    let mut framed = Zeroizing::new(Vec::with_capacity(VERSION_PREFIX_SIZE + plaintext.len()));
    framed.extend_from_slice(&master_key.version.to_be_bytes());
    framed.extend_from_slice(plaintext);

    let sealed_message = aead::seal(&*data_key, &framed)?;
    let sealed_data_key = aead::seal(master_key.material.as_bytes(), &*data_key)?;

    Ok(EnvelopeBundle {
        sealed_message,
        sealed_data_key,
    })
}

/// Opens a bundle with the given key source.
///
/// With [`KeySource::Versions`] candidates are tried newest version first;
/// callers must not depend on that order. The first candidate that both
/// unwraps the data key and opens the message wins.
///
/// # Errors
///
/// [`KmsError::DecryptionFailed`] if no key opens the bundle. No partial
/// output is ever returned.
pub fn decrypt(
    bundle: &EnvelopeBundle,
    source: KeySource<'_>,
) -> Result<Zeroizing<Vec<u8>>, KmsError> {
    match source {
        KeySource::Single(key) => open_with(bundle, key).map_err(KmsError::decryption),
        KeySource::Versions(versions) => {
            let mut last_failure = None;

            for key in versions.values().rev() {
                match open_with(bundle, key) {
                    Ok(plaintext) => {
                        debug!(version = key.version, "Envelope opened by version search");
                        return Ok(plaintext);
                    },
                    Err(e) => last_failure = Some(e),
                }
            }

            Err(KmsError::DecryptionFailed { last_failure })
        },
    }
}

fn open_with(bundle: &EnvelopeBundle, key: &MasterKey) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let data_key = aead::open(key.material.as_bytes(), &bundle.sealed_data_key)?;
    let framed = aead::open(&data_key, &bundle.sealed_message)?;

    if framed.len() < VERSION_PREFIX_SIZE {
        return Err(CryptoError::InvalidInput("sealed message has no version frame".into()));
    }

    let (prefix, body) = framed.split_at(VERSION_PREFIX_SIZE);
    let embedded = u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]);
    if embedded != key.version {
        return Err(CryptoError::InvalidInput(format!(
            "embedded version {embedded} does not match key version {}",
            key.version
        )));
    }

    Ok(Zeroizing::new(body.to_vec()))
}
