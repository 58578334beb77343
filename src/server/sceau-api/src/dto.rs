//! Request and response bodies.
//!
//! Binary payloads travel as standard-alphabet base64.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};

use sceau_kms::{KeyStatus, MasterKey};

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `healthy` or `degraded`.
    pub status: String,
    /// Server version.
    pub version: String,
    /// Name of the key store backend.
    pub backend: String,
    /// Version of the current ACTIVE key, if any.
    pub active_key_version: Option<u32>,
}

/// Master key as returned by the API.
#[derive(Debug, Serialize, Deserialize)]
pub struct KeyResponse {
    /// Storage row id.
    pub id: Option<i64>,
    /// Key identity.
    pub key_id: String,
    /// Key version.
    pub version: u32,
    /// Lifecycle status.
    pub status: KeyStatus,
    /// Unix seconds.
    pub creation_date: u64,
    /// Unix seconds. Advisory.
    pub expiration_date: u64,
    /// Base64 key material, only when the server exposes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_material: Option<String>,
}

impl KeyResponse {
    /// Metadata only.
    pub fn metadata(key: &MasterKey) -> Self {
        Self {
            id: key.id,
            key_id: key.key_id.to_string(),
            version: key.version,
            status: key.status,
            creation_date: key.created_at,
            expiration_date: key.expires_at,
            key_material: None,
        }
    }

    /// Metadata plus base64 key material.
    pub fn with_material(key: &MasterKey) -> Self {
        Self {
            key_material: Some(BASE64.encode(key.material.as_bytes())),
            ..Self::metadata(key)
        }
    }
}

/// `?key_id=` query.
#[derive(Debug, Deserialize)]
pub struct KeyQuery {
    /// Key identity.
    pub key_id: String,
}

/// Status change request.
#[derive(Debug, Serialize, Deserialize)]
pub struct SetStatusRequest {
    /// Key identity.
    pub key_id: String,
    /// `ACTIVE` or `INACTIVE`.
    pub status: String,
}

/// Encrypt request.
#[derive(Debug, Serialize, Deserialize)]
pub struct EncryptRequest {
    /// UTF-8 plaintext.
    pub message: String,
    /// Pin a specific master key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
}

/// Encrypt response.
#[derive(Debug, Serialize, Deserialize)]
pub struct EncryptResponse {
    /// Base64 sealed message.
    pub encrypted_message: String,
    /// Base64 wrapped data key.
    pub encrypted_data_key: String,
    /// Identity of the wrapping master key.
    pub key_id: String,
    /// Version of the wrapping master key.
    pub key_version: u32,
}

/// Decrypt request.
#[derive(Debug, Serialize, Deserialize)]
pub struct DecryptRequest {
    /// Base64 sealed message.
    pub encrypted_message: String,
    /// Base64 wrapped data key.
    pub encrypted_data_key: String,
    /// Pin a specific master key instead of searching every version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
}

/// Decrypt response.
#[derive(Debug, Serialize, Deserialize)]
pub struct DecryptResponse {
    /// UTF-8 plaintext.
    pub decrypted_message: String,
}
