//! Envelope encryption endpoints.

use axum::{extract::State, Json};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use sceau_kms::EnvelopeBundle;

use crate::dto::{DecryptRequest, DecryptResponse, EncryptRequest, EncryptResponse};
use crate::error::{ApiError, ApiResult};
use crate::routes::parse_key_id;
use crate::state::AppState;

fn decode_field(name: &str, value: &str) -> ApiResult<Vec<u8>> {
    BASE64
        .decode(value)
        .map_err(|_| ApiError::BadRequest(format!("invalid {name}")))
}

/// Encrypt a message
pub async fn encrypt(
    State(state): State<AppState>,
    Json(req): Json<EncryptRequest>,
) -> ApiResult<Json<EncryptResponse>> {
    let key_id = req.key_id.as_deref().map(parse_key_id).transpose()?;

    let sealed = state
        .manager
        .encrypt(req.message.as_bytes(), key_id.as_ref())
        .await?;

    Ok(Json(EncryptResponse {
        encrypted_message: BASE64.encode(&sealed.bundle.sealed_message),
        encrypted_data_key: BASE64.encode(&sealed.bundle.sealed_data_key),
        key_id: sealed.key_id.to_string(),
        key_version: sealed.key_version,
    }))
}

/// Decrypt a message
pub async fn decrypt(
    State(state): State<AppState>,
    Json(req): Json<DecryptRequest>,
) -> ApiResult<Json<DecryptResponse>> {
    let key_id = req.key_id.as_deref().map(parse_key_id).transpose()?;

    let bundle = EnvelopeBundle {
        sealed_message: decode_field("encrypted_message", &req.encrypted_message)?,
        sealed_data_key: decode_field("encrypted_data_key", &req.encrypted_data_key)?,
    };

    let plaintext = state.manager.decrypt(&bundle, key_id.as_ref()).await?;

    let decrypted_message = std::str::from_utf8(&plaintext)
        .map_err(|_| ApiError::BadRequest("decrypted message is not valid UTF-8".into()))?
        .to_string();

    Ok(Json(DecryptResponse { decrypted_message }))
}
