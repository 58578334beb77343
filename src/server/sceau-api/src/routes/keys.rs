//! Master key endpoints.

use axum::{
    extract::{Query, State},
    Json,
};

use sceau_kms::{KeyStatus, MasterKey};

use crate::dto::{KeyQuery, KeyResponse, SetStatusRequest};
use crate::error::{ApiError, ApiResult};
use crate::routes::parse_key_id;
use crate::state::AppState;

fn fresh_key_response(state: &AppState, key: &MasterKey) -> KeyResponse {
    if state.expose_key_material {
        KeyResponse::with_material(key)
    } else {
        KeyResponse::metadata(key)
    }
}

/// Create a master key
pub async fn create_key(State(state): State<AppState>) -> ApiResult<Json<KeyResponse>> {
    let key = state.manager.create_key().await?;

    Ok(Json(fresh_key_response(&state, &key)))
}

/// Get a master key by identity
pub async fn get_key(
    State(state): State<AppState>,
    Query(query): Query<KeyQuery>,
) -> ApiResult<Json<KeyResponse>> {
    let key_id = parse_key_id(&query.key_id)?;
    let key = state.manager.get_key(&key_id).await?;

    Ok(Json(KeyResponse::metadata(&key)))
}

/// List ACTIVE keys, newest first
pub async fn list_active_keys(State(state): State<AppState>) -> ApiResult<Json<Vec<KeyResponse>>> {
    let keys = state.manager.list_active_keys().await?;

    Ok(Json(keys.iter().map(KeyResponse::metadata).collect()))
}

/// Get the current ACTIVE key
pub async fn get_current_key(State(state): State<AppState>) -> ApiResult<Json<KeyResponse>> {
    let key = state.manager.get_current_active_key().await?;

    Ok(Json(KeyResponse::metadata(&key)))
}

/// List every key version, ascending
pub async fn list_key_versions(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<KeyResponse>>> {
    let versions = state.manager.get_all_key_versions().await?;

    Ok(Json(versions.values().map(KeyResponse::metadata).collect()))
}

/// Rotate the current ACTIVE key
pub async fn rotate_key(State(state): State<AppState>) -> ApiResult<Json<KeyResponse>> {
    let key = state.manager.rotate_key().await?;

    Ok(Json(fresh_key_response(&state, &key)))
}

/// Change a key's status
pub async fn set_key_status(
    State(state): State<AppState>,
    Json(req): Json<SetStatusRequest>,
) -> ApiResult<Json<KeyResponse>> {
    let key_id = parse_key_id(&req.key_id)?;
    let status: KeyStatus = req
        .status
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid status: {}", req.status)))?;

    let key = state.manager.set_key_status(&key_id, status).await?;

    Ok(Json(KeyResponse::metadata(&key)))
}
