//! Health check endpoint.

use axum::{extract::State, Json};

use sceau_kms::KmsError;

use crate::dto::HealthResponse;
use crate::error::ApiResult;
use crate::state::AppState;

/// Reports liveness and the current key version.
///
/// A store failure degrades the status instead of failing the request.
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    let (status, active_key_version) = match state.manager.get_current_active_key().await {
        Ok(key) => ("healthy", Some(key.version)),
        Err(KmsError::NoActiveKey) => ("healthy", None),
        Err(e) => {
            tracing::warn!(error = %e, "Health check could not reach the key store");
            ("degraded", None)
        },
    };

    Ok(Json(HealthResponse {
        status: status.to_string(),
        version: state.version.clone(),
        backend: state.manager.backend_name().to_string(),
        active_key_version,
    }))
}
