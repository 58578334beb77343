//! API route handlers.

pub mod crypto;
pub mod health;
pub mod keys;

use axum::{
    routing::{get, patch, post},
    Router,
};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Creates the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // System
        .route("/v1/sys/health", get(health::health_check))
        // Keys
        .route("/v1/keys", post(keys::create_key).get(keys::get_key))
        .route("/v1/keys/active", get(keys::list_active_keys))
        .route("/v1/keys/current", get(keys::get_current_key))
        .route("/v1/keys/versions", get(keys::list_key_versions))
        .route("/v1/keys/rotate", post(keys::rotate_key))
        .route("/v1/keys/status", patch(keys::set_key_status))
        // Envelope crypto
        .route("/v1/crypto/encrypt", post(crypto::encrypt))
        .route("/v1/crypto/decrypt", post(crypto::decrypt))
        .with_state(state)
}

pub(crate) fn parse_key_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("invalid key_id: {raw}")))
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request, StatusCode};
    use serde::de::DeserializeOwned;
    use serde_json::{json, Value};
    use sceau_kms::{KeyManager, KeyStatus};
    use sceau_storage::MemoryKeyStore;
    use tower::util::ServiceExt;

    use crate::dto::{DecryptResponse, EncryptResponse, HealthResponse, KeyResponse};
    use crate::error::ErrorResponse;

    fn create_test_state() -> AppState {
        let manager = KeyManager::new(Arc::new(MemoryKeyStore::new()));
        AppState::new(Arc::new(manager))
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Vec<u8>) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    fn parse<T: DeserializeOwned>(bytes: &[u8]) -> T {
        serde_json::from_slice(bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_without_keys() {
        let app = create_router(create_test_state());

        let (status, body) = send(&app, Method::GET, "/v1/sys/health", None).await;

        assert_eq!(status, StatusCode::OK);
        let health: HealthResponse = parse(&body);
        assert_eq!(health.status, "healthy");
        assert_eq!(health.backend, "memory");
        assert_eq!(health.active_key_version, None);
    }

    #[tokio::test]
    async fn test_create_and_get_key() {
        let app = create_router(create_test_state());

        let (status, body) = send(&app, Method::POST, "/v1/keys", None).await;
        assert_eq!(status, StatusCode::OK);
        let created: KeyResponse = parse(&body);
        assert_eq!(created.version, 1);
        assert_eq!(created.status, KeyStatus::Active);
        assert!(created.key_material.is_none());

        let uri = format!("/v1/keys?key_id={}", created.key_id);
        let (status, body) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        let fetched: KeyResponse = parse(&body);
        assert_eq!(fetched.key_id, created.key_id);

        let (_, body) = send(&app, Method::GET, "/v1/sys/health", None).await;
        let health: HealthResponse = parse(&body);
        assert_eq!(health.active_key_version, Some(1));
    }

    #[tokio::test]
    async fn test_second_create_conflicts() {
        let app = create_router(create_test_state());

        send(&app, Method::POST, "/v1/keys", None).await;
        let (status, body) = send(&app, Method::POST, "/v1/keys", None).await;

        assert_eq!(status, StatusCode::CONFLICT);
        let err: ErrorResponse = parse(&body);
        assert_eq!(err.code, "CONFLICT");

        let (_, body) = send(&app, Method::GET, "/v1/keys/active", None).await;
        let active: Vec<KeyResponse> = parse(&body);
        assert_eq!(active.len(), 1);
    }

    #[tokio::test]
    async fn test_key_material_exposed_when_enabled() {
        let mut state = create_test_state();
        state.expose_key_material = true;
        let app = create_router(state);

        let (_, body) = send(&app, Method::POST, "/v1/keys", None).await;
        let created: KeyResponse = parse(&body);
        assert_eq!(created.key_material.map(|m| m.len()), Some(44));
    }

    #[tokio::test]
    async fn test_get_key_errors() {
        let app = create_router(create_test_state());

        let (status, body) = send(&app, Method::GET, "/v1/keys?key_id=not-a-uuid", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let err: ErrorResponse = parse(&body);
        assert_eq!(err.code, "BAD_REQUEST");

        let uri = format!("/v1/keys?key_id={}", Uuid::new_v4());
        let (status, _) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, Method::GET, "/v1/keys/current", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, Method::POST, "/v1/keys/rotate", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_rotate_and_list() {
        let app = create_router(create_test_state());

        send(&app, Method::POST, "/v1/keys", None).await;
        let (status, body) = send(&app, Method::POST, "/v1/keys/rotate", None).await;
        assert_eq!(status, StatusCode::OK);
        let rotated: KeyResponse = parse(&body);
        assert_eq!(rotated.version, 2);

        let (_, body) = send(&app, Method::GET, "/v1/keys/active", None).await;
        let active: Vec<KeyResponse> = parse(&body);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].key_id, rotated.key_id);

        let (_, body) = send(&app, Method::GET, "/v1/keys/current", None).await;
        let current: KeyResponse = parse(&body);
        assert_eq!(current.version, 2);

        let (_, body) = send(&app, Method::GET, "/v1/keys/versions", None).await;
        let versions: Vec<KeyResponse> = parse(&body);
        let listed: Vec<_> = versions.iter().map(|k| (k.version, k.status)).collect();
        assert_eq!(listed, vec![(1, KeyStatus::Rotated), (2, KeyStatus::Active)]);
        assert!(versions.iter().all(|k| k.key_material.is_none()));
    }

    #[tokio::test]
    async fn test_set_key_status() {
        let app = create_router(create_test_state());

        let (_, body) = send(&app, Method::POST, "/v1/keys", None).await;
        let key: KeyResponse = parse(&body);

        let (status, body) = send(
            &app,
            Method::PATCH,
            "/v1/keys/status",
            Some(json!({ "key_id": key.key_id, "status": "INACTIVE" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let updated: KeyResponse = parse(&body);
        assert_eq!(updated.status, KeyStatus::Inactive);

        let (status, _) = send(
            &app,
            Method::PATCH,
            "/v1/keys/status",
            Some(json!({ "key_id": key.key_id, "status": "ROTATED" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = send(
            &app,
            Method::PATCH,
            "/v1/keys/status",
            Some(json!({ "key_id": key.key_id, "status": "bogus" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_encrypt_decrypt_roundtrip() {
        let app = create_router(create_test_state());
        send(&app, Method::POST, "/v1/keys", None).await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/v1/crypto/encrypt",
            Some(json!({ "message": "hello" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let sealed: EncryptResponse = parse(&body);
        assert_eq!(sealed.key_version, 1);

        send(&app, Method::POST, "/v1/keys/rotate", None).await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/v1/crypto/decrypt",
            Some(json!({
                "encrypted_message": sealed.encrypted_message,
                "encrypted_data_key": sealed.encrypted_data_key,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let opened: DecryptResponse = parse(&body);
        assert_eq!(opened.decrypted_message, "hello");

        let (status, body) = send(
            &app,
            Method::POST,
            "/v1/crypto/decrypt",
            Some(json!({
                "encrypted_message": sealed.encrypted_message,
                "encrypted_data_key": sealed.encrypted_data_key,
                "key_id": sealed.key_id,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let opened: DecryptResponse = parse(&body);
        assert_eq!(opened.decrypted_message, "hello");
    }

    #[tokio::test]
    async fn test_encrypt_without_active_key() {
        let app = create_router(create_test_state());

        let (status, _) = send(
            &app,
            Method::POST,
            "/v1/crypto/encrypt",
            Some(json!({ "message": "hello" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_decrypt_rejects_bad_input() {
        let app = create_router(create_test_state());
        send(&app, Method::POST, "/v1/keys", None).await;

        let (status, _) = send(
            &app,
            Method::POST,
            "/v1/crypto/decrypt",
            Some(json!({
                "encrypted_message": "!!!",
                "encrypted_data_key": "AAAA",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // Well-formed base64 that is not a valid envelope.
        let (status, body) = send(
            &app,
            Method::POST,
            "/v1/crypto/decrypt",
            Some(json!({
                "encrypted_message": "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA",
                "encrypted_data_key": "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let err: ErrorResponse = parse(&body);
        assert_eq!(err.code, "DECRYPTION_FAILED");
        assert_eq!(err.error, "decryption failed");
    }
}
