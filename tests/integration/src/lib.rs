//! Integration tests for the Sceau server.
//!
//! These tests run the full HTTP stack on an ephemeral port and drive it
//! with a real client, from key creation to decryption after rotation.

// Allow unwrap() in tests - panics are acceptable for test assertions
#![allow(clippy::disallowed_methods)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;

use sceau_api::dto::{DecryptResponse, EncryptResponse, HealthResponse, KeyResponse};
use sceau_api::{start_background_server, ApiConfig, AppState};
use sceau_kms::KeyManager;
use sceau_storage::{KeyStore, MemoryKeyStore};
use sceau_storage_sqlite::SqliteKeyStore;

// ============================================================================
// Test Server
// ============================================================================

/// An in-process server bound to a free local port.
pub struct TestServer {
    pub base_url: String,
    pub addr: SocketAddr,
}

impl TestServer {
    /// Starts a server over an in-memory store.
    pub async fn start_memory() -> Result<Self> {
        Self::start(Arc::new(MemoryKeyStore::new()), ApiConfig::default()).await
    }

    /// Starts a server over a SQLite store in `data_dir`.
    pub async fn start_sqlite(data_dir: &Path) -> Result<Self> {
        let store = SqliteKeyStore::open(data_dir, "keys")
            .await
            .context("Failed to open SQLite store")?;
        Self::start(Arc::new(store), ApiConfig::default()).await
    }

    /// Starts a server over `store` with the given API configuration.
    pub async fn start(store: Arc<dyn KeyStore>, config: ApiConfig) -> Result<Self> {
        let manager = Arc::new(KeyManager::new(store));
        let state = AppState::with_config(manager, &config);

        let addr = start_background_server(state, &config, ([127, 0, 0, 1], 0).into())
            .await
            .context("Failed to start server")?;

        let server = Self {
            base_url: format!("http://{}", addr),
            addr,
        };
        server.wait_for_ready().await?;

        Ok(server)
    }

    async fn wait_for_ready(&self) -> Result<()> {
        let client = Client::new();
        let url = format!("{}/v1/sys/health", self.base_url);

        for _ in 0..50 {
            match client.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                _ => tokio::time::sleep(Duration::from_millis(100)).await,
            }
        }

        bail!("Server failed to start within 5 seconds")
    }

    /// Get a configured HTTP client for this server.
    pub fn client(&self) -> SceauClient {
        SceauClient::new(&self.base_url)
    }
}

// ============================================================================
// Test Client
// ============================================================================

/// HTTP client for testing the Sceau API.
#[derive(Clone)]
pub struct SceauClient {
    client: Client,
    base_url: String,
}

impl SceauClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("Failed to create HTTP client"),
            base_url: base_url.to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder, action: &str) -> Result<T> {
        let resp = req.send().await?;
        if !resp.status().is_success() {
            bail!("{} failed ({}): {}", action, resp.status(), resp.text().await?);
        }
        Ok(resp.json().await?)
    }

    /// Raw status code of a request, for error-path assertions.
    pub async fn status_of(&self, req: RequestBuilder) -> Result<StatusCode> {
        Ok(req.send().await?.status())
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        self.send(self.client.get(self.url("/v1/sys/health")), "Health")
            .await
    }

    pub async fn create_key(&self) -> Result<KeyResponse> {
        self.send(self.client.post(self.url("/v1/keys")), "Create key")
            .await
    }

    pub async fn get_key(&self, key_id: &str) -> Result<KeyResponse> {
        let req = self
            .client
            .get(self.url("/v1/keys"))
            .query(&[("key_id", key_id)]);
        self.send(req, "Get key").await
    }

    pub async fn current_key(&self) -> Result<KeyResponse> {
        self.send(self.client.get(self.url("/v1/keys/current")), "Current key")
            .await
    }

    pub async fn active_keys(&self) -> Result<Vec<KeyResponse>> {
        self.send(self.client.get(self.url("/v1/keys/active")), "Active keys")
            .await
    }

    pub async fn key_versions(&self) -> Result<Vec<KeyResponse>> {
        self.send(self.client.get(self.url("/v1/keys/versions")), "Key versions")
            .await
    }

    pub async fn rotate(&self) -> Result<KeyResponse> {
        self.send(self.client.post(self.url("/v1/keys/rotate")), "Rotate")
            .await
    }

    pub async fn set_status(&self, key_id: &str, status: &str) -> Result<KeyResponse> {
        let req = self
            .client
            .patch(self.url("/v1/keys/status"))
            .json(&json!({ "key_id": key_id, "status": status }));
        self.send(req, "Set status").await
    }

    pub async fn encrypt(&self, message: &str, key_id: Option<&str>) -> Result<EncryptResponse> {
        let req = self
            .client
            .post(self.url("/v1/crypto/encrypt"))
            .json(&json!({ "message": message, "key_id": key_id }));
        self.send(req, "Encrypt").await
    }

    pub fn decrypt_request(&self, sealed: &EncryptResponse, key_id: Option<&str>) -> RequestBuilder {
        self.client
            .post(self.url("/v1/crypto/decrypt"))
            .json(&json!({
                "encrypted_message": sealed.encrypted_message,
                "encrypted_data_key": sealed.encrypted_data_key,
                "key_id": key_id,
            }))
    }

    pub async fn decrypt(&self, sealed: &EncryptResponse, key_id: Option<&str>) -> Result<String> {
        let resp: DecryptResponse = self
            .send(self.decrypt_request(sealed, key_id), "Decrypt")
            .await?;
        Ok(resp.decrypted_message)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use sceau_kms::KeyStatus;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_server_health() {
        let server = TestServer::start_memory().await.unwrap();
        let client = server.client();

        let health = client.health().await.unwrap();

        assert_eq!(health.status, "healthy");
        assert_eq!(health.backend, "memory");
        assert_eq!(health.active_key_version, None);
    }

    #[tokio::test]
    async fn test_full_envelope_workflow() {
        let server = TestServer::start_memory().await.unwrap();
        let client = server.client();

        // 1. Create the first key
        let k1 = client.create_key().await.unwrap();
        assert_eq!(k1.version, 1);
        assert!(k1.key_material.is_none());

        // 2. Encrypt under it
        let sealed = client.encrypt("hello", None).await.unwrap();
        assert_eq!(sealed.key_id, k1.key_id);
        assert_eq!(sealed.key_version, 1);

        // 3. Rotate
        let k2 = client.rotate().await.unwrap();
        assert_eq!(k2.version, 2);
        assert_eq!(client.get_key(&k1.key_id).await.unwrap().status, KeyStatus::Rotated);
        assert_eq!(client.current_key().await.unwrap().key_id, k2.key_id);

        // 4. Old ciphertext still opens, by search and pinned
        assert_eq!(client.decrypt(&sealed, None).await.unwrap(), "hello");
        assert_eq!(client.decrypt(&sealed, Some(&k1.key_id)).await.unwrap(), "hello");

        // 5. Pinning the wrong key fails generically
        let status = client
            .status_of(client.decrypt_request(&sealed, Some(&k2.key_id)))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // 6. New encryptions use the new key
        let fresh = client.encrypt("world", None).await.unwrap();
        assert_eq!(fresh.key_version, 2);
        assert_eq!(client.decrypt(&fresh, None).await.unwrap(), "world");

        let health = client.health().await.unwrap();
        assert_eq!(health.active_key_version, Some(2));
    }

    #[tokio::test]
    async fn test_status_management() {
        let server = TestServer::start_memory().await.unwrap();
        let client = server.client();

        let k1 = client.create_key().await.unwrap();
        let sealed = client.encrypt("parked", None).await.unwrap();

        let parked = client.set_status(&k1.key_id, "INACTIVE").await.unwrap();
        assert_eq!(parked.status, KeyStatus::Inactive);
        assert!(client.active_keys().await.unwrap().is_empty());

        // Parked keys still decrypt
        assert_eq!(client.decrypt(&sealed, None).await.unwrap(), "parked");

        // No ACTIVE key means no encryption
        assert!(client.encrypt("nope", None).await.is_err());

        let back = client.set_status(&k1.key_id, "ACTIVE").await.unwrap();
        assert_eq!(back.status, KeyStatus::Active);
        assert_eq!(client.encrypt("yes", None).await.unwrap().key_version, 1);
    }

    #[tokio::test]
    async fn test_tampered_ciphertext_rejected() {
        let server = TestServer::start_memory().await.unwrap();
        let client = server.client();

        client.create_key().await.unwrap();
        let mut sealed = client.encrypt("integrity", None).await.unwrap();

        // Flip one base64 character in the middle of the sealed message.
        let mut chars: Vec<char> = sealed.encrypted_message.chars().collect();
        let mid = chars.len() / 2;
        chars[mid] = if chars[mid] == 'A' { 'B' } else { 'A' };
        sealed.encrypted_message = chars.into_iter().collect();

        let status = client
            .status_of(client.decrypt_request(&sealed, None))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_key_material_exposure_flag() {
        let config = ApiConfig {
            expose_key_material: true,
            ..ApiConfig::default()
        };
        let server = TestServer::start(Arc::new(MemoryKeyStore::new()), config)
            .await
            .unwrap();
        let client = server.client();

        let created = client.create_key().await.unwrap();
        assert!(created.key_material.is_some());

        // Lookups never carry material.
        let fetched = client.get_key(&created.key_id).await.unwrap();
        assert!(fetched.key_material.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_rotations_keep_single_active_key() {
        let data_dir = TempDir::new().unwrap();
        let server = TestServer::start_sqlite(data_dir.path()).await.unwrap();
        let client = server.client();

        client.create_key().await.unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let client = client.clone();
                tokio::spawn(async move { client.rotate().await })
            })
            .collect();

        let mut succeeded = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                succeeded += 1;
            }
        }
        assert!(succeeded >= 1);

        let active = client.active_keys().await.unwrap();
        assert_eq!(active.len(), 1);

        let versions = client.key_versions().await.unwrap();
        assert_eq!(versions.len(), 1 + succeeded);
        for pair in versions.windows(2) {
            assert!(pair[0].version < pair[1].version);
        }
        assert_eq!(versions.last().unwrap().key_id, active[0].key_id);
    }

    #[tokio::test]
    async fn test_sqlite_persistence_across_restart() {
        let data_dir = TempDir::new().unwrap();

        let sealed = {
            let server = TestServer::start_sqlite(data_dir.path()).await.unwrap();
            let client = server.client();
            client.create_key().await.unwrap();
            let sealed = client.encrypt("durable", None).await.unwrap();
            client.rotate().await.unwrap();
            sealed
        };

        // A second server over the same directory sees the same keys.
        let server = TestServer::start_sqlite(data_dir.path()).await.unwrap();
        let client = server.client();

        let health = client.health().await.unwrap();
        assert_eq!(health.backend, "sqlite");
        assert_eq!(health.active_key_version, Some(2));
        assert_eq!(client.decrypt(&sealed, None).await.unwrap(), "durable");
    }
}
