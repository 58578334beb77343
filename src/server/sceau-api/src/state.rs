//! Application state for the API server.

use std::sync::Arc;

use sceau_kms::KeyManager;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    /// Key lifecycle and envelope operations.
    pub manager: Arc<KeyManager>,
    /// Include raw key material in create/rotate responses.
    pub expose_key_material: bool,
    /// Server version reported by the health endpoint.
    pub version: String,
}

impl AppState {
    /// Creates state with key material hidden.
    pub fn new(manager: Arc<KeyManager>) -> Self {
        Self {
            manager,
            expose_key_material: false,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Creates state from an API configuration.
    pub fn with_config(manager: Arc<KeyManager>, config: &ApiConfig) -> Self {
        Self {
            expose_key_material: config.expose_key_material,
            ..Self::new(manager)
        }
    }
}

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Include raw key material in create/rotate responses.
    pub expose_key_material: bool,
    /// Install a permissive CORS layer.
    pub enable_cors: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            expose_key_material: false,
            enable_cors: true,
        }
    }
}
