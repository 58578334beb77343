//! Sceau Server - Main entry point.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sceau_api::{build_app, ApiConfig, AppState};
use sceau_kms::{KeyManager, KeyManagerConfig, KmsError};
use sceau_storage::{KeyStore, MemoryKeyStore};
use sceau_storage_sqlite::SqliteKeyStore;

#[derive(Parser)]
#[command(name = "sceau-server")]
#[command(about = "Sceau - envelope encryption and master key management server")]
#[command(version)]
struct Cli {
    /// Server bind address
    #[arg(long, default_value = "0.0.0.0:9002", env = "SCEAU_BIND_ADDRESS")]
    bind: SocketAddr,

    /// Directory of the SQLite key store
    #[arg(long, default_value = "data", env = "SCEAU_DATA_DIR")]
    data_dir: PathBuf,

    /// Enable development mode (in-memory storage, nothing persisted)
    #[arg(long, env = "SCEAU_DEV_MODE")]
    dev: bool,

    /// Deadline for each key store call in milliseconds (0 disables it)
    #[arg(long, default_value_t = 5000, env = "SCEAU_STORE_TIMEOUT_MS")]
    store_timeout_ms: u64,

    /// Return raw key material from create and rotate
    #[arg(long, env = "SCEAU_EXPOSE_KEY_MATERIAL")]
    expose_key_material: bool,

    /// Create an initial key when the store has none
    #[arg(long, env = "SCEAU_BOOTSTRAP")]
    bootstrap: bool,
}

impl Cli {
    fn manager_config(&self) -> KeyManagerConfig {
        KeyManagerConfig {
            store_timeout: (self.store_timeout_ms > 0)
                .then(|| Duration::from_millis(self.store_timeout_ms)),
            ..KeyManagerConfig::default()
        }
    }
}

async fn open_store(cli: &Cli) -> anyhow::Result<Arc<dyn KeyStore>> {
    if cli.dev {
        tracing::warn!("Development mode enabled - DO NOT USE IN PRODUCTION");
        return Ok(Arc::new(MemoryKeyStore::new()));
    }

    let store = SqliteKeyStore::open(&cli.data_dir, "keys")
        .await
        .with_context(|| format!("failed to open key store in {}", cli.data_dir.display()))?;

    Ok(Arc::new(store))
}

async fn bootstrap(manager: &KeyManager) -> anyhow::Result<()> {
    match manager.get_current_active_key().await {
        Ok(key) => {
            tracing::info!(version = key.version, "Active key present, skipping bootstrap");
        },
        Err(KmsError::NoActiveKey) => {
            let key = manager
                .create_key()
                .await
                .context("failed to create initial key")?;
            tracing::info!(key_id = %key.key_id, version = key.version, "Bootstrapped initial key");
        },
        Err(e) => return Err(e).context("failed to inspect key store"),
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutting down...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    tracing::info!("Starting Sceau server...");
    tracing::info!("Bind address: {}", cli.bind);

    if cli.expose_key_material {
        tracing::warn!("Key material will be returned by the API - trusted networks only");
    }

    let store = open_store(&cli).await?;
    let manager = Arc::new(KeyManager::with_config(store, cli.manager_config()));

    if cli.bootstrap {
        bootstrap(&manager).await?;
    }

    let config = ApiConfig {
        expose_key_material: cli.expose_key_material,
        ..ApiConfig::default()
    };
    let app = build_app(AppState::with_config(manager, &config), &config);

    let listener = TcpListener::bind(cli.bind)
        .await
        .with_context(|| format!("failed to bind {}", cli.bind))?;

    tracing::info!("Sceau server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
