//! Sceau CLI - Command line interface.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

// ============================================================================
// CLI Structure
// ============================================================================

#[derive(Parser)]
#[command(name = "sceau")]
#[command(about = "Sceau CLI - Manage master keys and envelope encryption")]
#[command(version)]
struct Cli {
    /// Sceau server address
    #[arg(long, default_value = "http://localhost:9002", env = "SCEAU_ADDR")]
    addr: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check server status
    Status,
    /// Master key management
    Keys {
        #[command(subcommand)]
        command: KeysCommands,
    },
    /// Encrypt a message
    Encrypt {
        /// Plaintext message
        message: String,
        /// Pin a specific master key
        #[arg(long)]
        key_id: Option<String>,
    },
    /// Decrypt a message
    Decrypt {
        /// Base64 sealed message
        #[arg(long)]
        message: String,
        /// Base64 wrapped data key
        #[arg(long)]
        data_key: String,
        /// Pin a specific master key
        #[arg(long)]
        key_id: Option<String>,
    },
}

#[derive(Subcommand)]
enum KeysCommands {
    /// Create a new master key
    Create,
    /// Show a key by identity
    Get {
        /// Key identity
        key_id: String,
    },
    /// List ACTIVE keys
    Active,
    /// Show the current ACTIVE key
    Current,
    /// List every key version
    Versions,
    /// Rotate the current ACTIVE key
    Rotate,
    /// Change a key's status (ACTIVE or INACTIVE)
    SetStatus {
        /// Key identity
        key_id: String,
        /// New status
        status: String,
    },
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
    version: String,
    backend: String,
    active_key_version: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct KeyResponse {
    key_id: String,
    version: u32,
    status: String,
    creation_date: u64,
    expiration_date: u64,
    #[serde(default)]
    key_material: Option<String>,
}

#[derive(Serialize)]
struct SetStatusRequest<'a> {
    key_id: &'a str,
    status: &'a str,
}

#[derive(Serialize)]
struct EncryptRequest<'a> {
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    key_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct EncryptResponse {
    encrypted_message: String,
    encrypted_data_key: String,
    key_id: String,
    key_version: u32,
}

#[derive(Serialize)]
struct DecryptRequest<'a> {
    encrypted_message: &'a str,
    encrypted_data_key: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    key_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct DecryptResponse {
    decrypted_message: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

// ============================================================================
// HTTP Client
// ============================================================================

struct SceauClient {
    client: Client,
    base_url: String,
}

impl SceauClient {
    fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder, action: &str) -> Result<T> {
        let resp = req.send().await.context("Failed to connect to server")?;

        if !resp.status().is_success() {
            let error: ErrorResponse = resp.json().await.unwrap_or(ErrorResponse {
                error: "Unknown error".into(),
            });
            bail!("{} failed: {}", action, error.error);
        }

        resp.json().await.context("Failed to parse response")
    }

    async fn get_health(&self) -> Result<HealthResponse> {
        self.send(self.client.get(self.url("/v1/sys/health")), "Status")
            .await
    }

    async fn create_key(&self) -> Result<KeyResponse> {
        self.send(self.client.post(self.url("/v1/keys")), "Create key")
            .await
    }

    async fn get_key(&self, key_id: &str) -> Result<KeyResponse> {
        let req = self
            .client
            .get(self.url("/v1/keys"))
            .query(&[("key_id", key_id)]);
        self.send(req, "Get key").await
    }

    async fn list_keys(&self, path: &str) -> Result<Vec<KeyResponse>> {
        self.send(self.client.get(self.url(path)), "List keys").await
    }

    async fn current_key(&self) -> Result<KeyResponse> {
        self.send(self.client.get(self.url("/v1/keys/current")), "Get current key")
            .await
    }

    async fn rotate_key(&self) -> Result<KeyResponse> {
        self.send(self.client.post(self.url("/v1/keys/rotate")), "Rotate")
            .await
    }

    async fn set_status(&self, key_id: &str, status: &str) -> Result<KeyResponse> {
        let req = self
            .client
            .patch(self.url("/v1/keys/status"))
            .json(&SetStatusRequest { key_id, status });
        self.send(req, "Set status").await
    }

    async fn encrypt(&self, message: &str, key_id: Option<&str>) -> Result<EncryptResponse> {
        let req = self
            .client
            .post(self.url("/v1/crypto/encrypt"))
            .json(&EncryptRequest { message, key_id });
        self.send(req, "Encrypt").await
    }

    async fn decrypt(
        &self,
        encrypted_message: &str,
        encrypted_data_key: &str,
        key_id: Option<&str>,
    ) -> Result<DecryptResponse> {
        let req = self
            .client
            .post(self.url("/v1/crypto/decrypt"))
            .json(&DecryptRequest {
                encrypted_message,
                encrypted_data_key,
                key_id,
            });
        self.send(req, "Decrypt").await
    }
}

// ============================================================================
// Command Handlers
// ============================================================================

fn print_key(key: &KeyResponse) {
    println!("  Key ID:     {}", key.key_id);
    println!("  Version:    {}", key.version);
    println!("  Status:     {}", key.status);
    println!("  Created:    {}", key.creation_date);
    println!("  Expires:    {}", key.expiration_date);
    if let Some(material) = &key.key_material {
        println!("  Material:   {}", material);
    }
}

async fn cmd_status(client: &SceauClient) -> Result<()> {
    let health = client.get_health().await?;

    println!("Sceau server status:");
    println!("  Status:      {}", health.status);
    println!("  Version:     {}", health.version);
    println!("  Backend:     {}", health.backend);
    match health.active_key_version {
        Some(v) => println!("  Active key:  v{}", v),
        None => println!("  Active key:  none"),
    }

    Ok(())
}

async fn cmd_keys(client: &SceauClient, command: KeysCommands) -> Result<()> {
    match command {
        KeysCommands::Create => {
            let key = client.create_key().await?;
            println!("Key created:");
            print_key(&key);
        },
        KeysCommands::Get { key_id } => {
            let key = client.get_key(&key_id).await?;
            print_key(&key);
        },
        KeysCommands::Active => {
            let keys = client.list_keys("/v1/keys/active").await?;
            print_key_list(&keys, "No active keys");
        },
        KeysCommands::Current => {
            let key = client.current_key().await?;
            print_key(&key);
        },
        KeysCommands::Versions => {
            let keys = client.list_keys("/v1/keys/versions").await?;
            print_key_list(&keys, "No keys found");
        },
        KeysCommands::Rotate => {
            let key = client.rotate_key().await?;
            println!("Key rotated to version {}:", key.version);
            print_key(&key);
        },
        KeysCommands::SetStatus { key_id, status } => {
            let key = client.set_status(&key_id, &status.to_uppercase()).await?;
            println!("Key {} is now {}", key.key_id, key.status);
        },
    }

    Ok(())
}

fn print_key_list(keys: &[KeyResponse], empty: &str) {
    if keys.is_empty() {
        println!("{}", empty);
        return;
    }

    for key in keys {
        println!("  v{:<6} {:<9} {}", key.version, key.status, key.key_id);
    }
}

async fn cmd_encrypt(client: &SceauClient, message: &str, key_id: Option<&str>) -> Result<()> {
    let result = client.encrypt(message, key_id).await?;

    println!("{}", serde_json::to_string_pretty(&serde_json::json!({
        "encrypted_message": result.encrypted_message,
        "encrypted_data_key": result.encrypted_data_key,
        "key_id": result.key_id,
        "key_version": result.key_version,
    }))?);

    Ok(())
}

async fn cmd_decrypt(
    client: &SceauClient,
    message: &str,
    data_key: &str,
    key_id: Option<&str>,
) -> Result<()> {
    let result = client.decrypt(message, data_key, key_id).await?;
    println!("{}", result.decrypted_message);
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = SceauClient::new(&cli.addr)?;

    match cli.command {
        Commands::Status => cmd_status(&client).await,
        Commands::Keys { command } => cmd_keys(&client, command).await,
        Commands::Encrypt { message, key_id } => {
            cmd_encrypt(&client, &message, key_id.as_deref()).await
        },
        Commands::Decrypt {
            message,
            data_key,
            key_id,
        } => cmd_decrypt(&client, &message, &data_key, key_id.as_deref()).await,
    }
}
