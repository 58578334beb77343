//! # Sceau Storage - SQLite Backend
//!
//! SQLite implementation of the [`KeyStore`] contract.
//! Each store lives in its own database file at `{base_path}/{name}.db`.
//!
//! Rotation runs inside a single SQL transaction; dropping the transaction
//! before commit (error, cancellation, deadline) rolls it back.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{Sqlite, SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};
use uuid::Uuid;

use sceau_crypto::KeyMaterial;
use sceau_storage::{KeyStatus, KeyStore, MasterKey, StorageError};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS master_keys (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    key_id       TEXT NOT NULL UNIQUE,
    key_material BLOB NOT NULL,
    version      INTEGER NOT NULL UNIQUE,
    status       TEXT NOT NULL,
    created_at   INTEGER NOT NULL,
    expires_at   INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_master_keys_status ON master_keys (status, version);
"#;

const COLUMNS: &str = "id, key_id, key_material, version, status, created_at, expires_at";

type KeyRow = (i64, String, Vec<u8>, i64, String, i64, i64);

/// SQLite-backed key store.
#[derive(Clone)]
pub struct SqliteKeyStore {
    pool: SqlitePool,
    db_path: PathBuf,
}

impl SqliteKeyStore {
    /// Opens or creates the key store database.
    ///
    /// # Arguments
    ///
    /// * `base_path` - Directory where the database file is stored
    /// * `name` - Store name (must match `[a-z0-9_-]+`)
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Store name is invalid
    /// - Directory cannot be created
    /// - Database connection or migration fails
    pub async fn open(base_path: impl AsRef<Path>, name: &str) -> Result<Self, StorageError> {
        Self::validate_name(name)?;

        let base = base_path.as_ref();
        std::fs::create_dir_all(base).map_err(|e| {
            StorageError::ConnectionFailed(format!("failed to create directory: {e}"))
        })?;

        let db_path = base.join(format!("{name}.db"));
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));

        debug!(path = %db_path.display(), "Opening SQLite key store");

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        let store = Self { pool, db_path };
        store.migrate().await?;

        info!(path = %store.db_path.display(), "SQLite key store ready");

        Ok(store)
    }

    /// Path of the underlying database file.
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Validates that a store name is safe to use as a file name.
    ///
    /// Only allows: lowercase letters, digits, underscore, hyphen.
    fn validate_name(name: &str) -> Result<(), StorageError> {
        if name.is_empty() {
            return Err(StorageError::InvalidInput("store name cannot be empty".into()));
        }

        if name.len() > 64 {
            return Err(StorageError::InvalidInput("store name too long".into()));
        }

        let valid = name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');

        if !valid {
            return Err(StorageError::InvalidInput(
                "store name must match [a-z0-9_-]+".into(),
            ));
        }

        Ok(())
    }

    async fn migrate(&self) -> Result<(), StorageError> {
        debug!("Running key store migrations");

        for statement in SCHEMA.split(';').filter(|s| !s.trim().is_empty()) {
            sqlx::query(statement.trim())
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::ConnectionFailed(format!("migration failed: {e}")))?;
        }

        Ok(())
    }
}

fn query_err(e: sqlx::Error) -> StorageError {
    StorageError::QueryFailed(e.to_string())
}

fn write_err(e: sqlx::Error) -> StorageError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StorageError::AlreadyExists(db.message().to_string())
        },
        _ => StorageError::QueryFailed(e.to_string()),
    }
}

fn to_i64(value: u64, field: &str) -> Result<i64, StorageError> {
    i64::try_from(value).map_err(|_| StorageError::InvalidInput(format!("{field} out of range")))
}

fn decode(row: KeyRow) -> Result<MasterKey, StorageError> {
    let (id, key_id, material, version, status, created_at, expires_at) = row;

    Ok(MasterKey {
        id: Some(id),
        key_id: Uuid::parse_str(&key_id)
            .map_err(|e| StorageError::Corrupt(format!("key_id {key_id}: {e}")))?,
        material: KeyMaterial::from_bytes(&material)
            .map_err(|e| StorageError::Corrupt(format!("key {key_id}: {e}")))?,
        version: u32::try_from(version)
            .map_err(|_| StorageError::Corrupt(format!("key {key_id}: version {version}")))?,
        status: status
            .parse()
            .map_err(|e| StorageError::Corrupt(format!("key {key_id}: {e}")))?,
        created_at: u64::try_from(created_at)
            .map_err(|_| StorageError::Corrupt(format!("key {key_id}: created_at")))?,
        expires_at: u64::try_from(expires_at)
            .map_err(|_| StorageError::Corrupt(format!("key {key_id}: expires_at")))?,
    })
}

async fn insert_row<'e, E>(executor: E, key: &MasterKey) -> Result<i64, StorageError>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "INSERT INTO master_keys (key_id, key_material, version, status, created_at, expires_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(key.key_id.to_string())
    .bind(key.material.as_bytes())
    .bind(i64::from(key.version))
    .bind(key.status.as_str())
    .bind(to_i64(key.created_at, "created_at")?)
    .bind(to_i64(key.expires_at, "expires_at")?)
    .execute(executor)
    .await
    .map_err(write_err)?;

    Ok(result.last_insert_rowid())
}

#[async_trait]
impl KeyStore for SqliteKeyStore {
    async fn insert(&self, key: &MasterKey) -> Result<i64, StorageError> {
        insert_row(&self.pool, key).await
    }

    async fn find_by_key_id(&self, key_id: &Uuid) -> Result<Option<MasterKey>, StorageError> {
        let row: Option<KeyRow> =
            sqlx::query_as(&format!("SELECT {COLUMNS} FROM master_keys WHERE key_id = ?"))
                .bind(key_id.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(query_err)?;

        row.map(decode).transpose()
    }

    async fn find_active(&self) -> Result<Vec<MasterKey>, StorageError> {
        let rows: Vec<KeyRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM master_keys WHERE status = ? ORDER BY created_at DESC, version DESC"
        ))
        .bind(KeyStatus::Active.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(query_err)?;

        rows.into_iter().map(decode).collect()
    }

    async fn find_current_active(&self) -> Result<Option<MasterKey>, StorageError> {
        let row: Option<KeyRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM master_keys WHERE status = ? ORDER BY version DESC LIMIT 1"
        ))
        .bind(KeyStatus::Active.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(query_err)?;

        row.map(decode).transpose()
    }

    async fn find_all_versions(&self) -> Result<Vec<MasterKey>, StorageError> {
        let rows: Vec<KeyRow> =
            sqlx::query_as(&format!("SELECT {COLUMNS} FROM master_keys ORDER BY version"))
                .fetch_all(&self.pool)
                .await
                .map_err(query_err)?;

        rows.into_iter().map(decode).collect()
    }

    async fn latest_version(&self) -> Result<Option<u32>, StorageError> {
        let row: (Option<i64>,) = sqlx::query_as("SELECT MAX(version) FROM master_keys")
            .fetch_one(&self.pool)
            .await
            .map_err(query_err)?;

        row.0
            .map(|v| {
                u32::try_from(v).map_err(|_| StorageError::Corrupt(format!("version {v}")))
            })
            .transpose()
    }

    async fn atomic_rotate(
        &self,
        old_key_id: &Uuid,
        new_key: &MasterKey,
    ) -> Result<i64, StorageError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Transaction(e.to_string()))?;

        let updated = sqlx::query("UPDATE master_keys SET status = ? WHERE key_id = ? AND status = ?")
            .bind(KeyStatus::Rotated.as_str())
            .bind(old_key_id.to_string())
            .bind(KeyStatus::Active.as_str())
            .execute(&mut *tx)
            .await
            .map_err(write_err)?;

        if updated.rows_affected() == 0 {
            let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM master_keys WHERE key_id = ?")
                .bind(old_key_id.to_string())
                .fetch_optional(&mut *tx)
                .await
                .map_err(query_err)?;

            return Err(match exists {
                Some(_) => StorageError::Conflict(format!("key {old_key_id} is no longer ACTIVE")),
                None => StorageError::NotFound(format!("key {old_key_id}")),
            });
        }

        let id = insert_row(&mut *tx, new_key).await?;

        tx.commit()
            .await
            .map_err(|e| StorageError::Transaction(e.to_string()))?;

        debug!(old_key_id = %old_key_id, new_key_id = %new_key.key_id, "Rotation committed");

        Ok(id)
    }

    async fn update_status(
        &self,
        key_id: &Uuid,
        expected: KeyStatus,
        status: KeyStatus,
    ) -> Result<(), StorageError> {
        let updated = sqlx::query("UPDATE master_keys SET status = ? WHERE key_id = ? AND status = ?")
            .bind(status.as_str())
            .bind(key_id.to_string())
            .bind(expected.as_str())
            .execute(&self.pool)
            .await
            .map_err(write_err)?;

        if updated.rows_affected() == 0 {
            return match self.find_by_key_id(key_id).await? {
                Some(current) => Err(StorageError::Conflict(format!(
                    "key {key_id} is {}, expected {expected}",
                    current.status
                ))),
                None => Err(StorageError::NotFound(format!("key {key_id}"))),
            };
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}
