//! Storage error types.

use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Entry not found.
    #[error("entry not found: {0}")]
    NotFound(String),

    /// Entry already exists (duplicate key identity or version).
    #[error("entry already exists: {0}")]
    AlreadyExists(String),

    /// The stored state no longer matches what the caller expected.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Connection error.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Query error.
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Transaction could not be started or committed.
    #[error("transaction error: {0}")]
    Transaction(String),

    /// A stored row could not be decoded.
    #[error("corrupt record: {0}")]
    Corrupt(String),

    /// Invalid input.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}
