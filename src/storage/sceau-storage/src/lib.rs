//! # Sceau Storage
//!
//! Persistence contract for master keys.
//!
//! The key lifecycle manager talks to durable storage only through the
//! [`KeyStore`] trait. This crate also ships [`MemoryKeyStore`], a
//! process-local implementation used in development mode and tests.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod error;
pub mod memory;
pub mod model;

pub use backend::KeyStore;
pub use error::StorageError;
pub use memory::MemoryKeyStore;
pub use model::{KeyStatus, MasterKey};
