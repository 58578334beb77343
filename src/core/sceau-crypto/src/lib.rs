//! # Sceau Crypto
//!
//! Core cryptographic primitives for Sceau.
//!
//! This crate provides the low-level operations the envelope engine is built on:
//! - Authenticated encryption (AES-256-GCM, random 96-bit nonces)
//! - Secure random generation from the OS CSPRNG
//! - Zeroizing containers for raw key material

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod aead;
pub mod error;
pub mod keys;
pub mod random;

pub use error::CryptoError;
pub use keys::KeyMaterial;
