//! # Sceau API
//!
//! REST layer over the key manager.
//!
//! ## Endpoints
//!
//! - `GET /v1/sys/health` - Liveness and current key version
//! - `POST /v1/keys` - Create a master key
//! - `GET /v1/keys?key_id=` - Get a key by identity
//! - `GET /v1/keys/active` - List ACTIVE keys
//! - `GET /v1/keys/current` - Current ACTIVE key
//! - `GET /v1/keys/versions` - Every key version
//! - `POST /v1/keys/rotate` - Rotate the current key
//! - `PATCH /v1/keys/status` - Change a key's status
//! - `POST /v1/crypto/encrypt` - Envelope-encrypt a message
//! - `POST /v1/crypto/decrypt` - Decrypt an envelope

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod dto;
pub mod error;
pub mod routes;
pub mod server;
pub mod state;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use routes::create_router;
pub use server::{build_app, start_background_server};
pub use state::{ApiConfig, AppState};
