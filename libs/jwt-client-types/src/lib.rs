//! Shared primitives for JWT-authenticated service clients.
//!
//! This crate provides:
//! - AES-256-CTR payload cipher with random or seed-derived IVs
//! - HS256 access tokens bound to a request payload checksum
//! - Endpoint path templates with `:name` placeholders
//! - Error codes shared by clients and the services they call

mod cipher;
mod errors;
mod path;
mod token;

pub use cipher::{IV_LEN, decrypt, encrypt};
pub use errors::{CipherError, ErrorCode, PathError, TokenError};
pub use path::{PathContext, compile_path};
pub use token::{AccessTokenClaims, payload_checksum, sign_access_token, verify_access_token};
