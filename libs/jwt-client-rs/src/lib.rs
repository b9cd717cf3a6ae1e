//! Base client for JWT-authenticated calls between internal services.
//!
//! Every call is signed with a short-lived HS256 access token that binds a
//! checksum of its payload, so the receiving service can verify both origin
//! and integrity.
//!
//! # Features
//!
//! - **Request dispatch** - `send_get`/`send_post`/... with retries, per-call and per-attempt timers
//! - **Error classification** - Transport and upstream failures normalized into one `{code, message}` error
//! - **Identity sealing** - AES-256-CTR encryption of user identities under the service secret
//! - **Composition** - `ExtendedClient` wraps the base client with service-specific data
//!
//! # Example
//!
//! ```rust,ignore
//! use jwt_client::{ClientConfig, JwtClient, SendArgs, TracingLogger};
//!
//! let client = JwtClient::new(ClientConfig::from_env())?;
//!
//! let user = client
//!     .send_get(SendArgs::new("/users/:id").param("id", "42"), Some(&TracingLogger))
//!     .await?;
//! ```

mod classify;
mod client;
mod config;
mod dispatch;
mod error;
mod logging;
mod metrics;
mod options;
mod reqwest_transport;
mod retry;
mod transport;

#[cfg(test)]
pub mod test_utils;

pub use classify::{classify_by_message, normalize};
pub use client::{ExtendedClient, JwtClient, UserIdAndToken};
pub use config::ClientConfig;
pub use dispatch::SendArgs;
pub use error::{DefaultErrorKind, ErrorKind, JwtClientError, RequestFailure};
pub use logging::{ErrorScope, RequestErrorLog, RequestLogger, TracingLogger};
pub use metrics::{Metrics, NoopMetrics, RequestLabels, ResponseLabels, StopTimer, noop_metrics};
pub use options::{ACCESS_TOKEN_HEADER, AccessHeaders, RequestOptions, SearchParams, SendOptions, TransportOptions};
pub use reqwest_transport::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT, ReqwestTransport, try_build_client,
};
pub use retry::RetryPolicy;
pub use transport::{ErrorInfo, Method, RequestHooks, Transport, TransportError, TransportResponse};

// Re-export shared types for convenience
pub use jwt_client_types::{
    AccessTokenClaims, CipherError, ErrorCode, PathContext, TokenError, payload_checksum,
};
