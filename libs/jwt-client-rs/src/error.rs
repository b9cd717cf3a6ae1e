use jwt_client_types::ErrorCode;
use thiserror::Error;

use crate::transport::TransportError;

/// Capability to build the error type a client reports to its callers.
///
/// Every failure of a client, from configuration to upstream responses, is
/// constructed through its kind, so callers match on one error type and
/// branch on `code`/`message`.
pub trait ErrorKind: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Name of the error type, identifying the kind to callers.
    fn name(&self) -> &str;

    fn construct(&self, code: ErrorCode, message: String) -> Self::Error;
}

/// Error produced by [`DefaultErrorKind`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct JwtClientError {
    pub code: ErrorCode,
    pub message: String,
}

impl JwtClientError {
    pub fn code(&self) -> &ErrorCode {
        &self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultErrorKind;

impl ErrorKind for DefaultErrorKind {
    type Error = JwtClientError;

    fn name(&self) -> &str {
        "JwtClientError"
    }

    fn construct(&self, code: ErrorCode, message: String) -> JwtClientError {
        JwtClientError { code, message }
    }
}

/// Input of the error classifier.
///
/// `Client` holds an error this client already produced; it is passed
/// through untouched.
#[derive(Debug)]
pub enum RequestFailure<E> {
    Client(E),
    Transport(TransportError),
}

impl<E> From<TransportError> for RequestFailure<E> {
    fn from(error: TransportError) -> Self {
        RequestFailure::Transport(error)
    }
}

/// Messages of errors the client produces itself.
pub(crate) mod codes {
    pub const ENOSERVICESECRET: &str = "ENOSERVICESECRET";
    pub const ENOSERVICETOKEN: &str = "ENOSERVICETOKEN";
    pub const ENOSERVICESLUG: &str = "ENOSERVICESLUG";
    pub const ENOMICROSERVICEURL: &str = "ENOMICROSERVICEURL";
    pub const EINVALIDPAYLOAD: &str = "EINVALIDPAYLOAD";
    pub const EMISSINGPATHPARAM: &str = "EMISSINGPATHPARAM";
    pub const ETOKENSIGN: &str = "ETOKENSIGN";
    pub const EUNSPECIFIED: &str = "EUNSPECIFIED";
    pub const ENOERROR: &str = "ENOERROR";
}
