use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error code carried by every normalized client error.
///
/// Upstream services report either an HTTP-ish number (`404`, `409`) or a
/// symbolic string (`ECONNREFUSED`), so both shapes are kept as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorCode {
    Numeric(i64),
    Named(String),
}

impl ErrorCode {
    /// Numeric value of the code, if it is one.
    pub fn as_number(&self) -> Option<i64> {
        match self {
            Self::Numeric(n) => Some(*n),
            Self::Named(_) => None,
        }
    }

    /// Reads a code out of an arbitrary JSON value (`"E..."` or `409`).
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => n.as_i64().map(Self::Numeric),
            serde_json::Value::String(s) => Some(Self::Named(s.clone())),
            _ => None,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Numeric(n) => write!(f, "{}", n),
            Self::Named(s) => write!(f, "{}", s),
        }
    }
}

impl From<u16> for ErrorCode {
    fn from(status: u16) -> Self {
        Self::Numeric(i64::from(status))
    }
}

impl From<i64> for ErrorCode {
    fn from(code: i64) -> Self {
        Self::Numeric(code)
    }
}

impl From<&str> for ErrorCode {
    fn from(code: &str) -> Self {
        Self::Named(code.to_string())
    }
}

impl From<String> for ErrorCode {
    fn from(code: String) -> Self {
        Self::Named(code)
    }
}

/// Symmetric cipher failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CipherError {
    #[error("EncryptError: ENOENCRYPTKEY")]
    NoEncryptKey,

    #[error("EncryptError: ENOENCRYPTVALUE")]
    NoEncryptValue,

    #[error("DecryptError: ENODECRYPTKEY")]
    NoDecryptKey,

    #[error("DecryptError: ENODECRYPTVALUE")]
    NoDecryptValue,

    /// Input is not base64 or too short to hold an IV plus one byte.
    #[error("DecryptError: EMALFORMEDPAYLOAD")]
    MalformedPayload,
}

impl CipherError {
    pub fn name(&self) -> &'static str {
        match self {
            Self::NoEncryptKey | Self::NoEncryptValue => "EncryptError",
            Self::NoDecryptKey | Self::NoDecryptValue | Self::MalformedPayload => "DecryptError",
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::NoEncryptKey => "ENOENCRYPTKEY",
            Self::NoEncryptValue => "ENOENCRYPTVALUE",
            Self::NoDecryptKey => "ENODECRYPTKEY",
            Self::NoDecryptValue => "ENODECRYPTVALUE",
            Self::MalformedPayload => "EMALFORMEDPAYLOAD",
        }
    }
}

/// Access token signing and verification errors.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Payload serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Checksum does not match the received payload")]
    ChecksumMismatch,

    #[error("Token issued {age}s ago exceeds max age of {max_age}s")]
    Expired { age: i64, max_age: u64 },

    #[error("JWT library error: {0}")]
    Library(#[from] jsonwebtoken::errors::Error),
}

/// Endpoint template compilation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("Missing value for path parameter \"{0}\"")]
    MissingParam(String),

    #[error("Invalid path template: {0}")]
    InvalidTemplate(String),
}
