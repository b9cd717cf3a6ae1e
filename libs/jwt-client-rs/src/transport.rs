//! Contract between the dispatch pipeline and the HTTP transport.

use async_trait::async_trait;
use jwt_client_types::ErrorCode;
use serde::Serialize;
use serde_json::Value;

use crate::options::TransportOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Post => "post",
            Self::Put => "put",
            Self::Patch => "patch",
            Self::Delete => "delete",
            Self::Head => "head",
            Self::Options => "options",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
            Method::Head => reqwest::Method::HEAD,
            Method::Options => reqwest::Method::OPTIONS,
        }
    }
}

/// A response as received, body unparsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportResponse {
    pub status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status_code: u16, body: impl Into<String>) -> Self {
        Self {
            status_code,
            status_message: None,
            body: body.into(),
        }
    }

    pub fn with_status_message(mut self, message: impl Into<String>) -> Self {
        self.status_message = Some(message.into());
        self
    }

    pub fn has_blank_body(&self) -> bool {
        self.body.trim().is_empty()
    }
}

/// Application-level error details, either from the network stack or from
/// an upstream's error body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ErrorInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
}

impl ErrorInfo {
    pub fn with_code(code: impl Into<ErrorCode>) -> Self {
        Self {
            name: None,
            code: Some(code.into()),
        }
    }

    /// Reads `name`/`code` out of a JSON object body.
    pub fn from_object(body: &serde_json::Map<String, Value>) -> Self {
        Self {
            name: body.get("name").and_then(Value::as_str).map(str::to_string),
            code: body.get("code").and_then(ErrorCode::from_json),
        }
    }
}

/// Failure reported by a transport.
///
/// Transports fill in whatever subset they know: HTTP failures carry a
/// status, network failures only a code, and upstreams may wrap either in a
/// `body`/`error` object of their own.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportError {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip)]
    pub response: Option<TransportResponse>,
}

impl TransportError {
    /// Network-level failure identified only by a code like `ECONNREFUSED`.
    pub fn network(name: &str, code: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            error: Some(ErrorInfo::with_code(code)),
            code: Some(code.to_string()),
            ..Default::default()
        }
    }

    /// Non-2xx response turned into an error.
    pub fn from_response(response: TransportResponse) -> Self {
        let body = serde_json::from_str::<Value>(&response.body)
            .unwrap_or_else(|_| Value::String(response.body.clone()));
        Self {
            name: Some("HTTPError".to_string()),
            status_code: Some(response.status_code),
            status_message: response.status_message.clone(),
            body: Some(body),
            response: Some(response),
            ..Default::default()
        }
    }

    /// Status code of the error or of its attached response.
    pub fn effective_status(&self) -> Option<u16> {
        self.status_code
            .or_else(|| self.response.as_ref().map(|r| r.status_code))
    }

    /// The transport-level code, falling back to `error.code`.
    pub fn effective_code(&self) -> Option<String> {
        self.code.clone().or_else(|| {
            self.error
                .as_ref()
                .and_then(|e| e.code.as_ref())
                .map(ToString::to_string)
        })
    }
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (status: {}, code: {})",
            self.name.as_deref().unwrap_or("TransportError"),
            self.effective_status()
                .map(|s| s.to_string())
                .unwrap_or_default(),
            self.effective_code().unwrap_or_default()
        )
    }
}

impl std::error::Error for TransportError {}

/// Lifecycle listener a transport drives while performing one call.
///
/// Call order: `before_request` once, then per attempt `after_response` for
/// every received response, `before_retry` right before a retried attempt is
/// sent, and `on_error` once when the call ends in failure.
pub trait RequestHooks: Send {
    fn before_request(&mut self);

    fn before_retry(&mut self, error: &TransportError, retry_count: u32);

    /// May rewrite the response (e.g. normalize its body) before the
    /// transport inspects it.
    fn after_response(&mut self, response: &mut TransportResponse);

    fn on_error(&mut self, error: &TransportError);
}

/// Performs the socket I/O and owns the retry loop.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn perform(
        &self,
        method: Method,
        options: TransportOptions,
        hooks: &mut dyn RequestHooks,
    ) -> Result<TransportResponse, TransportError>;
}
