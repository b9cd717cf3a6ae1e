use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::retry::RetryPolicy;

pub const ACCESS_TOKEN_HEADER: &str = "x-access-token";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessHeaders {
    #[serde(rename = "x-access-token")]
    pub x_access_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchParams {
    /// Base64 of the JSON-serialized payload
    pub payload: String,
}

/// Authenticated request description built for one call.
///
/// At most one of `body` / `search_params` is set.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestOptions {
    pub url: String,
    pub headers: AccessHeaders,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_params: Option<SearchParams>,
    pub json: bool,
}

/// Caller overrides of transport behavior for one call.
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    pub headers: BTreeMap<String, String>,
    pub retry: Option<RetryPolicy>,
    pub timeout: Option<Duration>,
    pub throw_http_errors: Option<bool>,
}

impl SendOptions {
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn throw_http_errors(mut self, throw: bool) -> Self {
        self.throw_http_errors = Some(throw);
        self
    }
}

/// Fully merged options handed to a transport.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportOptions {
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Value>,
    pub search_params: BTreeMap<String, String>,
    pub json: bool,
    pub retry: RetryPolicy,
    pub timeout: Option<Duration>,
    /// Turn responses with status >= 400 into errors
    pub throw_http_errors: bool,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            url: String::new(),
            headers: BTreeMap::new(),
            body: None,
            search_params: BTreeMap::new(),
            json: false,
            retry: RetryPolicy::default(),
            timeout: None,
            throw_http_errors: true,
        }
    }
}

impl TransportOptions {
    /// Layers library defaults, then caller overrides, then the request
    /// options; later layers win.
    pub fn merge(send_options: SendOptions, request: RequestOptions) -> Self {
        let mut options = Self::default();

        // header names are case-insensitive; keep one key per name
        options.headers.extend(
            send_options
                .headers
                .into_iter()
                .map(|(name, value)| (name.to_ascii_lowercase(), value)),
        );
        if let Some(retry) = send_options.retry {
            options.retry = retry;
        }
        if send_options.timeout.is_some() {
            options.timeout = send_options.timeout;
        }
        if let Some(throw) = send_options.throw_http_errors {
            options.throw_http_errors = throw;
        }

        options.url = request.url;
        options
            .headers
            .insert(ACCESS_TOKEN_HEADER.to_string(), request.headers.x_access_token);
        options.body = request.body;
        if let Some(params) = request.search_params {
            options.search_params.insert("payload".to_string(), params.payload);
        }
        options.json = request.json;

        options
    }
}
