use serde::Serialize;

use crate::metrics::RequestLabels;
use crate::transport::TransportError;

/// Which stage of a call failed: one attempt, or the call as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorScope {
    Client,
    Api,
}

impl ErrorScope {
    fn tag(&self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Api => "API",
        }
    }

    pub fn log_name(&self) -> &'static str {
        match self {
            Self::Client => "jwt_client_request_error",
            Self::Api => "jwt_API_request_error",
        }
    }
}

/// Structured part of a request error log line.
#[derive(Debug, Serialize)]
pub struct RequestErrorLog<'a> {
    pub name: &'static str,
    pub client_name: &'a str,
    pub url: &'a str,
    pub base_url: &'a str,
    pub method: &'a str,
    pub error: &'a TransportError,
}

pub trait RequestLogger: Send + Sync {
    fn error(&self, entry: &RequestErrorLog<'_>, message: &str);
}

/// Emits request errors as `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl RequestLogger for TracingLogger {
    fn error(&self, entry: &RequestErrorLog<'_>, message: &str) {
        tracing::error!(
            log_name = entry.name,
            client_name = entry.client_name,
            url = entry.url,
            base_url = entry.base_url,
            method = entry.method,
            error = %serde_json::to_string(entry.error).unwrap_or_default(),
            "{}",
            message
        );
    }
}

pub(crate) fn log_request_error(
    logger: &dyn RequestLogger,
    scope: ErrorScope,
    labels: &RequestLabels,
    error: &TransportError,
) {
    let entry = RequestErrorLog {
        name: scope.log_name(),
        client_name: &labels.client_name,
        url: &labels.url,
        base_url: &labels.base_url,
        method: &labels.method,
        error,
    };
    logger.error(&entry, &format_message(scope, labels, error));
}

fn format_message(scope: ErrorScope, labels: &RequestLabels, error: &TransportError) -> String {
    let details = match (&error.error, &error.body) {
        (Some(info), _) => serde_json::to_string(info).unwrap_or_default(),
        (None, Some(body)) => serde_json::to_string(body).unwrap_or_default(),
        (None, None) => String::new(),
    };

    format!(
        "JWT {} request error: {}: {} {}{} - {} - {} - {} - {} - {}",
        scope.tag(),
        labels.client_name,
        labels.method.to_uppercase(),
        labels.base_url,
        labels.url,
        error.name.as_deref().unwrap_or_default(),
        error.code.as_deref().unwrap_or_default(),
        error
            .status_code
            .map(|s| s.to_string())
            .unwrap_or_default(),
        error.status_message.as_deref().unwrap_or_default(),
        details
    )
}
