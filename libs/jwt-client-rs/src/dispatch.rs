//! Request dispatch: one authenticated call with retries, timers and logging.

use jwt_client_types::PathContext;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::client::JwtClient;
use crate::error::{ErrorKind, RequestFailure};
use crate::logging::{ErrorScope, RequestLogger, log_request_error};
use crate::metrics::{Metrics, RequestLabels, ResponseLabels, Timer};
use crate::options::{SendOptions, TransportOptions};
use crate::transport::{ErrorInfo, Method, RequestHooks, TransportError, TransportResponse};

/// Arguments of one call.
#[derive(Debug, Clone, Default)]
pub struct SendArgs {
    /// Endpoint template, e.g. `/users/:id`
    pub url: String,
    pub context: PathContext,
    pub payload: Map<String, Value>,
    pub send_options: SendOptions,
}

impl SendArgs {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn context(mut self, context: PathContext) -> Self {
        self.context = context;
        self
    }

    /// Adds one path parameter.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(name.into(), value.into());
        self
    }

    pub fn payload(mut self, payload: Map<String, Value>) -> Self {
        self.payload = payload;
        self
    }

    /// Serializes `payload` into the call's payload.
    ///
    /// Values that do not serialize to a JSON object are ignored.
    pub fn payload_from<T: Serialize>(mut self, payload: &T) -> Self {
        if let Ok(Value::Object(map)) = serde_json::to_value(payload) {
            self.payload = map;
        }
        self
    }

    pub fn send_options(mut self, send_options: SendOptions) -> Self {
        self.send_options = send_options;
        self
    }
}

// ============================================================================
// Attempt listener
// ============================================================================

/// Per-attempt timing and logging, driven by the transport.
///
/// The attempt timer is stopped on every response, on a retry decision and
/// on terminal failure; whichever comes first records the outcome.
struct AttemptListener<'a> {
    labels: &'a RequestLabels,
    metrics: &'a dyn Metrics,
    logger: Option<&'a dyn RequestLogger>,
    timer: Option<Timer>,
}

impl<'a> AttemptListener<'a> {
    fn new(
        labels: &'a RequestLabels,
        metrics: &'a dyn Metrics,
        logger: Option<&'a dyn RequestLogger>,
    ) -> Self {
        Self {
            labels,
            metrics,
            logger,
            timer: None,
        }
    }

    fn start(&mut self) {
        self.timer = Some(Timer::start(self.metrics, self.labels));
    }

    fn stop(&mut self, outcome: &ResponseLabels) {
        if let Some(mut timer) = self.timer.take() {
            timer.stop(outcome);
        }
    }

    fn log(&self, error: &TransportError) {
        if let Some(logger) = self.logger {
            log_request_error(logger, ErrorScope::Client, self.labels, error);
        }
    }
}

impl RequestHooks for AttemptListener<'_> {
    fn before_request(&mut self) {
        self.start();
    }

    fn before_retry(&mut self, error: &TransportError, retry_count: u32) {
        self.stop(&ResponseLabels::from_error(error));
        tracing::debug!(
            client_name = %self.labels.client_name,
            url = %self.labels.url,
            retry_count,
            error = %error,
            "Retrying request"
        );
        self.log(error);
        self.start();
    }

    fn after_response(&mut self, response: &mut TransportResponse) {
        if response.status_code >= 400 {
            if response.has_blank_body() {
                response.body = "{}".to_string();
            }
            self.log(&TransportError::from_response(response.clone()));
        }
        self.stop(&ResponseLabels::from_response(response));
    }

    fn on_error(&mut self, error: &TransportError) {
        self.stop(&ResponseLabels::from_error(error));
        tracing::warn!(
            client_name = %self.labels.client_name,
            url = %self.labels.url,
            error = %error,
            "Request failed"
        );
    }
}

// ============================================================================
// Pipeline
// ============================================================================

impl<K: ErrorKind> JwtClient<K> {
    /// Perform one authenticated call and return its JSON body.
    ///
    /// GET calls carry the payload as the `payload` query parameter, other
    /// methods as the JSON body. A blank response body yields `{}`.
    ///
    /// # Errors
    /// Every failure is returned as this client's error kind, classified by
    /// [`JwtClient::handle_request_error`].
    pub async fn send(
        &self,
        method: Method,
        args: SendArgs,
        logger: Option<&dyn RequestLogger>,
    ) -> Result<Value, K::Error> {
        let SendArgs {
            url,
            context,
            payload,
            send_options,
        } = args;

        let request =
            self.create_request_options(&url, &context, &payload, method == Method::Get)?;
        let options = TransportOptions::merge(send_options, request);

        let labels = RequestLabels {
            client_name: self.config.service_slug.clone(),
            base_url: self.config.service_url.clone(),
            url,
            method: method.as_str().to_string(),
        };

        let mut api_timer = Timer::start(self.api_metrics.as_ref(), &labels);
        let mut listener = AttemptListener::new(&labels, self.request_metrics.as_ref(), logger);

        let result = self.transport.perform(method, options, &mut listener).await;
        drop(listener);

        // an unparseable body fails the call like a transport error
        let parsed = result.and_then(|response| {
            let body = parse_body(&response)?;
            Ok((response, body))
        });

        let error = match parsed {
            Ok((response, body)) => {
                api_timer.stop(&ResponseLabels::from_response(&response));
                return Ok(body);
            }
            Err(error) if is_benign_empty(&error) => {
                api_timer.stop(&ResponseLabels::from_error(&error));
                return Ok(Value::Object(Map::new()));
            }
            Err(error) => error,
        };

        api_timer.stop(&ResponseLabels::from_error(&error));
        if let Some(logger) = logger {
            log_request_error(logger, ErrorScope::Api, &labels, &error);
        }
        Err(self.handle_request_error(RequestFailure::Transport(error)))
    }

    pub async fn send_get(
        &self,
        args: SendArgs,
        logger: Option<&dyn RequestLogger>,
    ) -> Result<Value, K::Error> {
        self.send(Method::Get, args, logger).await
    }

    pub async fn send_post(
        &self,
        args: SendArgs,
        logger: Option<&dyn RequestLogger>,
    ) -> Result<Value, K::Error> {
        self.send(Method::Post, args, logger).await
    }

    pub async fn send_put(
        &self,
        args: SendArgs,
        logger: Option<&dyn RequestLogger>,
    ) -> Result<Value, K::Error> {
        self.send(Method::Put, args, logger).await
    }

    pub async fn send_patch(
        &self,
        args: SendArgs,
        logger: Option<&dyn RequestLogger>,
    ) -> Result<Value, K::Error> {
        self.send(Method::Patch, args, logger).await
    }

    pub async fn send_delete(
        &self,
        args: SendArgs,
        logger: Option<&dyn RequestLogger>,
    ) -> Result<Value, K::Error> {
        self.send(Method::Delete, args, logger).await
    }
}

/// Blank bodies become `{}`; anything else must be JSON.
fn parse_body(response: &TransportResponse) -> Result<Value, TransportError> {
    if response.has_blank_body() {
        return Ok(Value::Object(Map::new()));
    }

    serde_json::from_str(&response.body).map_err(|e| {
        tracing::warn!(
            status_code = response.status_code,
            error = %e,
            "Response body is not valid JSON"
        );
        TransportError {
            name: Some("ParseError".to_string()),
            error: Some(ErrorInfo::default()),
            response: Some(response.clone()),
            ..Default::default()
        }
    })
}

/// A failure raised over a successful response with nothing in it.
fn is_benign_empty(error: &TransportError) -> bool {
    error
        .response
        .as_ref()
        .is_some_and(|r| r.status_code < 300 && r.has_blank_body())
}
