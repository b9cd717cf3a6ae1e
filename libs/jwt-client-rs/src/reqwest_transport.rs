//! Default transport on top of `reqwest`, owning the retry loop.

use std::error::Error as _;
use std::io;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::ACCEPT;

use crate::options::TransportOptions;
use crate::transport::{Method, RequestHooks, Transport, TransportError, TransportResponse};

/// Default connect timeout (TCP handshake + TLS).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default timeout of a single attempt, overridable per call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Build an HTTP client with default timeouts.
pub fn try_build_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
        .timeout(DEFAULT_REQUEST_TIMEOUT)
        .build()
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn try_new() -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: try_build_client()?,
        })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn attempt(
        &self,
        method: Method,
        options: &TransportOptions,
    ) -> Result<TransportResponse, TransportError> {
        let mut request = self.client.request(method.into(), &options.url);

        for (name, value) in &options.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if options.json {
            request = request.header(ACCEPT, "application/json");
        }
        if !options.search_params.is_empty() {
            request = request.query(&options.search_params);
        }
        if let Some(body) = &options.body {
            request = request.json(body);
        }
        if let Some(timeout) = options.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(|e| network_error(&e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::network("RequestError", "ETIMEDOUT")
            } else {
                TransportError::network("ReadError", "EREADBODY")
            }
        })?;

        Ok(TransportResponse {
            status_code: status.as_u16(),
            status_message: status.canonical_reason().map(str::to_string),
            body,
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn perform(
        &self,
        method: Method,
        options: TransportOptions,
        hooks: &mut dyn RequestHooks,
    ) -> Result<TransportResponse, TransportError> {
        hooks.before_request();

        let mut retry_count = 0;
        loop {
            let error = match self.attempt(method, &options).await {
                Ok(mut response) => {
                    hooks.after_response(&mut response);
                    if response.status_code < 400 || !options.throw_http_errors {
                        return Ok(response);
                    }
                    TransportError::from_response(response)
                }
                Err(error) => error,
            };

            retry_count += 1;
            if !options.retry.should_retry(method, &error, retry_count) {
                hooks.on_error(&error);
                return Err(error);
            }

            tokio::time::sleep(options.retry.delay(retry_count)).await;
            hooks.before_retry(&error, retry_count);
        }
    }
}

/// Maps a reqwest failure onto the network codes the classifier knows.
fn network_error(error: &reqwest::Error) -> TransportError {
    let code = if error.is_timeout() {
        "ETIMEDOUT"
    } else {
        source_code(error).unwrap_or("EREQUEST")
    };

    TransportError::network("RequestError", code)
}

fn source_code(error: &reqwest::Error) -> Option<&'static str> {
    let mut source = error.source();
    while let Some(err) = source {
        if err.to_string().contains("dns error") {
            return Some("ENOTFOUND");
        }
        if let Some(io_error) = err.downcast_ref::<io::Error>() {
            match io_error.kind() {
                io::ErrorKind::ConnectionRefused => return Some("ECONNREFUSED"),
                io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted => {
                    return Some("ECONNRESET");
                }
                io::ErrorKind::BrokenPipe => return Some("EPIPE"),
                io::ErrorKind::AddrInUse => return Some("EADDRINUSE"),
                io::ErrorKind::TimedOut => return Some("ETIMEDOUT"),
                _ => {}
            }
        }
        source = err.source();
    }
    None
}
