//! In-memory collaborators for pipeline tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::logging::{RequestErrorLog, RequestLogger};
use crate::metrics::{Metrics, RequestLabels, ResponseLabels, StopTimer};
use crate::options::TransportOptions;
use crate::transport::{Method, RequestHooks, Transport, TransportError, TransportResponse};
use crate::{ClientConfig, JwtClient};

// ============================================================================
// MockTransport
// ============================================================================

/// One scripted attempt outcome.
pub enum Step {
    Respond(TransportResponse),
    Fail(TransportError),
}

/// Transport replaying scripted outcomes while driving the hooks in the
/// same order as `ReqwestTransport`, without sleeping between retries.
#[derive(Default)]
pub struct MockTransport {
    steps: Mutex<VecDeque<Step>>,
    pub calls: Mutex<Vec<(Method, TransportOptions)>>,
}

impl MockTransport {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn respond(status_code: u16, body: &str) -> Arc<Self> {
        Self::new(vec![Step::Respond(TransportResponse::new(status_code, body))])
    }

    pub fn last_options(&self) -> TransportOptions {
        self.calls.lock().unwrap().last().cloned().unwrap().1
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn perform(
        &self,
        method: Method,
        options: TransportOptions,
        hooks: &mut dyn RequestHooks,
    ) -> Result<TransportResponse, TransportError> {
        self.calls.lock().unwrap().push((method, options.clone()));
        hooks.before_request();

        let mut retry_count = 0;
        loop {
            let step = self
                .steps
                .lock()
                .unwrap()
                .pop_front()
                .expect("MockTransport ran out of scripted steps");

            let error = match step {
                Step::Respond(mut response) => {
                    hooks.after_response(&mut response);
                    if response.status_code < 400 || !options.throw_http_errors {
                        return Ok(response);
                    }
                    TransportError::from_response(response)
                }
                Step::Fail(error) => error,
            };

            retry_count += 1;
            if !options.retry.should_retry(method, &error, retry_count) {
                hooks.on_error(&error);
                return Err(error);
            }
            hooks.before_retry(&error, retry_count);
        }
    }
}

// ============================================================================
// RecordingMetrics
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum TimerEvent {
    Start(RequestLabels),
    Stop(ResponseLabels),
}

/// Metrics sink remembering every start and stop in order.
#[derive(Default)]
pub struct RecordingMetrics {
    pub events: Arc<Mutex<Vec<TimerEvent>>>,
}

impl RecordingMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<TimerEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn starts(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, TimerEvent::Start(_)))
            .count()
    }

    pub fn stops(&self) -> Vec<ResponseLabels> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                TimerEvent::Stop(labels) => Some(labels),
                TimerEvent::Start(_) => None,
            })
            .collect()
    }

    /// Every start is followed by its stop before the next start.
    pub fn assert_paired(&self) {
        let mut open = false;
        for event in self.events() {
            match event {
                TimerEvent::Start(_) => {
                    assert!(!open, "timer started while another was running");
                    open = true;
                }
                TimerEvent::Stop(_) => {
                    assert!(open, "timer stopped without being started");
                    open = false;
                }
            }
        }
        assert!(!open, "timer left running");
    }
}

impl Metrics for RecordingMetrics {
    fn start_timer(&self, labels: &RequestLabels) -> StopTimer {
        self.events
            .lock()
            .unwrap()
            .push(TimerEvent::Start(labels.clone()));
        let events = Arc::clone(&self.events);
        Box::new(move |labels| events.lock().unwrap().push(TimerEvent::Stop(labels.clone())))
    }
}

// ============================================================================
// RecordingLogger
// ============================================================================

#[derive(Default)]
pub struct RecordingLogger {
    pub entries: Mutex<Vec<(String, String)>>,
}

impl RecordingLogger {
    /// `(log name, message)` pairs in order.
    pub fn entries(&self) -> Vec<(String, String)> {
        self.entries.lock().unwrap().clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.entries().into_iter().map(|(name, _)| name).collect()
    }
}

impl RequestLogger for RecordingLogger {
    fn error(&self, entry: &RequestErrorLog<'_>, message: &str) {
        self.entries
            .lock()
            .unwrap()
            .push((entry.name.to_string(), message.to_string()));
    }
}

// ============================================================================
// Factories
// ============================================================================

pub fn test_config(service_url: &str) -> ClientConfig {
    ClientConfig::new("svc_secret", "svc_token", "users", service_url)
}

/// Client wired to `transport` with recording api/request metrics.
pub fn instrumented_client(
    transport: Arc<dyn Transport>,
) -> (JwtClient, Arc<RecordingMetrics>, Arc<RecordingMetrics>) {
    let api = RecordingMetrics::new();
    let request = RecordingMetrics::new();
    let client = JwtClient::new(test_config("http://users:3000"))
        .unwrap()
        .with_transport(transport)
        .with_metrics(api.clone(), request.clone());
    (client, api, request)
}
