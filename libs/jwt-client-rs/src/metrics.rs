//! Timing instrumentation for calls and attempts.

use std::sync::Arc;

use once_cell::sync::Lazy;
use serde::Serialize;

use crate::transport::{TransportError, TransportResponse};

/// Identifies one logical call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RequestLabels {
    pub client_name: String,
    pub base_url: String,
    /// Endpoint template, not the substituted path
    pub url: String,
    pub method: String,
}

/// Outcome of one attempt or call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ResponseLabels {
    pub status_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_name: Option<String>,
}

impl ResponseLabels {
    pub fn from_response(response: &TransportResponse) -> Self {
        Self {
            status_code: response.status_code.to_string(),
            status_message: response.status_message.clone(),
            error_name: None,
        }
    }

    /// Status if the error has one, else its code, else empty.
    pub fn from_error(error: &TransportError) -> Self {
        let status_code = error
            .effective_status()
            .map(|s| s.to_string())
            .or_else(|| error.effective_code())
            .unwrap_or_default();

        Self {
            status_code,
            status_message: error
                .status_message
                .clone()
                .or_else(|| error.response.as_ref().and_then(|r| r.status_message.clone())),
            error_name: error.name.clone(),
        }
    }

    pub(crate) fn cancelled() -> Self {
        Self {
            status_code: String::new(),
            status_message: None,
            error_name: Some("ECANCELLED".to_string()),
        }
    }
}

/// Stops a running timer, recording the outcome.
pub type StopTimer = Box<dyn FnOnce(&ResponseLabels) + Send>;

pub trait Metrics: Send + Sync {
    fn start_timer(&self, labels: &RequestLabels) -> StopTimer;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl Metrics for NoopMetrics {
    fn start_timer(&self, _labels: &RequestLabels) -> StopTimer {
        Box::new(|_| {})
    }
}

static NOOP_METRICS: Lazy<Arc<dyn Metrics>> = Lazy::new(|| Arc::new(NoopMetrics));

/// Shared no-op instance used until instrumentation is configured.
pub fn noop_metrics() -> Arc<dyn Metrics> {
    Arc::clone(&NOOP_METRICS)
}

/// A started timer that is stopped exactly once.
///
/// Dropping it while still running records a cancellation.
pub(crate) struct Timer {
    stop: Option<StopTimer>,
}

impl Timer {
    pub(crate) fn start(metrics: &dyn Metrics, labels: &RequestLabels) -> Self {
        Self {
            stop: Some(metrics.start_timer(labels)),
        }
    }

    pub(crate) fn stop(&mut self, labels: &ResponseLabels) {
        if let Some(stop) = self.stop.take() {
            stop(labels);
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.stop(&ResponseLabels::cancelled());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct CountingMetrics {
        stops: Arc<Mutex<Vec<ResponseLabels>>>,
    }

    impl Metrics for CountingMetrics {
        fn start_timer(&self, _labels: &RequestLabels) -> StopTimer {
            let stops = Arc::clone(&self.stops);
            Box::new(move |labels| stops.lock().unwrap().push(labels.clone()))
        }
    }

    fn labels() -> RequestLabels {
        RequestLabels {
            client_name: "users".into(),
            base_url: "http://users".into(),
            url: "/users/:id".into(),
            method: "get".into(),
        }
    }

    #[test]
    fn test_timer_stops_once() {
        let stops = Arc::new(Mutex::new(Vec::new()));
        let metrics = CountingMetrics {
            stops: Arc::clone(&stops),
        };

        let mut timer = Timer::start(&metrics, &labels());
        let ok = ResponseLabels::from_response(&TransportResponse::new(200, "{}"));
        timer.stop(&ok);
        timer.stop(&ok);
        drop(timer);

        assert_eq!(*stops.lock().unwrap(), vec![ok]);
    }

    #[test]
    fn test_dropped_timer_records_cancellation() {
        let stops = Arc::new(Mutex::new(Vec::new()));
        let metrics = CountingMetrics {
            stops: Arc::clone(&stops),
        };

        drop(Timer::start(&metrics, &labels()));

        let stops = stops.lock().unwrap();
        assert_eq!(stops.len(), 1);
        assert_eq!(stops[0].error_name.as_deref(), Some("ECANCELLED"));
    }

    #[test]
    fn test_labels_from_network_error_use_code() {
        let error = TransportError::network("RequestError", "ECONNREFUSED");
        let labels = ResponseLabels::from_error(&error);
        assert_eq!(labels.status_code, "ECONNREFUSED");
        assert_eq!(labels.error_name.as_deref(), Some("RequestError"));
    }

    #[test]
    fn test_labels_from_http_error_use_status() {
        let error = TransportError::from_response(
            TransportResponse::new(503, "").with_status_message("Service Unavailable"),
        );
        let labels = ResponseLabels::from_error(&error);
        assert_eq!(labels.status_code, "503");
        assert_eq!(labels.status_message.as_deref(), Some("Service Unavailable"));
    }

    #[test]
    fn test_noop_metrics_is_shared() {
        let a = noop_metrics();
        let b = noop_metrics();
        assert!(std::ptr::eq(
            Arc::as_ptr(&a) as *const (),
            Arc::as_ptr(&b) as *const ()
        ));
    }
}
