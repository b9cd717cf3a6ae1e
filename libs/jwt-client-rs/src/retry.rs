use std::time::Duration;

use rand::Rng;

use crate::transport::{Method, TransportError};

/// When and how often a transport retries a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt
    pub limit: u32,
    pub methods: Vec<Method>,
    pub status_codes: Vec<u16>,
    pub error_codes: Vec<String>,
    /// Delay before the first retry; doubled for each following one
    pub backoff_base: Duration,
    /// Upper bound of the random delay added to each backoff
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            limit: 2,
            methods: vec![
                Method::Get,
                Method::Put,
                Method::Head,
                Method::Delete,
                Method::Options,
            ],
            status_codes: vec![408, 413, 429, 500, 502, 503, 504, 521, 522, 524],
            error_codes: [
                "ETIMEDOUT",
                "ECONNRESET",
                "EADDRINUSE",
                "ECONNREFUSED",
                "EPIPE",
                "ENOTFOUND",
                "ENETUNREACH",
                "EAI_AGAIN",
            ]
            .iter()
            .map(|c| c.to_string())
            .collect(),
            backoff_base: Duration::from_secs(1),
            max_jitter: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            limit: 0,
            ..Self::default()
        }
    }

    /// Whether retry number `retry_count` (1-based) may follow `error`.
    pub fn should_retry(&self, method: Method, error: &TransportError, retry_count: u32) -> bool {
        if retry_count > self.limit || !self.methods.contains(&method) {
            return false;
        }

        if let Some(status) = error.effective_status() {
            return self.status_codes.contains(&status);
        }

        error
            .effective_code()
            .is_some_and(|code| self.error_codes.iter().any(|c| *c == code))
    }

    /// Exponential backoff with jitter before retry number `retry_count`.
    pub fn delay(&self, retry_count: u32) -> Duration {
        let exponent = retry_count.saturating_sub(1).min(16);
        let base = self.backoff_base.saturating_mul(1 << exponent);
        let jitter_ms = self.max_jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return base;
        }
        base + Duration::from_millis(rand::thread_rng().gen_range(0..jitter_ms))
    }
}
