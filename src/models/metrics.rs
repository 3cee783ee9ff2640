use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;

/// Status key used in breakdowns for requests that never got a response.
pub const STATUS_TIMEOUT: &str = "TIMEOUT";
pub const STATUS_REQUEST_ERROR: &str = "REQUEST_ERROR";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("connection closed unexpectedly")]
    Closed,

    #[error("network error: {0}")]
    Other(String),
}

/// Outcome of one GET. `status` is 0 whenever `error` is set.
#[derive(Debug, Clone)]
pub struct RequestSample {
    pub started_at: Instant,
    pub latency: Duration,
    pub status: u16,
    pub error: Option<RequestError>,
}

impl RequestSample {
    pub fn response(started_at: Instant, latency: Duration, status: u16) -> Self {
        Self {
            started_at,
            latency,
            status,
            error: None,
        }
    }

    pub fn failed(started_at: Instant, latency: Duration, error: RequestError) -> Self {
        Self {
            started_at,
            latency,
            status: 0,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 200
    }

    pub fn status_key(&self) -> String {
        match &self.error {
            Some(RequestError::Timeout(_)) => STATUS_TIMEOUT.to_string(),
            Some(_) => STATUS_REQUEST_ERROR.to_string(),
            None => self.status.to_string(),
        }
    }
}

/// Latency statistics in milliseconds.
#[derive(Debug, Default, Clone, Serialize, PartialEq)]
pub struct LatencyStats {
    pub min: f64,
    pub avg: f64,
    pub med: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
    pub max: f64,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct Metrics {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub success_ratio: f64,
    pub throughput: f64,
    pub latency_ms: LatencyStats,
    pub status_counts: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThresholdResult {
    pub expression: String,
    pub observed: f64,
    pub passed: bool,
}
