//! Prometheus request metrics, served in text format at `/metrics`.

use std::time::Duration;

use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};

/// Endpoint label for requests no route matched (404s, rate-limit rejections).
pub const UNMATCHED_ENDPOINT: &str = "unmatched";

const LATENCY_BUCKETS: [f64; 9] = [0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5];

/// Request counters and latency histogram on a private registry.
///
/// Endpoints are labelled with the matched route pattern, never the raw
/// path, so label cardinality stays bounded by the route table.
pub struct RequestMetrics {
    registry: Registry,
    requests: IntCounterVec,
    duration: HistogramVec,
    errors: IntCounterVec,
}

impl RequestMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let requests = IntCounterVec::new(
            Opts::new("http_requests_total", "Total HTTP requests"),
            &["method", "endpoint", "status_code"],
        )?;
        let duration = HistogramVec::new(
            HistogramOpts::new("http_request_duration_seconds", "HTTP request latency")
                .buckets(LATENCY_BUCKETS.to_vec()),
            &["method", "endpoint"],
        )?;
        let errors = IntCounterVec::new(
            Opts::new(
                "http_errors_total",
                "HTTP error responses split by error class (4xx vs 5xx)",
            ),
            &["error_class"],
        )?;

        let registry = Registry::new();
        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(duration.clone()))?;
        registry.register(Box::new(errors.clone()))?;

        Ok(Self {
            registry,
            requests,
            duration,
            errors,
        })
    }

    pub fn observe(&self, method: &str, endpoint: &str, status: u16, elapsed: Duration) {
        let status_code = status.to_string();
        self.requests
            .with_label_values(&[method, endpoint, &status_code])
            .inc();
        self.duration
            .with_label_values(&[method, endpoint])
            .observe(elapsed.as_secs_f64());

        let class = match status {
            400..=499 => "4xx",
            500..=599 => "5xx",
            _ => return,
        };
        self.errors.with_label_values(&[class]).inc();
    }

    /// Text exposition of everything registered.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = String::new();
        TextEncoder::new().encode_utf8(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }
}
