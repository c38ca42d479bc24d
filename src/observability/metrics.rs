//! Client request metrics.
//!
//! # Metrics
//! - `http_client_requests_total` (counter): completed requests by method, status
//! - `http_client_request_duration_seconds` (histogram): latency distribution
//!
//! # Design Decisions
//! - Recorded through the `metrics` facade; the application picks the exporter
//! - Status 0 labels transport failures (connect errors, timeouts)

use std::time::Instant;

use crate::http::HttpMethod;

pub const REQUESTS_TOTAL: &str = "http_client_requests_total";
pub const REQUEST_DURATION: &str = "http_client_request_duration_seconds";

/// Record one finished request.
pub fn record_request(method: HttpMethod, status: u16, started: Instant) {
    let method = method.as_str();
    let status = status.to_string();
    metrics::counter!(REQUESTS_TOTAL, "method" => method, "status" => status.clone())
        .increment(1);
    metrics::histogram!(REQUEST_DURATION, "method" => method, "status" => status)
        .record(started.elapsed().as_secs_f64());
}
