//! Request logging and metrics.
//!
//! # Responsibilities
//! - Log each dispatch and its terminal outcome with elapsed time
//! - Record `http_client_requests_total` / `http_client_request_duration_seconds`
//!
//! # Design Decisions
//! - Observes the stream without altering it
//! - Transport failures are recorded with status 0; interceptor errors are
//!   logged but not counted

use std::time::Instant;

use futures_util::StreamExt;

use crate::http::{HttpError, HttpEvent};
use crate::interceptor::InterceptorFn;
use crate::observability::metrics;

/// Interceptor that logs request outcomes; records metrics when `record_metrics`.
pub fn logging_interceptor(record_metrics: bool) -> InterceptorFn {
    InterceptorFn::new(move |request, next| {
        let method = request.method();
        let url = request.url_with_params();
        let started = Instant::now();
        tracing::debug!(method = %method, url = %url, "Request dispatched");

        let stream = next.run(request)?;
        Ok(stream
            .inspect(move |item| match item {
                Ok(HttpEvent::Response(response)) => {
                    tracing::info!(
                        method = %method,
                        url = %url,
                        status = response.status,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Request completed"
                    );
                    if record_metrics {
                        metrics::record_request(method, response.status, started);
                    }
                }
                Ok(event) => {
                    tracing::trace!(method = %method, url = %url, event = ?event.event_type(), "Request event");
                }
                Err(HttpError::Response(response)) => {
                    tracing::warn!(
                        method = %method,
                        url = %url,
                        status = response.status,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        error = %response.message,
                        "Request failed"
                    );
                    if record_metrics {
                        metrics::record_request(method, response.status, started);
                    }
                }
                Err(error) => {
                    tracing::warn!(method = %method, url = %url, error = %error, "Request failed");
                }
            })
            .boxed())
    })
}
