//! Retries with exponential backoff.
//!
//! # Responsibilities
//! - Re-run the rest of the chain when an idempotent request fails transiently
//! - Space attempts with exponential backoff plus jitter
//!
//! # Design Decisions
//! - Only GET, HEAD and OPTIONS are retried
//! - Retryable failures: transport errors (status 0) and 502/503/504
//! - Events of each attempt are delivered as they happen, so a retried
//!   request emits `Sent` again
//! - Synchronous chain failures are never retried

use std::time::Duration;

use futures_util::{stream, StreamExt};
use rand::Rng;

use crate::backend::EventStream;
use crate::config::RetryConfig;
use crate::http::{HttpError, HttpEvent, HttpRequest};
use crate::interceptor::{InterceptorFn, Next};

/// Calculate exponential backoff delay with jitter.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exponential_base);
    let capped_delay = delay_ms.min(max_ms);

    // Jitter: 0 to 10% of the delay
    let jitter_range = capped_delay / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay + jitter)
}

/// Whether `error` is worth another attempt.
pub fn is_retryable(error: &HttpError) -> bool {
    matches!(error.status(), Some(0 | 502 | 503 | 504))
}

struct RetryState {
    current: EventStream,
    attempt: u32,
    request: HttpRequest,
    next: Next,
    config: RetryConfig,
}

/// Interceptor that retries transient failures according to `config`.
pub fn retry_interceptor(config: RetryConfig) -> InterceptorFn {
    InterceptorFn::new(move |request, next| {
        if !config.enabled || !request.method().is_safe() {
            return next.run(request);
        }

        let first = next.run(request.clone())?;
        let state = RetryState {
            current: first,
            attempt: 0,
            request,
            next,
            config: config.clone(),
        };

        Ok(stream::unfold(Some(state), |state| async move {
            let mut state = state?;
            loop {
                match state.current.next().await {
                    None => return None,
                    Some(Err(error))
                        if state.attempt < state.config.max_attempts && is_retryable(&error) =>
                    {
                        state.attempt += 1;
                        let delay = calculate_backoff(
                            state.attempt,
                            state.config.base_delay_ms,
                            state.config.max_delay_ms,
                        );
                        tracing::warn!(
                            url = %state.request.url(),
                            attempt = state.attempt,
                            status = ?error.status(),
                            delay_ms = delay.as_millis() as u64,
                            "Retrying request"
                        );
                        tokio::time::sleep(delay).await;
                        match state.next.run(state.request.clone()) {
                            Ok(stream) => state.current = stream,
                            Err(error) => return Some((Err(error), None)),
                        }
                    }
                    Some(item) => {
                        let terminal = matches!(item, Err(_) | Ok(HttpEvent::Response(_)));
                        return Some((item, if terminal { None } else { Some(state) }));
                    }
                }
            }
        })
        .boxed())
    })
}
