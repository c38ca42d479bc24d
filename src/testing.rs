//! In-memory backend for tests.
//!
//! # Responsibilities
//! - Record every request that reaches the backend
//! - Let a test find a request and answer it by hand
//! - Check that no request was left unanswered
//!
//! # Design Decisions
//! - A request is recorded when its stream is first polled, and `Sent` is
//!   emitted right away
//! - Flushed bodies go through the same completion path as network responses
//! - Expectation failures panic with a message listing what was received

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::backend::body::{complete, RawBody};
use crate::backend::source::{event_source, EventSink};
use crate::backend::{EventStream, HttpBackend, HttpHandler};
use crate::http::{
    ErrorPayload, HttpErrorResponse, HttpEvent, HttpRequest, HttpResult, ResponseInit,
};

/// Backend that records requests until a test answers them.
#[derive(Clone, Default)]
pub struct TestingBackend {
    open: Arc<Mutex<Vec<TestRequest>>>,
}

impl TestingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn open(&self) -> MutexGuard<'_, Vec<TestRequest>> {
        self.open
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn describe_open(&self) -> String {
        self.open()
            .iter()
            .map(|request| request.describe())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Remove and return every open request matching `predicate`.
    pub fn match_requests<F>(&self, predicate: F) -> Vec<TestRequest>
    where
        F: Fn(&HttpRequest) -> bool,
    {
        let mut open = self.open();
        let (matched, rest): (Vec<_>, Vec<_>) = open
            .drain(..)
            .partition(|request| predicate(&request.request));
        *open = rest;
        matched
    }

    /// The single open request for `url` (including its query string).
    ///
    /// # Panics
    /// If zero or several requests match.
    pub fn expect_one(&self, url: &str) -> TestRequest {
        let url = url.to_string();
        self.expect_one_matching(&format!("Match URL: {url}"), move |request| {
            request.url_with_params() == url
        })
    }

    /// The single open request matching `predicate`; `description` names the
    /// criteria in the panic message.
    pub fn expect_one_matching<F>(&self, description: &str, predicate: F) -> TestRequest
    where
        F: Fn(&HttpRequest) -> bool,
    {
        let received = self.describe_open();
        let mut matched = self.match_requests(predicate);
        match matched.len() {
            1 => matched.remove(0),
            0 => {
                let mut message = format!(
                    "Expected one matching request for criteria \"{description}\", found none."
                );
                if !received.is_empty() {
                    message.push_str(&format!(" Requests received are: {received}."));
                }
                panic!("{message}");
            }
            n => panic!(
                "Expected one matching request for criteria \"{description}\", found {n} requests."
            ),
        }
    }

    /// # Panics
    /// If any open request is for `url`.
    pub fn expect_none(&self, url: &str) {
        let matched = self.match_requests(|request| request.url_with_params() == url);
        if !matched.is_empty() {
            panic!(
                "Expected zero matching requests for criteria \"Match URL: {url}\", found {}.",
                matched.len()
            );
        }
    }

    /// # Panics
    /// If any request is still open. Cancelled requests are ignored unless
    /// `ignore_cancelled` is false.
    pub fn verify(&self, ignore_cancelled: bool) {
        let open = self.open();
        let pending: Vec<String> = open
            .iter()
            .filter(|request| !(ignore_cancelled && request.is_cancelled()))
            .map(TestRequest::describe)
            .collect();
        if !pending.is_empty() {
            panic!(
                "Expected no open requests, found {}: {}",
                pending.len(),
                pending.join(", ")
            );
        }
    }

    pub fn open_count(&self) -> usize {
        self.open().len()
    }
}

impl HttpHandler for TestingBackend {
    fn handle(&self, request: HttpRequest) -> HttpResult<EventStream> {
        let open = self.open.clone();
        Ok(event_source(move |sink| {
            sink.next(HttpEvent::Sent);
            let test_request = TestRequest::new(request, sink);
            let cancelled = test_request.cancelled.clone();
            open.lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push(test_request);
            Box::new(move || cancelled.store(true, Ordering::SeqCst))
        }))
    }
}

impl HttpBackend for TestingBackend {
    fn name(&self) -> &'static str {
        "testing"
    }
}

impl fmt::Debug for TestingBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestingBackend")
            .field("open", &self.open_count())
            .finish()
    }
}

/// A recorded request waiting for an answer.
#[derive(Clone)]
pub struct TestRequest {
    pub request: HttpRequest,
    sink: EventSink,
    cancelled: Arc<AtomicBool>,
}

impl TestRequest {
    fn new(request: HttpRequest, sink: EventSink) -> Self {
        Self {
            request,
            sink,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    fn describe(&self) -> String {
        format!("{} {}", self.request.method(), self.request.url_with_params())
    }

    /// `true` once the caller dropped the request's stream.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn ensure_open(&self, action: &str) {
        if self.is_cancelled() {
            panic!("Cannot {action} a cancelled request.");
        }
        if self.sink.is_closed() {
            panic!("Cannot {action} a request that already completed.");
        }
    }

    /// Answer with `body` and status 200.
    pub fn flush(&self, body: impl Into<RawBody>) {
        self.flush_with(body, ResponseInit::default());
    }

    /// Answer with `body` and the given status, status text and headers.
    ///
    /// Non-2xx statuses, and 2xx JSON bodies that do not parse, are delivered
    /// as errors.
    pub fn flush_with(&self, body: impl Into<RawBody>, mut init: ResponseInit) {
        self.ensure_open("flush");
        if init.url.is_none() {
            init.url = Some(self.request.url_with_params());
        }
        match complete(&self.request, init, body.into()) {
            Ok(response) => self.sink.next(HttpEvent::Response(response)),
            Err(error) => self.sink.error(error.into()),
        }
    }

    /// Fail the request with `payload`; status defaults to 0 / "Unknown Error".
    pub fn error(&self, payload: ErrorPayload, mut init: ResponseInit) {
        self.ensure_open("error");
        if init.url.is_none() {
            init.url = Some(self.request.url_with_params());
        }
        self.sink.error(HttpErrorResponse::new(init, payload).into());
    }

    /// Deliver a non-terminal event such as progress.
    pub fn event(&self, event: HttpEvent) {
        self.ensure_open("send events to");
        self.sink.next(event);
    }
}

impl fmt::Debug for TestRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestRequest")
            .field("request", &self.describe())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
