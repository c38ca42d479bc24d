//! Interceptor pipeline in front of the backend.
//!
//! # Data Flow
//! ```text
//! HttpClient::request
//!     → InterceptorHandler::handle
//!     → [first call] dedup + fold right-to-left, memoize
//!     → interceptor a → interceptor b → ... → backend.handle
//!     ← EventStream flows back out through each interceptor
//! ```
//!
//! # Design Decisions
//! - Registration order `[a, b, c]` runs `a → b → c → backend`
//! - The chain is built once, on first use; later requests reuse it
//! - Functional interceptors are de-duplicated by identity; a legacy list
//!   adapted with `legacy_interceptor_fn` is a single slot and keeps every
//!   member
//! - `Next` owns its continuation, so it can be called later from inside a
//!   returned stream (retries, deferred dispatch)

pub mod default_headers;
pub mod logging;
pub mod request_id;
pub mod retry;
pub mod xsrf;

use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::backend::{EventStream, HttpHandler};
use crate::http::{HttpRequest, HttpResult};

pub use default_headers::default_headers_interceptor;
pub use logging::logging_interceptor;
pub use request_id::request_id_interceptor;
pub use retry::retry_interceptor;
pub use xsrf::{xsrf_interceptor, CookieTokenExtractor, XsrfOptions, XsrfTokenExtractor};

type NextFn = dyn Fn(HttpRequest) -> HttpResult<EventStream> + Send + Sync;
type InterceptFn = dyn Fn(HttpRequest, Next) -> HttpResult<EventStream> + Send + Sync;

/// A partially built chain: everything from one interceptor down to a final
/// handler supplied at call time.
type ChainFn = Arc<dyn Fn(HttpRequest, Arc<dyn HttpHandler>) -> HttpResult<EventStream> + Send + Sync>;

/// Continuation handed to an interceptor.
#[derive(Clone)]
pub struct Next(Arc<NextFn>);

impl Next {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(HttpRequest) -> HttpResult<EventStream> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Pass `request` to the rest of the chain.
    pub fn run(&self, request: HttpRequest) -> HttpResult<EventStream> {
        (self.0)(request)
    }
}

impl HttpHandler for Next {
    fn handle(&self, request: HttpRequest) -> HttpResult<EventStream> {
        self.run(request)
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Next")
    }
}

/// Functional interceptor.
///
/// Clones share identity: registering the same `InterceptorFn` twice runs it
/// once.
#[derive(Clone)]
pub struct InterceptorFn(Arc<InterceptFn>);

impl InterceptorFn {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(HttpRequest, Next) -> HttpResult<EventStream> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, request: HttpRequest, next: Next) -> HttpResult<EventStream> {
        (self.0)(request, next)
    }

    /// `true` if both values are the same registered interceptor.
    pub fn same_as(&self, other: &InterceptorFn) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.0) as *const (),
            Arc::as_ptr(&other.0) as *const (),
        )
    }
}

impl fmt::Debug for InterceptorFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("InterceptorFn")
            .field(&(Arc::as_ptr(&self.0) as *const ()))
            .finish()
    }
}

/// Object-style interceptor that receives the next handler explicitly.
pub trait HttpInterceptor: Send + Sync {
    fn intercept(&self, request: HttpRequest, next: &dyn HttpHandler) -> HttpResult<EventStream>;
}

fn chain_end() -> ChainFn {
    Arc::new(|request: HttpRequest, handler: Arc<dyn HttpHandler>| handler.handle(request))
}

fn chained(tail: ChainFn, interceptor: InterceptorFn) -> ChainFn {
    Arc::new(move |request: HttpRequest, handler: Arc<dyn HttpHandler>| {
        let tail = tail.clone();
        let next = Next::new(move |downstream| tail(downstream, handler.clone()));
        interceptor.call(request, next)
    })
}

fn adapt_legacy(tail: ChainFn, interceptor: Arc<dyn HttpInterceptor>) -> ChainFn {
    Arc::new(move |request: HttpRequest, handler: Arc<dyn HttpHandler>| {
        let tail = tail.clone();
        let next = Next::new(move |downstream| tail(downstream, handler.clone()));
        interceptor.intercept(request, &next)
    })
}

/// Adapt a list of legacy interceptors into one functional interceptor.
///
/// The inner chain keeps list order and is built on first use.
pub fn legacy_interceptor_fn(interceptors: Vec<Arc<dyn HttpInterceptor>>) -> InterceptorFn {
    let chain: OnceLock<ChainFn> = OnceLock::new();
    InterceptorFn::new(move |request, next| {
        let chain = chain.get_or_init(|| {
            tracing::debug!(count = interceptors.len(), "Legacy interceptor chain built");
            interceptors
                .iter()
                .rev()
                .fold(chain_end(), |tail, interceptor| {
                    adapt_legacy(tail, interceptor.clone())
                })
        });
        let handler: Arc<dyn HttpHandler> = Arc::new(next);
        chain(request, handler)
    })
}

/// Keep the first occurrence of each interceptor, in order.
fn dedup(interceptors: &[InterceptorFn]) -> Vec<InterceptorFn> {
    let mut unique: Vec<InterceptorFn> = Vec::with_capacity(interceptors.len());
    for interceptor in interceptors {
        if !unique.iter().any(|seen| seen.same_as(interceptor)) {
            unique.push(interceptor.clone());
        }
    }
    unique
}

/// Handler that runs the interceptor chain, then the backend.
pub struct InterceptorHandler {
    backend: Arc<dyn HttpHandler>,
    interceptors: Vec<InterceptorFn>,
    chain: OnceLock<ChainFn>,
}

impl InterceptorHandler {
    pub fn new(backend: Arc<dyn HttpHandler>, interceptors: Vec<InterceptorFn>) -> Self {
        Self {
            backend,
            interceptors,
            chain: OnceLock::new(),
        }
    }

    fn chain(&self) -> &ChainFn {
        self.chain.get_or_init(|| {
            let unique = dedup(&self.interceptors);
            tracing::debug!(
                registered = self.interceptors.len(),
                unique = unique.len(),
                "Interceptor chain built"
            );
            unique.into_iter().rev().fold(chain_end(), chained)
        })
    }
}

impl HttpHandler for InterceptorHandler {
    fn handle(&self, request: HttpRequest) -> HttpResult<EventStream> {
        tracing::trace!(method = %request.method(), url = %request.url(), "Entering interceptor chain");
        (self.chain())(request, self.backend.clone())
    }
}

impl fmt::Debug for InterceptorHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorHandler")
            .field("interceptors", &self.interceptors.len())
            .field("built", &self.chain.get().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{event_source, noop_abort};
    use crate::http::{
        HttpError, HttpEvent, HttpMethod, HttpResponse, RequestUpdate, ResponseBody, ResponseInit,
    };
    use futures_util::StreamExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Backend that records request URLs and answers with the request's `X-Trace` header.
    #[derive(Default)]
    struct EchoBackend {
        seen: Mutex<Vec<String>>,
    }

    impl HttpHandler for EchoBackend {
        fn handle(&self, request: HttpRequest) -> HttpResult<EventStream> {
            self.seen
                .lock()
                .unwrap()
                .push(request.url().to_string());
            let trace = request.headers().get("X-Trace").unwrap_or("").to_string();
            Ok(event_source(move |sink| {
                sink.next(HttpEvent::Sent);
                sink.next(HttpEvent::Response(HttpResponse::new(
                    ResponseInit::default(),
                    ResponseBody::Text(trace),
                )));
                noop_abort()
            }))
        }
    }

    fn tracing_interceptor(tag: &'static str) -> InterceptorFn {
        InterceptorFn::new(move |request, next| {
            let trace = match request.headers().get("X-Trace") {
                Some(existing) => format!("{existing},{tag}"),
                None => tag.to_string(),
            };
            next.run(request.with_updated_headers(request.headers().set("X-Trace", trace)))
        })
    }

    async fn body_of(stream: EventStream) -> String {
        let events: Vec<_> = stream.collect().await;
        match events.last() {
            Some(Ok(HttpEvent::Response(response))) => {
                response.body.as_text().unwrap_or_default().to_string()
            }
            other => panic!("unexpected terminal {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_chain_runs_in_registration_order() {
        let handler = InterceptorHandler::new(
            Arc::new(EchoBackend::default()),
            vec![
                tracing_interceptor("a"),
                tracing_interceptor("b"),
                tracing_interceptor("c"),
            ],
        );

        let stream = handler.handle(HttpRequest::new(HttpMethod::Get, "/")).unwrap();
        assert_eq!(body_of(stream).await, "a,b,c");
    }

    #[tokio::test]
    async fn test_duplicate_interceptor_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let counting = InterceptorFn::new(move |request, next| {
            counter.fetch_add(1, Ordering::SeqCst);
            next.run(request)
        });

        let handler = InterceptorHandler::new(
            Arc::new(EchoBackend::default()),
            vec![counting.clone(), tracing_interceptor("x"), counting],
        );
        let stream = handler.handle(HttpRequest::new(HttpMethod::Get, "/")).unwrap();
        let _ = body_of(stream).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_chain_is_built_once() {
        let handler = InterceptorHandler::new(
            Arc::new(EchoBackend::default()),
            vec![tracing_interceptor("a")],
        );
        assert!(handler.chain.get().is_none());

        let _ = handler.handle(HttpRequest::new(HttpMethod::Get, "/1")).unwrap();
        let first = Arc::as_ptr(handler.chain.get().unwrap()) as *const ();
        let _ = handler.handle(HttpRequest::new(HttpMethod::Get, "/2")).unwrap();
        let second = Arc::as_ptr(handler.chain.get().unwrap()) as *const ();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_short_circuit_skips_backend() {
        let backend = Arc::new(EchoBackend::default());
        let cached = InterceptorFn::new(|_request, _next| {
            Ok(futures_util::stream::iter(vec![Ok(HttpEvent::Response(HttpResponse::new(
                ResponseInit::default(),
                ResponseBody::Text("cached".into()),
            )))])
            .boxed())
        });

        let handler = InterceptorHandler::new(backend.clone(), vec![cached]);
        let stream = handler.handle(HttpRequest::new(HttpMethod::Get, "/")).unwrap();

        assert_eq!(body_of(stream).await, "cached");
        assert!(backend.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sync_interceptor_error_is_returned() {
        #[derive(Debug, thiserror::Error)]
        #[error("denied")]
        struct Denied;

        let handler = InterceptorHandler::new(
            Arc::new(EchoBackend::default()),
            vec![InterceptorFn::new(|_request, _next| {
                Err(HttpError::interceptor(Denied))
            })],
        );

        let result = handler.handle(HttpRequest::new(HttpMethod::Get, "/"));
        assert!(matches!(result, Err(HttpError::Interceptor(_))));
    }

    #[tokio::test]
    async fn test_interceptor_can_rewrite_request() {
        let backend = Arc::new(EchoBackend::default());
        let rewrite = InterceptorFn::new(|request, next| {
            next.run(request.clone_with(RequestUpdate {
                url: Some("/rewritten".into()),
                ..Default::default()
            }))
        });

        let handler = InterceptorHandler::new(backend.clone(), vec![rewrite]);
        let stream = handler.handle(HttpRequest::new(HttpMethod::Get, "/orig")).unwrap();
        let _ = body_of(stream).await;

        assert_eq!(*backend.seen.lock().unwrap(), vec!["/rewritten".to_string()]);
    }

    struct LegacyTag(&'static str);

    impl HttpInterceptor for LegacyTag {
        fn intercept(
            &self,
            request: HttpRequest,
            next: &dyn HttpHandler,
        ) -> HttpResult<EventStream> {
            let trace = match request.headers().get("X-Trace") {
                Some(existing) => format!("{existing},{}", self.0),
                None => self.0.to_string(),
            };
            next.handle(request.with_updated_headers(request.headers().set("X-Trace", trace)))
        }
    }

    #[tokio::test]
    async fn test_legacy_interceptors_keep_list_order_in_one_slot() {
        let legacy = legacy_interceptor_fn(vec![
            Arc::new(LegacyTag("l1")) as Arc<dyn HttpInterceptor>,
            Arc::new(LegacyTag("l2")),
        ]);
        let handler = InterceptorHandler::new(
            Arc::new(EchoBackend::default()),
            vec![tracing_interceptor("f1"), legacy, tracing_interceptor("f2")],
        );

        let stream = handler.handle(HttpRequest::new(HttpMethod::Get, "/")).unwrap();
        assert_eq!(body_of(stream).await, "f1,l1,l2,f2");
    }

    #[tokio::test]
    async fn test_legacy_duplicates_are_kept() {
        let shared: Arc<dyn HttpInterceptor> = Arc::new(LegacyTag("dup"));
        let legacy = legacy_interceptor_fn(vec![shared.clone(), shared]);
        let handler = InterceptorHandler::new(Arc::new(EchoBackend::default()), vec![legacy]);

        let stream = handler.handle(HttpRequest::new(HttpMethod::Get, "/")).unwrap();
        assert_eq!(body_of(stream).await, "dup,dup");
    }

    #[tokio::test]
    async fn test_next_can_run_later_from_stream() {
        let deferred = InterceptorFn::new(|request, next| {
            Ok(futures_util::stream::once(async move { next.run(request) })
                .map(|result| match result {
                    Ok(stream) => stream,
                    Err(error) => futures_util::stream::iter(vec![Err(error)]).boxed(),
                })
                .flatten()
                .boxed())
        });
        let handler = InterceptorHandler::new(
            Arc::new(EchoBackend::default()),
            vec![deferred, tracing_interceptor("late")],
        );

        let stream = handler.handle(HttpRequest::new(HttpMethod::Get, "/")).unwrap();
        assert_eq!(body_of(stream).await, "late");
    }
}
