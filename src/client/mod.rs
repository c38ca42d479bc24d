//! Client facade.
//!
//! # Data Flow
//! ```text
//! client.get(url).param(..).header(..)      (builder.rs)
//!     → HttpRequest
//!     → HttpClient::request (lazy: chain entered on first poll)
//!     → InterceptorHandler → backend
//!     → EventStream
//!     → observe(): Body | Response | Events projection
//! ```
//!
//! # Design Decisions
//! - Errors pass through untouched; the facade never rewraps them
//! - Body and response views deliver exactly one value, or `NoResponse`
//!   when the stream ends without a terminal response
//! - The handler is built once per client and shared by its clones

mod builder;

use std::fmt;
use std::sync::Arc;

use futures_util::stream::{self, BoxStream};
use futures_util::{FutureExt, StreamExt};

use crate::backend::{EventStream, HttpHandler};
use crate::http::{
    HttpError, HttpEvent, HttpMethod, HttpRequest, HttpResponse, HttpResult, RequestBody,
    ResponseBody,
};
use crate::interceptor::InterceptorHandler;
use crate::setup::{HttpFeature, HttpSetup};

pub use builder::RequestBuilder;

/// Which part of the lifecycle the caller wants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Observe {
    #[default]
    Body,
    Response,
    Events,
}

impl std::str::FromStr for Observe {
    type Err = HttpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "body" => Ok(Self::Body),
            "response" => Ok(Self::Response),
            "events" => Ok(Self::Events),
            other => Err(HttpError::InvalidRequest(format!(
                "unknown observe mode `{other}`"
            ))),
        }
    }
}

/// Item of an observed stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Observed {
    Body(ResponseBody),
    Response(HttpResponse),
    Event(HttpEvent),
}

/// Stream returned by `HttpClient::observe`.
pub type ObservedStream = BoxStream<'static, HttpResult<Observed>>;

/// Entry point for issuing requests.
#[derive(Clone)]
pub struct HttpClient {
    handler: Arc<dyn HttpHandler>,
}

impl HttpClient {
    /// Client on the process-wide setup plus `features`.
    pub fn new(features: impl IntoIterator<Item = HttpFeature>) -> Self {
        Self::with_setup(HttpSetup::global(), features)
    }

    /// Client on `setup` plus `features`.
    pub fn with_setup(setup: &HttpSetup, features: impl IntoIterator<Item = HttpFeature>) -> Self {
        let setup = setup.clone().with_features(features);
        Self::from_handler(Arc::new(setup.build_handler()))
    }

    /// Client over an arbitrary handler (no interceptors added).
    pub fn from_handler(handler: Arc<dyn HttpHandler>) -> Self {
        Self { handler }
    }

    /// Every event of `request`. Nothing happens until the stream is polled.
    pub fn request(&self, request: HttpRequest) -> EventStream {
        let handler = self.handler.clone();
        stream::once(async move { handler.handle(request) })
            .flat_map(|result| match result {
                Ok(events) => events,
                Err(error) => stream::iter([Err(error)]).boxed(),
            })
            .boxed()
    }

    /// Project the events of `request` into the `observe` view.
    pub fn observe(&self, request: HttpRequest, observe: Observe) -> ObservedStream {
        let events = self.request(request);
        match observe {
            Observe::Events => events
                .map(|item| item.map(Observed::Event))
                .boxed(),
            Observe::Response => terminal_response(events)
                .map(|result| result.map(Observed::Response))
                .into_stream()
                .boxed(),
            Observe::Body => terminal_response(events)
                .map(|result| result.map(|response| Observed::Body(response.into_body())))
                .into_stream()
                .boxed(),
        }
    }

    /// The final response of `request`.
    pub async fn send(&self, request: HttpRequest) -> HttpResult<HttpResponse> {
        terminal_response(self.request(request)).await
    }

    pub fn get(&self, url: impl Into<String>) -> RequestBuilder {
        self.builder(HttpMethod::Get, url)
    }

    pub fn head(&self, url: impl Into<String>) -> RequestBuilder {
        self.builder(HttpMethod::Head, url)
    }

    pub fn delete(&self, url: impl Into<String>) -> RequestBuilder {
        self.builder(HttpMethod::Delete, url)
    }

    pub fn options(&self, url: impl Into<String>) -> RequestBuilder {
        self.builder(HttpMethod::Options, url)
    }

    pub fn post(&self, url: impl Into<String>, body: impl Into<RequestBody>) -> RequestBuilder {
        self.builder(HttpMethod::Post, url).body(body)
    }

    pub fn put(&self, url: impl Into<String>, body: impl Into<RequestBody>) -> RequestBuilder {
        self.builder(HttpMethod::Put, url).body(body)
    }

    pub fn patch(&self, url: impl Into<String>, body: impl Into<RequestBody>) -> RequestBuilder {
        self.builder(HttpMethod::Patch, url).body(body)
    }

    /// Builder for an arbitrary method.
    pub fn builder(&self, method: HttpMethod, url: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(self.clone(), HttpRequest::new(method, url))
    }
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient").finish_non_exhaustive()
    }
}

impl From<InterceptorHandler> for HttpClient {
    fn from(handler: InterceptorHandler) -> Self {
        Self::from_handler(Arc::new(handler))
    }
}

/// First `Response` of `events`, the first error, or `NoResponse`.
async fn terminal_response(mut events: EventStream) -> HttpResult<HttpResponse> {
    while let Some(item) = events.next().await {
        if let HttpEvent::Response(response) = item? {
            return Ok(response);
        }
    }
    Err(HttpError::NoResponse)
}
