//! Courier: a portable HTTP client layer.
//!
//! # Architecture Overview
//!
//! ```text
//!   caller
//!     │  client.get(url).param(..).fetch()
//!     ▼
//!  ┌────────┐   HttpRequest    ┌──────────────────────────────┐
//!  │ client │ ───────────────▶ │ interceptor chain            │
//!  │ facade │                  │ f1 → f2 → legacy[..] → fN    │
//!  └────────┘                  └──────────────┬───────────────┘
//!     ▲                                       │
//!     │  Body | Response | Events             ▼
//!     │                        ┌──────────────────────────────┐
//!     └─────── EventStream ─── │ backend (hyper | testing)    │
//!                              └──────────────────────────────┘
//!
//!  setup:   backend + interceptors, composed from features or config
//!  config:  TOML file → ClientConfig → validate
//!  observability: tracing subscriber, request metrics
//! ```
//!
//! Requests are immutable values; every change produces a new request.
//! Nothing is sent until the returned stream is polled, and dropping the
//! stream cancels the request.

pub mod backend;
pub mod client;
pub mod config;
pub mod http;
pub mod interceptor;
pub mod observability;
pub mod setup;
pub mod testing;

pub use backend::{EventStream, HttpBackend, HttpHandler, HyperBackend};
pub use client::{HttpClient, Observe, Observed, RequestBuilder};
pub use config::{load_config, ClientConfig, ConfigError};
pub use self::http::{
    HttpContext, HttpContextToken, HttpError, HttpErrorResponse, HttpEvent, HttpHeaders,
    HttpMethod, HttpParams, HttpRequest, HttpResponse, HttpResult, RequestBody, ResponseBody,
    ResponseType,
};
pub use interceptor::{HttpInterceptor, InterceptorFn, InterceptorHandler, Next};
pub use setup::{HttpFeature, HttpSetup};
pub use testing::{TestRequest, TestingBackend};
