//! Transport backends.
//!
//! # Data Flow
//! ```text
//! HttpRequest (final, after interceptors)
//!     → HttpBackend::handle (validate, encode)
//!     → source.rs (lazy stream; work starts on first poll)
//!     → Sent → [UploadProgress] → [ResponseHeader] → DownloadProgress*
//!     → body.rs (decode, normalize status)
//!     → Response | HttpError
//! ```
//!
//! # Design Decisions
//! - `handle` returns synchronously; requests that cannot be encoded fail
//!   before any stream exists
//! - Dropping the stream cancels the in-flight exchange
//! - All backends complete through the same decoding path

pub mod body;
pub mod network;
pub mod source;

use std::sync::Arc;

use futures_util::stream::BoxStream;

use crate::http::{HttpError, HttpEvent, HttpRequest};

pub use body::{complete, RawBody};
pub use network::HyperBackend;
pub use source::{event_source, noop_abort, AbortHook, EventSink};

/// One item of a request's event stream.
pub type EventResult = Result<HttpEvent, HttpError>;

/// Event stream of a single request.
pub type EventStream = BoxStream<'static, EventResult>;

/// Anything that turns a request into an event stream.
pub trait HttpHandler: Send + Sync {
    fn handle(&self, request: HttpRequest) -> Result<EventStream, HttpError>;
}

/// Final handler of the chain: the transport that talks to the network.
pub trait HttpBackend: HttpHandler {
    /// Name used in logs and `Unsupported` errors.
    fn name(&self) -> &'static str {
        "custom"
    }
}

impl<H: HttpHandler + ?Sized> HttpHandler for Arc<H> {
    fn handle(&self, request: HttpRequest) -> Result<EventStream, HttpError> {
        (**self).handle(request)
    }
}

impl<H: HttpHandler + ?Sized> HttpHandler for Box<H> {
    fn handle(&self, request: HttpRequest) -> Result<EventStream, HttpError> {
        (**self).handle(request)
    }
}
