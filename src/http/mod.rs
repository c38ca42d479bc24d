//! HTTP data model.
//!
//! # Data Flow
//! ```text
//! caller
//!     → request.rs (HttpRequest: method, url, body, headers, params, context)
//!     → [interceptor chain] (may clone_with to derive new requests)
//!     → [backend] (url_with_params, serialize_body, headers)
//!     → response.rs (HttpEvent stream: Sent → ResponseHeader → progress → Response)
//!     → error.rs (HttpError on failure)
//! ```
//!
//! # Design Decisions
//! - Headers, params and requests are immutable values; mutators return copies
//! - Context is the only shared mutable state on a request, and it is scoped
//!   to that request and its clones

pub mod context;
pub mod error;
pub mod headers;
pub mod params;
pub mod request;
pub mod response;

pub use context::{HttpContext, HttpContextToken};
pub use error::{HttpError, HttpResult};
pub use headers::HttpHeaders;
pub use params::{HttpParams, ParamCodec, StandardCodec};
pub use request::{
    FormData, FormValue, HttpMethod, HttpRequest, RequestBody, RequestUpdate, ResponseType,
    WireBody,
};
pub use response::{
    ErrorPayload, HttpDownloadProgressEvent, HttpErrorResponse, HttpEvent, HttpEventType,
    HttpHeaderResponse, HttpJsonParseError, HttpResponse, HttpResponseBase, HttpUploadProgressEvent,
    HttpUserEvent, ResponseBody, ResponseInit, ResponseUpdate,
};
