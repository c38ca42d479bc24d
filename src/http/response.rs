//! Response and event model.
//!
//! # Responsibilities
//! - Shared response metadata (`HttpResponseBase`) and its three views:
//!   header-only, full response, error response
//! - The `HttpEvent` union delivered on every request stream
//! - Decoded body and error payload shapes
//!
//! # Design Decisions
//! - The views wrap the base and `Deref` to it, so `status`, `headers` and
//!   `ok()` read the same everywhere
//! - Error responses are never `ok`, whatever their status

use std::ops::Deref;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::http::error::HttpError;
use crate::http::headers::HttpHeaders;

pub const DEFAULT_STATUS: u16 = 200;
pub const DEFAULT_STATUS_TEXT: &str = "OK";
pub const UNKNOWN_ERROR: &str = "Unknown Error";

/// Metadata shared by every response view.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponseBase {
    pub url: Option<String>,
    pub status: u16,
    pub status_text: String,
    pub headers: HttpHeaders,
}

impl HttpResponseBase {
    fn from_init(init: ResponseInit, default_status: u16, default_text: &str) -> Self {
        Self {
            url: init.url,
            status: init.status.unwrap_or(default_status),
            status_text: init
                .status_text
                .unwrap_or_else(|| default_text.to_string()),
            headers: init.headers.unwrap_or_default(),
        }
    }

    /// `true` for 2xx statuses.
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Constructor arguments for the response views. Missing fields take the
/// view's defaults.
#[derive(Debug, Clone, Default)]
pub struct ResponseInit {
    pub url: Option<String>,
    pub status: Option<u16>,
    pub status_text: Option<String>,
    pub headers: Option<HttpHeaders>,
}

impl ResponseInit {
    pub fn status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn status_text(mut self, status_text: impl Into<String>) -> Self {
        self.status_text = Some(status_text.into());
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn headers(mut self, headers: HttpHeaders) -> Self {
        self.headers = Some(headers);
        self
    }
}

/// Headers and status, before the body.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpHeaderResponse {
    base: HttpResponseBase,
}

impl HttpHeaderResponse {
    pub fn new(init: ResponseInit) -> Self {
        Self {
            base: HttpResponseBase::from_init(init, DEFAULT_STATUS, DEFAULT_STATUS_TEXT),
        }
    }
}

impl Deref for HttpHeaderResponse {
    type Target = HttpResponseBase;

    fn deref(&self) -> &Self::Target {
        &self.base
    }
}

/// Decoded response body.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ResponseBody {
    #[default]
    Null,
    Json(Value),
    Text(String),
    Blob {
        bytes: Bytes,
        content_type: Option<String>,
    },
    ArrayBuffer(Bytes),
}

impl ResponseBody {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null | Self::Json(Value::Null))
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Blob { bytes, .. } | Self::ArrayBuffer(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Deserialize a JSON (or null) body into `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, HttpError> {
        let value = match self {
            Self::Json(value) => value.clone(),
            Self::Null => Value::Null,
            Self::Text(text) => serde_json::from_str(text)
                .map_err(|e| HttpError::InvalidRequest(format!("body is not JSON: {e}")))?,
            _ => {
                return Err(HttpError::InvalidRequest(
                    "binary body cannot be read as JSON".to_string(),
                ))
            }
        };
        serde_json::from_value(value)
            .map_err(|e| HttpError::InvalidRequest(format!("unexpected body shape: {e}")))
    }
}

/// A complete successful response.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    base: HttpResponseBase,
    pub body: ResponseBody,
}

impl HttpResponse {
    pub fn new(init: ResponseInit, body: ResponseBody) -> Self {
        Self {
            base: HttpResponseBase::from_init(init, DEFAULT_STATUS, DEFAULT_STATUS_TEXT),
            body,
        }
    }

    pub fn into_body(self) -> ResponseBody {
        self.body
    }

    /// Copy with the provided fields replaced.
    pub fn clone_with(&self, update: ResponseUpdate) -> Self {
        Self {
            base: HttpResponseBase {
                url: update.url.or_else(|| self.base.url.clone()),
                status: update.status.unwrap_or(self.base.status),
                status_text: update
                    .status_text
                    .unwrap_or_else(|| self.base.status_text.clone()),
                headers: update.headers.unwrap_or_else(|| self.base.headers.clone()),
            },
            body: update.body.unwrap_or_else(|| self.body.clone()),
        }
    }

    /// Copy with only the body replaced.
    pub fn with_body(&self, body: ResponseBody) -> Self {
        self.clone_with(ResponseUpdate {
            body: Some(body),
            ..Default::default()
        })
    }
}

/// Overrides applied by `HttpResponse::clone_with`. `None` keeps the field.
#[derive(Debug, Clone, Default)]
pub struct ResponseUpdate {
    pub url: Option<String>,
    pub status: Option<u16>,
    pub status_text: Option<String>,
    pub headers: Option<HttpHeaders>,
    pub body: Option<ResponseBody>,
}

impl Deref for HttpResponse {
    type Target = HttpResponseBase;

    fn deref(&self) -> &Self::Target {
        &self.base
    }
}

/// Details of a 2xx body that failed to parse as JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpJsonParseError {
    pub error: String,
    /// The body as received.
    pub text: String,
}

/// What went wrong, attached to an `HttpErrorResponse`.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ErrorPayload {
    #[default]
    None,
    Body(ResponseBody),
    JsonParse(HttpJsonParseError),
    Transport(String),
}

/// A failed request: non-2xx status, unparseable body, or transport failure.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct HttpErrorResponse {
    base: HttpResponseBase,
    pub error: ErrorPayload,
    pub message: String,
}

impl HttpErrorResponse {
    pub fn new(init: ResponseInit, error: ErrorPayload) -> Self {
        let base = HttpResponseBase::from_init(init, 0, UNKNOWN_ERROR);
        let url = base.url.as_deref().unwrap_or("(unknown url)");
        let message = if base.ok() {
            format!("Http failure during parsing for {url}")
        } else {
            format!(
                "Http failure response for {url}: {} {}",
                base.status, base.status_text
            )
        };
        Self {
            base,
            error,
            message,
        }
    }

    /// Transport-level failure: status 0, "Unknown Error".
    pub fn transport(url: Option<String>, reason: impl Into<String>) -> Self {
        Self::new(
            ResponseInit {
                url,
                ..Default::default()
            },
            ErrorPayload::Transport(reason.into()),
        )
    }

    /// Always `false`.
    pub fn ok(&self) -> bool {
        false
    }
}

impl Deref for HttpErrorResponse {
    type Target = HttpResponseBase;

    fn deref(&self) -> &Self::Target {
        &self.base
    }
}

/// Upload progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpUploadProgressEvent {
    pub loaded: u64,
    pub total: Option<u64>,
}

/// Download progress; `partial_text` is set for text responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpDownloadProgressEvent {
    pub loaded: u64,
    pub total: Option<u64>,
    pub partial_text: Option<String>,
}

/// Custom event emitted by an interceptor.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpUserEvent {
    pub name: String,
    pub payload: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpEventType {
    Sent,
    UploadProgress,
    ResponseHeader,
    DownloadProgress,
    Response,
    User,
}

/// One step of a request's lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub enum HttpEvent {
    Sent,
    UploadProgress(HttpUploadProgressEvent),
    ResponseHeader(HttpHeaderResponse),
    DownloadProgress(HttpDownloadProgressEvent),
    Response(HttpResponse),
    User(HttpUserEvent),
}

impl HttpEvent {
    pub fn event_type(&self) -> HttpEventType {
        match self {
            Self::Sent => HttpEventType::Sent,
            Self::UploadProgress(_) => HttpEventType::UploadProgress,
            Self::ResponseHeader(_) => HttpEventType::ResponseHeader,
            Self::DownloadProgress(_) => HttpEventType::DownloadProgress,
            Self::Response(_) => HttpEventType::Response,
            Self::User(_) => HttpEventType::User,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Response(_))
    }

    pub fn into_response(self) -> Option<HttpResponse> {
        match self {
            Self::Response(response) => Some(response),
            _ => None,
        }
    }
}
