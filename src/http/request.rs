//! Outgoing request descriptor.
//!
//! # Responsibilities
//! - Carry everything a backend needs to issue one request
//! - Derive the final URL (query string merged) and the wire body
//! - Detect a `Content-Type` for bodies that imply one
//!
//! # Design Decisions
//! - Requests are immutable; `with_*` builders consume and return, and
//!   `clone_with` produces an updated copy for interceptors
//! - The body kind is fixed when the body is attached, so content-type
//!   detection and serialization are exhaustive matches

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;
use serde_json::Value;

use crate::http::context::HttpContext;
use crate::http::error::HttpError;
use crate::http::headers::HttpHeaders;
use crate::http::params::HttpParams;

pub const TEXT_PLAIN: &str = "text/plain";
pub const APPLICATION_JSON: &str = "application/json";
pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded;charset=UTF-8";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Delete,
    Get,
    Head,
    Post,
    Options,
    Put,
    Patch,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Delete => "DELETE",
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Options => "OPTIONS",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
        }
    }

    /// GET, HEAD and OPTIONS: methods without side effects.
    pub fn is_safe(&self) -> bool {
        matches!(self, Self::Get | Self::Head | Self::Options)
    }

    pub fn to_http(self) -> http::Method {
        match self {
            Self::Delete => http::Method::DELETE,
            Self::Get => http::Method::GET,
            Self::Head => http::Method::HEAD,
            Self::Post => http::Method::POST,
            Self::Options => http::Method::OPTIONS,
            Self::Put => http::Method::PUT,
            Self::Patch => http::Method::PATCH,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for HttpMethod {
    type Err = HttpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DELETE" => Ok(Self::Delete),
            "GET" => Ok(Self::Get),
            "HEAD" => Ok(Self::Head),
            "POST" => Ok(Self::Post),
            "OPTIONS" => Ok(Self::Options),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            other => Err(HttpError::InvalidRequest(format!(
                "unknown method `{other}`"
            ))),
        }
    }
}

/// How the response body should be decoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseType {
    #[default]
    Json,
    Text,
    Blob,
    ArrayBuffer,
}

impl std::str::FromStr for ResponseType {
    type Err = HttpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "text" => Ok(Self::Text),
            "blob" => Ok(Self::Blob),
            "arraybuffer" => Ok(Self::ArrayBuffer),
            other => Err(HttpError::InvalidRequest(format!(
                "unknown response type `{other}`"
            ))),
        }
    }
}

/// One field of a multipart form.
#[derive(Debug, Clone, PartialEq)]
pub enum FormValue {
    Text(String),
    File {
        filename: String,
        content_type: Option<String>,
        bytes: Bytes,
    },
}

/// Multipart form body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormData {
    fields: Vec<(String, FormValue)>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), FormValue::Text(value.into())));
        self
    }

    pub fn file(
        mut self,
        name: impl Into<String>,
        filename: impl Into<String>,
        content_type: Option<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        self.fields.push((
            name.into(),
            FormValue::File {
                filename: filename.into(),
                content_type,
                bytes: bytes.into(),
            },
        ));
        self
    }

    pub fn fields(&self) -> &[(String, FormValue)] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Encode as `multipart/form-data` with the given boundary.
    pub fn encode(&self, boundary: &str) -> Bytes {
        let mut out = BytesMut::new();
        for (name, value) in &self.fields {
            out.put_slice(format!("--{boundary}\r\n").as_bytes());
            match value {
                FormValue::Text(text) => {
                    out.put_slice(
                        format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n")
                            .as_bytes(),
                    );
                    out.put_slice(text.as_bytes());
                }
                FormValue::File {
                    filename,
                    content_type,
                    bytes,
                } => {
                    out.put_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n"
                        )
                        .as_bytes(),
                    );
                    let content_type =
                        content_type.as_deref().unwrap_or("application/octet-stream");
                    out.put_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
                    out.put_slice(bytes);
                }
            }
            out.put_slice(b"\r\n");
        }
        out.put_slice(format!("--{boundary}--\r\n").as_bytes());
        out.freeze()
    }
}

/// Request payload, tagged by kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    #[default]
    Empty,
    Text(String),
    Json(Value),
    Binary {
        bytes: Bytes,
        content_type: Option<String>,
    },
    Form(FormData),
    UrlEncoded(HttpParams),
}

impl RequestBody {
    /// Serialize `value` into a JSON body.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, HttpError> {
        serde_json::to_value(value)
            .map(Self::Json)
            .map_err(|e| HttpError::InvalidRequest(format!("body is not valid JSON: {e}")))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

impl From<String> for RequestBody {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for RequestBody {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Value> for RequestBody {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl From<Bytes> for RequestBody {
    fn from(bytes: Bytes) -> Self {
        Self::Binary {
            bytes,
            content_type: None,
        }
    }
}

impl From<FormData> for RequestBody {
    fn from(form: FormData) -> Self {
        Self::Form(form)
    }
}

impl From<HttpParams> for RequestBody {
    fn from(params: HttpParams) -> Self {
        Self::UrlEncoded(params)
    }
}

/// Body in the shape a transport sends it.
#[derive(Debug, Clone, PartialEq)]
pub enum WireBody {
    Text(String),
    Bytes(Bytes),
    Form(FormData),
}

/// Overrides applied by `HttpRequest::clone_with`. `None` keeps the field.
#[derive(Debug, Clone, Default)]
pub struct RequestUpdate {
    pub method: Option<HttpMethod>,
    pub url: Option<String>,
    pub body: Option<RequestBody>,
    pub headers: Option<HttpHeaders>,
    pub params: Option<HttpParams>,
    pub context: Option<HttpContext>,
    pub response_type: Option<ResponseType>,
    pub report_progress: Option<bool>,
    pub with_credentials: Option<bool>,
    /// Headers set on top of `headers` (or the current headers).
    pub set_headers: Vec<(String, String)>,
    /// Params set on top of `params` (or the current params).
    pub set_params: Vec<(String, String)>,
}

/// Immutable outgoing request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    method: HttpMethod,
    url: String,
    body: RequestBody,
    headers: HttpHeaders,
    params: HttpParams,
    context: HttpContext,
    response_type: ResponseType,
    report_progress: bool,
    with_credentials: bool,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            body: RequestBody::Empty,
            headers: HttpHeaders::new(),
            params: HttpParams::new(),
            context: HttpContext::new(),
            response_type: ResponseType::default(),
            report_progress: false,
            with_credentials: false,
        }
    }

    pub fn with_body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_headers(mut self, headers: HttpHeaders) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_params(mut self, params: HttpParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_context(mut self, context: HttpContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }

    pub fn with_report_progress(mut self, report_progress: bool) -> Self {
        self.report_progress = report_progress;
        self
    }

    pub fn with_credentials(mut self, with_credentials: bool) -> Self {
        self.with_credentials = with_credentials;
        self
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn body(&self) -> &RequestBody {
        &self.body
    }

    pub fn headers(&self) -> &HttpHeaders {
        &self.headers
    }

    pub fn params(&self) -> &HttpParams {
        &self.params
    }

    pub fn context(&self) -> &HttpContext {
        &self.context
    }

    pub fn response_type(&self) -> ResponseType {
        self.response_type
    }

    pub fn report_progress(&self) -> bool {
        self.report_progress
    }

    pub fn credentials(&self) -> bool {
        self.with_credentials
    }

    /// URL with the encoded params merged in.
    pub fn url_with_params(&self) -> String {
        let query = self.params.to_query_string();
        if query.is_empty() {
            return self.url.clone();
        }
        match self.url.find('?') {
            None => format!("{}?{query}", self.url),
            Some(pos) if pos + 1 < self.url.len() => format!("{}&{query}", self.url),
            Some(_) => format!("{}{query}", self.url),
        }
    }

    /// Content type implied by the body, if any.
    ///
    /// Form bodies return `None`: the transport picks the multipart boundary.
    pub fn detect_content_type_header(&self) -> Option<String> {
        match &self.body {
            RequestBody::Empty | RequestBody::Form(_) => None,
            RequestBody::Binary { content_type, .. } => content_type.clone(),
            RequestBody::Text(_) => Some(TEXT_PLAIN.to_string()),
            RequestBody::UrlEncoded(_) => Some(FORM_URLENCODED.to_string()),
            RequestBody::Json(_) => Some(APPLICATION_JSON.to_string()),
        }
    }

    /// Body in the form the transport sends it.
    pub fn serialize_body(&self) -> Option<WireBody> {
        match &self.body {
            RequestBody::Empty => None,
            RequestBody::Text(text) => Some(WireBody::Text(text.clone())),
            RequestBody::Binary { bytes, .. } => Some(WireBody::Bytes(bytes.clone())),
            RequestBody::Form(form) => Some(WireBody::Form(form.clone())),
            RequestBody::UrlEncoded(params) => Some(WireBody::Text(params.to_query_string())),
            RequestBody::Json(value) => Some(WireBody::Text(value.to_string())),
        }
    }

    /// Copy of this request with `update` applied.
    pub fn clone_with(&self, update: RequestUpdate) -> Self {
        let mut headers = update.headers.unwrap_or_else(|| self.headers.clone());
        for (name, value) in update.set_headers {
            headers = headers.set(&name, value);
        }
        let mut params = update.params.unwrap_or_else(|| self.params.clone());
        for (key, value) in update.set_params {
            params = params.set(&key, value);
        }
        Self {
            method: update.method.unwrap_or(self.method),
            url: update.url.unwrap_or_else(|| self.url.clone()),
            body: update.body.unwrap_or_else(|| self.body.clone()),
            headers,
            params,
            context: update.context.unwrap_or_else(|| self.context.clone()),
            response_type: update.response_type.unwrap_or(self.response_type),
            report_progress: update.report_progress.unwrap_or(self.report_progress),
            with_credentials: update.with_credentials.unwrap_or(self.with_credentials),
        }
    }

    /// Shorthand for `clone_with` that only replaces the headers.
    pub fn with_updated_headers(&self, headers: HttpHeaders) -> Self {
        self.clone_with(RequestUpdate {
            headers: Some(headers),
            ..Default::default()
        })
    }
}
