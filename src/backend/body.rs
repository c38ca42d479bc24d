//! Response completion shared by every backend.
//!
//! Turns a status line, headers and raw payload into either an
//! `HttpResponse` or an `HttpErrorResponse`, decoding the body according to
//! the request's `ResponseType`.

use bytes::Bytes;
use serde_json::Value;

use crate::http::{
    ErrorPayload, HttpErrorResponse, HttpJsonParseError, HttpRequest, HttpResponse, ResponseBody,
    ResponseInit, ResponseType,
};

const XSSI_PREFIXES: [&str; 2] = [")]}',\n", ")]}'\n"];

/// Payload as delivered by a transport, before decoding.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RawBody {
    #[default]
    Empty,
    Bytes(Bytes),
    Text(String),
    Json(Value),
}

impl RawBody {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Bytes(bytes) => bytes.is_empty(),
            Self::Text(text) => text.is_empty(),
            Self::Json(value) => value.is_null(),
        }
    }

    fn into_text(self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Bytes(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Self::Text(text) => text,
            Self::Json(value) => value.to_string(),
        }
    }

    fn into_bytes(self) -> Bytes {
        match self {
            Self::Empty => Bytes::new(),
            Self::Bytes(bytes) => bytes,
            Self::Text(text) => Bytes::from(text),
            Self::Json(value) => Bytes::from(value.to_string()),
        }
    }
}

impl From<&str> for RawBody {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for RawBody {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Value> for RawBody {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl From<Bytes> for RawBody {
    fn from(bytes: Bytes) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<()> for RawBody {
    fn from(_: ()) -> Self {
        Self::Empty
    }
}

fn strip_xssi_prefix(text: &str) -> &str {
    XSSI_PREFIXES
        .iter()
        .find_map(|prefix| text.strip_prefix(prefix))
        .unwrap_or(text)
}

fn parse_json(text: &str) -> Result<Value, serde_json::Error> {
    let stripped = strip_xssi_prefix(text);
    if stripped.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(stripped)
}

/// Build the terminal outcome of a request.
///
/// - 204 responses carry no body
/// - status 0 becomes 200 when a body arrived, otherwise it stays an error
/// - JSON bodies lose an XSSI prefix before parsing; a 2xx body that does not
///   parse becomes an error carrying the original text
pub fn complete(
    request: &HttpRequest,
    mut init: ResponseInit,
    raw: RawBody,
) -> Result<HttpResponse, HttpErrorResponse> {
    let mut status = init.status.unwrap_or(200);
    let raw = if status == 204 { RawBody::Empty } else { raw };
    if status == 0 && !raw.is_empty() {
        status = 200;
    }
    init.status = Some(status);
    let ok = (200..300).contains(&status);

    let body = if raw.is_empty() {
        ResponseBody::Null
    } else {
        match request.response_type() {
            ResponseType::Json => match raw {
                RawBody::Json(value) => ResponseBody::Json(value),
                other => {
                    let text = other.into_text();
                    match parse_json(&text) {
                        Ok(value) => ResponseBody::Json(value),
                        Err(error) if ok => {
                            return Err(HttpErrorResponse::new(
                                init,
                                ErrorPayload::JsonParse(HttpJsonParseError {
                                    error: error.to_string(),
                                    text,
                                }),
                            ));
                        }
                        Err(_) => ResponseBody::Text(text),
                    }
                }
            },
            ResponseType::Text => ResponseBody::Text(raw.into_text()),
            ResponseType::Blob => ResponseBody::Blob {
                content_type: init
                    .headers
                    .as_ref()
                    .and_then(|headers| headers.get("content-type"))
                    .map(str::to_string),
                bytes: raw.into_bytes(),
            },
            ResponseType::ArrayBuffer => ResponseBody::ArrayBuffer(raw.into_bytes()),
        }
    };

    if ok {
        Ok(HttpResponse::new(init, body))
    } else {
        let payload = if body.is_null() {
            ErrorPayload::None
        } else {
            ErrorPayload::Body(body)
        };
        Err(HttpErrorResponse::new(init, payload))
    }
}
