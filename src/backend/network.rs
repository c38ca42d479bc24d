//! Network backend on the hyper-util connection pool.
//!
//! # Responsibilities
//! - Resolve relative URLs against the configured base URL
//! - Encode headers and body (default `Accept`, detected `Content-Type`,
//!   multipart boundaries)
//! - Stream response frames into progress events
//! - Enforce the request deadline
//!
//! # Design Decisions
//! - One pooled client per backend, shared by every request
//! - The exchange runs on its own task; dropping the stream aborts it
//! - Transport failures and timeouts surface as status 0 errors
//! - TLS via rustls with the webpki root store; `http` and `https` share
//!   one connector

use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use url::Url;
use uuid::Uuid;

use crate::backend::body::{complete, RawBody};
use crate::backend::source::{event_source, EventSink};
use crate::backend::{EventStream, HttpBackend, HttpHandler};
use crate::config::{ClientConfig, DEFAULT_ACCEPT};
use crate::http::response::DEFAULT_STATUS_TEXT;
use crate::http::{
    HttpDownloadProgressEvent, HttpError, HttpErrorResponse, HttpEvent, HttpHeaderResponse,
    HttpHeaders, HttpRequest, HttpResponse, HttpUploadProgressEvent, ResponseInit, ResponseType,
    WireBody,
};

type PooledClient = Client<HttpsConnector<HttpConnector>, Full<Bytes>>;

/// Backend that performs requests over HTTP/1.1 and HTTP/2, with or without TLS.
#[derive(Clone)]
pub struct HyperBackend {
    client: PooledClient,
    base_url: Option<Url>,
    accept: String,
    request_timeout: Duration,
}

impl std::fmt::Debug for HyperBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperBackend")
            .field("base_url", &self.base_url.as_ref().map(Url::as_str))
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl Default for HyperBackend {
    fn default() -> Self {
        Self::with_timeouts(None, DEFAULT_ACCEPT, Duration::from_secs(5), Duration::from_secs(30))
    }
}

impl HyperBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend configured from the client config.
    pub fn from_config(config: &ClientConfig) -> Result<Self, HttpError> {
        let base_url = config
            .base_url
            .as_deref()
            .map(|raw| {
                Url::parse(raw)
                    .map_err(|e| HttpError::InvalidRequest(format!("invalid base url `{raw}`: {e}")))
            })
            .transpose()?;
        Ok(Self::with_timeouts(
            base_url,
            &config.accept,
            Duration::from_secs(config.timeouts.connect_secs),
            Duration::from_secs(config.timeouts.request_secs),
        ))
    }

    fn with_timeouts(
        base_url: Option<Url>,
        accept: &str,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(connect_timeout));
        connector.enforce_http(false);
        let https = HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .enable_http2()
            .wrap_connector(connector);
        let client = Client::builder(TokioExecutor::new()).build(https);

        Self {
            client,
            base_url,
            accept: accept.to_string(),
            request_timeout,
        }
    }

    fn resolve_url(&self, raw: &str) -> Result<Url, HttpError> {
        let url = match (Url::parse(raw), &self.base_url) {
            (Ok(url), _) => url,
            (Err(url::ParseError::RelativeUrlWithoutBase), Some(base)) => base
                .join(raw)
                .map_err(|e| HttpError::InvalidRequest(format!("invalid url `{raw}`: {e}")))?,
            (Err(e), _) => {
                return Err(HttpError::InvalidRequest(format!("invalid url `{raw}`: {e}")))
            }
        };
        if !matches!(url.scheme(), "http" | "https") {
            return Err(HttpError::Unsupported {
                feature: format!("scheme `{}`", url.scheme()),
                backend: self.name(),
            });
        }
        Ok(url)
    }

    /// Encode `request` for the wire. Returns the upload size for progress.
    fn build_request(
        &self,
        request: &HttpRequest,
        url: &Url,
    ) -> Result<(http::Request<Full<Bytes>>, Option<u64>), HttpError> {
        let mut headers = request.headers().clone();
        if !headers.has("Accept") {
            headers = headers.set("Accept", self.accept.as_str());
        }
        if !headers.has("Content-Type") {
            if let Some(content_type) = request.detect_content_type_header() {
                headers = headers.set("Content-Type", content_type);
            }
        }

        let body = match request.serialize_body() {
            None => None,
            Some(WireBody::Text(text)) => Some(Bytes::from(text)),
            Some(WireBody::Bytes(bytes)) => Some(bytes),
            Some(WireBody::Form(form)) => {
                let boundary = format!("----courier{}", Uuid::new_v4().simple());
                headers = headers.set(
                    "Content-Type",
                    format!("multipart/form-data; boundary={boundary}"),
                );
                Some(form.encode(&boundary))
            }
        };
        let upload_len = body.as_ref().map(|bytes| bytes.len() as u64);

        let uri: http::Uri = url
            .as_str()
            .parse()
            .map_err(|e| HttpError::InvalidRequest(format!("invalid url `{url}`: {e}")))?;
        let mut wire = http::Request::new(Full::new(body.unwrap_or_default()));
        *wire.method_mut() = request.method().to_http();
        *wire.uri_mut() = uri;
        *wire.headers_mut() = headers.to_header_map()?;
        Ok((wire, upload_len))
    }
}

impl HttpHandler for HyperBackend {
    fn handle(&self, request: HttpRequest) -> Result<EventStream, HttpError> {
        let url = self.resolve_url(&request.url_with_params())?;
        let (wire, upload_len) = self.build_request(&request, &url)?;
        let client = self.client.clone();
        let timeout = self.request_timeout;

        Ok(event_source(move |sink| {
            sink.next(HttpEvent::Sent);
            let exchange = Exchange {
                request,
                url: url.to_string(),
                upload_len,
                sink,
            };
            let task = tokio::spawn(exchange.run(client, wire, timeout));
            Box::new(move || task.abort())
        }))
    }
}

impl HttpBackend for HyperBackend {
    fn name(&self) -> &'static str {
        "hyper"
    }
}

struct Exchange {
    request: HttpRequest,
    url: String,
    upload_len: Option<u64>,
    sink: EventSink,
}

impl Exchange {
    async fn run(
        self,
        client: PooledClient,
        wire: http::Request<Full<Bytes>>,
        timeout: Duration,
    ) {
        let started = Instant::now();
        match tokio::time::timeout(timeout, self.perform(&client, wire)).await {
            Ok(Ok(response)) => {
                tracing::debug!(
                    url = %self.url,
                    status = response.status,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Response received"
                );
                self.sink.next(HttpEvent::Response(response));
            }
            Ok(Err(error)) => self.sink.error(error),
            Err(_) => {
                tracing::warn!(
                    url = %self.url,
                    timeout_ms = timeout.as_millis() as u64,
                    "Request timed out"
                );
                self.sink.error(
                    HttpErrorResponse::transport(
                        Some(self.url.clone()),
                        format!("request timed out after {}ms", timeout.as_millis()),
                    )
                    .into(),
                );
            }
        }
    }

    fn transport_error(&self, error: impl std::fmt::Display) -> HttpError {
        tracing::warn!(url = %self.url, error = %error, "Transport failure");
        HttpErrorResponse::transport(Some(self.url.clone()), error.to_string()).into()
    }

    async fn perform(
        &self,
        client: &PooledClient,
        wire: http::Request<Full<Bytes>>,
    ) -> Result<HttpResponse, HttpError> {
        let report_progress = self.request.report_progress();
        let response: http::Response<Incoming> = client
            .request(wire)
            .await
            .map_err(|e| self.transport_error(e))?;

        if report_progress {
            if let Some(total) = self.upload_len {
                self.sink
                    .next(HttpEvent::UploadProgress(HttpUploadProgressEvent {
                        loaded: total,
                        total: Some(total),
                    }));
            }
        }

        let (parts, mut body) = response.into_parts();
        let headers = HttpHeaders::from(&parts.headers);
        let init = ResponseInit {
            url: Some(self.url.clone()),
            status: Some(parts.status.as_u16()),
            status_text: Some(reason_phrase(parts.status).to_string()),
            headers: Some(headers.clone()),
        };
        if report_progress {
            self.sink
                .next(HttpEvent::ResponseHeader(HttpHeaderResponse::new(init.clone())));
        }

        let total = headers
            .get("content-length")
            .and_then(|value| value.parse::<u64>().ok());
        let stream_text = self.request.response_type() == ResponseType::Text;
        let mut buffer = BytesMut::new();
        while let Some(frame) = body.frame().await {
            let frame = frame.map_err(|e| self.transport_error(e))?;
            let Ok(data) = frame.into_data() else {
                continue;
            };
            buffer.extend_from_slice(&data);
            if report_progress {
                self.sink
                    .next(HttpEvent::DownloadProgress(HttpDownloadProgressEvent {
                        loaded: buffer.len() as u64,
                        total,
                        partial_text: stream_text.then(|| utf8_prefix(&buffer)),
                    }));
            }
        }

        let raw = if buffer.is_empty() {
            RawBody::Empty
        } else {
            RawBody::Bytes(buffer.freeze())
        };
        complete(&self.request, init, raw).map_err(HttpError::from)
    }
}

/// Canonical reason for `status`, "OK" when it has none.
fn reason_phrase(status: http::StatusCode) -> &'static str {
    status.canonical_reason().unwrap_or(DEFAULT_STATUS_TEXT)
}

/// Longest valid UTF-8 prefix of `bytes`.
fn utf8_prefix(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(e) => String::from_utf8_lossy(&bytes[..e.valid_up_to()]).into_owned(),
    }
}
