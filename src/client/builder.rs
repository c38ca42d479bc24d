//! Fluent request construction.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::backend::EventStream;
use crate::client::{terminal_response, HttpClient, Observe, ObservedStream};
use crate::http::{
    HttpContext, HttpHeaders, HttpParams, HttpRequest, HttpResponse, HttpResult, RequestBody,
    ResponseBody, ResponseType,
};

/// Request under construction, bound to the client that will send it.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    client: HttpClient,
    request: HttpRequest,
}

impl RequestBuilder {
    pub(crate) fn new(client: HttpClient, request: HttpRequest) -> Self {
        Self { client, request }
    }

    fn map(mut self, f: impl FnOnce(HttpRequest) -> HttpRequest) -> Self {
        self.request = f(self.request);
        self
    }

    /// Append a query parameter.
    pub fn param(self, key: &str, value: impl ToString) -> Self {
        self.map(|request| {
            let params = request.params().append(key, value);
            request.with_params(params)
        })
    }

    /// Replace all query parameters.
    pub fn params(self, params: HttpParams) -> Self {
        self.map(|request| request.with_params(params))
    }

    /// Set a header, replacing earlier values.
    pub fn header(self, name: &str, value: impl Into<String>) -> Self {
        self.map(|request| {
            let headers = request.headers().set(name, value);
            request.with_headers(headers)
        })
    }

    /// Replace all headers.
    pub fn headers(self, headers: HttpHeaders) -> Self {
        self.map(|request| request.with_headers(headers))
    }

    pub fn body(self, body: impl Into<RequestBody>) -> Self {
        self.map(|request| request.with_body(body))
    }

    /// Serialize `value` as a JSON body.
    pub fn json_body<T: Serialize + ?Sized>(self, value: &T) -> HttpResult<Self> {
        let body = RequestBody::json(value)?;
        Ok(self.body(body))
    }

    pub fn context(self, context: HttpContext) -> Self {
        self.map(|request| request.with_context(context))
    }

    pub fn response_type(self, response_type: ResponseType) -> Self {
        self.map(|request| request.with_response_type(response_type))
    }

    pub fn report_progress(self, report_progress: bool) -> Self {
        self.map(|request| request.with_report_progress(report_progress))
    }

    pub fn with_credentials(self, with_credentials: bool) -> Self {
        self.map(|request| request.with_credentials(with_credentials))
    }

    /// The request as built so far.
    pub fn build(self) -> HttpRequest {
        self.request
    }

    /// Decoded body of the response.
    pub async fn fetch(self) -> HttpResult<ResponseBody> {
        Ok(self.response().await?.into_body())
    }

    /// JSON body deserialized into `T`.
    pub async fn json<T: DeserializeOwned>(self) -> HttpResult<T> {
        self.response_type(ResponseType::Json).fetch().await?.json()
    }

    /// Body as text.
    pub async fn text(self) -> HttpResult<String> {
        let body = self.response_type(ResponseType::Text).fetch().await?;
        Ok(body.as_text().unwrap_or_default().to_string())
    }

    /// The full response: status, headers and body.
    pub async fn response(self) -> HttpResult<HttpResponse> {
        terminal_response(self.client.request(self.request)).await
    }

    /// Every event of the request.
    pub fn events(self) -> EventStream {
        self.client.request(self.request)
    }

    pub fn observe(self, observe: Observe) -> ObservedStream {
        self.client.observe(self.request, observe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpMethod;
    use crate::testing::TestingBackend;
    use std::sync::Arc;

    #[test]
    fn test_builder_assembles_request() {
        let client = HttpClient::from_handler(Arc::new(TestingBackend::new()));
        let request = client
            .get("/items")
            .param("page", 2)
            .param("tag", "a")
            .param("tag", "b")
            .header("X-Trace", "1")
            .response_type(ResponseType::Text)
            .report_progress(true)
            .build();

        assert_eq!(request.method(), HttpMethod::Get);
        assert_eq!(request.url_with_params(), "/items?page=2&tag=a&tag=b");
        assert_eq!(request.headers().get("x-trace"), Some("1"));
        assert_eq!(request.response_type(), ResponseType::Text);
        assert!(request.report_progress());
    }

    #[test]
    fn test_json_body() {
        let client = HttpClient::from_handler(Arc::new(TestingBackend::new()));
        let request = client
            .builder(HttpMethod::Post, "/items")
            .json_body(&serde_json::json!({"name": "x"}))
            .unwrap()
            .build();

        assert_eq!(
            request.detect_content_type_header().as_deref(),
            Some("application/json")
        );
    }
}
