//! Requests against a real socket through the hyper backend.

mod common;

use std::time::Duration;

use courier::backend::{HttpHandler, HyperBackend};
use courier::client::{HttpClient, Observe, Observed};
use courier::config::ClientConfig;
use courier::http::{ErrorPayload, HttpEventType, ResponseBody, ResponseType};
use courier::setup::HttpSetup;
use futures_util::StreamExt;
use serde_json::json;

use common::{closed_port, start_programmable_backend, MockResponse};

fn config_for(addr: std::net::SocketAddr) -> ClientConfig {
    ClientConfig {
        base_url: Some(format!("http://{addr}")),
        ..Default::default()
    }
}

fn client_for(config: &ClientConfig) -> HttpClient {
    HttpClient::with_setup(&HttpSetup::from_config(config).unwrap(), Vec::new())
}

#[tokio::test]
async fn test_get_json_through_base_url() {
    let mock = start_programmable_backend(|request| async move {
        MockResponse::json(200, format!(r#"{{"path":"{}"}}"#, request.path))
    })
    .await;
    let client = client_for(&config_for(mock.addr));

    let body = client
        .get("/users")
        .param("page", 2)
        .fetch()
        .await
        .unwrap();

    assert_eq!(body, ResponseBody::Json(json!({"path": "/users?page=2"})));
    let received = mock.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].method, "GET");
    assert_eq!(
        received[0].header("accept"),
        Some("application/json, text/plain, */*")
    );
    assert!(received[0].header("x-request-id").is_some());
}

#[tokio::test]
async fn test_post_json_sets_content_type() {
    let mock =
        start_programmable_backend(|request| async move { MockResponse::json(201, request.body) })
            .await;
    let client = client_for(&config_for(mock.addr));

    let response = client
        .post("/items", json!({"name": "widget"}))
        .response()
        .await
        .unwrap();

    assert_eq!(response.status, 201);
    assert_eq!(response.body.as_json().unwrap()["name"], "widget");
    let received = mock.received();
    assert_eq!(received[0].header("content-type"), Some("application/json"));
}

#[tokio::test]
async fn test_default_headers_from_config() {
    let mock = start_programmable_backend(|_| async move { MockResponse::json(200, "{}") }).await;
    let mut config = config_for(mock.addr);
    config
        .default_headers
        .insert("X-Client".into(), "courier-tests".into());
    let client = client_for(&config);

    client
        .get("/with-defaults")
        .header("X-Trace", "7")
        .fetch()
        .await
        .unwrap();

    let received = mock.received();
    assert_eq!(received[0].header("x-client"), Some("courier-tests"));
    assert_eq!(received[0].header("x-trace"), Some("7"));
}

#[tokio::test]
async fn test_error_status_surfaces_body() {
    let mock = start_programmable_backend(|_| async move {
        MockResponse::json(404, r#"{"reason":"missing"}"#)
    })
    .await;
    let client = client_for(&config_for(mock.addr));

    let error = client.get("/missing").fetch().await.unwrap_err();
    let response = error.as_response().unwrap();
    assert_eq!(response.status, 404);
    assert_eq!(response.status_text, "Not Found");
    assert_eq!(
        response.error,
        ErrorPayload::Body(ResponseBody::Json(json!({"reason": "missing"})))
    );
    assert_eq!(
        response.message,
        format!("Http failure response for http://{}/missing: 404 Not Found", mock.addr)
    );
}

#[tokio::test]
async fn test_invalid_json_on_success_is_a_parse_error() {
    let mock =
        start_programmable_backend(|_| async move { MockResponse::json(200, "not json") }).await;
    let client = client_for(&config_for(mock.addr));

    let error = client.get("/broken").response().await.unwrap_err();
    match &error.as_response().unwrap().error {
        ErrorPayload::JsonParse(parse) => assert_eq!(parse.text, "not json"),
        other => panic!("unexpected payload {other:?}"),
    }
}

#[tokio::test]
async fn test_progress_events_are_ordered() {
    let mock = start_programmable_backend(|_| async move {
        MockResponse::text(200, "hello progress")
    })
    .await;
    let client = client_for(&config_for(mock.addr));

    let events: Vec<_> = client
        .post("/upload", "payload")
        .response_type(ResponseType::Text)
        .report_progress(true)
        .observe(Observe::Events)
        .collect()
        .await;

    let kinds: Vec<HttpEventType> = events
        .into_iter()
        .map(|item| match item.unwrap() {
            Observed::Event(event) => event.event_type(),
            other => panic!("unexpected {other:?}"),
        })
        .collect();

    assert_eq!(kinds.first(), Some(&HttpEventType::Sent));
    assert_eq!(kinds.last(), Some(&HttpEventType::Response));
    assert_eq!(
        kinds.iter().filter(|kind| **kind == HttpEventType::Response).count(),
        1
    );
    let header_at = kinds
        .iter()
        .position(|kind| *kind == HttpEventType::ResponseHeader)
        .unwrap();
    let first_download = kinds
        .iter()
        .position(|kind| *kind == HttpEventType::DownloadProgress)
        .unwrap();
    assert!(header_at < first_download);
    assert!(kinds.contains(&HttpEventType::UploadProgress));
}

#[tokio::test]
async fn test_no_progress_without_report_progress() {
    let mock =
        start_programmable_backend(|_| async move { MockResponse::text(200, "quiet") }).await;
    let client = client_for(&config_for(mock.addr));

    let events: Vec<_> = client
        .get("/quiet")
        .response_type(ResponseType::Text)
        .events()
        .collect()
        .await;

    let kinds: Vec<_> = events
        .into_iter()
        .map(|item| item.unwrap().event_type())
        .collect();
    assert_eq!(kinds, vec![HttpEventType::Sent, HttpEventType::Response]);
}

#[tokio::test]
async fn test_timeout_becomes_status_zero() {
    let mock = start_programmable_backend(|_| async move {
        MockResponse::json(200, "{}").delayed(Duration::from_secs(5))
    })
    .await;
    let mut config = config_for(mock.addr);
    config.timeouts.request_secs = 1;
    let client = client_for(&config);

    let error = client.get("/slow").fetch().await.unwrap_err();
    let response = error.as_response().unwrap();
    assert_eq!(response.status, 0);
    assert_eq!(response.status_text, "Unknown Error");
    assert!(matches!(response.error, ErrorPayload::Transport(_)));
}

#[tokio::test]
async fn test_connection_refused_becomes_status_zero() {
    let addr = closed_port().await;
    let client = client_for(&config_for(addr));

    let error = client.get("/nobody-home").fetch().await.unwrap_err();
    assert_eq!(error.status(), Some(0));
}

#[tokio::test]
async fn test_dropping_the_stream_closes_the_connection() {
    let mock = start_programmable_backend(|_| async move {
        MockResponse::json(200, "{}").delayed(Duration::from_secs(2))
    })
    .await;
    let client = client_for(&config_for(mock.addr));

    let mut events = client.get("/abandoned").events();
    assert_eq!(
        events.next().await.unwrap().unwrap().event_type(),
        HttpEventType::Sent
    );
    wait_for(|| mock.received().len() == 1).await;
    assert_eq!(mock.closed_early(), 0);

    // Still in flight: nothing but `Sent` so far.
    let pending = tokio::time::timeout(Duration::from_millis(200), events.next()).await;
    assert!(pending.is_err());
    assert_eq!(mock.closed_early(), 0);

    drop(events);
    wait_for(|| mock.closed_early() == 1).await;
    assert_eq!(mock.received().len(), 1);
}

/// Poll `condition` every 10ms for up to 2 seconds.
async fn wait_for(condition: impl Fn() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met within 2s");
}

#[tokio::test]
async fn test_relative_url_without_base_fails_fast() {
    let backend = HyperBackend::new();
    let request = courier::http::HttpRequest::new(courier::http::HttpMethod::Get, "/relative");
    assert!(backend.handle(request).is_err());
}
