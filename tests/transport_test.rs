mod common;

use common::{transport, transport_with_timeouts, TOKEN};
use field_submit::infrastructure::{ApiRequest, FilePart, MultipartBody};
use field_submit::services::StaticToken;
use field_submit::{Config, ErrorKind, TransportClient, TransportError};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_headers_and_bearer_on_private_path() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/projects"))
        .and(header("authorization", format!("Bearer {}", TOKEN).as_str()))
        .and(header("x-app-version", "1.2.3"))
        .and(header("x-app-build", "42"))
        .and(header("accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let response = transport(&server)
        .send(ApiRequest::get("/api/projects"))
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.body, json!([]));
}

#[tokio::test]
async fn test_public_path_never_carries_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    transport(&server)
        .send(ApiRequest::get("/api/health").header("Authorization", "Bearer stale"))
        .await
        .unwrap();

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    assert!(received[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_no_token_means_no_authorization_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/projects"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let config = Config {
        api_base_url: server.uri(),
        ..Config::default()
    };
    let client = TransportClient::new(&config, Arc::new(StaticToken::none()));
    client.send(ApiRequest::get("/api/projects")).await.unwrap();

    let received = server.received_requests().await.unwrap();
    assert!(received[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_deadline_exceeded_is_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({}))
                .set_delay(Duration::from_millis(800)),
        )
        .mount(&server)
        .await;

    let client =
        transport_with_timeouts(&server, Duration::from_millis(100), Duration::from_secs(5));
    let err = client.send(ApiRequest::get("/api/slow")).await.unwrap_err();

    assert_eq!(err, TransportError::Timeout);
}

#[tokio::test]
async fn test_cancellation_is_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let token = CancellationToken::new();
    token.cancel();

    let err = transport(&server)
        .send_with_cancel(ApiRequest::get("/api/projects"), Some(&token))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Timeout);
}

#[tokio::test]
async fn test_connection_refused_is_offline() {
    let config = Config {
        api_base_url: "http://127.0.0.1:1".to_string(),
        ..Config::default()
    };
    let client = TransportClient::new(&config, Arc::new(StaticToken::none()));

    let err = client.send(ApiRequest::get("/api/projects")).await.unwrap_err();

    assert_eq!(err, TransportError::Offline);
}

#[tokio::test]
async fn test_html_error_page_is_bad_gateway() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/projects/BA-2025-DEMO/regie"))
        .respond_with(ResponseTemplate::new(502).set_body_raw(
            "<!DOCTYPE html><html><body>Bad Gateway</body></html>",
            "text/html",
        ))
        .mount(&server)
        .await;

    let err = transport(&server)
        .send(ApiRequest::post_json("/api/projects/BA-2025-DEMO/regie", json!({})))
        .await
        .unwrap_err();

    assert_eq!(err, TransportError::BadGatewayOrWrongApiBase { status: 502 });
}

#[tokio::test]
async fn test_spa_index_on_success_is_wrong_api_base() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("<html><div id=app></div></html>", "text/html"),
        )
        .mount(&server)
        .await;

    let err = transport(&server)
        .send(ApiRequest::get("/api/projects"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::BadGatewayOrWrongApiBase);
}

#[tokio::test]
async fn test_missing_endpoint_shapes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/express"))
        .respond_with(ResponseTemplate::new(404).set_body_raw(
            "<!DOCTYPE html><html><body><pre>Cannot POST /api/express</pre></body></html>",
            "text/html",
        ))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/json"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "Not found"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/proxy"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_raw("<html><body><h1>404 Not Found</h1>nginx</body></html>", "text/html"),
        )
        .mount(&server)
        .await;

    let client = transport(&server);

    let express = client
        .send(ApiRequest::post_json("/api/express", json!({})))
        .await
        .unwrap_err();
    assert_eq!(
        express,
        TransportError::MissingEndpoint {
            status: 404,
            path: "POST /api/express".to_string()
        }
    );

    let json_404 = client
        .send(ApiRequest::post_json("/api/json", json!({})))
        .await
        .unwrap_err();
    assert!(json_404.is_missing_endpoint());

    let proxy = client
        .send(ApiRequest::post_json("/api/proxy", json!({})))
        .await
        .unwrap_err();
    assert_eq!(proxy, TransportError::BadGatewayOrWrongApiBase { status: 404 });
}

#[tokio::test]
async fn test_application_errors_surface_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/json-error"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "date missing"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/text-error"))
        .respond_with(ResponseTemplate::new(500).set_body_string("database unavailable"))
        .mount(&server)
        .await;

    let client = transport(&server);

    let err = client
        .send(ApiRequest::post_json("/api/json-error", json!({})))
        .await
        .unwrap_err();
    assert_eq!(err, TransportError::server(400, "date missing"));

    let err = client
        .send(ApiRequest::post_json("/api/text-error", json!({})))
        .await
        .unwrap_err();
    assert_eq!(err, TransportError::server(500, "database unavailable"));
}

#[tokio::test]
async fn test_multipart_upload_carries_fields_and_files() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .mount(&server)
        .await;

    let body = MultipartBody::new()
        .text("projectId", "BA-2025-DEMO")
        .file(FilePart {
            field: "files".to_string(),
            file_name: "a.jpg".to_string(),
            media_type: Some("image/jpeg".to_string()),
            bytes: b"jpeg".to_vec(),
        });
    transport(&server)
        .send(ApiRequest::post_multipart("/upload", body))
        .await
        .unwrap();

    let received = server.received_requests().await.unwrap();
    let raw = String::from_utf8_lossy(&received[0].body);
    assert!(raw.contains("name=\"projectId\""));
    assert!(raw.contains("BA-2025-DEMO"));
    assert!(raw.contains("filename=\"a.jpg\""));
    assert!(raw.contains("image/jpeg"));
}
