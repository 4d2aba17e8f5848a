//! Shared helpers for API tests plus server-level coverage (spawn,
//! shutdown, CORS, Swagger UI toggle).

use super::*;

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tempfile::NamedTempFile;
use tower::ServiceExt; // for oneshot()
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::db::Database;
use crate::types::AccountId;

mod system;

/// Build a router backed by a temp sqlite file and the given mock provider
async fn create_test_api(server: &MockServer) -> (Router, Arc<InvoiceExporter>, NamedTempFile) {
    create_test_api_with(server, |_| {}).await
}

/// Same as [`create_test_api`] with a config tweak applied before startup
async fn create_test_api_with(
    server: &MockServer,
    tweak: impl FnOnce(&mut Config),
) -> (Router, Arc<InvoiceExporter>, NamedTempFile) {
    let db_file = NamedTempFile::new().unwrap();

    let mut config = Config::default();
    config.provider.base_url = server.uri();
    config.provider.request_timeout = Duration::from_secs(5);
    config.provider.document_timeout = Duration::from_secs(5);
    config.persistence.database_path = db_file.path().to_path_buf();
    tweak(&mut config);

    let exporter = Arc::new(InvoiceExporter::new(config.clone()).await.unwrap());
    let app = create_router(exporter.clone(), Arc::new(config));
    (app, exporter, db_file)
}

/// Mount the account-identity endpoint resolving to `account_id`
async fn mount_account_identity(server: &MockServer, account_id: &str) {
    Mock::given(method("GET"))
        .and(path("/v1/account"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": account_id })),
        )
        .mount(server)
        .await;
}

/// One listing item whose pdf lives on the mock server under /docs/{id}.pdf
fn listed_invoice(server: &MockServer, id: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "created": 1_704_100_000,
        "amount_due": 1000,
        "currency": "usd",
        "status": "paid",
        "customer_email": "payer@example.com",
        "invoice_pdf": format!("{}/docs/{}.pdf", server.uri(), id),
    })
}

/// Mount a single-page listing answering any /v1/invoices query
async fn mount_listing(server: &MockServer, invoices: Vec<serde_json::Value>) {
    Mock::given(method("GET"))
        .and(path("/v1/invoices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": invoices,
            "has_more": false,
        })))
        .mount(server)
        .await;
}

/// Mount a pdf body for one invoice id
async fn mount_document(server: &MockServer, id: &str, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(format!("/docs/{}.pdf", id)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .mount(server)
        .await;
}

/// Drain a response body into a byte buffer
async fn read_bytes(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

/// Drain a response body and parse it as JSON
async fn read_json(response: axum::response::Response) -> serde_json::Value {
    serde_json::from_slice(&read_bytes(response).await).unwrap()
}

/// Wait until the account's export count reaches `expected`
///
/// The usage increment happens on the pipeline task shortly after the body
/// stream closes, so tests poll briefly instead of racing it.
async fn wait_for_export_count(db: &Database, account_id: &AccountId, expected: i64) {
    for _ in 0..100 {
        if let Some(usage) = db.get_account_usage(account_id).await.unwrap() {
            if usage.export_count == expected {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("export count never reached {} for {}", expected, account_id);
}

#[tokio::test]
async fn test_api_server_spawns_and_drains_on_shutdown() {
    let server = MockServer::start().await;
    let (_app, exporter, _db_file) = create_test_api_with(&server, |config| {
        config.api.bind_address = "127.0.0.1:0".parse().unwrap(); // Port 0 = OS assigns a free port
    })
    .await;

    // Spawn the API server
    let api_handle = exporter.spawn_api_server();

    // Give it a moment to start
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Cancelling the exporter token must drain the server cleanly
    exporter.shutdown().await.unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), api_handle)
        .await
        .expect("server should stop after shutdown")
        .unwrap();
    assert!(result.is_ok(), "server should exit without error");
}

#[tokio::test]
async fn test_routes_live_under_api_v1_prefix() {
    let server = MockServer::start().await;
    let (app, _exporter, _db_file) = create_test_api(&server).await;

    // The prefixed path works
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // The bare path does not
    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cors_enabled() {
    let server = MockServer::start().await;
    let (app, _exporter, _db_file) = create_test_api_with(&server, |config| {
        config.api.cors_enabled = true;
        config.api.cors_origins = vec!["*".to_string()];
    })
    .await;

    // Make a request with Origin header
    let request = Request::builder()
        .uri("/api/v1/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // The CORS middleware should add access-control-allow-origin header
    let headers = response.headers();
    assert!(
        headers.contains_key("access-control-allow-origin"),
        "CORS header should be present when CORS is enabled"
    );
}

#[tokio::test]
async fn test_cors_disabled() {
    let server = MockServer::start().await;
    let (app, _exporter, _db_file) = create_test_api_with(&server, |config| {
        config.api.cors_enabled = false;
    })
    .await;

    let request = Request::builder()
        .uri("/api/v1/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let headers = response.headers();
    assert!(
        !headers.contains_key("access-control-allow-origin"),
        "CORS header should be absent when CORS is disabled"
    );
}

#[tokio::test]
async fn test_swagger_ui_enabled() {
    let server = MockServer::start().await;
    let (app, _exporter, _db_file) = create_test_api_with(&server, |config| {
        config.api.swagger_ui = true;
    })
    .await;

    // Make a request to /swagger-ui (should serve HTML)
    let response = app
        .oneshot(
            Request::builder()
                .uri("/swagger-ui/")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        response.status(),
        StatusCode::OK,
        "Swagger UI should be accessible when enabled"
    );

    let body_str = String::from_utf8(read_bytes(response).await).unwrap();
    assert!(
        body_str.contains("<!DOCTYPE html>") || body_str.contains("<html"),
        "Response should contain HTML"
    );
    assert!(
        body_str.contains("swagger") || body_str.contains("Swagger"),
        "Response should contain Swagger-related content"
    );
}

#[tokio::test]
async fn test_swagger_ui_disabled() {
    let server = MockServer::start().await;
    let (app, _exporter, _db_file) = create_test_api_with(&server, |config| {
        config.api.swagger_ui = false;
    })
    .await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/swagger-ui/")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        response.status(),
        StatusCode::NOT_FOUND,
        "Swagger UI should not be accessible when disabled"
    );
}
