//! Tests for the system endpoints: health and the OpenAPI document.

use super::*;

#[tokio::test]
async fn test_health_endpoint() {
    let server = MockServer::start().await;
    let (app, _exporter, _db_file) = create_test_api(&server).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = read_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_openapi_spec_endpoint() {
    let server = MockServer::start().await;
    let (app, _exporter, _db_file) = create_test_api(&server).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/openapi.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = read_json(response).await;
    assert_eq!(json["info"]["title"], "invoice-dl REST API");
    assert!(
        json["paths"].get("/api/v1/invoices/export").is_some(),
        "the export endpoint must be documented"
    );
    assert!(
        json["paths"].get("/api/v1/webhooks/payment").is_some(),
        "the webhook endpoint must be documented"
    );
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let server = MockServer::start().await;
    let (app, _exporter, _db_file) = create_test_api(&server).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/nonexistent")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
