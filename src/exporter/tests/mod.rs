//! Shared helpers for exporter tests.

mod run;

use std::time::Duration;

use tempfile::NamedTempFile;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::config::Config;
use crate::db::Database;
use crate::exporter::InvoiceExporter;
use crate::types::AccountId;

/// Build an exporter backed by a temp sqlite file and the given mock provider
pub(crate) async fn create_test_exporter(server: &MockServer) -> (InvoiceExporter, NamedTempFile) {
    let db_file = NamedTempFile::new().unwrap();

    let mut config = Config::default();
    config.provider.base_url = server.uri();
    config.provider.request_timeout = Duration::from_secs(5);
    config.provider.document_timeout = Duration::from_secs(5);
    config.persistence.database_path = db_file.path().to_path_buf();

    let exporter = InvoiceExporter::new(config).await.unwrap();
    (exporter, db_file)
}

/// Mount the account-identity endpoint resolving to `account_id`
pub(crate) async fn mount_account_identity(server: &MockServer, account_id: &str) {
    Mock::given(method("GET"))
        .and(path("/v1/account"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": account_id })),
        )
        .mount(server)
        .await;
}

/// One listing item whose pdf lives on the mock server under /docs/{id}.pdf
pub(crate) fn listed_invoice(server: &MockServer, id: &str) -> serde_json::Value {
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
pub(crate) async fn mount_listing(server: &MockServer, invoices: Vec<serde_json::Value>) {
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
pub(crate) async fn mount_document(server: &MockServer, id: &str, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(format!("/docs/{}.pdf", id)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .mount(server)
        .await;
}

/// Drain an export body into a single byte buffer
pub(crate) async fn collect_body(mut body: tokio::sync::mpsc::Receiver<bytes::Bytes>) -> Vec<u8> {
    let mut out = Vec::new();
    while let Some(chunk) = body.recv().await {
        out.extend_from_slice(&chunk);
    }
    out
}

/// Wait until the account's export count reaches `expected`
///
/// The usage increment happens on the pipeline task shortly after the body
/// stream closes, so tests poll briefly instead of racing it.
pub(crate) async fn wait_for_export_count(db: &Database, account_id: &AccountId, expected: i64) {
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
