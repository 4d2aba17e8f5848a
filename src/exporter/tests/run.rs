//! Export pipeline tests against a mock provider.

use std::io::{Cursor, Read};
use std::time::Duration;

use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::{
    collect_body, create_test_exporter, listed_invoice, mount_account_identity, mount_document,
    mount_listing, wait_for_export_count,
};
use crate::archive::PLACEHOLDER_ENTRY_NAME;
use crate::error::Error;
use crate::types::{AccountId, DateRange, Tier};

fn archive_entry_names(data: &[u8]) -> Vec<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(data.to_vec())).unwrap();
    (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect()
}

#[tokio::test]
async fn test_export_streams_all_documents_and_records_usage() {
    let server = MockServer::start().await;
    mount_account_identity(&server, "acct_1").await;
    mount_listing(
        &server,
        vec![
            listed_invoice(&server, "in_1"),
            listed_invoice(&server, "in_2"),
            listed_invoice(&server, "in_3"),
        ],
    )
    .await;
    mount_document(&server, "in_1", b"pdf one").await;
    mount_document(&server, "in_2", b"pdf two").await;
    mount_document(&server, "in_3", b"pdf three").await;

    let (exporter, _db_file) = create_test_exporter(&server).await;

    let stream = exporter
        .begin_export("sk_test_1", DateRange::unbounded())
        .await
        .unwrap();
    assert_eq!(stream.account_id, AccountId::new("acct_1"));
    assert_eq!(stream.invoice_count, 3);

    let data = collect_body(stream.body).await;
    assert_eq!(
        archive_entry_names(&data),
        vec!["in_1.pdf", "in_2.pdf", "in_3.pdf"],
        "entries must appear in listing order"
    );

    let mut archive = zip::ZipArchive::new(Cursor::new(data)).unwrap();
    let mut content = Vec::new();
    archive
        .by_name("in_2.pdf")
        .unwrap()
        .read_to_end(&mut content)
        .unwrap();
    assert_eq!(content, b"pdf two");

    wait_for_export_count(&exporter.db, &AccountId::new("acct_1"), 1).await;
}

#[tokio::test]
async fn test_export_forwards_date_window_to_listing() {
    let server = MockServer::start().await;
    mount_account_identity(&server, "acct_1").await;

    // Only a listing scoped to January 2024 is mounted, so an unfiltered
    // call would miss and fail the export
    Mock::given(method("GET"))
        .and(path("/v1/invoices"))
        .and(query_param("created[gte]", "1704067200"))
        .and(query_param("created[lte]", "1706745599"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [listed_invoice(&server, "in_jan")],
            "has_more": false,
        })))
        .mount(&server)
        .await;
    mount_document(&server, "in_jan", b"january pdf").await;

    let (exporter, _db_file) = create_test_exporter(&server).await;

    let range = DateRange::new(
        chrono::NaiveDate::from_ymd_opt(2024, 1, 1),
        chrono::NaiveDate::from_ymd_opt(2024, 1, 31),
    );
    let stream = exporter.begin_export("sk_test_1", range).await.unwrap();

    let data = collect_body(stream.body).await;
    assert_eq!(archive_entry_names(&data), vec!["in_jan.pdf"]);
}

#[tokio::test]
async fn test_second_free_export_is_denied_with_account_id() {
    let server = MockServer::start().await;
    mount_account_identity(&server, "acct_1").await;
    mount_listing(&server, vec![listed_invoice(&server, "in_1")]).await;
    mount_document(&server, "in_1", b"pdf").await;

    let (exporter, _db_file) = create_test_exporter(&server).await;
    let account = AccountId::new("acct_1");

    let stream = exporter
        .begin_export("sk_test_1", DateRange::unbounded())
        .await
        .unwrap();
    collect_body(stream.body).await;
    wait_for_export_count(&exporter.db, &account, 1).await;

    match exporter.begin_export("sk_test_1", DateRange::unbounded()).await {
        Err(Error::QuotaExceeded {
            account_id,
            export_count,
        }) => {
            assert_eq!(account_id, account);
            assert_eq!(export_count, 1);
        }
        Ok(_) => panic!("second free export must be denied"),
        Err(e) => panic!("expected quota denial, got {e}"),
    }

    // The denied attempt produced nothing and charged nothing
    let usage = exporter.db.get_account_usage(&account).await.unwrap().unwrap();
    assert_eq!(usage.export_count, 1);
}

#[tokio::test]
async fn test_premium_empty_result_gets_placeholder_and_still_counts() {
    let server = MockServer::start().await;
    mount_account_identity(&server, "acct_2").await;
    mount_listing(&server, vec![]).await;

    let (exporter, _db_file) = create_test_exporter(&server).await;
    let account = AccountId::new("acct_2");
    exporter.db.set_tier(&account, Tier::Premium).await.unwrap();

    let stream = exporter
        .begin_export("sk_test_2", DateRange::unbounded())
        .await
        .unwrap();
    assert_eq!(stream.invoice_count, 0);

    let data = collect_body(stream.body).await;
    assert_eq!(
        archive_entry_names(&data),
        vec![PLACEHOLDER_ENTRY_NAME],
        "an empty export still yields a valid archive with a note"
    );

    wait_for_export_count(&exporter.db, &account, 1).await;
}

#[tokio::test]
async fn test_failed_document_is_skipped_and_export_completes() {
    let server = MockServer::start().await;
    mount_account_identity(&server, "acct_1").await;
    mount_listing(
        &server,
        (1..=5)
            .map(|n| listed_invoice(&server, &format!("in_{n}")))
            .collect(),
    )
    .await;
    for n in [1, 2, 4, 5] {
        let body = format!("pdf {n}");
        mount_document(&server, &format!("in_{n}"), body.as_bytes()).await;
    }
    // in_3's document endpoint answers 500
    Mock::given(method("GET"))
        .and(path("/docs/in_3.pdf"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let (exporter, _db_file) = create_test_exporter(&server).await;

    let stream = exporter
        .begin_export("sk_test_1", DateRange::unbounded())
        .await
        .unwrap();
    assert_eq!(stream.invoice_count, 5);

    let data = collect_body(stream.body).await;
    assert_eq!(
        archive_entry_names(&data),
        vec!["in_1.pdf", "in_2.pdf", "in_4.pdf", "in_5.pdf"],
        "one bad document must not abort the export"
    );

    // Completion is still a success: usage is charged exactly once
    wait_for_export_count(&exporter.db, &AccountId::new("acct_1"), 1).await;
}

#[tokio::test]
async fn test_invoice_without_document_is_not_in_archive() {
    let server = MockServer::start().await;
    mount_account_identity(&server, "acct_1").await;

    let mut no_doc = listed_invoice(&server, "in_nodoc");
    no_doc.as_object_mut().unwrap().remove("invoice_pdf");
    mount_listing(&server, vec![listed_invoice(&server, "in_1"), no_doc]).await;
    mount_document(&server, "in_1", b"pdf").await;

    let (exporter, _db_file) = create_test_exporter(&server).await;

    let stream = exporter
        .begin_export("sk_test_1", DateRange::unbounded())
        .await
        .unwrap();
    assert_eq!(stream.invoice_count, 2, "the listing still includes it");

    let data = collect_body(stream.body).await;
    assert_eq!(archive_entry_names(&data), vec!["in_1.pdf"]);

    wait_for_export_count(&exporter.db, &AccountId::new("acct_1"), 1).await;
}

#[tokio::test]
async fn test_dropping_the_body_cancels_without_quota_credit() {
    let server = MockServer::start().await;
    mount_account_identity(&server, "acct_1").await;
    mount_listing(&server, vec![listed_invoice(&server, "in_1")]).await;
    // Slow document keeps the pipeline in flight when the body is dropped
    Mock::given(method("GET"))
        .and(path("/docs/in_1.pdf"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"pdf".to_vec())
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let (exporter, _db_file) = create_test_exporter(&server).await;
    let account = AccountId::new("acct_1");

    let stream = exporter
        .begin_export("sk_test_1", DateRange::unbounded())
        .await
        .unwrap();
    drop(stream.body);

    // Give the pipeline time to notice the disconnect and unwind
    tokio::time::sleep(Duration::from_millis(300)).await;

    let usage = exporter.db.get_account_usage(&account).await.unwrap().unwrap();
    assert_eq!(
        usage.export_count, 0,
        "an abandoned export must never be charged"
    );
}

#[tokio::test]
async fn test_shutdown_cancels_in_flight_export_without_credit() {
    let server = MockServer::start().await;
    mount_account_identity(&server, "acct_1").await;
    mount_listing(&server, vec![listed_invoice(&server, "in_1")]).await;
    Mock::given(method("GET"))
        .and(path("/docs/in_1.pdf"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"pdf".to_vec())
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let (exporter, _db_file) = create_test_exporter(&server).await;
    let account = AccountId::new("acct_1");

    let stream = exporter
        .begin_export("sk_test_1", DateRange::unbounded())
        .await
        .unwrap();

    exporter.shutdown().await.unwrap();

    // The body stream ends without a complete archive
    let _partial = collect_body(stream.body).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let usage = exporter.db.get_account_usage(&account).await.unwrap().unwrap();
    assert_eq!(usage.export_count, 0);
}
