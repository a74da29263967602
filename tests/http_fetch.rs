//! HTTP retrieval against a local mock server
//!
//! Exercises `HttpTransport` through `FetchManager`: status handling, retry with backoff,
//! payload checks and the per-request timeout.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{HTML_BODY, PDF_BODY, mount_pdf, mount_status, pdf_response, test_fetch_config};
use earnings_dl::{
    CompanyIdentity, DocType, DocumentRecord, DocumentTransport, FetchError, FetchManager,
    FetchStatus, FetchSummary, HttpTransport, Region,
};
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn record(url: String) -> DocumentRecord {
    DocumentRecord::new(
        CompanyIdentity::new("Acme Industries Ltd"),
        Region::India,
        DocType::Transcript,
        url,
        "bse",
        0,
    )
}

#[tokio::test]
async fn successful_download_returns_body_and_content_type() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/acme/q3.pdf"))
        .and(header("user-agent", "earnings-dl-tests/0.1"))
        .and(header("accept", "*/*"))
        .respond_with(pdf_response())
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = assert_ok!(FetchManager::new(test_fetch_config(3)));
    let result = fetcher
        .fetch_one(record(format!("{}/acme/q3.pdf", server.uri())))
        .await;

    assert_eq!(result.status, FetchStatus::Ok);
    assert_eq!(result.attempts, 1);
    assert_eq!(result.bytes.as_deref(), Some(PDF_BODY));
    assert_eq!(result.content_type.as_deref(), Some("application/pdf"));
}

#[tokio::test]
async fn server_errors_are_retried_until_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky.pdf"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    mount_pdf(&server, "/flaky.pdf").await;

    let fetcher = assert_ok!(FetchManager::new(test_fetch_config(3)));
    let result = fetcher
        .fetch_one(record(format!("{}/flaky.pdf", server.uri())))
        .await;

    assert_eq!(result.status, FetchStatus::Ok);
    assert_eq!(result.attempts, 3);
}

#[tokio::test]
async fn missing_document_fails_after_all_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing.pdf"))
        .respond_with(ResponseTemplate::new(404))
        .expect(3)
        .mount(&server)
        .await;

    let fetcher = assert_ok!(FetchManager::new(test_fetch_config(2)));
    let result = fetcher
        .fetch_one(record(format!("{}/missing.pdf", server.uri())))
        .await;

    assert_eq!(result.status, FetchStatus::Failed);
    assert_eq!(result.attempts, 3);
    assert_eq!(
        result.error.as_deref(),
        Some(FetchError::Status { code: 404 }.to_string().as_str())
    );
}

#[tokio::test]
async fn non_document_and_empty_bodies_are_rejected_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/login.pdf"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(HTML_BODY, "text/html; charset=utf-8"),
        )
        .expect(1)
        .mount(&server)
        .await;
    // set_body_string serves text/plain
    Mock::given(method("GET"))
        .and(path("/missing.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_string("document not found"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/empty.pdf"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-type", "application/pdf"))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = assert_ok!(FetchManager::new(test_fetch_config(3)));
    let results = fetcher
        .fetch_all(
            vec![
                record(format!("{}/login.pdf", server.uri())),
                record(format!("{}/missing.pdf", server.uri())),
                record(format!("{}/empty.pdf", server.uri())),
            ],
            fetcher.default_options(),
        )
        .await;

    assert_eq!(results.len(), 3);
    assert!(results[0].error.as_deref().unwrap().contains("text/html"));
    assert!(results[1].error.as_deref().unwrap().contains("text/plain"));
    for result in &results {
        assert_eq!(result.status, FetchStatus::Failed);
        assert_eq!(result.attempts, 1);
        assert!(result.error.as_deref().unwrap().starts_with("invalid payload"));
    }
}

#[tokio::test]
async fn slow_server_hits_request_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow.pdf"))
        .respond_with(pdf_response().set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let mut config = test_fetch_config(0);
    config.request_timeout = Duration::from_millis(200);
    let transport = assert_ok!(HttpTransport::new(&config));

    let err = assert_err!(transport.get(&format!("{}/slow.pdf", server.uri())).await);
    assert_eq!(err, FetchError::Timeout);
}

#[tokio::test]
async fn partial_failure_batch_reports_every_record() {
    let server = MockServer::start().await;
    for route in ["/a.pdf", "/b.pdf", "/d.pdf"] {
        mount_pdf(&server, route).await;
    }
    mount_status(&server, "/c.pdf", 500).await;

    let fetcher = assert_ok!(FetchManager::new(test_fetch_config(1)));
    let records: Vec<DocumentRecord> = ["/a.pdf", "/b.pdf", "/c.pdf", "/d.pdf"]
        .iter()
        .map(|route| record(format!("{}{route}", server.uri())))
        .collect();

    let results = fetcher
        .fetch_all(records.clone(), fetcher.default_options().with_max_concurrency(2))
        .await;

    assert_eq!(results.len(), records.len());
    for (result, original) in results.iter().zip(&records) {
        assert_eq!(&result.record, original);
    }
    let summary = FetchSummary::from_results(&results);
    assert_eq!(summary.succeeded, 3);
    assert_eq!(summary.failed, 1);
    assert_eq!(results[2].attempts, 2);
    assert!(summary.first_error.unwrap().contains("500"));
}

#[tokio::test]
async fn custom_transport_can_wrap_an_existing_client() {
    let server = MockServer::start().await;
    mount_pdf(&server, "/doc.pdf").await;

    let client = reqwest::Client::builder().build().unwrap();
    let transport: Arc<dyn DocumentTransport> = Arc::new(HttpTransport::with_client(client));
    let fetcher = FetchManager::with_transport(transport, test_fetch_config(0));

    let result = fetcher
        .fetch_one(record(format!("{}/doc.pdf", server.uri())))
        .await;
    assert!(result.is_ok());
}
