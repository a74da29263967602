//! Document bodies, mock endpoints and configurations

use earnings_dl::{FetchConfig, RetryConfig};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Smallest body that looks like a PDF
pub const PDF_BODY: &[u8] = b"%PDF-1.7\n1 0 obj\n<< /Type /Catalog >>\nendobj\n%%EOF\n";

/// Typical login/consent page served instead of a document
pub const HTML_BODY: &str = "<!doctype html><html><body>Please sign in</body></html>";

/// Retry policy with millisecond backoff so tests stay fast
pub fn quick_retry(max_retries: u32) -> RetryConfig {
    RetryConfig {
        max_retries,
        base_backoff: Duration::from_millis(10),
        max_backoff: Duration::from_millis(50),
        backoff_multiplier: 2.0,
        jitter: false,
    }
}

/// Fetch configuration suitable for a local mock server
pub fn test_fetch_config(max_retries: u32) -> FetchConfig {
    FetchConfig {
        max_concurrency: 4,
        request_timeout: Duration::from_secs(5),
        user_agent: "earnings-dl-tests/0.1".to_string(),
        retry: quick_retry(max_retries),
        ..Default::default()
    }
}

/// 200 response carrying a PDF
pub fn pdf_response() -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "application/pdf")
        .set_body_bytes(PDF_BODY)
}

/// Serve a PDF at `route`
pub async fn mount_pdf(server: &MockServer, route: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(pdf_response())
        .mount(server)
        .await;
}

/// Serve `status` at `route`
pub async fn mount_status(server: &MockServer, route: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}
