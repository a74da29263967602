//! Document transport: the HTTP seam of the fetch manager

use crate::config::FetchConfig;
use crate::error::{FetchError, Result};
use reqwest::header::{ACCEPT, CONTENT_TYPE};

/// Body and content type of one successful response
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Payload {
    /// Raw body
    pub bytes: Vec<u8>,
    /// `Content-Type` header, if the server sent one
    pub content_type: Option<String>,
}

impl Payload {
    /// Payload with a content type
    pub fn new(bytes: impl Into<Vec<u8>>, content_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: Some(content_type.into()),
        }
    }
}

/// Abstraction over document retrieval, enabling testability.
///
/// One call is one attempt; retries and payload checks belong to the caller.
#[async_trait::async_trait]
pub trait DocumentTransport: Send + Sync {
    /// Retrieve `url`
    async fn get(&self, url: &str) -> std::result::Result<Payload, FetchError>;
}

/// Production [`DocumentTransport`] backed by a shared `reqwest::Client`
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Client with the configured user agent and per-request timeout
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { client })
    }

    /// Wrap an existing client (proxies, custom TLS, cookie stores)
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl DocumentTransport for HttpTransport {
    async fn get(&self, url: &str) -> std::result::Result<Payload, FetchError> {
        let response = self.client.get(url).header(ACCEPT, "*/*").send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                code: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?;

        tracing::trace!(url, bytes = bytes.len(), "Received response body");

        Ok(Payload {
            bytes: bytes.to_vec(),
            content_type,
        })
    }
}
