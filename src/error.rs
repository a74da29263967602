//! Error types for earnings-dl
//!
//! Two layers of errors exist:
//! - [`Error`] covers configuration, registration and per-source failures. Only the
//!   configuration-time variants ever reach the caller of the pipeline; source failures are
//!   absorbed by the aggregator and reported as diagnostics.
//! - [`FetchError`] describes why a single document could not be retrieved. It is recorded on
//!   the [`FetchResult`](crate::types::FetchResult) for that document and never aborts a batch.

use std::time::Duration;
use thiserror::Error;

use crate::types::Region;

/// Result type alias for earnings-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for earnings-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "fetch.max_concurrency")
        key: Option<String>,
    },

    /// A source with the same name was already registered
    #[error("source '{source_name}' is already registered (attempted for region {region})")]
    DuplicateSourceRegistration {
        /// Name shared by both sources
        source_name: String,
        /// Region of the rejected source
        region: Region,
    },

    /// Source declared metadata the registry cannot accept
    #[error("invalid metadata for source '{source_name}': {reason}")]
    InvalidSourceMetadata {
        /// Name of the offending source (may be empty)
        source_name: String,
        /// What is wrong with it
        reason: String,
    },

    /// The process-wide registry was installed twice
    #[error("global source registry is already installed")]
    RegistryAlreadyInstalled,

    /// A source failed at the transport level
    #[error("source '{source_name}' unavailable: {reason}")]
    SourceUnavailable {
        /// Source that failed
        source_name: String,
        /// Transport-level reason
        reason: String,
    },

    /// A source operation exceeded its time bound
    #[error("source '{source_name}' timed out during {operation} after {timeout:?}")]
    SourceTimeout {
        /// Source that timed out
        source_name: String,
        /// Operation that was running (`search_company` or `get_documents`)
        operation: &'static str,
        /// The bound that was exceeded
        timeout: Duration,
    },

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a [`Error::Config`] naming the offending key
    pub(crate) fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }

    /// Whether this error is a configuration-time failure that must reach the caller
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Config { .. }
                | Error::DuplicateSourceRegistration { .. }
                | Error::InvalidSourceMetadata { .. }
                | Error::RegistryAlreadyInstalled
        )
    }
}

/// Reason a single document retrieval failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Connection, TLS or body-read failure
    #[error("transport error: {0}")]
    Transport(String),

    /// The request did not complete in time
    #[error("request timed out")]
    Timeout,

    /// The server answered with a non-success status
    #[error("unexpected HTTP status {code}")]
    Status {
        /// HTTP status code
        code: u16,
    },

    /// The body failed the sanity check (empty, too large, wrong content type)
    #[error("invalid payload: {reason}")]
    InvalidPayload {
        /// What the check rejected
        reason: String,
    },

    /// The batch deadline passed or the caller cancelled while this document was in flight
    #[error("cancelled before completion")]
    Cancelled,
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else if let Some(status) = e.status() {
            FetchError::Status {
                code: status.as_u16(),
            }
        } else {
            FetchError::Transport(e.to_string())
        }
    }
}
