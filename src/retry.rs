//! Retry logic with exponential backoff
//!
//! This module provides configurable retry logic for transient failures.
//! It implements exponential backoff with optional jitter to prevent thundering herd, and
//! checks a [`CancellationToken`] before every attempt and during every wait so a batch
//! deadline can abandon work at the next safe point.
//!
//! # Example
//!
//! ```no_run
//! use earnings_dl::retry::{Cancelled, IsRetryable, retry_with_backoff};
//! use earnings_dl::config::RetryConfig;
//! use tokio_util::sync::CancellationToken;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//!     Permanent,
//!     Cancelled,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{self:?}")
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Transient)
//!     }
//! }
//!
//! impl From<Cancelled> for MyError {
//!     fn from(_: Cancelled) -> Self {
//!         MyError::Cancelled
//!     }
//! }
//!
//! # async fn example() {
//! let config = RetryConfig::default();
//! let cancel = CancellationToken::new();
//! let outcome = retry_with_backoff(&config, &cancel, |_attempt| async {
//!     // Your operation here
//!     Ok::<_, MyError>(())
//! })
//! .await;
//! println!("took {} attempt(s)", outcome.attempts);
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::{Error, FetchError};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (timeouts, connection resets, server errors) should return `true`.
/// Permanent failures (bad configuration, rejected payloads, cancellation) should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Network(e) => e.is_timeout() || e.is_connect(),
            Error::SourceTimeout { .. } | Error::SourceUnavailable { .. } => true,
            Error::Config { .. }
            | Error::DuplicateSourceRegistration { .. }
            | Error::InvalidSourceMetadata { .. }
            | Error::RegistryAlreadyInstalled => false,
            Error::Serialization(_) => false,
            Error::Other(_) => false,
        }
    }
}

impl IsRetryable for FetchError {
    fn is_retryable(&self) -> bool {
        match self {
            FetchError::Transport(_) | FetchError::Timeout | FetchError::Status { .. } => true,
            // The same bytes would come back
            FetchError::InvalidPayload { .. } => false,
            FetchError::Cancelled => false,
        }
    }
}

/// Marker produced when the cancellation token fires during a retry loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

impl From<Cancelled> for FetchError {
    fn from(_: Cancelled) -> Self {
        FetchError::Cancelled
    }
}

/// Final result of a retried operation and how many attempts were started
#[must_use]
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    /// Success value or the last error
    pub result: Result<T, E>,
    /// Attempts started; 0 means cancellation happened before the first one
    pub attempts: u32,
}

/// Execute an async operation with exponential backoff retry logic
///
/// The operation receives the 0-based attempt number. It is tried once, then retried up to
/// `config.max_retries` times while it fails with a retryable error, so a persistently failing
/// operation runs `max_retries + 1` times.
///
/// `cancel` is checked before each attempt, raced against each attempt, and raced against each
/// backoff wait. Cancellation yields `E::from(Cancelled)`.
pub async fn retry_with_backoff<F, Fut, T, E>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    mut operation: F,
) -> RetryOutcome<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + From<Cancelled> + std::fmt::Display,
{
    let mut attempts = 0;
    let mut delay = config.base_backoff.min(config.max_backoff);

    loop {
        if cancel.is_cancelled() {
            return RetryOutcome {
                result: Err(E::from(Cancelled)),
                attempts,
            };
        }

        let current = attempts;
        attempts += 1;
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(E::from(Cancelled)),
            r = operation(current) => r,
        };

        match result {
            Ok(value) => {
                if attempts > 1 {
                    tracing::info!(attempts, "Operation succeeded after retry");
                }
                return RetryOutcome {
                    result: Ok(value),
                    attempts,
                };
            }
            Err(e) if e.is_retryable() && current < config.max_retries => {
                let wait = if config.jitter { add_jitter(delay) } else { delay };

                tracing::warn!(
                    error = %e,
                    attempt = attempts,
                    max_retries = config.max_retries,
                    delay_ms = wait.as_millis() as u64,
                    "Operation failed, retrying"
                );

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        tracing::debug!(attempts, "Retry abandoned during backoff");
                        return RetryOutcome {
                            result: Err(E::from(Cancelled)),
                            attempts,
                        };
                    }
                    _ = tokio::time::sleep(wait) => {}
                }

                delay = next_delay(delay, config);
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(
                        error = %e,
                        attempts,
                        "Operation failed after all retry attempts exhausted"
                    );
                } else {
                    tracing::debug!(
                        error = %e,
                        attempts,
                        "Operation failed with non-retryable error"
                    );
                }
                return RetryOutcome {
                    result: Err(e),
                    attempts,
                };
            }
        }
    }
}

/// Delay before retry `n` (0-based), without jitter
pub fn backoff_delay(config: &RetryConfig, retry: u32) -> Duration {
    let mut delay = config.base_backoff.min(config.max_backoff);
    for _ in 0..retry {
        delay = next_delay(delay, config);
    }
    delay
}

// Products that overflow `Duration` (or are NaN) saturate at `max_backoff`
fn next_delay(delay: Duration, config: &RetryConfig) -> Duration {
    Duration::try_from_secs_f64(delay.as_secs_f64() * config.backoff_multiplier)
        .map_or(config.max_backoff, |next| next.min(config.max_backoff))
}

/// Add random jitter to a delay to prevent thundering herd
///
/// Jitter is uniformly distributed between 0% and 100% of the delay.
/// This means the actual delay will be between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    let jittered_secs = delay.as_secs_f64() * (1.0 + jitter_factor);
    Duration::from_secs_f64(jittered_secs)
}
