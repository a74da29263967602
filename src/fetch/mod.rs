//! Document retrieval: bounded worker pool with per-document retry
//!
//! [`FetchManager::fetch_all`] turns a batch of [`DocumentRecord`]s into exactly one
//! [`FetchResult`] per record, in input order. At most `max_concurrency` workers pull records
//! from a shared queue, so one slow or failing document never holds up its siblings. Each
//! record is retried with exponential backoff; an optional deadline or cancellation token stops
//! the batch, leaving unstarted records [`FetchStatus::Skipped`] and in-flight ones
//! [`FetchStatus::Failed`].

mod transport;

pub use transport::{DocumentTransport, HttpTransport, Payload};

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::{FetchConfig, PayloadCheck, RetryConfig};
use crate::error::{FetchError, Result};
use crate::retry::retry_with_backoff;
use crate::types::{DocumentRecord, FetchResult, FetchStatus, FetchSummary};

/// Progress notification sent as each record finishes
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchProgress {
    /// Position of the record in the batch
    pub index: usize,
    /// Record URL
    pub url: String,
    /// Outcome
    pub status: FetchStatus,
    /// Requests made
    pub attempts: u32,
}

/// Per-batch knobs for [`FetchManager::fetch_all`]
#[derive(Clone, Debug)]
pub struct FetchOptions {
    /// Workers running at once (0 is treated as 1)
    pub max_concurrency: usize,
    /// Retry behavior per record
    pub retry: RetryConfig,
    /// Stop the batch at this instant
    pub deadline: Option<Instant>,
    /// External cancellation; cancelling it stops the batch like a deadline
    pub cancel: Option<CancellationToken>,
    /// Receives one [`FetchProgress`] per record as it completes
    pub progress: Option<mpsc::UnboundedSender<FetchProgress>>,
}

impl FetchOptions {
    /// Options taken from a [`FetchConfig`], with no deadline
    pub fn from_config(config: &FetchConfig) -> Self {
        Self {
            max_concurrency: config.max_concurrency,
            retry: config.retry.clone(),
            deadline: None,
            cancel: None,
            progress: None,
        }
    }

    /// Override the worker count
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    /// Override retry behavior
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Stop the batch at `deadline`
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Stop the batch `budget` from now
    pub fn with_time_budget(self, budget: Duration) -> Self {
        self.with_deadline(Instant::now() + budget)
    }

    /// Stop the batch when `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Report per-record completion on `tx`
    pub fn with_progress(mut self, tx: mpsc::UnboundedSender<FetchProgress>) -> Self {
        self.progress = Some(tx);
        self
    }
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self::from_config(&FetchConfig::default())
    }
}

/// Retrieves batches of documents through a [`DocumentTransport`]
#[derive(Clone)]
pub struct FetchManager {
    transport: Arc<dyn DocumentTransport>,
    config: FetchConfig,
}

impl std::fmt::Debug for FetchManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Finished results by input position; filled as each record completes
type Slots = Arc<Mutex<Vec<Option<FetchResult>>>>;

/// Everything a worker needs, cloned once per worker
struct WorkerContext {
    worker_id: usize,
    queue: Arc<Mutex<VecDeque<(usize, DocumentRecord)>>>,
    slots: Slots,
    transport: Arc<dyn DocumentTransport>,
    retry: RetryConfig,
    payload_check: PayloadCheck,
    cancel: CancellationToken,
    progress: Option<mpsc::UnboundedSender<FetchProgress>>,
}

impl FetchManager {
    /// Manager using [`HttpTransport`]
    pub fn new(config: FetchConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::with_transport(Arc::new(transport), config))
    }

    /// Manager using a caller-supplied transport
    pub fn with_transport(transport: Arc<dyn DocumentTransport>, config: FetchConfig) -> Self {
        Self { transport, config }
    }

    /// Configuration in use
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Batch options derived from the configuration
    pub fn default_options(&self) -> FetchOptions {
        FetchOptions::from_config(&self.config)
    }

    /// Retrieve every record, returning one result per record in input order
    ///
    /// Returns only after every worker has stopped, so no request is still running (and none
    /// will be retried) once this resolves.
    pub async fn fetch_all(
        &self,
        records: Vec<DocumentRecord>,
        options: FetchOptions,
    ) -> Vec<FetchResult> {
        let total = records.len();
        if total == 0 {
            return Vec::new();
        }

        let cancel = options
            .cancel
            .as_ref()
            .map(CancellationToken::child_token)
            .unwrap_or_else(CancellationToken::new);
        // Dropping this future stops the per-record tasks it spawned
        let _stop_on_drop = cancel.clone().drop_guard();

        let watchdog = options.deadline.map(|deadline| {
            let token = cancel.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep_until(deadline) => {
                        tracing::warn!("Fetch deadline reached, cancelling remaining documents");
                        token.cancel();
                    }
                    _ = token.cancelled() => {}
                }
            })
        });

        let originals = records.clone();
        let queue = Arc::new(Mutex::new(
            records.into_iter().enumerate().collect::<VecDeque<_>>(),
        ));
        let workers = options.max_concurrency.clamp(1, total);

        tracing::info!(
            documents = total,
            workers,
            max_retries = options.retry.max_retries,
            "Starting batch fetch"
        );

        let slots: Slots = Arc::new(Mutex::new((0..total).map(|_| None).collect()));
        let mut set = JoinSet::new();
        for worker_id in 0..workers {
            let ctx = WorkerContext {
                worker_id,
                queue: Arc::clone(&queue),
                slots: Arc::clone(&slots),
                transport: Arc::clone(&self.transport),
                retry: options.retry.clone(),
                payload_check: self.config.payload.clone(),
                cancel: cancel.clone(),
                progress: options.progress.clone(),
            };
            set.spawn(run_worker(ctx));
        }

        while let Some(joined) = set.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Fetch worker terminated abnormally");
            }
        }

        if let Some(handle) = watchdog {
            handle.abort();
        }

        // Finished results survive a crashed worker; only records it never completed are filled in
        let finished = std::mem::take(&mut *slots.lock().await);
        let results: Vec<FetchResult> = finished
            .into_iter()
            .zip(originals)
            .map(|(slot, record)| {
                slot.unwrap_or_else(|| FetchResult::failed(record, 0, "fetch worker terminated"))
            })
            .collect();

        let summary = FetchSummary::from_results(&results);
        tracing::info!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            "Batch fetch finished"
        );
        results
    }

    /// Retrieve a single record with the configured retry policy
    pub async fn fetch_one(&self, record: DocumentRecord) -> FetchResult {
        fetch_record(
            self.transport.as_ref(),
            record,
            &self.config.retry,
            &self.config.payload,
            &CancellationToken::new(),
        )
        .await
    }
}

async fn run_worker(ctx: WorkerContext) {
    loop {
        let next = ctx.queue.lock().await.pop_front();
        let Some((index, record)) = next else { break };

        let result = if ctx.cancel.is_cancelled() {
            FetchResult::skipped(record, "batch stopped before this document started")
        } else {
            tracing::debug!(worker = ctx.worker_id, index, url = %record.url, "Fetching document");
            fetch_isolated(&ctx, record).await
        };

        if let Some(tx) = &ctx.progress {
            // Receiver may be gone; progress is best effort
            let _ = tx.send(FetchProgress {
                index,
                url: result.record.url.clone(),
                status: result.status,
                attempts: result.attempts,
            });
        }
        ctx.slots.lock().await[index] = Some(result);
    }
}

/// Run one record as its own task so a panic fails that record alone
async fn fetch_isolated(ctx: &WorkerContext, record: DocumentRecord) -> FetchResult {
    let transport = Arc::clone(&ctx.transport);
    let retry = ctx.retry.clone();
    let payload_check = ctx.payload_check.clone();
    let cancel = ctx.cancel.clone();
    let task_record = record.clone();

    let task = tokio::spawn(async move {
        fetch_record(
            transport.as_ref(),
            task_record,
            &retry,
            &payload_check,
            &cancel,
        )
        .await
    });

    match task.await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(url = %record.url, error = %e, "Document fetch task failed");
            // At least one request was running when the task died
            FetchResult::failed(record, 1, format!("fetch task failed: {e}"))
        }
    }
}

async fn fetch_record(
    transport: &dyn DocumentTransport,
    record: DocumentRecord,
    retry: &RetryConfig,
    payload_check: &PayloadCheck,
    cancel: &CancellationToken,
) -> FetchResult {
    let outcome = {
        let url = record.url.as_str();
        retry_with_backoff(retry, cancel, move |attempt| async move {
            if attempt > 0 {
                tracing::debug!(url, attempt, "Retrying document");
            }
            let payload = transport.get(url).await?;
            check_payload(payload_check, &payload)?;
            Ok::<_, FetchError>(payload)
        })
        .await
    };

    match outcome.result {
        Ok(payload) => {
            tracing::debug!(
                url = %record.url,
                attempts = outcome.attempts,
                bytes = payload.bytes.len(),
                "Document retrieved"
            );
            FetchResult::ok(record, outcome.attempts, payload.bytes, payload.content_type)
        }
        Err(FetchError::Cancelled) if outcome.attempts == 0 => {
            FetchResult::skipped(record, "batch stopped before this document started")
        }
        Err(e) => {
            tracing::warn!(
                url = %record.url,
                source = %record.source_name,
                attempts = outcome.attempts,
                error = %e,
                "Document retrieval failed"
            );
            FetchResult::failed(record, outcome.attempts, e.to_string())
        }
    }
}

/// Reject bodies that cannot be the requested document
///
/// Checks the size bounds, then requires a declared content type to start with one of the
/// accepted prefixes (case-insensitive).
pub fn check_payload(
    check: &PayloadCheck,
    payload: &Payload,
) -> std::result::Result<(), FetchError> {
    let len = payload.bytes.len() as u64;
    if len < check.min_bytes {
        return Err(FetchError::InvalidPayload {
            reason: if len == 0 {
                "empty body".to_string()
            } else {
                format!("body of {len} bytes is below the {} byte minimum", check.min_bytes)
            },
        });
    }
    if let Some(max) = check.max_bytes.filter(|&max| len > max) {
        return Err(FetchError::InvalidPayload {
            reason: format!("body of {len} bytes exceeds the {max} byte limit"),
        });
    }
    if let Some(content_type) = &payload.content_type {
        let lowered = content_type.trim().to_ascii_lowercase();
        let accepted = check
            .accepted_content_types
            .iter()
            .any(|prefix| lowered.starts_with(&prefix.to_ascii_lowercase()));
        if !accepted {
            return Err(FetchError::InvalidPayload {
                reason: format!("content type {content_type} is not a document type"),
            });
        }
    }
    Ok(())
}
