//! Webhook retry worker.
//!
//! Periodically sweeps the persisted webhook failure queue and replays each
//! due record through an injected [`WebhookProcessor`]. Webhook receipt must
//! acknowledge fast; processing can retry slowly from here without losing
//! events. Join handles are tracked, cancellation is explicit, and batch
//! processing is wrapped in a timeout.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use fieldsync_core::WebhookFailureStore;
use fieldsync_domain::constants::DEFAULT_WEBHOOK_MAX_ATTEMPTS;
use fieldsync_domain::{WebhookFailure, WebhookFailureStatus};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::database::webhook_failure_repository::calculate_backoff_secs;
use crate::sync::errors::SyncError;

/// Configuration for the webhook retry worker.
#[derive(Debug, Clone)]
pub struct WebhookRetryWorkerConfig {
    /// Maximum number of records to process per sweep
    pub batch_size: usize,
    /// Interval between sweeps
    pub poll_interval: Duration,
    /// Timeout for processing a single batch
    pub processing_timeout: Duration,
    /// Join timeout when stopping
    pub join_timeout: Duration,
}

impl Default for WebhookRetryWorkerConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            poll_interval: Duration::from_secs(60),
            processing_timeout: Duration::from_secs(300),
            join_timeout: Duration::from_secs(5),
        }
    }
}

/// Replays a failed webhook's payload.
#[async_trait]
pub trait WebhookProcessor: Send + Sync {
    /// Process one failed webhook. A retryable error reschedules the record
    /// (dead lettering once the attempt budget is spent); a permanent error
    /// dead letters it immediately.
    async fn process(&self, failure: &WebhookFailure) -> std::result::Result<(), SyncError>;
}

/// Build a fresh queue record for a webhook whose processing just failed.
///
/// The first retry is scheduled one backoff tier out rather than
/// immediately, giving a busy store or flaky downstream room to recover.
pub fn new_webhook_failure(
    webhook_type: &str,
    event: &str,
    payload_json: &str,
    headers_json: &str,
    signature: Option<String>,
    error: &str,
) -> WebhookFailure {
    let now = Utc::now().timestamp();
    WebhookFailure {
        id: uuid::Uuid::new_v4().to_string(),
        webhook_type: webhook_type.to_string(),
        event: event.to_string(),
        payload_json: payload_json.to_string(),
        headers_json: headers_json.to_string(),
        signature,
        attempt_count: 0,
        max_attempts: DEFAULT_WEBHOOK_MAX_ATTEMPTS,
        next_retry_at: Some(now + calculate_backoff_secs(0)),
        status: WebhookFailureStatus::Pending,
        last_error: Some(error.to_string()),
        created_at: now,
        processed_at: None,
    }
}

/// Retry worker with explicit lifecycle management.
pub struct WebhookRetryWorker {
    store: Arc<dyn WebhookFailureStore>,
    processor: Arc<dyn WebhookProcessor>,
    config: WebhookRetryWorkerConfig,
    cancellation: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

impl WebhookRetryWorker {
    pub fn new(
        store: Arc<dyn WebhookFailureStore>,
        processor: Arc<dyn WebhookProcessor>,
        config: WebhookRetryWorkerConfig,
    ) -> Self {
        Self {
            store,
            processor,
            config,
            cancellation: CancellationToken::new(),
            task_handle: None,
        }
    }

    /// Start the worker, spawning the background sweep task.
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> std::result::Result<(), String> {
        if self.is_running() {
            return Err("Worker already running".to_string());
        }

        info!("Starting webhook retry worker");

        self.cancellation = CancellationToken::new();

        let store = Arc::clone(&self.store);
        let processor = Arc::clone(&self.processor);
        let poll_interval = self.config.poll_interval;
        let batch_size = self.config.batch_size;
        let processing_timeout = self.config.processing_timeout;
        let cancel = self.cancellation.clone();

        let handle = tokio::spawn(async move {
            Self::process_loop(store, processor, poll_interval, batch_size, processing_timeout, cancel)
                .await;
        });

        self.task_handle = Some(handle);
        info!("Webhook retry worker started");

        Ok(())
    }

    /// Stop the worker and wait for the sweep task to finish.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> std::result::Result<(), String> {
        if !self.is_running() {
            return Err("Worker not running".to_string());
        }

        info!("Stopping webhook retry worker");

        self.cancellation.cancel();

        if let Some(handle) = self.task_handle.take() {
            match tokio::time::timeout(self.config.join_timeout, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!("Worker task panicked: {}", e);
                    return Err("Worker task panicked".to_string());
                }
                Err(_) => {
                    warn!("Worker task did not complete within timeout");
                    return Err("Worker task timeout".to_string());
                }
            }
        }

        info!("Webhook retry worker stopped");
        self.cancellation = CancellationToken::new();

        Ok(())
    }

    /// Returns true when a worker instance is active.
    pub fn is_running(&self) -> bool {
        self.task_handle.is_some()
    }

    async fn process_loop(
        store: Arc<dyn WebhookFailureStore>,
        processor: Arc<dyn WebhookProcessor>,
        poll_interval: Duration,
        batch_size: usize,
        processing_timeout: Duration,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Webhook retry worker process loop cancelled");
                    break;
                }
                _ = tokio::time::sleep(poll_interval) => {
                    match tokio::time::timeout(
                        processing_timeout,
                        Self::process_batch(&store, &processor, batch_size),
                    )
                    .await
                    {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => {
                            error!(error = %e, "Webhook retry batch failed");
                        }
                        Err(_) => {
                            warn!(
                                timeout_secs = processing_timeout.as_secs(),
                                "Webhook retry batch timed out"
                            );
                        }
                    }
                }
            }
        }
    }

    /// Sweep one batch of due records.
    ///
    /// Processing failures are per-record bookkeeping, not batch errors;
    /// only failures to persist an outcome bubble up.
    pub async fn process_batch(
        store: &Arc<dyn WebhookFailureStore>,
        processor: &Arc<dyn WebhookProcessor>,
        batch_size: usize,
    ) -> std::result::Result<(), String> {
        let now = Utc::now().timestamp();
        let due = store
            .due_batch(now, batch_size)
            .await
            .map_err(|e| format!("Failed to load due webhook failures: {e}"))?;

        if due.is_empty() {
            debug!("No due webhook failures");
            return Ok(());
        }

        info!(count = due.len(), "Processing webhook retry batch");

        let mut fatal_errors: Vec<String> = Vec::new();
        let mut processed = 0_u32;
        let mut rescheduled = 0_u32;
        let mut dead_lettered = 0_u32;

        for failure in due {
            match processor.process(&failure).await {
                Ok(()) => {
                    if let Err(err) =
                        store.mark_processed(&failure.id, Utc::now().timestamp()).await
                    {
                        let msg = err.to_string();
                        warn!(id = %failure.id, error = %msg, "mark_processed failed");
                        fatal_errors.push(format!("mark_processed error for {}: {}", failure.id, msg));
                    } else {
                        processed = processed.saturating_add(1);
                    }
                }
                Err(err) if err.is_retryable() => {
                    debug!(
                        id = %failure.id,
                        attempt = failure.attempt_count + 1,
                        error = %err,
                        "Webhook replay failed"
                    );
                    if let Err(record_err) = store
                        .record_attempt_failure(
                            &failure.id,
                            &truncate_reason(&err.to_string()),
                            Utc::now().timestamp(),
                        )
                        .await
                    {
                        let msg = record_err.to_string();
                        warn!(id = %failure.id, error = %msg, "record_attempt_failure failed");
                        fatal_errors
                            .push(format!("record_attempt_failure error for {}: {}", failure.id, msg));
                    } else {
                        rescheduled = rescheduled.saturating_add(1);
                    }
                }
                Err(err) => {
                    warn!(
                        id = %failure.id,
                        error = %err,
                        "Webhook replay failed permanently, dead lettering"
                    );
                    if let Err(dl_err) =
                        store.dead_letter(&failure.id, &truncate_reason(&err.to_string())).await
                    {
                        let msg = dl_err.to_string();
                        warn!(id = %failure.id, error = %msg, "dead_letter failed");
                        fatal_errors.push(format!("dead_letter error for {}: {}", failure.id, msg));
                    } else {
                        dead_lettered = dead_lettered.saturating_add(1);
                    }
                }
            }
        }

        debug!(processed, rescheduled, dead_lettered, "Webhook retry batch completed");

        if !fatal_errors.is_empty() {
            return Err(fatal_errors.join("; "));
        }

        Ok(())
    }
}

fn truncate_reason(reason: &str) -> String {
    const MAX_LEN: usize = 256;
    if reason.len() <= MAX_LEN {
        return reason.to_string();
    }

    let mut truncated = reason.chars().take(MAX_LEN.saturating_sub(3)).collect::<String>();
    truncated.push_str("...");
    truncated
}

impl Drop for WebhookRetryWorker {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("WebhookRetryWorker dropped while running; cancelling tasks");
            self.cancellation.cancel();
        }
    }
}
