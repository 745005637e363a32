//! Port interfaces implemented by the infrastructure crate

use async_trait::async_trait;
use fieldsync_domain::{
    ContactType, Customer, CustomerContact, Job, JobForm, Result, StagedJob, SyncWatermark,
    WebhookFailure,
};

/// Local store of customers and their contact channels.
#[async_trait]
pub trait CustomerStore: Send + Sync {
    /// Insert or update all mutable customer fields plus `last_synced_at`.
    async fn upsert_customer(&self, customer: &Customer) -> Result<()>;

    /// Replace the customer's entire contact set (whole-set semantics so
    /// contacts removed upstream do not linger).
    async fn replace_contacts(&self, customer_id: &str, contacts: &[CustomerContact])
        -> Result<()>;

    /// Indexed lookup of customer ids holding a normalized contact value.
    /// Shared values may return several ids.
    async fn find_customer_ids_by_contact(
        &self,
        contact_type: ContactType,
        normalized_value: &str,
    ) -> Result<Vec<String>>;

    async fn get_customer(&self, external_id: &str) -> Result<Option<Customer>>;
}

/// Local store for staged and normalized jobs.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Idempotent raw-payload upsert keyed by external job id; the latest
    /// payload wins.
    async fn stage_job(&self, job_id: &str, raw_payload: &str, fetched_at: i64) -> Result<()>;

    /// Staged rows with `processed_at` null and no recorded error.
    async fn unprocessed_staged_jobs(&self, limit: usize) -> Result<Vec<StagedJob>>;

    async fn mark_staged_processed(&self, job_id: &str, processed_at: i64) -> Result<()>;

    /// Record a normalization failure; the row stays unprocessed and is not
    /// auto-retried.
    async fn mark_staged_failed(&self, job_id: &str, error: &str) -> Result<()>;

    async fn upsert_job(&self, job: &Job) -> Result<()>;

    /// Job ids whose `modified_on` is at or after the cutoff.
    async fn job_ids_modified_since(&self, cutoff: i64) -> Result<Vec<String>>;

    /// One aggregate pass recomputing every customer's completed-job count
    /// from normalized jobs. Returns the number of customers updated.
    async fn recompute_customer_job_counts(&self) -> Result<usize>;
}

/// Persisted sync cursors, one row per sync type.
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    async fn get_watermark(&self, sync_type: &str) -> Result<Option<SyncWatermark>>;

    /// Persist the watermark. `last_modified_on_fetched` never regresses:
    /// implementations keep the maximum of the stored and offered values.
    async fn save_watermark(&self, watermark: &SyncWatermark) -> Result<()>;

    /// Record a run failure without touching cursor fields.
    async fn record_sync_error(&self, sync_type: &str, error: &str, at: i64) -> Result<()>;
}

/// Local store for classified job forms.
#[async_trait]
pub trait FormStore: Send + Sync {
    async fn upsert_form(&self, form: &JobForm) -> Result<()>;
}

/// Persisted retry queue for failed webhook processing.
#[async_trait]
pub trait WebhookFailureStore: Send + Sync {
    async fn enqueue(&self, failure: &WebhookFailure) -> Result<()>;

    /// Pending rows whose `next_retry_at` has elapsed, oldest first.
    async fn due_batch(&self, now: i64, limit: usize) -> Result<Vec<WebhookFailure>>;

    async fn mark_processed(&self, id: &str, processed_at: i64) -> Result<()>;

    /// Increment the attempt count and either reschedule with backoff or
    /// move the record to dead letter once the budget is exhausted.
    async fn record_attempt_failure(&self, id: &str, error: &str, now: i64) -> Result<()>;

    /// Move a pending record straight to dead letter, bypassing the retry
    /// budget. Used for failures no retry can fix.
    async fn dead_letter(&self, id: &str, error: &str) -> Result<()>;
}

/// Liveness signal consumed by an external watchdog so long-running syncs
/// are not flagged as stuck.
pub trait HeartbeatSink: Send + Sync {
    fn beat(&self);
}
