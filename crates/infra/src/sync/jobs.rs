//! Watermarked incremental job sync.
//!
//! Each run loops fetch -> stage -> normalize until the platform reports no
//! more pages. Raw payloads land in the staging table exactly as received;
//! normalization runs separately so a bad payload never blocks ingestion.
//! The watermark advances in memory per completed batch and is persisted
//! only after a fully successful run; a mid-run failure records the error
//! and leaves the cursor at the last fully-completed batch, so the failed
//! window is redelivered on the next invocation (at-least-once).

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use fieldsync_core::{HeartbeatSink, JobStore, WatermarkStore};
use fieldsync_domain::constants::JOBS_SYNC_TYPE;
use fieldsync_domain::{FieldSyncError, Job, Result, SyncReport, SyncWatermark};
use tracing::{debug, info, instrument, warn};

use crate::integrations::fsm::types::{to_minor_units, ApiJob};
use crate::integrations::fsm::FsmClient;

/// One fetched page of raw job payloads.
pub struct JobsBatch {
    pub items: Vec<serde_json::Value>,
    pub has_more: bool,
    /// Maximum `modifiedOn` observed among parseable items.
    pub max_modified_on: Option<i64>,
}

/// Incremental job sync engine.
pub struct JobSyncEngine {
    client: Arc<FsmClient>,
    jobs: Arc<dyn JobStore>,
    watermarks: Arc<dyn WatermarkStore>,
    heartbeat: Arc<dyn HeartbeatSink>,
    batch_size: usize,
}

impl JobSyncEngine {
    pub fn new(
        client: Arc<FsmClient>,
        jobs: Arc<dyn JobStore>,
        watermarks: Arc<dyn WatermarkStore>,
        heartbeat: Arc<dyn HeartbeatSink>,
        batch_size: usize,
    ) -> Self {
        Self { client, jobs, watermarks, heartbeat, batch_size }
    }

    /// One page of jobs modified at or after `since` (absent means full sync).
    pub async fn fetch_jobs_incremental(
        &self,
        since: Option<i64>,
        page: usize,
    ) -> Result<JobsBatch> {
        let cutoff = since.and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0));
        let envelope = self.client.jobs_page(page, self.batch_size, cutoff).await?;

        let max_modified_on = envelope
            .data
            .iter()
            .filter_map(|item| item.get("modifiedOn"))
            .filter_map(|v| v.as_str())
            .filter_map(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.timestamp())
            .max();

        Ok(JobsBatch { items: envelope.data, has_more: envelope.has_more, max_modified_on })
    }

    /// Run the full incremental pipeline and persist the watermark.
    #[instrument(skip(self))]
    pub async fn sync_all_jobs(&self) -> Result<SyncReport> {
        let started = Instant::now();

        let loaded = self
            .watermarks
            .get_watermark(JOBS_SYNC_TYPE)
            .await?
            .unwrap_or_else(|| SyncWatermark::empty(JOBS_SYNC_TYPE));
        let since = loaded.last_modified_on_fetched;

        let mut committed = since;
        let mut processed = 0_usize;

        if let Err(e) = self.run_pages(since, &mut committed, &mut processed).await {
            let now = Utc::now().timestamp();
            let failed = SyncWatermark {
                sync_type: JOBS_SYNC_TYPE.to_string(),
                last_successful_sync_at: loaded.last_successful_sync_at,
                last_modified_on_fetched: committed,
                records_processed: loaded.records_processed,
                last_error: Some(e.to_string()),
                last_error_at: Some(now),
            };
            if let Err(save_err) = self.watermarks.save_watermark(&failed).await {
                warn!(error = %save_err, "failed to record job sync failure");
            }
            return Err(e);
        }

        let now = Utc::now().timestamp();
        let watermark = SyncWatermark {
            sync_type: JOBS_SYNC_TYPE.to_string(),
            last_successful_sync_at: Some(now),
            last_modified_on_fetched: committed,
            records_processed: processed as i64,
            last_error: None,
            last_error_at: None,
        };
        self.watermarks.save_watermark(&watermark).await?;

        let report = SyncReport {
            records_processed: processed,
            duration_ms: started.elapsed().as_millis() as u64,
            errors: Vec::new(),
        };
        info!(
            processed = report.records_processed,
            duration_ms = report.duration_ms,
            cursor = ?committed,
            "job sync completed"
        );

        Ok(report)
    }

    async fn run_pages(
        &self,
        since: Option<i64>,
        committed: &mut Option<i64>,
        processed: &mut usize,
    ) -> Result<()> {
        let mut page = 1;

        loop {
            let batch = self.fetch_jobs_incremental(since, page).await?;
            let fetched_at = Utc::now().timestamp();

            for item in &batch.items {
                let Some(job_id) = item.get("id").and_then(|v| v.as_str()) else {
                    warn!(page, "job payload without an id, skipping");
                    continue;
                };
                self.jobs.stage_job(job_id, &item.to_string(), fetched_at).await?;
            }

            *processed += self.normalize_staged().await?;

            // The batch only counts once staging and normalization finished.
            if let Some(max) = batch.max_modified_on {
                *committed = Some(committed.map_or(max, |c| c.max(max)));
            }
            self.heartbeat.beat();

            if !batch.has_more {
                break;
            }
            page += 1;
        }

        let updated = self.jobs.recompute_customer_job_counts().await?;
        debug!(customers_updated = updated, "recomputed customer job counts");

        Ok(())
    }

    /// Drain unprocessed staged rows, upserting normalized jobs.
    ///
    /// A payload that fails to normalize gets its error recorded and stays
    /// unprocessed; it is not auto-retried and does not stop the drain.
    async fn normalize_staged(&self) -> Result<usize> {
        let mut processed = 0_usize;

        loop {
            let staged = self.jobs.unprocessed_staged_jobs(self.batch_size).await?;
            if staged.is_empty() {
                break;
            }

            for row in staged {
                match normalize_payload(&row.raw_payload) {
                    Ok(job) => {
                        self.jobs.upsert_job(&job).await?;
                        self.jobs
                            .mark_staged_processed(&row.job_id, Utc::now().timestamp())
                            .await?;
                        processed += 1;
                    }
                    Err(e) => {
                        warn!(job_id = %row.job_id, error = %e, "staged job failed normalization");
                        self.jobs.mark_staged_failed(&row.job_id, &e.to_string()).await?;
                    }
                }
            }
        }

        Ok(processed)
    }
}

fn normalize_payload(raw_payload: &str) -> Result<Job> {
    let api: ApiJob = serde_json::from_str(raw_payload)
        .map_err(|e| FieldSyncError::InvalidInput(format!("unparseable job payload: {e}")))?;
    Ok(to_domain_job(&api, Utc::now().timestamp()))
}

/// Convert a wire job into the local row shape.
pub(crate) fn to_domain_job(api: &ApiJob, now: i64) -> Job {
    Job {
        external_id: api.id.clone(),
        job_number: api.job_number.clone(),
        customer_id: api.customer_id.clone(),
        status: api.status.clone(),
        completed_on: api.completed_on.map(|dt| dt.timestamp()),
        total: to_minor_units(api.total),
        created_on: api.created_on.timestamp(),
        modified_on: api.modified_on.timestamp(),
        last_synced_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_scales_money_and_timestamps() {
        let api: ApiJob = serde_json::from_str(
            r#"{
                "id": "j1",
                "jobNumber": "1001",
                "customerId": "c1",
                "status": "Completed",
                "completedOn": "2024-05-01T12:00:00Z",
                "total": 412.345,
                "createdOn": "2024-04-01T09:00:00Z",
                "modifiedOn": "2024-05-01T12:30:00Z"
            }"#,
        )
        .expect("parses");

        let job = to_domain_job(&api, 1_700_000_000);
        assert_eq!(job.total, 41235);
        assert_eq!(job.completed_on, Some(1_714_564_800));
        assert_eq!(job.modified_on, 1_714_566_600);
        assert_eq!(job.last_synced_at, 1_700_000_000);
    }

    #[test]
    fn normalization_rejects_malformed_payloads() {
        let err = normalize_payload(r#"{"id": "j1"}"#).expect_err("missing fields");
        assert!(matches!(err, FieldSyncError::InvalidInput(_)));

        let err = normalize_payload("not json").expect_err("not json");
        assert!(matches!(err, FieldSyncError::InvalidInput(_)));
    }
}
