//! Job forms sync with heuristic field classification.
//!
//! Candidate jobs come from an explicit id list or from jobs modified within
//! a trailing window. Forms are fetched per job in bounded-concurrency
//! batches; a single job or form failing is logged and skipped without
//! aborting its siblings.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use fieldsync_core::{classify_fields, FormStore, JobStore};
use fieldsync_domain::constants::{DEFAULT_FORMS_LOOKBACK_DAYS, FORM_FETCH_BATCH_SIZE};
use fieldsync_domain::{JobForm, Result, SyncReport};
use tracing::{info, instrument, warn};

use crate::integrations::fsm::types::ApiForm;
use crate::integrations::fsm::FsmClient;

const SECS_PER_DAY: i64 = 86_400;

/// Options for one forms sync run.
#[derive(Debug, Clone)]
pub struct FormsSyncOptions {
    /// Explicit job ids; when absent, jobs modified within the lookback
    /// window are selected.
    pub job_ids: Option<Vec<String>>,
    pub lookback_days: i64,
}

impl Default for FormsSyncOptions {
    fn default() -> Self {
        Self { job_ids: None, lookback_days: DEFAULT_FORMS_LOOKBACK_DAYS }
    }
}

/// Per-job form retrieval and classification engine.
pub struct FormsSyncEngine {
    client: Arc<FsmClient>,
    jobs: Arc<dyn JobStore>,
    forms: Arc<dyn FormStore>,
}

impl FormsSyncEngine {
    pub fn new(
        client: Arc<FsmClient>,
        jobs: Arc<dyn JobStore>,
        forms: Arc<dyn FormStore>,
    ) -> Self {
        Self { client, jobs, forms }
    }

    /// Fetch, classify, and upsert forms for the candidate jobs.
    #[instrument(skip(self, options))]
    pub async fn sync_job_forms(&self, options: FormsSyncOptions) -> Result<SyncReport> {
        let started = Instant::now();

        let candidates = match options.job_ids {
            Some(ids) => ids,
            None => {
                let cutoff = Utc::now().timestamp() - options.lookback_days * SECS_PER_DAY;
                self.jobs.job_ids_modified_since(cutoff).await?
            }
        };

        let mut report = SyncReport::default();

        for chunk in candidates.chunks(FORM_FETCH_BATCH_SIZE) {
            let fetches = chunk.iter().map(|job_id| self.sync_forms_for_job(job_id));
            let results = futures::future::join_all(fetches).await;

            for (job_id, result) in chunk.iter().zip(results) {
                match result {
                    Ok(count) => report.records_processed += count,
                    Err(e) => {
                        warn!(job_id = %job_id, error = %e, "forms sync failed for job, skipping");
                        report.errors.push(format!("{job_id}: {e}"));
                    }
                }
            }
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            forms_processed = report.records_processed,
            errors = report.errors.len(),
            duration_ms = report.duration_ms,
            "forms sync completed"
        );

        Ok(report)
    }

    async fn sync_forms_for_job(&self, job_id: &str) -> Result<usize> {
        let api_forms = self.client.get_job_forms(job_id).await?;
        let now = Utc::now().timestamp();

        let mut count = 0;
        for api_form in &api_forms {
            let form = classify_form(job_id, api_form, now);
            self.forms.upsert_form(&form).await?;
            count += 1;
        }

        Ok(count)
    }
}

fn classify_form(job_id: &str, api_form: &ApiForm, now: i64) -> JobForm {
    let fields: Vec<(String, String)> = api_form
        .fields
        .iter()
        .filter_map(|f| f.value.as_ref().map(|v| (f.name.clone(), v.clone())))
        .collect();
    let classified = classify_fields(&fields);

    JobForm {
        external_id: api_form.id.clone(),
        job_id: api_form.job_id.clone().unwrap_or_else(|| job_id.to_string()),
        submitted_on: api_form.submitted_on.map(|dt| dt.timestamp()),
        technician_notes: classified.technician_notes,
        customer_concerns: classified.customer_concerns,
        recommendations_made: classified.recommendations_made,
        equipment_condition: classified.equipment_condition,
        last_synced_at: now,
    }
}
