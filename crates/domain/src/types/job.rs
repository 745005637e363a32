//! Job, staged-job and job-form row shapes

use serde::{Deserialize, Serialize};

/// Normalized job record, upserted idempotently keyed by `external_id`.
///
/// A job row is only ever produced from a processed staged row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub external_id: String,
    pub job_number: String,
    pub customer_id: String,
    pub status: String,
    pub completed_on: Option<i64>,
    /// Job total in minor units
    pub total: i64,
    pub created_on: i64,
    pub modified_on: i64,
    pub last_synced_at: i64,
}

/// Raw landing record for an ingested job payload.
///
/// `processed_at == None` means "awaiting normalization". A normalization
/// failure records `processing_error` and leaves the row unprocessed; it is
/// not auto-retried.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagedJob {
    pub job_id: String,
    pub raw_payload: String,
    pub fetched_at: i64,
    pub processed_at: Option<i64>,
    pub processing_error: Option<String>,
}

/// A classified job form, one row per external form id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobForm {
    pub external_id: String,
    pub job_id: String,
    pub submitted_on: Option<i64>,
    pub technician_notes: Option<String>,
    pub customer_concerns: Option<String>,
    pub recommendations_made: Option<String>,
    pub equipment_condition: Option<String>,
    pub last_synced_at: i64,
}
