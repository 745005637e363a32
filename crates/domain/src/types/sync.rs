//! Sync bookkeeping and report types

use serde::{Deserialize, Serialize};

/// Persisted cursor for one sync type ("jobs", "customers", ...).
///
/// `last_modified_on_fetched` is monotonically non-decreasing across
/// successful runs; it bounds the next incremental fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncWatermark {
    pub sync_type: String,
    pub last_successful_sync_at: Option<i64>,
    pub last_modified_on_fetched: Option<i64>,
    pub records_processed: i64,
    pub last_error: Option<String>,
    pub last_error_at: Option<i64>,
}

impl SyncWatermark {
    /// Empty watermark for a sync type that has never run (implies full sync).
    pub fn empty(sync_type: impl Into<String>) -> Self {
        Self {
            sync_type: sync_type.into(),
            last_successful_sync_at: None,
            last_modified_on_fetched: None,
            records_processed: 0,
            last_error: None,
            last_error_at: None,
        }
    }
}

/// Outcome summary returned to the external scheduler.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncReport {
    pub records_processed: usize,
    pub duration_ms: u64,
    /// Per-record failures that were logged and skipped
    pub errors: Vec<String>,
}

/// One failed item within a bulk loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemFailure {
    pub id: String,
    pub error: String,
}

/// Requested external membership status change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MembershipUpdate {
    pub membership_id: String,
    pub status: String,
}

/// Partial-success report for a bulk membership update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MembershipUpdateReport {
    pub success: usize,
    pub failed: usize,
    pub errors: Vec<ItemFailure>,
}
