//! Application constants
//!
//! Centralized location for all domain-level constants used throughout the
//! application.

// Customer sync
pub const CUSTOMER_PAGE_SIZE: usize = 200;
pub const JOB_COUNT_PAGE_SIZE: usize = 100;
pub const JOB_COUNT_MAX_PAGES: usize = 50; // safety valve: 5,000 jobs per customer

// Job sync
pub const DEFAULT_JOB_BATCH_SIZE: usize = 100;
pub const JOBS_SYNC_TYPE: &str = "jobs";
pub const CUSTOMERS_SYNC_TYPE: &str = "customers";

// Identity resolution
pub const BRUTE_FORCE_PAGE_SIZE: usize = 50;
pub const BRUTE_FORCE_MAX_PAGES: usize = 5; // 250 customers scanned at most
pub const CONTACT_FETCH_BATCH_SIZE: usize = 10;

// Forms sync
pub const FORM_FETCH_BATCH_SIZE: usize = 10;
pub const DEFAULT_FORMS_LOOKBACK_DAYS: i64 = 30;

// Webhook retry queue
pub const DEFAULT_WEBHOOK_MAX_ATTEMPTS: i64 = 5;

// Token refresh happens this many seconds before the reported expiry
pub const TOKEN_EXPIRY_SKEW_SECS: u64 = 60;
