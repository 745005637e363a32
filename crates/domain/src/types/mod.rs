//! Domain types and models
//!
//! Row shapes for the local store plus the report types the sync engines
//! return to external schedulers. Timestamps are unix seconds (i64);
//! monetary amounts are integer minor units.

pub mod customer;
pub mod job;
pub mod sync;
pub mod webhook;

pub use customer::{ContactType, Customer, CustomerContact};
pub use job::{Job, JobForm, StagedJob};
pub use sync::{ItemFailure, MembershipUpdate, MembershipUpdateReport, SyncReport, SyncWatermark};
pub use webhook::{WebhookFailure, WebhookFailureStatus};
