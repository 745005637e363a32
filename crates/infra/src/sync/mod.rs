//! Sync engines and background workers.

pub mod customers;
pub mod errors;
pub mod forms;
pub mod jobs;
pub mod membership;
pub mod resolver;
pub mod retry_worker;

pub use customers::CustomerSyncEngine;
pub use errors::SyncError;
pub use forms::{FormsSyncEngine, FormsSyncOptions};
pub use jobs::JobSyncEngine;
pub use membership::MembershipManager;
pub use resolver::{CustomerResolutionService, LiveSearchStrategy, LocalCacheStrategy};
pub use retry_worker::{
    new_webhook_failure, WebhookProcessor, WebhookRetryWorker, WebhookRetryWorkerConfig,
};
