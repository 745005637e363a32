//! SQLite-backed implementations of the core store ports.

pub mod customer_repository;
pub mod form_repository;
pub mod job_repository;
pub mod manager;
pub mod watermark_repository;
pub mod webhook_failure_repository;

pub use customer_repository::SqliteCustomerRepository;
pub use form_repository::SqliteFormRepository;
pub use job_repository::SqliteJobRepository;
pub use manager::{DbConnection, DbManager};
pub use watermark_repository::SqliteWatermarkRepository;
pub use webhook_failure_repository::SqliteWebhookFailureRepository;
