//! # FieldSync Infrastructure
//!
//! Infrastructure implementations of core domain ports.
//!
//! This crate contains:
//! - SQLite repository implementations (rusqlite behind an r2d2 pool)
//! - The external field-service platform client (OAuth + REST)
//! - Sync engines (customers, jobs, forms), identity-resolution strategies,
//!   membership updates, and the webhook retry worker
//!
//! ## Architecture
//! - Implements traits defined in `fieldsync-core`
//! - Contains all "impure" code (I/O, HTTP, database)

pub mod config;
pub mod database;
pub mod errors;
pub mod integrations;
pub mod sync;

// Re-export commonly used items
pub use database::*;
pub use errors::InfraError;
pub use integrations::fsm;
