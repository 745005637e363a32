//! # FieldSync Core
//!
//! Pure business logic and port definitions.
//!
//! This crate contains:
//! - Contact normalization (phone/email canonicalization)
//! - Form field classification (declarative keyword rules)
//! - Identity resolution strategy driver
//! - Port traits implemented by `fieldsync-infra`
//!
//! ## Architecture
//! - Depends only on `fieldsync-domain`
//! - No I/O: everything behind ports is injected

pub mod contact;
pub mod forms;
pub mod ports;
pub mod resolution;

// Re-export commonly used items
pub use contact::{normalize_email, normalize_phone};
pub use forms::{classify_fields, ClassifiedFormFields};
pub use ports::{
    CustomerStore, FormStore, HeartbeatSink, JobStore, WatermarkStore, WebhookFailureStore,
};
pub use resolution::{ContactKey, CustomerIdentityResolver, ResolutionStrategy};
