//! Error type for webhook replay processors.

use fieldsync_domain::FieldSyncError;
use thiserror::Error;

/// Failure replaying a webhook payload.
///
/// The retry worker consults [`SyncError::is_retryable`] to route a failed
/// replay: retryable failures reschedule with backoff, permanent ones go
/// straight to the dead-letter state instead of spending the attempt budget
/// on a payload that can never succeed.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Token refresh or credential problem. The next sweep gets a fresh
    /// token, so this is worth retrying.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Downstream rejected or mishandled the call transiently (429, 5xx).
    #[error("downstream unavailable: {0}")]
    Downstream(String),

    /// Connection-level failure before a response arrived.
    #[error("network error: {0}")]
    Network(String),

    /// Local store failure while replaying.
    #[error("database error: {0}")]
    Database(String),

    /// The payload can never be processed: malformed body, unknown entity,
    /// misconfigured handler. Retrying cannot help.
    #[error("permanent failure: {0}")]
    Permanent(String),
}

impl SyncError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Permanent(_))
    }
}

impl From<FieldSyncError> for SyncError {
    fn from(err: FieldSyncError) -> Self {
        match err {
            FieldSyncError::Database(message) => Self::Database(message),
            FieldSyncError::Network(message) => Self::Network(message),
            FieldSyncError::Auth(message) => Self::Auth(message),
            FieldSyncError::Internal(message) => Self::Downstream(message),
            FieldSyncError::Config(message)
            | FieldSyncError::NotFound(message)
            | FieldSyncError::InvalidInput(message) => Self::Permanent(message),
        }
    }
}
