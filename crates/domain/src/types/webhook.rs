//! Webhook failure queue row shape and status machine

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::FieldSyncError;

/// A webhook whose processing failed and is awaiting retry.
///
/// `attempt_count` only increases; status transitions are one-directional:
/// `pending -> processed` or `pending -> dead_letter`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookFailure {
    pub id: String,
    /// Webhook type ("job", "customer", ...)
    pub webhook_type: String,
    /// Event name within the type ("job.completed", ...)
    pub event: String,
    pub payload_json: String,
    pub headers_json: String,
    pub signature: Option<String>,
    pub attempt_count: i64,
    pub max_attempts: i64,
    pub next_retry_at: Option<i64>,
    pub status: WebhookFailureStatus,
    pub last_error: Option<String>,
    pub created_at: i64,
    pub processed_at: Option<i64>,
}

/// Lifecycle state of a [`WebhookFailure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookFailureStatus {
    Pending,
    Processed,
    DeadLetter,
}

impl fmt::Display for WebhookFailureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processed => write!(f, "processed"),
            Self::DeadLetter => write!(f, "dead_letter"),
        }
    }
}

impl FromStr for WebhookFailureStatus {
    type Err = FieldSyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processed" => Ok(Self::Processed),
            "dead_letter" => Ok(Self::DeadLetter),
            other => {
                Err(FieldSyncError::InvalidInput(format!("unknown webhook status: {other}")))
            }
        }
    }
}
