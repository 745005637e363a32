//! Customer and contact row shapes

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::FieldSyncError;

/// Customer record mirrored from the external platform.
///
/// Owned and mutated exclusively by the customer sync engine; read by
/// identity resolution and external consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    /// Platform-assigned identifier (primary key)
    pub external_id: String,
    pub name: String,
    pub customer_type: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub active: bool,
    /// Outstanding balance in minor units
    pub balance: i64,
    /// Count of completed jobs, recomputed by the job sync aggregate pass
    pub job_count: i64,
    /// Lifetime value in minor units
    pub lifetime_value: i64,
    pub last_synced_at: i64,
}

/// One communication channel belonging to a customer.
///
/// `normalized_value` is deliberately not unique: shared phones and emails
/// across accounts are expected and supported.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerContact {
    pub customer_id: String,
    pub contact_type: ContactType,
    pub raw_value: String,
    pub normalized_value: String,
    pub is_primary: bool,
}

/// Kind of contact channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactType {
    Phone,
    Email,
}

impl fmt::Display for ContactType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Phone => write!(f, "phone"),
            Self::Email => write!(f, "email"),
        }
    }
}

impl FromStr for ContactType {
    type Err = FieldSyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "phone" | "mobile" | "mobilephone" => Ok(Self::Phone),
            "email" => Ok(Self::Email),
            other => Err(FieldSyncError::InvalidInput(format!("unknown contact type: {other}"))),
        }
    }
}
