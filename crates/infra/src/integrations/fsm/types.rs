//! Wire types for the field-service platform REST API.
//!
//! The platform speaks camelCase JSON; list endpoints wrap results in a
//! `{ data, hasMore }` envelope. Monetary values arrive as decimals and are
//! converted to integer minor units at the boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Convert a decimal monetary value to integer minor units.
pub fn to_minor_units(value: f64) -> i64 {
    (value * 100.0).round() as i64
}

/// Standard list response envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEnvelope<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
}

/// OAuth token endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Token lifetime in seconds.
    pub expires_in: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCustomer {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub customer_type: Option<String>,
    pub address: Option<ApiAddress>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub balance: f64,
    #[serde(default)]
    pub lifetime_value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiAddress {
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
}

/// A contact channel record. The contacts-search endpoint returns these with
/// `customer_id` populated, letting callers map a shared phone or email back
/// to every holder.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiContact {
    pub id: String,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(rename = "type")]
    pub contact_type: String,
    pub value: String,
    #[serde(default)]
    pub is_primary: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiJob {
    pub id: String,
    pub job_number: String,
    pub customer_id: String,
    pub status: String,
    pub completed_on: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total: f64,
    pub created_on: DateTime<Utc>,
    pub modified_on: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiForm {
    pub id: String,
    #[serde(default)]
    pub job_id: Option<String>,
    pub submitted_on: Option<DateTime<Utc>>,
    #[serde(default)]
    pub fields: Vec<ApiFormField>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiFormField {
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
}

fn default_true() -> bool {
    true
}
