//! Configuration structures
//!
//! Assembled by the infra config loader from environment variables or a
//! TOML file; consumed by the database manager, the platform client, and the
//! sync engines.

use serde::{Deserialize, Serialize};

/// Top-level application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub platform: PlatformConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Local SQLite store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

/// Credentials and endpoints for the external field-service platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Base URL of the platform REST API
    pub base_url: String,
    /// Token endpoint for the client-credentials grant
    pub auth_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub tenant_id: String,
    /// Static application key attached to every request
    pub app_key: String,
}

/// Tunables for the sync engines
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_job_batch_size")]
    pub job_batch_size: usize,
    #[serde(default = "default_forms_lookback_days")]
    pub forms_lookback_days: i64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            job_batch_size: default_job_batch_size(),
            forms_lookback_days: default_forms_lookback_days(),
        }
    }
}

fn default_pool_size() -> u32 {
    4
}

fn default_job_batch_size() -> usize {
    crate::constants::DEFAULT_JOB_BATCH_SIZE
}

fn default_forms_lookback_days() -> i64 {
    crate::constants::DEFAULT_FORMS_LOOKBACK_DAYS
}
