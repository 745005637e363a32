//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If incomplete, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `FIELDSYNC_DB_PATH`: Database file path
//! - `FIELDSYNC_DB_POOL_SIZE`: Connection pool size (optional, default 4)
//! - `FIELDSYNC_BASE_URL`: Platform REST API base URL
//! - `FIELDSYNC_AUTH_URL`: OAuth token endpoint
//! - `FIELDSYNC_CLIENT_ID` / `FIELDSYNC_CLIENT_SECRET`: OAuth credentials
//! - `FIELDSYNC_TENANT_ID`: Platform tenant identifier
//! - `FIELDSYNC_APP_KEY`: Static application key header value
//! - `FIELDSYNC_JOB_BATCH_SIZE`: Staged-job normalization batch size (optional)
//! - `FIELDSYNC_FORMS_LOOKBACK_DAYS`: Default forms sync window (optional)

use std::path::{Path, PathBuf};

use fieldsync_domain::{
    Config, DatabaseConfig, FieldSyncError, PlatformConfig, Result, SyncConfig,
};

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If any required
/// variables are missing, falls back to loading from a config file.
///
/// # Errors
/// Returns `FieldSyncError::Config` if configuration cannot be loaded from
/// either source.
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// All required environment variables must be present. Returns an error
/// if any are missing.
pub fn load_from_env() -> Result<Config> {
    let db_path = env_var("FIELDSYNC_DB_PATH")?;
    let pool_size = match std::env::var("FIELDSYNC_DB_POOL_SIZE") {
        Ok(s) => s
            .parse::<u32>()
            .map_err(|e| FieldSyncError::Config(format!("Invalid pool size: {e}")))?,
        Err(_) => default_config().database.pool_size,
    };

    let platform = PlatformConfig {
        base_url: env_var("FIELDSYNC_BASE_URL")?,
        auth_url: env_var("FIELDSYNC_AUTH_URL")?,
        client_id: env_var("FIELDSYNC_CLIENT_ID")?,
        client_secret: env_var("FIELDSYNC_CLIENT_SECRET")?,
        tenant_id: env_var("FIELDSYNC_TENANT_ID")?,
        app_key: env_var("FIELDSYNC_APP_KEY")?,
    };

    let mut sync = SyncConfig::default();
    if let Ok(s) = std::env::var("FIELDSYNC_JOB_BATCH_SIZE") {
        sync.job_batch_size = s
            .parse::<usize>()
            .map_err(|e| FieldSyncError::Config(format!("Invalid job batch size: {e}")))?;
    }
    if let Ok(s) = std::env::var("FIELDSYNC_FORMS_LOOKBACK_DAYS") {
        sync.forms_lookback_days = s
            .parse::<i64>()
            .map_err(|e| FieldSyncError::Config(format!("Invalid forms lookback: {e}")))?;
    }

    Ok(Config { database: DatabaseConfig { path: db_path, pool_size }, platform, sync })
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(FieldSyncError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            FieldSyncError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| FieldSyncError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| FieldSyncError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| FieldSyncError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(FieldSyncError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe standard locations for configuration files
///
/// Searches the current working directory and up to two parents, then the
/// executable's directory. Returns the first config file found.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(vec![
            cwd.join("config.json"),
            cwd.join("config.toml"),
            cwd.join("fieldsync.json"),
            cwd.join("fieldsync.toml"),
            cwd.join("../config.json"),
            cwd.join("../config.toml"),
            cwd.join("../../config.json"),
            cwd.join("../../config.toml"),
        ]);
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(vec![
                exe_dir.join("config.json"),
                exe_dir.join("config.toml"),
                exe_dir.join("fieldsync.json"),
                exe_dir.join("fieldsync.toml"),
            ]);
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

fn default_config() -> Config {
    Config {
        database: DatabaseConfig { path: String::new(), pool_size: 4 },
        platform: PlatformConfig {
            base_url: String::new(),
            auth_url: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            tenant_id: String::new(),
            app_key: String::new(),
        },
        sync: SyncConfig::default(),
    }
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| {
        FieldSyncError::Config(format!("Missing required environment variable: {key}"))
    })
}
