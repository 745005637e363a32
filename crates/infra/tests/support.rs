use std::sync::Arc;

use async_trait::async_trait;
use fieldsync_domain::{PlatformConfig, Result};
use fieldsync_infra::database::DbManager;
use fieldsync_infra::fsm::{AccessTokenProvider, FsmClient};
use tempfile::TempDir;

/// Temporary database wrapper that keeps the underlying file alive for the
/// duration of a test run.
pub struct TestDatabase {
    pub manager: Arc<DbManager>,
    _temp_dir: TempDir,
}

impl TestDatabase {
    /// Create a new temporary database with the full schema applied.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("temp dir should be created");
        let db_path = temp_dir.path().join("test.db");

        let manager = DbManager::new(&db_path, 4).expect("db manager should be created");
        manager.run_migrations().expect("migrations should run");

        Self { manager: Arc::new(manager), _temp_dir: temp_dir }
    }

    /// Run a scalar query against the database.
    pub fn query_i64(&self, sql: &str) -> i64 {
        let conn = self.manager.get_connection().expect("connection available");
        conn.query_row(sql, [], |row| row.get(0)).expect("scalar query succeeds")
    }
}

impl Default for TestDatabase {
    fn default() -> Self {
        Self::new()
    }
}

struct StaticToken;

#[async_trait]
impl AccessTokenProvider for StaticToken {
    async fn access_token(&self) -> Result<String> {
        Ok("test-token".to_string())
    }
}

/// Build a platform client pointed at a wiremock server.
pub fn test_client(base_url: &str) -> Arc<FsmClient> {
    let config = PlatformConfig {
        base_url: base_url.to_string(),
        auth_url: format!("{base_url}/oauth/token"),
        client_id: "client-id".into(),
        client_secret: "client-secret".into(),
        tenant_id: "tenant-1".into(),
        app_key: "app-key".into(),
    };
    Arc::new(FsmClient::new(&config, Arc::new(StaticToken)).expect("client should build"))
}
