//! SQLite-backed job form repository.

use std::sync::Arc;

use async_trait::async_trait;
use fieldsync_core::FormStore;
use fieldsync_domain::{FieldSyncError, JobForm, Result};
use rusqlite::{params, Connection};
use tokio::task;

use super::manager::DbManager;
use crate::errors::InfraError;

/// SQLite form repository. One row per external form id.
pub struct SqliteFormRepository {
    db: Arc<DbManager>,
}

impl SqliteFormRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl FormStore for SqliteFormRepository {
    async fn upsert_form(&self, form: &JobForm) -> Result<()> {
        let db = Arc::clone(&self.db);
        let form = form.clone();

        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            upsert_form(&conn, &form)
        })
        .await
        .map_err(map_join_error)?
    }
}

// ============================================================================
// SQL Operations (synchronous)
// ============================================================================

fn upsert_form(conn: &Connection, form: &JobForm) -> Result<()> {
    conn.execute(
        "INSERT INTO job_forms (external_id, job_id, submitted_on, technician_notes,
                                customer_concerns, recommendations_made,
                                equipment_condition, last_synced_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(external_id) DO UPDATE SET
             job_id = excluded.job_id,
             submitted_on = excluded.submitted_on,
             technician_notes = excluded.technician_notes,
             customer_concerns = excluded.customer_concerns,
             recommendations_made = excluded.recommendations_made,
             equipment_condition = excluded.equipment_condition,
             last_synced_at = excluded.last_synced_at",
        params![
            form.external_id,
            form.job_id,
            form.submitted_on,
            form.technician_notes,
            form.customer_concerns,
            form.recommendations_made,
            form.equipment_condition,
            form.last_synced_at,
        ],
    )
    .map_err(map_sql_error)?;

    Ok(())
}

// ============================================================================
// Error Mapping
// ============================================================================

fn map_sql_error(err: rusqlite::Error) -> FieldSyncError {
    FieldSyncError::from(InfraError::from(err))
}

fn map_join_error(err: task::JoinError) -> FieldSyncError {
    if err.is_cancelled() {
        FieldSyncError::Internal("blocking task cancelled".into())
    } else {
        FieldSyncError::Internal(format!("blocking task failed: {err}"))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    async fn setup_repository() -> (SqliteFormRepository, Arc<DbManager>, TempDir) {
        let temp_dir = TempDir::new().expect("temp dir created");
        let db_path = temp_dir.path().join("forms.db");

        let manager = Arc::new(DbManager::new(&db_path, 2).expect("db manager created"));
        manager.run_migrations().expect("migrations run");

        let repo = SqliteFormRepository::new(Arc::clone(&manager));
        (repo, manager, temp_dir)
    }

    fn sample_form(id: &str) -> JobForm {
        JobForm {
            external_id: id.to_string(),
            job_id: "job-1".into(),
            submitted_on: Some(1_700_000_000),
            technician_notes: Some("Replaced capacitor".into()),
            customer_concerns: Some("Unit making noise".into()),
            recommendations_made: None,
            equipment_condition: Some("Fair".into()),
            last_synced_at: 1_700_000_100,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn upsert_is_idempotent_on_external_id() {
        let (repo, manager, _dir) = setup_repository().await;

        let mut form = sample_form("form-1");
        repo.upsert_form(&form).await.expect("first upsert");

        form.equipment_condition = Some("Poor".into());
        repo.upsert_form(&form).await.expect("second upsert");

        let conn = manager.get_connection().expect("connection");
        let (count, condition): (i64, String) = conn
            .query_row(
                "SELECT COUNT(*), MAX(equipment_condition) FROM job_forms",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .expect("count query");

        assert_eq!(count, 1);
        assert_eq!(condition, "Poor");
    }
}
