//! SQLite-backed staged-job and job repository.
//!
//! The staging table captures raw payloads exactly as fetched so
//! normalization failures can be replayed and audited; the jobs table only
//! ever receives rows derived from processed staged rows.

use std::sync::Arc;

use async_trait::async_trait;
use fieldsync_core::JobStore;
use fieldsync_domain::{FieldSyncError, Job, Result, StagedJob};
use rusqlite::{params, Connection, Row};
use tokio::task;

use super::manager::DbManager;
use crate::errors::InfraError;

/// SQLite job repository.
pub struct SqliteJobRepository {
    db: Arc<DbManager>,
}

impl SqliteJobRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl JobStore for SqliteJobRepository {
    async fn stage_job(&self, job_id: &str, raw_payload: &str, fetched_at: i64) -> Result<()> {
        let db = Arc::clone(&self.db);
        let job_id = job_id.to_string();
        let raw_payload = raw_payload.to_string();

        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            stage_job(&conn, &job_id, &raw_payload, fetched_at)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn unprocessed_staged_jobs(&self, limit: usize) -> Result<Vec<StagedJob>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> Result<Vec<StagedJob>> {
            let conn = db.get_connection()?;
            query_unprocessed(&conn, limit)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn mark_staged_processed(&self, job_id: &str, processed_at: i64) -> Result<()> {
        let db = Arc::clone(&self.db);
        let job_id = job_id.to_string();

        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            conn.execute(
                "UPDATE staged_jobs
                 SET processed_at = ?1, processing_error = NULL
                 WHERE job_id = ?2",
                params![processed_at, job_id],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn mark_staged_failed(&self, job_id: &str, error: &str) -> Result<()> {
        let db = Arc::clone(&self.db);
        let job_id = job_id.to_string();
        let error = error.to_string();

        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            conn.execute(
                "UPDATE staged_jobs SET processing_error = ?1 WHERE job_id = ?2",
                params![error, job_id],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn upsert_job(&self, job: &Job) -> Result<()> {
        let db = Arc::clone(&self.db);
        let job = job.clone();

        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            upsert_job(&conn, &job)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn job_ids_modified_since(&self, cutoff: i64) -> Result<Vec<String>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> Result<Vec<String>> {
            let conn = db.get_connection()?;
            query_ids_modified_since(&conn, cutoff)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn recompute_customer_job_counts(&self) -> Result<usize> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> Result<usize> {
            let conn = db.get_connection()?;
            recompute_job_counts(&conn)
        })
        .await
        .map_err(map_join_error)?
    }
}

// ============================================================================
// SQL Operations (synchronous)
// ============================================================================

fn stage_job(conn: &Connection, job_id: &str, raw_payload: &str, fetched_at: i64) -> Result<()> {
    // Re-ingesting the same job id keeps exactly one row holding the latest
    // payload; a previously recorded error is cleared so the new payload gets
    // a fresh normalization attempt.
    conn.execute(
        "INSERT INTO staged_jobs (job_id, raw_payload, fetched_at, processed_at, processing_error)
         VALUES (?1, ?2, ?3, NULL, NULL)
         ON CONFLICT(job_id) DO UPDATE SET
             raw_payload = excluded.raw_payload,
             fetched_at = excluded.fetched_at,
             processed_at = NULL,
             processing_error = NULL",
        params![job_id, raw_payload, fetched_at],
    )
    .map_err(map_sql_error)?;

    Ok(())
}

fn query_unprocessed(conn: &Connection, limit: usize) -> Result<Vec<StagedJob>> {
    if limit == 0 {
        return Ok(Vec::new());
    }

    let mut stmt = conn
        .prepare(
            "SELECT job_id, raw_payload, fetched_at, processed_at, processing_error
             FROM staged_jobs
             WHERE processed_at IS NULL AND processing_error IS NULL
             ORDER BY fetched_at ASC
             LIMIT ?1",
        )
        .map_err(map_sql_error)?;

    let rows = stmt
        .query_map(params![usize_to_i64(limit)], map_staged_row)
        .map_err(map_sql_error)?;

    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sql_error)
}

fn upsert_job(conn: &Connection, job: &Job) -> Result<()> {
    conn.execute(
        "INSERT INTO jobs (external_id, job_number, customer_id, status, completed_on,
                           total, created_on, modified_on, last_synced_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(external_id) DO UPDATE SET
             job_number = excluded.job_number,
             customer_id = excluded.customer_id,
             status = excluded.status,
             completed_on = excluded.completed_on,
             total = excluded.total,
             created_on = excluded.created_on,
             modified_on = excluded.modified_on,
             last_synced_at = excluded.last_synced_at",
        params![
            job.external_id,
            job.job_number,
            job.customer_id,
            job.status,
            job.completed_on,
            job.total,
            job.created_on,
            job.modified_on,
            job.last_synced_at,
        ],
    )
    .map_err(map_sql_error)?;

    Ok(())
}

fn query_ids_modified_since(conn: &Connection, cutoff: i64) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare(
            "SELECT external_id FROM jobs WHERE modified_on >= ?1 ORDER BY modified_on ASC",
        )
        .map_err(map_sql_error)?;

    let rows =
        stmt.query_map(params![cutoff], |row| row.get::<_, String>(0)).map_err(map_sql_error)?;

    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sql_error)
}

fn recompute_job_counts(conn: &Connection) -> Result<usize> {
    let updated = conn
        .execute(
            "UPDATE customers SET job_count = (
                 SELECT COUNT(*) FROM jobs
                 WHERE jobs.customer_id = customers.external_id
                   AND jobs.status = 'Completed'
                   AND jobs.completed_on IS NOT NULL
             )",
            [],
        )
        .map_err(map_sql_error)?;

    Ok(updated)
}

fn map_staged_row(row: &Row<'_>) -> rusqlite::Result<StagedJob> {
    Ok(StagedJob {
        job_id: row.get(0)?,
        raw_payload: row.get(1)?,
        fetched_at: row.get(2)?,
        processed_at: row.get(3)?,
        processing_error: row.get(4)?,
    })
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

fn usize_to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    async fn setup_repository() -> (SqliteJobRepository, Arc<DbManager>, TempDir) {
        let temp_dir = TempDir::new().expect("temp dir created");
        let db_path = temp_dir.path().join("jobs.db");

        let manager = Arc::new(DbManager::new(&db_path, 4).expect("db manager created"));
        manager.run_migrations().expect("migrations run");

        let repo = SqliteJobRepository::new(Arc::clone(&manager));
        (repo, manager, temp_dir)
    }

    fn sample_job(id: &str, customer_id: &str, modified_on: i64) -> Job {
        Job {
            external_id: id.to_string(),
            job_number: format!("J-{id}"),
            customer_id: customer_id.to_string(),
            status: "Completed".into(),
            completed_on: Some(modified_on),
            total: 199_00,
            created_on: modified_on - 3600,
            modified_on,
            last_synced_at: modified_on + 60,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn staging_same_job_id_keeps_single_row_with_latest_payload() {
        let (repo, manager, _dir) = setup_repository().await;

        repo.stage_job("job-1", r#"{"v":1}"#, 100).await.expect("first stage");
        repo.stage_job("job-1", r#"{"v":2}"#, 200).await.expect("second stage");

        let conn = manager.get_connection().expect("connection");
        let (count, payload): (i64, String) = conn
            .query_row("SELECT COUNT(*), MAX(raw_payload) FROM staged_jobs", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .expect("staging query");

        assert_eq!(count, 1);
        assert_eq!(payload, r#"{"v":2}"#);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn restaging_clears_processing_error() {
        let (repo, _manager, _dir) = setup_repository().await;

        repo.stage_job("job-1", r#"{"v":1}"#, 100).await.expect("stage");
        repo.mark_staged_failed("job-1", "bad timestamp").await.expect("mark failed");
        assert!(repo.unprocessed_staged_jobs(10).await.expect("select").is_empty());

        repo.stage_job("job-1", r#"{"v":2}"#, 200).await.expect("restage");
        let pending = repo.unprocessed_staged_jobs(10).await.expect("select");
        assert_eq!(pending.len(), 1);
        assert!(pending[0].processing_error.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn processed_rows_are_not_selected() {
        let (repo, _manager, _dir) = setup_repository().await;

        repo.stage_job("job-1", "{}", 100).await.expect("stage");
        repo.mark_staged_processed("job-1", 150).await.expect("mark processed");

        assert!(repo.unprocessed_staged_jobs(10).await.expect("select").is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn job_upsert_is_idempotent() {
        let (repo, manager, _dir) = setup_repository().await;

        let mut job = sample_job("job-1", "cust-1", 1_000);
        repo.upsert_job(&job).await.expect("first upsert");
        job.total = 250_00;
        repo.upsert_job(&job).await.expect("second upsert");

        let conn = manager.get_connection().expect("connection");
        let (count, total): (i64, i64) = conn
            .query_row("SELECT COUNT(*), MAX(total) FROM jobs", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .expect("jobs query");

        assert_eq!(count, 1);
        assert_eq!(total, 250_00);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn recompute_counts_only_completed_jobs_with_completion_date() {
        let (repo, manager, _dir) = setup_repository().await;

        {
            let conn = manager.get_connection().expect("connection");
            conn.execute(
                "INSERT INTO customers (external_id, name, active, last_synced_at)
                 VALUES ('cust-1', 'Jane', 1, 0)",
                [],
            )
            .expect("customer row");
        }

        repo.upsert_job(&sample_job("job-1", "cust-1", 1_000)).await.expect("completed job");

        let mut in_progress = sample_job("job-2", "cust-1", 2_000);
        in_progress.status = "Scheduled".into();
        in_progress.completed_on = None;
        repo.upsert_job(&in_progress).await.expect("scheduled job");

        let updated = repo.recompute_customer_job_counts().await.expect("recompute");
        assert_eq!(updated, 1);

        let conn = manager.get_connection().expect("connection");
        let count: i64 = conn
            .query_row("SELECT job_count FROM customers WHERE external_id = 'cust-1'", [], |row| {
                row.get(0)
            })
            .expect("count query");
        assert_eq!(count, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn modified_since_filters_on_cutoff() {
        let (repo, _manager, _dir) = setup_repository().await;

        repo.upsert_job(&sample_job("job-old", "cust-1", 1_000)).await.expect("old");
        repo.upsert_job(&sample_job("job-new", "cust-1", 5_000)).await.expect("new");

        let ids = repo.job_ids_modified_since(2_000).await.expect("select");
        assert_eq!(ids, vec!["job-new".to_string()]);
    }
}
