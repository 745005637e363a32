//! SQLite-backed webhook failure retry queue.
//!
//! Rows move `pending -> processed` or `pending -> dead_letter`, never back.
//! Failed attempts reschedule with exponential backoff until the attempt
//! budget is spent, at which point the row stops being selected and waits
//! for manual intervention.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use fieldsync_core::WebhookFailureStore;
use fieldsync_domain::{FieldSyncError, Result, WebhookFailure, WebhookFailureStatus};
use rusqlite::{params, Connection, Row};
use tokio::task;

use super::manager::DbManager;
use crate::errors::InfraError;

const BASE_RETRY_DELAY_SECS: i64 = 60;
const MAX_RETRY_DELAY_SECS: i64 = 3600;

/// Retry delay for the given attempt number with +/-10% jitter so a burst of
/// failures does not reschedule onto the same instant.
pub fn calculate_backoff_secs(attempt_count: i64) -> i64 {
    let exponent = attempt_count.clamp(0, 10) as u32;
    let base = BASE_RETRY_DELAY_SECS
        .saturating_mul(1_i64 << exponent)
        .min(MAX_RETRY_DELAY_SECS);

    let jitter = ((rand::random::<f64>() * 0.2) - 0.1) * base as f64;
    (base as f64 + jitter).max(1.0) as i64
}

/// SQLite webhook failure repository.
pub struct SqliteWebhookFailureRepository {
    db: Arc<DbManager>,
}

impl SqliteWebhookFailureRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl WebhookFailureStore for SqliteWebhookFailureRepository {
    async fn enqueue(&self, failure: &WebhookFailure) -> Result<()> {
        let db = Arc::clone(&self.db);
        let failure = failure.clone();

        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            insert_failure(&conn, &failure)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn due_batch(&self, now: i64, limit: usize) -> Result<Vec<WebhookFailure>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> Result<Vec<WebhookFailure>> {
            let conn = db.get_connection()?;
            query_due_batch(&conn, now, limit)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn mark_processed(&self, id: &str, processed_at: i64) -> Result<()> {
        let db = Arc::clone(&self.db);
        let id = id.to_string();

        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            let updated = conn
                .execute(
                    "UPDATE webhook_failures
                     SET status = 'processed', processed_at = ?2, next_retry_at = NULL
                     WHERE id = ?1 AND status = 'pending'",
                    params![id, processed_at],
                )
                .map_err(map_sql_error)?;

            if updated == 0 {
                return Err(FieldSyncError::NotFound(format!(
                    "no pending webhook failure with id {id}"
                )));
            }
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn record_attempt_failure(&self, id: &str, error: &str, now: i64) -> Result<()> {
        let db = Arc::clone(&self.db);
        let id = id.to_string();
        let error = error.to_string();

        task::spawn_blocking(move || -> Result<()> {
            let mut conn = db.get_connection()?;
            record_attempt_failure(&mut conn, &id, &error, now)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn dead_letter(&self, id: &str, error: &str) -> Result<()> {
        let db = Arc::clone(&self.db);
        let id = id.to_string();
        let error = error.to_string();

        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            let updated = conn
                .execute(
                    "UPDATE webhook_failures
                     SET status = 'dead_letter', last_error = ?2, next_retry_at = NULL
                     WHERE id = ?1 AND status = 'pending'",
                    params![id, error],
                )
                .map_err(map_sql_error)?;

            if updated == 0 {
                return Err(FieldSyncError::NotFound(format!(
                    "no pending webhook failure with id {id}"
                )));
            }
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }
}

// ============================================================================
// SQL Operations (synchronous)
// ============================================================================

fn insert_failure(conn: &Connection, failure: &WebhookFailure) -> Result<()> {
    conn.execute(
        "INSERT INTO webhook_failures
             (id, webhook_type, event, payload_json, headers_json, signature,
              attempt_count, max_attempts, next_retry_at, status, last_error,
              created_at, processed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            failure.id,
            failure.webhook_type,
            failure.event,
            failure.payload_json,
            failure.headers_json,
            failure.signature,
            failure.attempt_count,
            failure.max_attempts,
            failure.next_retry_at,
            failure.status.to_string(),
            failure.last_error,
            failure.created_at,
            failure.processed_at,
        ],
    )
    .map_err(map_sql_error)?;

    Ok(())
}

fn query_due_batch(conn: &Connection, now: i64, limit: usize) -> Result<Vec<WebhookFailure>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, webhook_type, event, payload_json, headers_json, signature,
                    attempt_count, max_attempts, next_retry_at, status, last_error,
                    created_at, processed_at
             FROM webhook_failures
             WHERE status = 'pending' AND next_retry_at IS NOT NULL AND next_retry_at <= ?1
             ORDER BY next_retry_at ASC, created_at ASC
             LIMIT ?2",
        )
        .map_err(map_sql_error)?;

    let rows = stmt
        .query_map(params![now, limit as i64], map_failure_row)
        .map_err(map_sql_error)?;

    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sql_error)
}

// Read-modify-write inside one transaction so the attempt counter cannot be
// double-incremented by overlapping sweeps.
fn record_attempt_failure(
    conn: &mut Connection,
    id: &str,
    error: &str,
    now: i64,
) -> Result<()> {
    let tx = conn.transaction().map_err(map_sql_error)?;

    let (attempt_count, max_attempts): (i64, i64) = tx
        .query_row(
            "SELECT attempt_count, max_attempts FROM webhook_failures
             WHERE id = ?1 AND status = 'pending'",
            params![id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                FieldSyncError::NotFound(format!("no pending webhook failure with id {id}"))
            }
            other => map_sql_error(other),
        })?;

    let next_attempt = attempt_count + 1;

    if next_attempt >= max_attempts {
        tx.execute(
            "UPDATE webhook_failures
             SET attempt_count = ?2, last_error = ?3, status = 'dead_letter',
                 next_retry_at = NULL
             WHERE id = ?1",
            params![id, next_attempt, error],
        )
        .map_err(map_sql_error)?;
    } else {
        let next_retry_at = now + calculate_backoff_secs(next_attempt);
        tx.execute(
            "UPDATE webhook_failures
             SET attempt_count = ?2, last_error = ?3, next_retry_at = ?4
             WHERE id = ?1",
            params![id, next_attempt, error, next_retry_at],
        )
        .map_err(map_sql_error)?;
    }

    tx.commit().map_err(map_sql_error)
}

fn map_failure_row(row: &Row<'_>) -> rusqlite::Result<WebhookFailure> {
    let status_text: String = row.get(9)?;
    let status = WebhookFailureStatus::from_str(&status_text).map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            9,
            rusqlite::types::Type::Text,
            format!("unknown webhook status: {status_text}").into(),
        )
    })?;

    Ok(WebhookFailure {
        id: row.get(0)?,
        webhook_type: row.get(1)?,
        event: row.get(2)?,
        payload_json: row.get(3)?,
        headers_json: row.get(4)?,
        signature: row.get(5)?,
        attempt_count: row.get(6)?,
        max_attempts: row.get(7)?,
        next_retry_at: row.get(8)?,
        status,
        last_error: row.get(10)?,
        created_at: row.get(11)?,
        processed_at: row.get(12)?,
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

// ============================================================================
// Tests
// ============================================================================
