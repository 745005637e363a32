//! SQLite-backed sync watermark repository.
//!
//! One row per sync type. The cursor column (`last_modified_on_fetched`)
//! never regresses: saves keep the maximum of the stored and offered values
//! so a stale writer cannot move an incremental window backwards.

use std::sync::Arc;

use async_trait::async_trait;
use fieldsync_core::WatermarkStore;
use fieldsync_domain::{FieldSyncError, Result, SyncWatermark};
use rusqlite::{params, Connection, Row};
use tokio::task;

use super::manager::DbManager;
use crate::errors::InfraError;

/// SQLite watermark repository.
pub struct SqliteWatermarkRepository {
    db: Arc<DbManager>,
}

impl SqliteWatermarkRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl WatermarkStore for SqliteWatermarkRepository {
    async fn get_watermark(&self, sync_type: &str) -> Result<Option<SyncWatermark>> {
        let db = Arc::clone(&self.db);
        let sync_type = sync_type.to_string();

        task::spawn_blocking(move || -> Result<Option<SyncWatermark>> {
            let conn = db.get_connection()?;
            query_watermark(&conn, &sync_type)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn save_watermark(&self, watermark: &SyncWatermark) -> Result<()> {
        let db = Arc::clone(&self.db);
        let watermark = watermark.clone();

        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            save_watermark(&conn, &watermark)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn record_sync_error(&self, sync_type: &str, error: &str, at: i64) -> Result<()> {
        let db = Arc::clone(&self.db);
        let sync_type = sync_type.to_string();
        let error = error.to_string();

        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            conn.execute(
                "INSERT INTO sync_watermarks (sync_type, last_error, last_error_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(sync_type) DO UPDATE SET
                     last_error = excluded.last_error,
                     last_error_at = excluded.last_error_at",
                params![sync_type, error, at],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }
}

// ============================================================================
// SQL Operations (synchronous)
// ============================================================================

fn query_watermark(conn: &Connection, sync_type: &str) -> Result<Option<SyncWatermark>> {
    let result = conn.query_row(
        "SELECT sync_type, last_successful_sync_at, last_modified_on_fetched,
                records_processed, last_error, last_error_at
         FROM sync_watermarks WHERE sync_type = ?1",
        params![sync_type],
        map_watermark_row,
    );

    match result {
        Ok(watermark) => Ok(Some(watermark)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(map_sql_error(e)),
    }
}

fn save_watermark(conn: &Connection, watermark: &SyncWatermark) -> Result<()> {
    conn.execute(
        "INSERT INTO sync_watermarks (sync_type, last_successful_sync_at,
                                      last_modified_on_fetched, records_processed,
                                      last_error, last_error_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(sync_type) DO UPDATE SET
             last_successful_sync_at = excluded.last_successful_sync_at,
             last_modified_on_fetched = MAX(
                 COALESCE(sync_watermarks.last_modified_on_fetched, 0),
                 COALESCE(excluded.last_modified_on_fetched, 0)
             ),
             records_processed = excluded.records_processed,
             last_error = excluded.last_error,
             last_error_at = excluded.last_error_at",
        params![
            watermark.sync_type,
            watermark.last_successful_sync_at,
            watermark.last_modified_on_fetched,
            watermark.records_processed,
            watermark.last_error,
            watermark.last_error_at,
        ],
    )
    .map_err(map_sql_error)?;

    Ok(())
}

fn map_watermark_row(row: &Row<'_>) -> rusqlite::Result<SyncWatermark> {
    Ok(SyncWatermark {
        sync_type: row.get(0)?,
        last_successful_sync_at: row.get(1)?,
        last_modified_on_fetched: row.get(2)?,
        records_processed: row.get(3)?,
        last_error: row.get(4)?,
        last_error_at: row.get(5)?,
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
