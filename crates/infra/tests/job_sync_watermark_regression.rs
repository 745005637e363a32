//! Regression tests for the incremental job sync cursor.
//!
//! A mid-run platform failure must leave the watermark at the last fully
//! completed batch so the failed window is redelivered, and redelivery must
//! be idempotent at the row level.

mod support;

use std::sync::Arc;

use fieldsync_core::{HeartbeatSink, WatermarkStore};
use fieldsync_domain::constants::JOBS_SYNC_TYPE;
use fieldsync_infra::database::{SqliteJobRepository, SqliteWatermarkRepository};
use fieldsync_infra::sync::JobSyncEngine;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use support::{test_client, TestDatabase};

const PAGE_ONE_MODIFIED: i64 = 1_714_557_600; // 2024-05-01T10:00:00Z
const PAGE_TWO_MODIFIED: i64 = 1_714_561_200; // 2024-05-01T11:00:00Z
const RERUN_MODIFIED: i64 = 1_714_564_800; // 2024-05-01T12:00:00Z

struct NoopHeartbeat;

impl HeartbeatSink for NoopHeartbeat {
    fn beat(&self) {}
}

fn job_payload(id: &str, modified_on: &str) -> serde_json::Value {
    json!({
        "id": id,
        "jobNumber": format!("J-{id}"),
        "customerId": "c1",
        "status": "Scheduled",
        "completedOn": null,
        "total": 100.0,
        "createdOn": "2024-04-01T09:00:00Z",
        "modifiedOn": modified_on
    })
}

fn engine_for(server: &MockServer, db: &TestDatabase) -> JobSyncEngine {
    let jobs = Arc::new(SqliteJobRepository::new(db.manager.clone()));
    let watermarks = Arc::new(SqliteWatermarkRepository::new(db.manager.clone()));
    JobSyncEngine::new(test_client(&server.uri()), jobs, watermarks, Arc::new(NoopHeartbeat), 100)
}

async fn mount_page(server: &MockServer, page: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/tenant/tenant-1/jobs"))
        .and(query_param("page", page))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn mid_run_failure_leaves_cursor_at_last_completed_batch() {
    let db = TestDatabase::new();
    let server = MockServer::start().await;

    mount_page(
        &server,
        "1",
        json!({
            "data": [
                job_payload("j1", "2024-05-01T10:00:00Z"),
                job_payload("j2", "2024-05-01T10:00:00Z"),
            ],
            "hasMore": true
        }),
    )
    .await;
    mount_page(
        &server,
        "2",
        json!({
            "data": [job_payload("j3", "2024-05-01T11:00:00Z")],
            "hasMore": true
        }),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/tenant/tenant-1/jobs"))
        .and(query_param("page", "3"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;

    let engine = engine_for(&server, &db);
    engine.sync_all_jobs().await.expect_err("page 3 failure should surface");

    let watermarks = SqliteWatermarkRepository::new(db.manager.clone());
    let mark = watermarks
        .get_watermark(JOBS_SYNC_TYPE)
        .await
        .expect("watermark query")
        .expect("watermark row exists after failed run");

    assert_eq!(mark.last_modified_on_fetched, Some(PAGE_TWO_MODIFIED));
    assert_eq!(mark.last_successful_sync_at, None);
    assert!(mark.last_error.is_some());
    assert!(mark.last_error_at.is_some());

    // Pages one and two still landed.
    assert_eq!(db.query_i64("SELECT COUNT(*) FROM jobs"), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn rerun_redelivers_failed_window_idempotently() {
    let db = TestDatabase::new();

    // First run fails on page 2 leaving the cursor at the page-1 batch.
    let first = MockServer::start().await;
    mount_page(
        &first,
        "1",
        json!({
            "data": [
                job_payload("j1", "2024-05-01T10:00:00Z"),
                job_payload("j2", "2024-05-01T11:00:00Z"),
            ],
            "hasMore": true
        }),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/tenant/tenant-1/jobs"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&first)
        .await;

    engine_for(&first, &db).sync_all_jobs().await.expect_err("first run fails");
    drop(first);

    // Second run resumes from the persisted cursor. The platform redelivers
    // j2 (at-least-once) together with a newer job.
    let second = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tenant/tenant-1/jobs"))
        .and(query_param("page", "1"))
        .and(query_param("modifiedOnOrAfter", "2024-05-01T11:00:00+00:00"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                job_payload("j2", "2024-05-01T11:00:00Z"),
                job_payload("j4", "2024-05-01T12:00:00Z"),
            ],
            "hasMore": false
        })))
        .expect(1)
        .mount(&second)
        .await;

    let report = engine_for(&second, &db).sync_all_jobs().await.expect("rerun succeeds");
    assert_eq!(report.records_processed, 2);

    let watermarks = SqliteWatermarkRepository::new(db.manager.clone());
    let mark = watermarks
        .get_watermark(JOBS_SYNC_TYPE)
        .await
        .expect("watermark query")
        .expect("watermark row");

    assert_eq!(mark.last_modified_on_fetched, Some(RERUN_MODIFIED));
    assert!(mark.last_successful_sync_at.is_some());
    assert_eq!(mark.last_error, None);
    assert_eq!(mark.last_error_at, None);

    // j2 was redelivered but upserted in place, not duplicated.
    assert_eq!(db.query_i64("SELECT COUNT(*) FROM jobs"), 3);
    assert_eq!(db.query_i64("SELECT COUNT(*) FROM staged_jobs WHERE job_id = 'j2'"), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn successful_run_records_cursor_and_counts() {
    let db = TestDatabase::new();
    let server = MockServer::start().await;

    mount_page(
        &server,
        "1",
        json!({
            "data": [
                job_payload("j1", "2024-05-01T10:00:00Z"),
                job_payload("j2", "2024-05-01T11:00:00Z"),
            ],
            "hasMore": false
        }),
    )
    .await;

    let report = engine_for(&server, &db).sync_all_jobs().await.expect("sync succeeds");
    assert_eq!(report.records_processed, 2);

    let watermarks = SqliteWatermarkRepository::new(db.manager.clone());
    let mark = watermarks
        .get_watermark(JOBS_SYNC_TYPE)
        .await
        .expect("watermark query")
        .expect("watermark row");

    assert_eq!(mark.last_modified_on_fetched, Some(PAGE_TWO_MODIFIED));
    assert_eq!(mark.records_processed, 2);
    assert!(mark.last_error.is_none());
    assert!(mark.last_modified_on_fetched.unwrap() > PAGE_ONE_MODIFIED);
}
