//! Generation dispatch, polling, and reconciliation integration tests.

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;
use common::TestHarness;
use serde_json::json;

use adforge_core::JobStatus;
use adforge_service::reaper;
use adforge_service::worker::{GenerationWorker, WorkerError, WorkerJob};
use adforge_store::Store;

/// A worker whose queue is down: every handoff fails.
struct FailingWorker;

#[async_trait]
impl GenerationWorker for FailingWorker {
    async fn submit(&self, _job: WorkerJob) -> Result<(), WorkerError> {
        Err(WorkerError::Request("connection refused".into()))
    }
}

async fn dispatch_image(harness: &TestHarness) -> String {
    let response = harness
        .server
        .post("/v1/generations")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({
            "kind": "image",
            "prompt": "hero shot on marble",
            "styles": ["minimal", "bright"],
            "input_refs": ["blob/in-1"]
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json::<serde_json::Value>()["job"]["id"]
        .as_str()
        .unwrap()
        .to_string()
}

// ============================================================================
// Dispatch
// ============================================================================

#[tokio::test]
async fn dispatch_debits_and_returns_pending_job() {
    let harness = TestHarness::new();
    harness.seed_test_user(50);

    let response = harness
        .server
        .post("/v1/generations")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({
            "kind": "video",
            "prompt": "rotate the bottle slowly",
            "input_refs": ["blob/in-1"]
        }))
        .await;

    response.assert_status(StatusCode::CREATED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["job"]["status"], "pending");
    assert_eq!(body["job"]["kind"], "video");
    assert_eq!(body["job"]["cost"], 25);
    assert_eq!(body["balance"], 25);
    assert_eq!(harness.balance(), 25);
}

#[tokio::test]
async fn dispatch_with_insufficient_credits_creates_nothing() {
    let harness = TestHarness::new();
    harness.seed_test_user(3); // image costs 5

    let response = harness
        .server
        .post("/v1/generations")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({
            "kind": "image",
            "prompt": "hero shot",
            "input_refs": ["blob/in-1"]
        }))
        .await;

    response.assert_status(StatusCode::PAYMENT_REQUIRED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "insufficient_credits");
    assert_eq!(body["error"]["details"]["balance"], 3);
    assert_eq!(body["error"]["details"]["required"], 5);

    assert_eq!(harness.balance(), 3);
    let jobs = harness
        .store
        .list_jobs_by_user(&harness.test_user_id, 10, 0)
        .unwrap();
    assert!(jobs.is_empty());
}

#[tokio::test]
async fn dispatch_validates_input_ref_count() {
    let harness = TestHarness::new();
    harness.seed_test_user(100);

    // Video takes exactly one input.
    let response = harness
        .server
        .post("/v1/generations")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({
            "kind": "video",
            "prompt": "rotate",
            "input_refs": ["blob/in-1", "blob/in-2"]
        }))
        .await;
    response.assert_status_bad_request();

    // Image takes at most two.
    let response = harness
        .server
        .post("/v1/generations")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({
            "kind": "image",
            "prompt": "hero shot",
            "input_refs": ["blob/1", "blob/2", "blob/3"]
        }))
        .await;
    response.assert_status_bad_request();

    // Validation failures never touch the balance.
    assert_eq!(harness.balance(), 100);
}

#[tokio::test]
async fn dispatch_rejects_empty_prompt() {
    let harness = TestHarness::new();
    harness.seed_test_user(100);

    let response = harness
        .server
        .post("/v1/generations")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({
            "kind": "image",
            "prompt": "   ",
            "input_refs": ["blob/in-1"]
        }))
        .await;

    response.assert_status_bad_request();
    assert_eq!(harness.balance(), 100);
}

#[tokio::test]
async fn failed_worker_handoff_refunds_immediately() {
    let harness = TestHarness::with_worker(Arc::new(FailingWorker));
    harness.seed_test_user(50);

    let response = harness
        .server
        .post("/v1/generations")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({
            "kind": "image",
            "prompt": "hero shot",
            "input_refs": ["blob/in-1"]
        }))
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);

    // Compensation: the job is failed and the debit refunded.
    assert_eq!(harness.balance(), 50);
    let jobs = harness
        .store
        .list_jobs_by_user(&harness.test_user_id, 10, 0)
        .unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].status, JobStatus::Failed);
}

// ============================================================================
// Polling
// ============================================================================

#[tokio::test]
async fn get_generation_returns_own_job_only() {
    let harness = TestHarness::new();
    harness.seed_test_user(50);
    let job_id = dispatch_image(&harness).await;

    let response = harness
        .server
        .get(&format!("/v1/generations/{job_id}"))
        .add_header("authorization", harness.user_auth_header())
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "pending");

    // Another user sees 404, not 403.
    let response = harness
        .server
        .get(&format!("/v1/generations/{job_id}"))
        .add_header("authorization", TestHarness::other_user_auth_header())
        .await;
    response.assert_status_not_found();
}

#[tokio::test]
async fn latest_generations_returns_newest_per_kind() {
    let harness = TestHarness::new();
    harness.seed_test_user(100);
    let job_id = dispatch_image(&harness).await;

    let response = harness
        .server
        .get("/v1/generations/latest")
        .add_header("authorization", harness.user_auth_header())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["image"]["id"], job_id);
    assert!(body.get("video").is_none());
}

// ============================================================================
// Reconciliation
// ============================================================================

#[tokio::test]
async fn reconcile_success_completes_job_and_keeps_debit() {
    let harness = TestHarness::new();
    harness.seed_test_user(50);
    let job_id = dispatch_image(&harness).await;

    let response = harness
        .server
        .post(&format!("/v1/internal/jobs/{job_id}/result"))
        .add_header("x-api-key", harness.service_api_key.clone())
        .json(&json!({ "status": "success", "output_ref": "blob/out-1" }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["applied"], true);
    assert_eq!(body["status"], "completed");

    // The creative is visible to the owner, and the debit stands.
    let response = harness
        .server
        .get(&format!("/v1/generations/{job_id}"))
        .add_header("authorization", harness.user_auth_header())
        .await;
    let job: serde_json::Value = response.json();
    assert_eq!(job["status"], "completed");
    assert_eq!(job["output_url"], "http://localhost:8081/media/blob/out-1");
    assert_eq!(harness.balance(), 45);
}

#[tokio::test]
async fn duplicate_result_delivery_is_acknowledged_not_applied() {
    let harness = TestHarness::new();
    harness.seed_test_user(50);
    let job_id = dispatch_image(&harness).await;

    harness
        .server
        .post(&format!("/v1/internal/jobs/{job_id}/result"))
        .add_header("x-api-key", harness.service_api_key.clone())
        .json(&json!({ "status": "success", "output_ref": "blob/out-1" }))
        .await
        .assert_status_ok();

    // The retry delivers a contradictory failure; the terminal record wins.
    let response = harness
        .server
        .post(&format!("/v1/internal/jobs/{job_id}/result"))
        .add_header("x-api-key", harness.service_api_key.clone())
        .json(&json!({ "status": "failure", "error": "timeout" }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["applied"], false);
    assert_eq!(body["status"], "completed");

    // No refund for a completed job.
    assert_eq!(harness.balance(), 45);
}

#[tokio::test]
async fn reconcile_failure_refunds_exactly_once() {
    let harness = TestHarness::new();
    harness.seed_test_user(50);
    let job_id = dispatch_image(&harness).await;

    for _ in 0..2 {
        harness
            .server
            .post(&format!("/v1/internal/jobs/{job_id}/result"))
            .add_header("x-api-key", harness.service_api_key.clone())
            .json(&json!({ "status": "failure", "error": "render crashed" }))
            .await
            .assert_status_ok();
    }

    assert_eq!(harness.balance(), 50);
}

#[tokio::test]
async fn reconcile_requires_service_key() {
    let harness = TestHarness::new();
    harness.seed_test_user(50);
    let job_id = dispatch_image(&harness).await;

    let response = harness
        .server
        .post(&format!("/v1/internal/jobs/{job_id}/result"))
        .add_header("x-api-key", "wrong-key")
        .json(&json!({ "status": "success", "output_ref": "blob/out-1" }))
        .await;
    response.assert_status_unauthorized();

    // A user JWT is not service auth.
    let response = harness
        .server
        .post(&format!("/v1/internal/jobs/{job_id}/result"))
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({ "status": "success", "output_ref": "blob/out-1" }))
        .await;
    response.assert_status_unauthorized();
}

#[tokio::test]
async fn reconcile_unknown_job_is_not_found() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post(&format!(
            "/v1/internal/jobs/{}/result",
            adforge_core::JobId::generate()
        ))
        .add_header("x-api-key", harness.service_api_key.clone())
        .json(&json!({ "status": "success", "output_ref": "blob/out-1" }))
        .await;

    response.assert_status_not_found();
}

// ============================================================================
// Reaper
// ============================================================================

#[tokio::test]
async fn reaper_fails_and_refunds_stale_pending_jobs() {
    // Harness config sets the pending timeout to zero, so every pending
    // job is immediately stale.
    let harness = TestHarness::new();
    harness.seed_test_user(50);
    let job_id = dispatch_image(&harness).await;
    assert_eq!(harness.balance(), 45);

    let reaped = reaper::sweep(&harness.state).unwrap();
    assert_eq!(reaped, 1);

    let job = harness
        .store
        .get_job(&job_id.parse().unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(harness.balance(), 50);

    // A second sweep finds nothing pending.
    assert_eq!(reaper::sweep(&harness.state).unwrap(), 0);
}

#[tokio::test]
async fn reaper_tolerates_out_of_range_timeout() {
    let harness = TestHarness::new();
    harness.seed_test_user(50);
    dispatch_image(&harness).await;

    // A timeout too large for the cutoff arithmetic degrades to
    // "nothing is ever stale" instead of panicking the sweep.
    let mut state = harness.state.clone();
    state.config.pending_job_timeout_seconds = u64::MAX;

    assert_eq!(reaper::sweep(&state).unwrap(), 0);
    assert_eq!(harness.balance(), 45);
}

#[tokio::test]
async fn reaper_skips_settled_jobs() {
    let harness = TestHarness::new();
    harness.seed_test_user(50);
    let job_id = dispatch_image(&harness).await;

    // Settle the job before the sweep.
    harness
        .server
        .post(&format!("/v1/internal/jobs/{job_id}/result"))
        .add_header("x-api-key", harness.service_api_key.clone())
        .json(&json!({ "status": "success", "output_ref": "blob/out-1" }))
        .await
        .assert_status_ok();

    assert_eq!(reaper::sweep(&harness.state).unwrap(), 0);
    assert_eq!(harness.balance(), 45);
}
