//! Generation dispatch, polling, and result reconciliation handlers.
//!
//! Dispatch is debit-before-handoff: the debit and the pending job are
//! committed atomically, then the job is enqueued with the external
//! worker. A failed enqueue is compensated immediately (fail + refund)
//! so a caller never pays for a job no worker will ever run.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use adforge_core::{GenerationJob, JobId, JobKind, MediaRef};
use adforge_store::{Store, StoreError};

use crate::auth::{AuthUser, ServiceAuth};
use crate::error::ApiError;
use crate::state::AppState;
use crate::worker::WorkerJob;

const MAX_PROMPT_CHARS: usize = 2000;
const MAX_STYLES: usize = 5;

/// Generation request.
#[derive(Debug, Deserialize)]
pub struct CreateGenerationRequest {
    /// Image or video.
    pub kind: JobKind,
    /// Creative brief.
    pub prompt: String,
    /// Visual style tags folded into the worker prompt.
    #[serde(default)]
    pub styles: Vec<String>,
    /// Blob references to the uploaded source media.
    pub input_refs: Vec<String>,
}

/// Generation job response.
#[derive(Debug, Serialize)]
pub struct JobResponse {
    /// Job ID.
    pub id: String,
    /// Image or video.
    pub kind: JobKind,
    /// Lifecycle state.
    pub status: String,
    /// Creative brief.
    pub prompt: String,
    /// Style tags.
    pub styles: Vec<String>,
    /// Resolved output URL, set on completion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_url: Option<String>,
    /// Failure detail, set on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Credits debited for this job.
    pub cost: i64,
    /// Creation timestamp.
    pub created_at: String,
    /// Terminal timestamp, if terminal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
}

impl JobResponse {
    fn from_job(job: &GenerationJob, state: &AppState) -> Self {
        Self {
            id: job.id.to_string(),
            kind: job.kind,
            status: format!("{:?}", job.status).to_lowercase(),
            prompt: job.prompt.clone(),
            styles: job.styles.clone(),
            output_url: job.output_ref.as_ref().map(|r| state.config.media_url(r)),
            error_message: job.error_message.clone(),
            cost: job.cost,
            created_at: job.created_at.to_rfc3339(),
            finished_at: job.finished_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// Response for a freshly dispatched generation.
#[derive(Debug, Serialize)]
pub struct CreateGenerationResponse {
    /// The pending job.
    pub job: JobResponse,
    /// Balance after the debit.
    pub balance: i64,
}

fn validate_request(request: &CreateGenerationRequest) -> Result<(), ApiError> {
    let prompt = request.prompt.trim();
    if prompt.is_empty() {
        return Err(ApiError::BadRequest("prompt must not be empty".into()));
    }
    if prompt.chars().count() > MAX_PROMPT_CHARS {
        return Err(ApiError::BadRequest(format!(
            "prompt exceeds {MAX_PROMPT_CHARS} characters"
        )));
    }
    if request.styles.len() > MAX_STYLES {
        return Err(ApiError::BadRequest(format!(
            "at most {MAX_STYLES} styles allowed"
        )));
    }

    let (min_inputs, max_inputs) = request.kind.input_bounds();
    let count = request.input_refs.len();
    if count < min_inputs || count > max_inputs {
        return Err(ApiError::BadRequest(format!(
            "{:?} generation requires between {min_inputs} and {max_inputs} input refs, got {count}",
            request.kind
        )));
    }
    if request.input_refs.iter().any(|r| r.trim().is_empty()) {
        return Err(ApiError::BadRequest("input refs must not be empty".into()));
    }

    Ok(())
}

/// Dispatch a generation: debit, create the pending job, hand off to
/// the worker.
pub async fn create_generation(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(request): Json<CreateGenerationRequest>,
) -> Result<(StatusCode, Json<CreateGenerationResponse>), ApiError> {
    validate_request(&request)?;

    let cost = state.config.pricing.generation_cost(request.kind);
    let input_refs = request.input_refs.iter().map(MediaRef::new).collect();

    let job = GenerationJob::new(
        auth.user_id,
        request.kind,
        request.prompt.trim().to_string(),
        request.styles,
        input_refs,
        cost,
    );

    // Debit and pending record land atomically; on error nothing exists.
    let balance = state.store.dispatch_job(&job)?;

    tracing::info!(
        job_id = %job.id,
        user_id = %auth.user_id,
        kind = ?request.kind,
        cost,
        balance,
        "Generation dispatched"
    );

    // Hand off to the worker. On failure, compensate: the job flips to
    // failed and the debit is refunded before the caller sees an error.
    if let Err(err) = state.worker.submit(WorkerJob::from(&job)).await {
        tracing::error!(job_id = %job.id, error = %err, "Worker handoff failed, compensating");

        match state
            .store
            .fail_job(&job.id, &format!("worker handoff failed: {err}"))
        {
            Ok(failed) => {
                tracing::info!(
                    job_id = %job.id,
                    balance = failed.balance,
                    "Handoff compensation applied"
                );
            }
            Err(StoreError::InvalidJobState { .. }) => {
                // A racing reconciliation settled the job first.
                tracing::warn!(job_id = %job.id, "Job settled before compensation");
            }
            Err(compensation_err) => return Err(compensation_err.into()),
        }

        return Err(ApiError::Internal(format!(
            "generation worker unavailable: {err}"
        )));
    }

    Ok((
        StatusCode::CREATED,
        Json(CreateGenerationResponse {
            job: JobResponse::from_job(&job, &state),
            balance,
        }),
    ))
}

/// Get one of the calling user's jobs by ID.
pub async fn get_generation(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(job_id): Path<String>,
) -> Result<Json<JobResponse>, ApiError> {
    let job_id: JobId = job_id
        .parse()
        .map_err(|_| ApiError::BadRequest("invalid job id".into()))?;

    let job = state
        .store
        .get_job(&job_id)?
        // Another user's job reads as absent, not forbidden.
        .filter(|job| job.owner_id == auth.user_id)
        .ok_or_else(|| ApiError::NotFound("job not found".into()))?;

    Ok(Json(JobResponse::from_job(&job, &state)))
}

/// Job list query parameters.
#[derive(Debug, Deserialize)]
pub struct ListGenerationsQuery {
    /// Maximum number of jobs to return (default: 20).
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Offset for pagination (default: 0).
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    20
}

/// Job list response.
#[derive(Debug, Serialize)]
pub struct ListGenerationsResponse {
    /// Jobs (newest first).
    pub jobs: Vec<JobResponse>,
    /// Whether there are more jobs.
    pub has_more: bool,
}

/// List the calling user's jobs, newest first.
pub async fn list_generations(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(query): Query<ListGenerationsQuery>,
) -> Result<Json<ListGenerationsResponse>, ApiError> {
    let limit = query.limit.min(100);
    let jobs = state
        .store
        .list_jobs_by_user(&auth.user_id, limit + 1, query.offset)?;

    let has_more = jobs.len() > limit;
    let jobs: Vec<_> = jobs
        .iter()
        .take(limit)
        .map(|job| JobResponse::from_job(job, &state))
        .collect();

    Ok(Json(ListGenerationsResponse { jobs, has_more }))
}

/// Latest creations response: the newest job of each kind.
#[derive(Debug, Serialize)]
pub struct LatestGenerationsResponse {
    /// The user's most recent image job, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<JobResponse>,
    /// The user's most recent video job, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<JobResponse>,
}

/// Get the calling user's latest image and video jobs.
pub async fn latest_generations(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<LatestGenerationsResponse>, ApiError> {
    let image = state
        .store
        .latest_job_of_kind(&auth.user_id, JobKind::Image)?;
    let video = state
        .store
        .latest_job_of_kind(&auth.user_id, JobKind::Video)?;

    Ok(Json(LatestGenerationsResponse {
        image: image.map(|job| JobResponse::from_job(&job, &state)),
        video: video.map(|job| JobResponse::from_job(&job, &state)),
    }))
}

/// Result payload delivered by the worker's harness.
#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobResultRequest {
    /// The worker produced an output.
    Success {
        /// Blob reference to the generated creative.
        output_ref: String,
    },
    /// The worker gave up on the job.
    Failure {
        /// Human-readable failure detail.
        error: String,
    },
}

/// Reconciliation response.
#[derive(Debug, Serialize)]
pub struct JobResultResponse {
    /// False when this delivery was a duplicate and changed nothing.
    pub applied: bool,
    /// The job's (possibly pre-existing) terminal status.
    pub status: String,
}

/// Reconcile a worker result into the job record.
///
/// Delivery is at-least-once: a duplicate for an already-terminal job
/// is logged and acknowledged so the worker's harness stops retrying.
pub async fn reconcile_job(
    State(state): State<Arc<AppState>>,
    service: ServiceAuth,
    Path(job_id): Path<String>,
    Json(request): Json<JobResultRequest>,
) -> Result<Json<JobResultResponse>, ApiError> {
    let job_id: JobId = job_id
        .parse()
        .map_err(|_| ApiError::BadRequest("invalid job id".into()))?;

    let outcome = match &request {
        JobResultRequest::Success { output_ref } => {
            if output_ref.trim().is_empty() {
                return Err(ApiError::BadRequest("output_ref must not be empty".into()));
            }
            state
                .store
                .complete_job(&job_id, MediaRef::new(output_ref))
                .map(|job| job.status)
        }
        JobResultRequest::Failure { error } => state
            .store
            .fail_job(&job_id, error)
            .map(|failed| failed.job.status),
    };

    match outcome {
        Ok(status) => {
            tracing::info!(
                job_id = %job_id,
                status = ?status,
                service = %service.service_name,
                "Job result reconciled"
            );
            Ok(Json(JobResultResponse {
                applied: true,
                status: format!("{status:?}").to_lowercase(),
            }))
        }
        Err(StoreError::InvalidJobState { status, .. }) => {
            tracing::warn!(
                job_id = %job_id,
                status = ?status,
                "Duplicate result delivery for settled job"
            );
            Ok(Json(JobResultResponse {
                applied: false,
                status: format!("{status:?}").to_lowercase(),
            }))
        }
        Err(err) => Err(err.into()),
    }
}
