//! External generation worker collaborator.
//!
//! The worker is an opaque long-running service: the dispatcher hands
//! it `{job_id, kind, prompt, input_refs}` and it eventually calls the
//! reconciliation endpoint with the outcome. Only the *enqueue* is
//! awaited here; a failed enqueue is surfaced to the dispatcher so it
//! can compensate (fail + refund) instead of leaving the job dangling.

use async_trait::async_trait;
use serde::Serialize;

use adforge_core::{GenerationJob, JobId, JobKind, MediaRef};

/// The handoff payload sent to the worker's enqueue endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerJob {
    /// The job to report results against.
    pub job_id: JobId,
    /// Image or video.
    pub kind: JobKind,
    /// Prompt with style tags folded in.
    pub prompt: String,
    /// Blob-store references to the source media.
    pub input_refs: Vec<MediaRef>,
}

impl From<&GenerationJob> for WorkerJob {
    fn from(job: &GenerationJob) -> Self {
        Self {
            job_id: job.id,
            kind: job.kind,
            prompt: job.worker_prompt(),
            input_refs: job.input_refs.clone(),
        }
    }
}

/// Errors from the worker handoff.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// The enqueue request could not be sent.
    #[error("worker request failed: {0}")]
    Request(String),

    /// The worker rejected the enqueue.
    #[error("worker rejected job with status {0}")]
    Rejected(u16),
}

/// The external generation worker's enqueue interface.
///
/// `submit` returns once the job is accepted by the worker's queue.
/// Execution and result delivery happen out of band, at-least-once,
/// with no latency bound.
#[async_trait]
pub trait GenerationWorker: Send + Sync {
    /// Enqueue a job with the worker.
    ///
    /// # Errors
    ///
    /// Returns a `WorkerError` when the job could not be scheduled.
    /// The caller must compensate (fail + refund); the worker will
    /// never call back for a job it did not accept.
    async fn submit(&self, job: WorkerJob) -> Result<(), WorkerError>;
}

/// HTTP worker client posting handoffs to a configured endpoint.
pub struct HttpWorker {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpWorker {
    /// Create a worker client for the given enqueue endpoint.
    #[must_use]
    pub fn new(endpoint: &str, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.to_string(),
            api_key,
        }
    }
}

#[async_trait]
impl GenerationWorker for HttpWorker {
    async fn submit(&self, job: WorkerJob) -> Result<(), WorkerError> {
        let mut request = self.client.post(&self.endpoint).json(&job);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| WorkerError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(WorkerError::Rejected(response.status().as_u16()));
        }

        tracing::debug!(job_id = %job.job_id, "Job enqueued with worker");
        Ok(())
    }
}

/// Fallback worker used when no worker URL is configured.
///
/// Accepts every handoff and drops it, so jobs stay `pending` until
/// the reaper times them out and refunds. Useful for local development
/// without a worker deployment.
pub struct NullWorker;

#[async_trait]
impl GenerationWorker for NullWorker {
    async fn submit(&self, job: WorkerJob) -> Result<(), WorkerError> {
        tracing::warn!(
            job_id = %job.job_id,
            "No worker configured - job accepted but will never complete"
        );
        Ok(())
    }
}
