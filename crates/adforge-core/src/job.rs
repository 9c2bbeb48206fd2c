//! Generation job records and their state machine.
//!
//! A job moves `pending -> completed` or `pending -> failed`, exactly
//! once, never backward. The transition methods here are the only way
//! to reach a terminal state, so every storage path inherits the guard.
//! Duplicate reconciliation callbacks are expected (the external worker
//! has no exactly-once delivery guarantee); they surface as
//! `JobStateError` and callers log and swallow them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{JobId, MediaRef, UserId};

/// What kind of creative the job produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// A still ad image composed from 1-2 product photos.
    Image,
    /// A short ad video animated from exactly one source image.
    Video,
}

impl JobKind {
    /// Permitted number of input media references for this kind.
    #[must_use]
    pub const fn input_bounds(self) -> (usize, usize) {
        match self {
            Self::Image => (1, 2),
            Self::Video => (1, 1),
        }
    }
}

/// Lifecycle state of a generation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Dispatched to the worker, result not yet reconciled.
    Pending,
    /// Worker produced an output; `output_ref` is set.
    Completed,
    /// Worker reported an error or the handoff failed; refunded.
    Failed,
}

impl JobStatus {
    /// Whether this status is terminal.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Attempted an invalid state transition on a job.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("job {job_id} is already {status:?}, cannot transition")]
pub struct JobStateError {
    /// The job whose transition was rejected.
    pub job_id: JobId,
    /// The terminal status the job already holds.
    pub status: JobStatus,
}

/// One request to the external generation worker and its durable record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationJob {
    /// Unique job ID (ULID for time-ordering).
    pub id: JobId,

    /// The user who requested and paid for the generation.
    pub owner_id: UserId,

    /// Image or video generation.
    pub kind: JobKind,

    /// Current lifecycle state.
    pub status: JobStatus,

    /// The creative brief sent to the worker.
    pub prompt: String,

    /// Visual style tags folded into the worker prompt.
    pub styles: Vec<String>,

    /// Uploaded source media (1-2 refs for images, exactly 1 for video).
    pub input_refs: Vec<MediaRef>,

    /// Generated output, set on completion.
    pub output_ref: Option<MediaRef>,

    /// Failure detail, set on failure.
    pub error_message: Option<String>,

    /// Credits debited when the job was dispatched.
    pub cost: i64,

    /// When the job was created.
    pub created_at: DateTime<Utc>,

    /// When the job reached a terminal state.
    pub finished_at: Option<DateTime<Utc>>,
}

impl GenerationJob {
    /// Create a new pending job.
    #[must_use]
    pub fn new(
        owner_id: UserId,
        kind: JobKind,
        prompt: String,
        styles: Vec<String>,
        input_refs: Vec<MediaRef>,
        cost: i64,
    ) -> Self {
        Self {
            id: JobId::generate(),
            owner_id,
            kind,
            status: JobStatus::Pending,
            prompt,
            styles,
            input_refs,
            output_ref: None,
            error_message: None,
            cost,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Transition `pending -> completed`, recording the output.
    ///
    /// # Errors
    ///
    /// Returns `JobStateError` if the job is already terminal. The
    /// record is left untouched in that case.
    pub fn complete(&mut self, output_ref: MediaRef) -> Result<(), JobStateError> {
        self.guard_pending()?;
        self.status = JobStatus::Completed;
        self.output_ref = Some(output_ref);
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    /// Transition `pending -> failed`, recording the error message.
    ///
    /// The credit refund is chained by the caller; this method only
    /// owns the status transition.
    ///
    /// # Errors
    ///
    /// Returns `JobStateError` if the job is already terminal. The
    /// record is left untouched in that case.
    pub fn fail(&mut self, error_message: String) -> Result<(), JobStateError> {
        self.guard_pending()?;
        self.status = JobStatus::Failed;
        self.error_message = Some(error_message);
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    fn guard_pending(&self) -> Result<(), JobStateError> {
        if self.status.is_terminal() {
            return Err(JobStateError {
                job_id: self.id,
                status: self.status,
            });
        }
        Ok(())
    }

    /// The prompt text handed to the worker, with style tags appended.
    #[must_use]
    pub fn worker_prompt(&self) -> String {
        if self.styles.is_empty() {
            self.prompt.clone()
        } else {
            format!("{} [styles: {}]", self.prompt, self.styles.join(", "))
        }
    }
}
