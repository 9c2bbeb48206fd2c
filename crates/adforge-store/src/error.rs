//! Error types for adforge storage.

use adforge_core::{JobId, JobStateError, JobStatus};

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Record not found.
    #[error("{entity} not found")]
    NotFound {
        /// Which kind of record was missing.
        entity: &'static str,
    },

    /// Insufficient credits for a debit.
    #[error("insufficient credits: balance={balance}, required={required}")]
    InsufficientCredits {
        /// Current balance in credits.
        balance: i64,
        /// Required amount in credits.
        required: i64,
    },

    /// A terminal job was asked to transition again.
    #[error("invalid job state: job {job_id} is already {status:?}")]
    InvalidJobState {
        /// The job whose transition was rejected.
        job_id: JobId,
        /// The terminal status it already holds.
        status: JobStatus,
    },

    /// A debit or credit amount was zero or negative.
    #[error("invalid amount: {0}")]
    InvalidAmount(i64),
}

impl From<JobStateError> for StoreError {
    fn from(err: JobStateError) -> Self {
        Self::InvalidJobState {
            job_id: err.job_id,
            status: err.status,
        }
    }
}
