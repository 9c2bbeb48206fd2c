//! `RocksDB` storage layer for adforge.
//!
//! This crate owns the durable state behind the credit ledger and the
//! generation-job lifecycle. All balance mutations are compound
//! operations: they check invariants (overdraft, idempotency, terminal
//! job state) under a per-user lock and commit through a single
//! `WriteBatch`, so readers only ever observe consistent records.
//!
//! # Column families
//!
//! - `users`: user records, keyed by `user_id`
//! - `jobs` / `jobs_by_user`: generation jobs and the owner index
//! - `transactions` / `transactions_by_user`: the append-only ledger
//! - `purchases`: purchase idempotency keys (provider purchase id)
//! - `refunds`: refund idempotency keys (job id)

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod locks;
pub mod rocks;
pub mod schema;

pub use error::{Result, StoreError};
pub use rocks::RocksStore;

use chrono::{DateTime, Utc};

use adforge_core::{
    GenerationJob, JobId, JobKind, LedgerTransaction, MediaRef, TransactionId, User, UserId,
};

/// Outcome of an idempotent credit operation.
#[derive(Debug, Clone)]
pub struct CreditOutcome {
    /// Balance after the credit was (first) applied.
    pub balance: i64,
    /// The ledger transaction recording the credit.
    pub transaction_id: TransactionId,
    /// True if the purchase id had already been processed and this
    /// call was a no-op returning the prior result.
    pub replayed: bool,
}

/// Outcome of failing a job, including the chained refund.
#[derive(Debug, Clone)]
pub struct FailedJob {
    /// The job in its terminal `failed` state.
    pub job: GenerationJob,
    /// The owner's balance after the refund.
    pub balance: i64,
    /// The refund transaction, if one was written by this call.
    pub refund: Option<TransactionId>,
}

/// The storage trait defining all database operations.
///
/// This abstracts the storage layer so tests and alternative backends
/// can substitute implementations.
pub trait Store: Send + Sync {
    // =========================================================================
    // User Operations
    // =========================================================================

    /// Insert or update a user record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_user(&self, user: &User) -> Result<()>;

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_user(&self, user_id: &UserId) -> Result<Option<User>>;

    // =========================================================================
    // Job Queries
    // =========================================================================

    /// Get a job by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_job(&self, job_id: &JobId) -> Result<Option<GenerationJob>>;

    /// List a user's jobs, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_jobs_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<GenerationJob>>;

    /// The user's most recent job of the given kind, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn latest_job_of_kind(&self, user_id: &UserId, kind: JobKind)
        -> Result<Option<GenerationJob>>;

    /// Jobs still `pending` that were created before `cutoff`.
    ///
    /// Used by the reaper to fail-and-refund jobs whose worker never
    /// called back.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_stale_pending_jobs(&self, cutoff: DateTime<Utc>) -> Result<Vec<GenerationJob>>;

    // =========================================================================
    // Ledger Queries
    // =========================================================================

    /// Get a ledger transaction by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_transaction(&self, transaction_id: &TransactionId)
        -> Result<Option<LedgerTransaction>>;

    /// List a user's ledger transactions, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_transactions_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<LedgerTransaction>>;

    // =========================================================================
    // Compound Operations
    // =========================================================================

    /// Debit the owner for `job.cost` and create the pending job record
    /// in one atomic write.
    ///
    /// Returns the owner's balance after the debit. On any error the
    /// job record does not exist and the balance is unchanged.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the owner doesn't exist.
    /// - `StoreError::InsufficientCredits` if the balance is too low.
    /// - `StoreError::InvalidAmount` if the cost is not positive.
    fn dispatch_job(&self, job: &GenerationJob) -> Result<i64>;

    /// Credit a user from a completed purchase, exactly once per
    /// purchase id.
    ///
    /// A replayed purchase id is a no-op that returns the previously
    /// recorded outcome.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the user doesn't exist.
    /// - `StoreError::InvalidAmount` if the amount is not positive.
    fn credit_purchase(
        &self,
        user_id: &UserId,
        amount: i64,
        purchase_id: &str,
    ) -> Result<CreditOutcome>;

    /// Transition a job `pending -> completed` with its output.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the job doesn't exist.
    /// - `StoreError::InvalidJobState` if the job is already terminal;
    ///   the record is unchanged.
    fn complete_job(&self, job_id: &JobId, output_ref: MediaRef) -> Result<GenerationJob>;

    /// Transition a job `pending -> failed` and refund its debit, in
    /// one atomic write.
    ///
    /// The refund is idempotent per job: if one was already recorded,
    /// no second refund transaction is written.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the job doesn't exist.
    /// - `StoreError::InvalidJobState` if the job is already terminal;
    ///   the record and the ledger are unchanged.
    fn fail_job(&self, job_id: &JobId, error_message: &str) -> Result<FailedJob>;
}
