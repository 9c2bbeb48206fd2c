//! Ledger transaction types.
//!
//! Every balance change appends exactly one transaction, so the sum of
//! all deltas for a user always equals the current balance. Purchase
//! transactions carry the payment provider's purchase identifier as an
//! idempotency key; refund transactions are keyed by the job they
//! compensate so a job refunds at most once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{JobId, TransactionId, UserId};

/// Why a balance changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionReason {
    /// Credits debited to fund a generation job.
    JobDebit,

    /// Credits returned because a funded job failed.
    JobRefund,

    /// Credits purchased through the payment provider.
    Purchase,
}

impl TransactionReason {
    /// Check if this reason adds credits (positive delta).
    #[must_use]
    pub const fn is_credit(&self) -> bool {
        matches!(self, Self::JobRefund | Self::Purchase)
    }

    /// Check if this reason removes credits (negative delta).
    #[must_use]
    pub const fn is_debit(&self) -> bool {
        matches!(self, Self::JobDebit)
    }
}

/// A ledger transaction representing one balance change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerTransaction {
    /// Unique transaction ID (ULID for time-ordering).
    pub id: TransactionId,

    /// The user whose balance was affected.
    pub user_id: UserId,

    /// Signed change in credits. Positive = credit, negative = debit.
    pub delta: i64,

    /// Why the balance changed.
    pub reason: TransactionReason,

    /// The job this debit funded or this refund compensates.
    pub related_job: Option<JobId>,

    /// The payment provider's purchase identifier (idempotency key).
    pub purchase_id: Option<String>,

    /// Balance after this transaction was applied.
    pub balance_after: i64,

    /// When the transaction was created.
    pub created_at: DateTime<Utc>,
}

impl LedgerTransaction {
    /// Create a debit transaction funding a job.
    #[must_use]
    pub fn job_debit(user_id: UserId, amount: i64, balance_after: i64, job_id: JobId) -> Self {
        Self {
            id: TransactionId::generate(),
            user_id,
            delta: -amount.abs(),
            reason: TransactionReason::JobDebit,
            related_job: Some(job_id),
            purchase_id: None,
            balance_after,
            created_at: Utc::now(),
        }
    }

    /// Create a refund transaction for a failed job.
    #[must_use]
    pub fn job_refund(user_id: UserId, amount: i64, balance_after: i64, job_id: JobId) -> Self {
        Self {
            id: TransactionId::generate(),
            user_id,
            delta: amount.abs(),
            reason: TransactionReason::JobRefund,
            related_job: Some(job_id),
            purchase_id: None,
            balance_after,
            created_at: Utc::now(),
        }
    }

    /// Create a purchase transaction keyed by the provider's purchase id.
    #[must_use]
    pub fn purchase(
        user_id: UserId,
        amount: i64,
        balance_after: i64,
        purchase_id: String,
    ) -> Self {
        Self {
            id: TransactionId::generate(),
            user_id,
            delta: amount.abs(),
            reason: TransactionReason::Purchase,
            related_job: None,
            purchase_id: Some(purchase_id),
            balance_after,
            created_at: Utc::now(),
        }
    }
}
