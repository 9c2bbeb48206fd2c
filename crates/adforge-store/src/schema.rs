//! Database schema definitions and column families.
//!
//! This module defines the column families used in `RocksDB` storage.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Primary user records, keyed by `user_id`.
    pub const USERS: &str = "users";

    /// Generation jobs, keyed by `job_id` (ULID).
    pub const JOBS: &str = "jobs";

    /// Index: jobs by owner, keyed by `user_id || job_id`.
    /// Value is empty (index only).
    pub const JOBS_BY_USER: &str = "jobs_by_user";

    /// Ledger transactions, keyed by `transaction_id` (ULID).
    pub const TRANSACTIONS: &str = "transactions";

    /// Index: transactions by user, keyed by `user_id || transaction_id`.
    /// Value is empty (index only).
    pub const TRANSACTIONS_BY_USER: &str = "transactions_by_user";

    /// Purchase idempotency keys, keyed by the provider's purchase id.
    /// Value is the transaction id that recorded the credit.
    pub const PURCHASES: &str = "purchases";

    /// Refund idempotency keys, keyed by `job_id`.
    /// Value is the transaction id that recorded the refund.
    pub const REFUNDS: &str = "refunds";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::USERS,
        cf::JOBS,
        cf::JOBS_BY_USER,
        cf::TRANSACTIONS,
        cf::TRANSACTIONS_BY_USER,
        cf::PURCHASES,
        cf::REFUNDS,
    ]
}
