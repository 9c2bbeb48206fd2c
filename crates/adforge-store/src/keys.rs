//! Key encoding utilities for `RocksDB`.
//!
//! User keys are the raw UUID bytes; job and transaction keys are raw
//! ULID bytes, so index keys of the form `user_id || ulid` sort
//! chronologically within a user's prefix.

use adforge_core::{JobId, TransactionId, UserId};

/// Create a user key from a user ID.
#[must_use]
pub fn user_key(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Create a job key from a job ID.
#[must_use]
pub fn job_key(job_id: &JobId) -> Vec<u8> {
    job_id.to_bytes().to_vec()
}

/// Create an owner-job index key.
///
/// Format: `user_id (16 bytes) || job_id (16 bytes)`.
#[must_use]
pub fn user_job_key(user_id: &UserId, job_id: &JobId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(user_id.as_bytes());
    key.extend_from_slice(&job_id.to_bytes());
    key
}

/// Create a transaction key from a transaction ID.
#[must_use]
pub fn transaction_key(transaction_id: &TransactionId) -> Vec<u8> {
    transaction_id.to_bytes().to_vec()
}

/// Create a user-transaction index key.
///
/// Format: `user_id (16 bytes) || transaction_id (16 bytes)`.
#[must_use]
pub fn user_transaction_key(user_id: &UserId, transaction_id: &TransactionId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(user_id.as_bytes());
    key.extend_from_slice(&transaction_id.to_bytes());
    key
}

/// Create a prefix for iterating a user's index entries.
#[must_use]
pub fn user_prefix(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Extract the trailing ULID bytes from a 32-byte index key.
///
/// # Panics
///
/// Panics if the key is not at least 32 bytes.
#[must_use]
pub fn extract_index_ulid(key: &[u8]) -> [u8; 16] {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&key[16..32]);
    bytes
}

/// Create a purchase idempotency key from the provider's purchase id.
#[must_use]
pub fn purchase_key(purchase_id: &str) -> Vec<u8> {
    purchase_id.as_bytes().to_vec()
}

/// Create a refund idempotency key from a job ID.
#[must_use]
pub fn refund_key(job_id: &JobId) -> Vec<u8> {
    job_id.to_bytes().to_vec()
}
