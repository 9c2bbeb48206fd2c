//! Per-user write locks.
//!
//! Ledger mutations are read-modify-write on a user's balance, so they
//! must be serialized per user (single-writer-per-user). Jobs for
//! different users, and different users' ledgers, proceed concurrently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use adforge_core::UserId;

/// A table of per-user mutexes.
///
/// Lock entries are created on first use and kept for the lifetime of
/// the store; the set of active users is small relative to memory.
#[derive(Default)]
pub struct UserLocks {
    inner: Mutex<HashMap<uuid::Uuid, Arc<Mutex<()>>>>,
}

impl UserLocks {
    /// Create an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get (or create) the lock for a user.
    ///
    /// Callers hold the returned guard for the duration of a balance
    /// read-modify-write and its `WriteBatch` commit.
    #[must_use]
    pub fn for_user(&self, user_id: &UserId) -> Arc<Mutex<()>> {
        let mut table = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        table
            .entry(*user_id.as_uuid())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Acquire a user lock, recovering from poisoning.
///
/// The guarded critical sections never leave partial state behind (all
/// writes go through a single batch), so a panic while holding the
/// lock does not invalidate the data it protects.
#[must_use]
pub fn acquire(lock: &Mutex<()>) -> MutexGuard<'_, ()> {
    lock.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_user_gets_same_lock() {
        let locks = UserLocks::new();
        let user = UserId::generate();

        let a = locks.for_user(&user);
        let b = locks.for_user(&user);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn different_users_get_different_locks() {
        let locks = UserLocks::new();

        let a = locks.for_user(&UserId::generate());
        let b = locks.for_user(&UserId::generate());
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
