//! `RocksDB` storage implementation.
//!
//! Compound operations acquire the owner's lock from [`UserLocks`],
//! re-read state under that lock, and commit every mutation through a
//! single `WriteBatch`. That gives single-writer-per-user semantics for
//! the ledger and ensures a reader never sees a half-written terminal
//! job or a debit without its transaction record.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, IteratorMode, MultiThreaded,
    Options, WriteBatch,
};

use adforge_core::{
    GenerationJob, JobId, JobKind, JobStatus, LedgerTransaction, MediaRef, TransactionId, User,
    UserId,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::locks::{acquire, UserLocks};
use crate::schema::{all_column_families, cf};
use crate::{CreditOutcome, FailedJob, Store};

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    locks: UserLocks,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self {
            db: Arc::new(db),
            locks: UserLocks::new(),
        })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn write(&self, batch: WriteBatch) -> Result<()> {
        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn must_get_user(&self, user_id: &UserId) -> Result<User> {
        self.get_user(user_id)?
            .ok_or(StoreError::NotFound { entity: "user" })
    }

    fn must_get_job(&self, job_id: &JobId) -> Result<GenerationJob> {
        self.get_job(job_id)?
            .ok_or(StoreError::NotFound { entity: "job" })
    }

    /// Collect ULIDs from a user-prefixed index, newest first.
    fn index_ulids_desc(&self, cf_name: &str, user_id: &UserId) -> Result<Vec<[u8; 16]>> {
        let cf = self.cf(cf_name)?;
        let prefix = keys::user_prefix(user_id);

        let iter = self.db.iterator_cf(
            &cf,
            IteratorMode::From(&prefix, rocksdb::Direction::Forward),
        );

        let mut ulids = Vec::new();
        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            ulids.push(keys::extract_index_ulid(&key));
        }

        // ULIDs within a prefix are time-ordered; flip to newest first.
        ulids.reverse();
        Ok(ulids)
    }

    /// Append a transaction plus its user index entry to a batch.
    fn batch_transaction(
        &self,
        batch: &mut WriteBatch,
        transaction: &LedgerTransaction,
    ) -> Result<()> {
        let cf_tx = self.cf(cf::TRANSACTIONS)?;
        let cf_by_user = self.cf(cf::TRANSACTIONS_BY_USER)?;

        let value = Self::serialize(transaction)?;
        batch.put_cf(&cf_tx, keys::transaction_key(&transaction.id), &value);
        batch.put_cf(
            &cf_by_user,
            keys::user_transaction_key(&transaction.user_id, &transaction.id),
            [],
        );
        Ok(())
    }
}

impl Store for RocksStore {
    // =========================================================================
    // User Operations
    // =========================================================================

    fn put_user(&self, user: &User) -> Result<()> {
        let cf = self.cf(cf::USERS)?;
        let value = Self::serialize(user)?;
        self.db
            .put_cf(&cf, keys::user_key(&user.id), value)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn get_user(&self, user_id: &UserId) -> Result<Option<User>> {
        let cf = self.cf(cf::USERS)?;
        self.db
            .get_cf(&cf, keys::user_key(user_id))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    // =========================================================================
    // Job Queries
    // =========================================================================

    fn get_job(&self, job_id: &JobId) -> Result<Option<GenerationJob>> {
        let cf = self.cf(cf::JOBS)?;
        self.db
            .get_cf(&cf, keys::job_key(job_id))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn list_jobs_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<GenerationJob>> {
        let ulids = self.index_ulids_desc(cf::JOBS_BY_USER, user_id)?;

        let mut jobs = Vec::new();
        for bytes in ulids.into_iter().skip(offset) {
            if jobs.len() >= limit {
                break;
            }
            let job_id = JobId::from_bytes(bytes)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            if let Some(job) = self.get_job(&job_id)? {
                jobs.push(job);
            }
        }
        Ok(jobs)
    }

    fn latest_job_of_kind(
        &self,
        user_id: &UserId,
        kind: JobKind,
    ) -> Result<Option<GenerationJob>> {
        let ulids = self.index_ulids_desc(cf::JOBS_BY_USER, user_id)?;

        for bytes in ulids {
            let job_id = JobId::from_bytes(bytes)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            if let Some(job) = self.get_job(&job_id)? {
                if job.kind == kind {
                    return Ok(Some(job));
                }
            }
        }
        Ok(None)
    }

    fn list_stale_pending_jobs(&self, cutoff: DateTime<Utc>) -> Result<Vec<GenerationJob>> {
        let cf = self.cf(cf::JOBS)?;
        let iter = self.db.iterator_cf(&cf, IteratorMode::Start);

        let mut stale = Vec::new();
        for item in iter {
            let (_, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            let job: GenerationJob = Self::deserialize(&value)?;
            if job.status == JobStatus::Pending && job.created_at < cutoff {
                stale.push(job);
            }
        }
        Ok(stale)
    }

    // =========================================================================
    // Ledger Queries
    // =========================================================================

    fn get_transaction(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<Option<LedgerTransaction>> {
        let cf = self.cf(cf::TRANSACTIONS)?;
        self.db
            .get_cf(&cf, keys::transaction_key(transaction_id))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn list_transactions_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<LedgerTransaction>> {
        let ulids = self.index_ulids_desc(cf::TRANSACTIONS_BY_USER, user_id)?;

        let mut transactions = Vec::new();
        for bytes in ulids.into_iter().skip(offset) {
            if transactions.len() >= limit {
                break;
            }
            let tx_id = TransactionId::from_bytes(bytes)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            if let Some(tx) = self.get_transaction(&tx_id)? {
                transactions.push(tx);
            }
        }
        Ok(transactions)
    }

    // =========================================================================
    // Compound Operations
    // =========================================================================

    fn dispatch_job(&self, job: &GenerationJob) -> Result<i64> {
        if job.cost <= 0 {
            return Err(StoreError::InvalidAmount(job.cost));
        }

        let lock = self.locks.for_user(&job.owner_id);
        let _guard = acquire(&lock);

        let mut user = self.must_get_user(&job.owner_id)?;
        if user.credit_balance < job.cost {
            return Err(StoreError::InsufficientCredits {
                balance: user.credit_balance,
                required: job.cost,
            });
        }

        user.credit_balance -= job.cost;
        user.updated_at = Utc::now();

        let tx =
            LedgerTransaction::job_debit(job.owner_id, job.cost, user.credit_balance, job.id);

        let cf_users = self.cf(cf::USERS)?;
        let cf_jobs = self.cf(cf::JOBS)?;
        let cf_jobs_by_user = self.cf(cf::JOBS_BY_USER)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_users, keys::user_key(&user.id), Self::serialize(&user)?);
        batch.put_cf(&cf_jobs, keys::job_key(&job.id), Self::serialize(job)?);
        batch.put_cf(&cf_jobs_by_user, keys::user_job_key(&job.owner_id, &job.id), []);
        self.batch_transaction(&mut batch, &tx)?;
        self.write(batch)?;

        Ok(user.credit_balance)
    }

    fn credit_purchase(
        &self,
        user_id: &UserId,
        amount: i64,
        purchase_id: &str,
    ) -> Result<CreditOutcome> {
        if amount <= 0 {
            return Err(StoreError::InvalidAmount(amount));
        }

        let lock = self.locks.for_user(user_id);
        let _guard = acquire(&lock);

        // Replay check: a purchase id credits at most once.
        let cf_purchases = self.cf(cf::PURCHASES)?;
        if let Some(prior) = self
            .db
            .get_cf(&cf_purchases, keys::purchase_key(purchase_id))
            .map_err(|e| StoreError::Database(e.to_string()))?
        {
            let bytes: [u8; 16] = prior.as_slice().try_into().map_err(|_| {
                StoreError::Serialization("malformed purchase index entry".into())
            })?;
            let tx_id = TransactionId::from_bytes(bytes)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            let tx = self
                .get_transaction(&tx_id)?
                .ok_or(StoreError::NotFound { entity: "transaction" })?;

            return Ok(CreditOutcome {
                balance: tx.balance_after,
                transaction_id: tx_id,
                replayed: true,
            });
        }

        let mut user = self.must_get_user(user_id)?;
        user.credit_balance += amount;
        user.updated_at = Utc::now();

        let tx = LedgerTransaction::purchase(
            *user_id,
            amount,
            user.credit_balance,
            purchase_id.to_string(),
        );

        let cf_users = self.cf(cf::USERS)?;
        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_users, keys::user_key(user_id), Self::serialize(&user)?);
        batch.put_cf(
            &cf_purchases,
            keys::purchase_key(purchase_id),
            tx.id.to_bytes(),
        );
        self.batch_transaction(&mut batch, &tx)?;
        self.write(batch)?;

        Ok(CreditOutcome {
            balance: user.credit_balance,
            transaction_id: tx.id,
            replayed: false,
        })
    }

    fn complete_job(&self, job_id: &JobId, output_ref: MediaRef) -> Result<GenerationJob> {
        let peek = self.must_get_job(job_id)?;

        let lock = self.locks.for_user(&peek.owner_id);
        let _guard = acquire(&lock);

        // Re-read under the lock so a racing fail/complete is seen.
        let mut job = self.must_get_job(job_id)?;
        job.complete(output_ref)?;

        let cf_jobs = self.cf(cf::JOBS)?;
        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_jobs, keys::job_key(job_id), Self::serialize(&job)?);
        self.write(batch)?;

        Ok(job)
    }

    fn fail_job(&self, job_id: &JobId, error_message: &str) -> Result<FailedJob> {
        let peek = self.must_get_job(job_id)?;

        let lock = self.locks.for_user(&peek.owner_id);
        let _guard = acquire(&lock);

        // Re-read under the lock so a racing reconciler/reaper call
        // hits the terminal guard instead of double-refunding.
        let mut job = self.must_get_job(job_id)?;
        job.fail(error_message.to_string())?;

        let mut user = self.must_get_user(&job.owner_id)?;

        // Refund at most once per job.
        let cf_refunds = self.cf(cf::REFUNDS)?;
        let already_refunded = self
            .db
            .get_cf(&cf_refunds, keys::refund_key(job_id))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .is_some();

        let cf_jobs = self.cf(cf::JOBS)?;
        let cf_users = self.cf(cf::USERS)?;
        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_jobs, keys::job_key(job_id), Self::serialize(&job)?);

        let refund = if already_refunded || job.cost <= 0 {
            None
        } else {
            user.credit_balance += job.cost;
            user.updated_at = Utc::now();

            let tx = LedgerTransaction::job_refund(
                job.owner_id,
                job.cost,
                user.credit_balance,
                job.id,
            );
            batch.put_cf(&cf_users, keys::user_key(&user.id), Self::serialize(&user)?);
            batch.put_cf(&cf_refunds, keys::refund_key(job_id), tx.id.to_bytes());
            self.batch_transaction(&mut batch, &tx)?;
            Some(tx.id)
        };

        self.write(batch)?;

        Ok(FailedJob {
            job,
            balance: user.credit_balance,
            refund,
        })
    }
}
