//! Core domain types for adforge.
//!
//! This crate defines the credit ledger, generation job, and user types
//! shared by the storage and service layers. It contains no I/O: every
//! invariant (overdraft protection, the job state machine, idempotency
//! keys) is expressed as plain data and transition methods so the store
//! can enforce them atomically.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod ids;
pub mod job;
pub mod ledger;
pub mod media;
pub mod pricing;
pub mod user;

pub use ids::{IdError, JobId, TransactionId, UserId};
pub use job::{GenerationJob, JobKind, JobStateError, JobStatus};
pub use ledger::{LedgerTransaction, TransactionReason};
pub use media::MediaRef;
pub use pricing::{PriceTier, PricingConfig};
pub use user::User;
