//! HTTP service for the adforge credit ledger and generation jobs.
//!
//! Exposes the dispatch, polling, ledger, reconciliation, and payment
//! webhook endpoints over axum, plus the background reaper that times
//! out pending jobs whose worker never called back.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod auth;
pub mod config;
pub mod crypto;
pub mod error;
pub mod handlers;
pub mod reaper;
pub mod routes;
pub mod state;
pub mod worker;

pub use config::ServiceConfig;
pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
