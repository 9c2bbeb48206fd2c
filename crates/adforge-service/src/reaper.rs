//! Stale pending-job reaper.
//!
//! The external worker delivers results at-least-once but with no
//! latency bound, and a crashed worker delivers nothing at all. This
//! background task fails-and-refunds jobs that have been `pending`
//! longer than the configured timeout, through the same idempotent
//! paths the reconciler uses, so a racing late result loses cleanly.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use adforge_store::{Store, StoreError};

use crate::state::AppState;

/// Spawn the background reaper loop.
pub fn spawn(state: Arc<AppState>) {
    let interval = Duration::from_secs(state.config.reaper_interval_seconds);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // A missed tick should not trigger a burst of scans.
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            match sweep(&state) {
                Ok(0) => {}
                Ok(reaped) => {
                    tracing::info!(reaped, "Reaped stale pending jobs");
                }
                Err(err) => {
                    tracing::error!(error = %err, "Reaper sweep failed");
                }
            }
        }
    });
}

/// Run one sweep: fail-and-refund every job pending longer than the
/// configured timeout. Returns the number of jobs reaped.
///
/// # Errors
///
/// Returns an error if the stale-job scan itself fails. Per-job
/// failures are logged and skipped so one bad record cannot wedge the
/// sweep.
pub fn sweep(state: &AppState) -> Result<usize, StoreError> {
    // An out-of-range timeout must not panic the loop; it degrades to
    // "nothing is ever stale".
    let timeout = i64::try_from(state.config.pending_job_timeout_seconds)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .unwrap_or(chrono::Duration::MAX);
    let cutoff = Utc::now()
        .checked_sub_signed(timeout)
        .unwrap_or(chrono::DateTime::<Utc>::MIN_UTC);

    let stale = state.store.list_stale_pending_jobs(cutoff)?;
    let mut reaped = 0;

    for job in stale {
        match state
            .store
            .fail_job(&job.id, "generation timed out waiting for the worker")
        {
            Ok(failed) => {
                tracing::warn!(
                    job_id = %job.id,
                    owner_id = %job.owner_id,
                    refunded = failed.refund.is_some(),
                    "Timed out pending job failed and refunded"
                );
                reaped += 1;
            }
            Err(StoreError::InvalidJobState { .. }) => {
                // A result arrived between the scan and the transition.
                tracing::debug!(job_id = %job.id, "Job settled during sweep");
            }
            Err(err) => {
                tracing::error!(job_id = %job.id, error = %err, "Failed to reap job");
            }
        }
    }

    Ok(reaped)
}
