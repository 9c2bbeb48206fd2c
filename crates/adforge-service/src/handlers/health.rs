//! Health check handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use adforge_core::UserId;
use adforge_store::Store;

use crate::state::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: String,
    /// Service name.
    pub service: String,
    /// Service version.
    pub version: String,
    /// Storage backend status.
    pub store: String,
}

/// Health check endpoint.
///
/// Probes the store with a cheap point read so a wedged database
/// surfaces as `degraded` instead of an opaque 500 on the first real
/// request.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let store_ok = state.store.get_user(&UserId::generate()).is_ok();

    Json(HealthResponse {
        status: if store_ok { "ok" } else { "degraded" }.to_string(),
        service: "adforge".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        store: if store_ok { "ok" } else { "unavailable" }.to_string(),
    })
}
