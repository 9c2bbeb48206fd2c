//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{credits, generations, health, users, webhooks};
use crate::state::AppState;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## Users (JWT auth)
/// - `PUT /v1/users/me` - Create/update profile from sign-in claims
/// - `GET /v1/users/me` - Get current user's profile
///
/// ## Credits (JWT auth)
/// - `GET /v1/credits/balance` - Get current balance
/// - `GET /v1/credits/transactions` - List the ledger
///
/// ## Generations (JWT auth)
/// - `POST /v1/generations` - Dispatch a generation
/// - `GET /v1/generations` - List jobs
/// - `GET /v1/generations/latest` - Latest image and video jobs
/// - `GET /v1/generations/:id` - Poll one job
///
/// ## Internal (Service API Key auth)
/// - `POST /v1/internal/jobs/:id/result` - Reconcile a worker result
///
/// ## Webhooks (Signature verification)
/// - `POST /webhooks/payments` - Payment provider events
pub fn create_router(state: AppState) -> Router {
    // Extract config values before moving state
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    Router::new()
        // Health (public)
        .route("/health", get(health::health))
        // Users
        .route(
            "/v1/users/me",
            put(users::upsert_me).get(users::get_me),
        )
        // Credits
        .route("/v1/credits/balance", get(credits::get_balance))
        .route("/v1/credits/transactions", get(credits::list_transactions))
        // Generations
        .route(
            "/v1/generations",
            post(generations::create_generation).get(generations::list_generations),
        )
        .route(
            "/v1/generations/latest",
            get(generations::latest_generations),
        )
        .route("/v1/generations/:id", get(generations::get_generation))
        // Internal (service auth)
        .route(
            "/v1/internal/jobs/:id/result",
            post(generations::reconcile_job),
        )
        // Webhooks
        .route("/webhooks/payments", post(webhooks::payment_webhook))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
