//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{events, health, webhooks};
use crate::state::AppState;

/// Maximum concurrent requests from the front end. Automatic fulfillment
/// holds a request open for minutes, so this bounds in-flight orders too.
const API_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## Front end (Service API Key auth)
/// - `POST /v1/events` - Handle a user or admin action
/// - `GET /v1/outbox` - Take queued notifications
///
/// ## Webhooks (Signature verification)
/// - `POST /webhooks/cryptopay` - Crypto Pay webhooks
pub fn create_router(state: AppState) -> Router {
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let state = Arc::new(state);

    let api_routes = Router::new()
        .route("/events", post(events::post_event))
        .route("/outbox", get(events::poll_outbox))
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS));

    Router::new()
        .route("/health", get(health::health))
        .nest("/v1", api_routes)
        .route("/webhooks/cryptopay", post(webhooks::cryptopay_webhook))
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}
