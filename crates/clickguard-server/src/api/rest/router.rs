//! Router creation and configuration

use super::handlers::*;
use super::types::AppState;
use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create REST API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/v1/track", post(track))
        .route("/v1/conversions/:id/verify", post(verify_conversion))
        .route("/v1/events/:id", get(get_event))
        .route("/v1/events/:id/audit", get(audit_trail))
        .route("/v1/queue/claim", post(claim_review))
        .route("/v1/queue/recheck", post(recheck))
        .route("/v1/blacklist", post(block_identifier))
        .route("/v1/blacklist/:hashed", delete(unblock_identifier))
        .route("/v1/campaigns/:id/fraud-report", get(fraud_report))
        .fallback(not_found)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
