//! API endpoint handlers

use super::extractors::{AdminAuth, ClientContext, JsonExtractor};
use super::types::*;
use crate::error::ServerError;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use clickguard_core::VerificationQueueItem;
use clickguard_runtime::report::MAX_WINDOW_HOURS;
use clickguard_sdk::{AuditLogEntry, Event, FraudReport, RecheckOutcome};
use serde_json::{json, Value};
use tracing::{debug, info};

/// Health check endpoint
pub(super) async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Metrics endpoint (text exposition)
pub(super) async fn metrics(State(state): State<AppState>) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.pipeline.metrics().render(),
    )
        .into_response()
}

/// Click/conversion ingestion
///
/// 200 with [`TrackResponse`] for stored events, 403 with `reasons` when the
/// blocking heuristics reject it. A 200 may carry `riskScore` 100.
#[axum::debug_handler(state = AppState)]
pub(super) async fn track(
    State(state): State<AppState>,
    client: ClientContext,
    JsonExtractor(payload): JsonExtractor<TrackRequest>,
) -> Result<Json<TrackResponse>, ServerError> {
    debug!(
        kind = ?payload.kind,
        affiliate_id = %payload.affiliate_id,
        campaign_id = %payload.campaign_id,
        "Received tracking request"
    );

    let submission = payload.into_submission(client.ip, client.user_agent, client.caller)?;
    let response = state.pipeline.ingest(submission).await?;

    Ok(Json(response.into()))
}

/// Manual verification decision
pub(super) async fn verify_conversion(
    State(state): State<AppState>,
    _auth: AdminAuth,
    Path(event_id): Path<String>,
    JsonExtractor(payload): JsonExtractor<VerifyRequest>,
) -> Result<Json<VerifyResponse>, ServerError> {
    info!(
        event_id = %event_id,
        action = ?payload.action,
        reviewer_id = %payload.reviewer_id,
        "Received verification decision"
    );

    let changed = state
        .pipeline
        .verify_conversion(&event_id, payload.action, &payload.reviewer_id, payload.notes)
        .await?;

    Ok(Json(VerifyResponse {
        success: true,
        changed,
    }))
}

pub(super) async fn get_event(
    State(state): State<AppState>,
    _auth: AdminAuth,
    Path(event_id): Path<String>,
) -> Result<Json<Event>, ServerError> {
    state
        .pipeline
        .event(&event_id)
        .await?
        .map(Json)
        .ok_or_else(|| ServerError::NotFound(format!("event {}", event_id)))
}

pub(super) async fn audit_trail(
    State(state): State<AppState>,
    _auth: AdminAuth,
    Path(event_id): Path<String>,
) -> Result<Json<Vec<AuditLogEntry>>, ServerError> {
    let trail = state.pipeline.audit_trail(&event_id).await?;
    if trail.is_empty() {
        return Err(ServerError::NotFound(format!("event {}", event_id)));
    }
    Ok(Json(trail))
}

/// Claim the most urgent due review item
pub(super) async fn claim_review(
    State(state): State<AppState>,
    _auth: AdminAuth,
) -> Result<Json<Option<VerificationQueueItem>>, ServerError> {
    let item = state.pipeline.claim_next_review().await?;
    if let Some(item) = &item {
        info!(conversion_id = %item.conversion_id, priority = ?item.priority, "Review item claimed");
    }
    Ok(Json(item))
}

/// Run the automated re-check on the next due item
pub(super) async fn recheck(
    State(state): State<AppState>,
    _auth: AdminAuth,
) -> Result<Json<Option<RecheckOutcome>>, ServerError> {
    Ok(Json(state.pipeline.recheck_next().await?))
}

pub(super) async fn block_identifier(
    State(state): State<AppState>,
    _auth: AdminAuth,
    JsonExtractor(payload): JsonExtractor<BlacklistRequest>,
) -> Result<Json<BlacklistResponse>, ServerError> {
    if payload.identifier.trim().is_empty() {
        return Err(ServerError::InvalidRequest(
            "identifier must not be empty".to_string(),
        ));
    }
    let hashed_identifier = state
        .pipeline
        .block_identifier(payload.identifier.trim(), &payload.reason)
        .await?;

    Ok(Json(BlacklistResponse {
        success: true,
        hashed_identifier,
    }))
}

pub(super) async fn unblock_identifier(
    State(state): State<AppState>,
    _auth: AdminAuth,
    Path(hashed_identifier): Path<String>,
) -> Result<Json<UnblockResponse>, ServerError> {
    let removed = state.pipeline.unblock_identifier(&hashed_identifier).await?;
    Ok(Json(UnblockResponse {
        success: true,
        removed,
    }))
}

pub(super) async fn fraud_report(
    State(state): State<AppState>,
    _auth: AdminAuth,
    Path(campaign_id): Path<String>,
    Query(query): Query<FraudReportQuery>,
) -> Result<Json<FraudReport>, ServerError> {
    if let Some(hours) = query.window_hours {
        if !(1..=MAX_WINDOW_HOURS).contains(&hours) {
            return Err(ServerError::InvalidRequest(format!(
                "windowHours must be between 1 and {}",
                MAX_WINDOW_HOURS
            )));
        }
    }
    let report = state
        .pipeline
        .fraud_report(&campaign_id, query.window_hours)
        .await?;
    Ok(Json(report))
}

/// Fallback for unknown routes
pub(super) async fn not_found() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "route not found",
            "status": 404,
        })),
    )
}
