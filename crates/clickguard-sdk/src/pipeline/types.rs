//! Response types for TrackingPipeline

use clickguard_core::{Event, VerificationStatus};
use serde::{Deserialize, Serialize};

/// Result of an accepted ingestion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    pub accepted: bool,
    pub event_id: String,
    /// Composite score including amount exposure; not the rejection gate
    pub risk_score: u8,
    pub status: VerificationStatus,
    pub requires_manual_review: bool,
}

impl IngestResponse {
    pub(crate) fn for_event(event: &Event, requires_manual_review: bool) -> Self {
        Self {
            accepted: true,
            event_id: event.id.clone(),
            risk_score: event.risk_score,
            status: event.status,
            requires_manual_review,
        }
    }
}
