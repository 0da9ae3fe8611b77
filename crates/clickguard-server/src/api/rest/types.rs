//! REST API type definitions

use crate::error::ServerError;
use clickguard_sdk::{
    Caller, EventSubmission, IngestResponse, ReviewAction, TrackingPipeline, VerificationStatus,
};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::Arc;

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<TrackingPipeline>,
    /// Bearer token for review and admin routes; open when unset
    pub admin_token: Option<Arc<str>>,
    /// Peers whose `X-Forwarded-For` header is honored
    pub trusted_proxies: Arc<[IpAddr]>,
}

impl AppState {
    pub fn new(pipeline: Arc<TrackingPipeline>) -> Self {
        Self {
            pipeline,
            admin_token: None,
            trusted_proxies: Arc::from(Vec::new()),
        }
    }

    pub fn with_admin_token(mut self, token: impl Into<Arc<str>>) -> Self {
        self.admin_token = Some(token.into());
        self
    }

    pub fn with_trusted_proxies(mut self, proxies: impl Into<Vec<IpAddr>>) -> Self {
        self.trusted_proxies = Arc::from(proxies.into());
        self
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackType {
    Click,
    Conversion,
}

/// Tracking request body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackRequest {
    #[serde(default)]
    pub affiliate_id: String,
    #[serde(default)]
    pub campaign_id: String,
    #[serde(rename = "type")]
    pub kind: TrackType,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub referrer: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub client_fingerprint: Option<String>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

impl TrackRequest {
    /// Combine the body with what the transport knows about the client.
    ///
    /// A user agent in the body wins over the request header.
    pub fn into_submission(
        self,
        client_ip: String,
        header_user_agent: Option<String>,
        caller: Caller,
    ) -> Result<EventSubmission, ServerError> {
        let mut submission = match self.kind {
            TrackType::Click => {
                EventSubmission::click(self.affiliate_id, self.campaign_id, client_ip)
            }
            TrackType::Conversion => {
                let amount = self.amount.ok_or_else(|| {
                    ServerError::InvalidRequest("conversion requires an amount".to_string())
                })?;
                EventSubmission::conversion(self.affiliate_id, self.campaign_id, client_ip, amount)
            }
        };
        if let (TrackType::Click, Some(referrer)) = (self.kind, self.referrer) {
            submission = submission.with_referrer(referrer);
        }
        if let Some(user_agent) = self.user_agent.or(header_user_agent) {
            submission = submission.with_user_agent(user_agent);
        }
        submission.session_id = self.session_id;
        submission.client_fingerprint = self.client_fingerprint;
        submission.idempotency_key = self.idempotency_key;
        Ok(submission.with_caller(caller))
    }
}

/// Tracking response
///
/// `riskScore` sums every triggered heuristic, amount exposure included.
/// Rejection (403) is decided on blocking heuristics alone, so an accepted
/// event can report a high or even maximal `riskScore`; `status` and
/// `requiresReview` carry the outcome.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackResponse {
    pub success: bool,
    pub event_id: String,
    pub risk_score: u8,
    pub status: VerificationStatus,
    pub requires_review: bool,
}

impl From<IngestResponse> for TrackResponse {
    fn from(response: IngestResponse) -> Self {
        Self {
            success: response.accepted,
            event_id: response.event_id,
            risk_score: response.risk_score,
            status: response.status,
            requires_review: response.requires_manual_review,
        }
    }
}

/// Manual verification request body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub action: ReviewAction,
    #[serde(default)]
    pub reviewer_id: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub success: bool,
    /// False when the event already held the requested status
    pub changed: bool,
}

#[derive(Debug, Deserialize)]
pub struct BlacklistRequest {
    pub identifier: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlacklistResponse {
    pub success: bool,
    pub hashed_identifier: String,
}

#[derive(Debug, Serialize)]
pub struct UnblockResponse {
    pub success: bool,
    pub removed: usize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FraudReportQuery {
    #[serde(default)]
    pub window_hours: Option<i64>,
}
