//! Suspicious activity records for investigators
//!
//! Unlike the audit trail, these records carry the raw client context of an
//! event (or of a population-level anomaly) so that investigators can review it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActivityType {
    /// A single event was rejected by the scoring engine
    RejectedEvent,
    /// One identifier produced an excessive number of clicks for a campaign
    ExcessiveClicks,
    /// A campaign's clicks are concentrated in one hour of the day
    HourConcentration,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::RejectedEvent => "rejected-event",
            ActivityType::ExcessiveClicks => "excessive-clicks",
            ActivityType::HourConcentration => "hour-concentration",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "rejected-event" => Some(ActivityType::RejectedEvent),
            "excessive-clicks" => Some(ActivityType::ExcessiveClicks),
            "hour-concentration" => Some(ActivityType::HourConcentration),
            _ => None,
        }
    }

    /// Advisory findings never gate individual events
    pub fn is_advisory(&self) -> bool {
        !matches!(self, ActivityType::RejectedEvent)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuspiciousActivity {
    pub id: String,
    pub event_id: Option<String>,
    pub campaign_id: String,
    pub affiliate_id: Option<String>,
    pub activity_type: ActivityType,
    pub hashed_identifier: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
    pub client_fingerprint: Option<String>,
    /// Submitting dashboard user, if any
    pub caller: Option<String>,
    pub reasons: Vec<String>,
    #[serde(default)]
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl SuspiciousActivity {
    pub fn new(
        campaign_id: impl Into<String>,
        activity_type: ActivityType,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            event_id: None,
            campaign_id: campaign_id.into(),
            affiliate_id: None,
            activity_type,
            hashed_identifier: None,
            user_agent: None,
            referrer: None,
            client_fingerprint: None,
            caller: None,
            reasons: Vec::new(),
            details: serde_json::Value::Null,
            created_at,
        }
    }
}
