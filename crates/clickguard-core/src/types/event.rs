//! Tracked events
//!
//! Clicks and conversions share a common base and differ in a kind-specific
//! payload ([`EventDetails`]). Amount-based heuristics dispatch on that payload.

use super::status::VerificationStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Event discriminant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Click,
    Conversion,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Click => "click",
            EventKind::Conversion => "conversion",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific event payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EventDetails {
    Click {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        referrer: Option<String>,
    },
    Conversion {
        /// Amount in minor currency units
        amount: i64,
        /// Payable commission in minor currency units
        commission: i64,
    },
}

/// A persisted click or conversion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub affiliate_id: String,
    pub campaign_id: String,
    pub details: EventDetails,
    pub timestamp: DateTime<Utc>,
    /// Session the event belongs to (client session id, fingerprint, or derived)
    pub session_key: String,
    /// Keyed hash of the submitting IP; raw addresses are never stored
    pub hashed_identifier: String,
    pub user_agent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_fingerprint: Option<String>,
    /// Server-side HMAC over [`Event::canonical_fields`]
    pub signature: String,
    /// Composite score of every triggered heuristic, 0..=100. Amount
    /// heuristics add to it but not to the rejection gate, so a stored event
    /// may carry 100 without having been rejected.
    pub risk_score: u8,
    pub status: VerificationStatus,
    #[serde(default)]
    pub security_flags: Vec<String>,
    #[serde(default)]
    pub webhook_validated: bool,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self.details {
            EventDetails::Click { .. } => EventKind::Click,
            EventDetails::Conversion { .. } => EventKind::Conversion,
        }
    }

    pub fn amount(&self) -> Option<i64> {
        match self.details {
            EventDetails::Conversion { amount, .. } => Some(amount),
            EventDetails::Click { .. } => None,
        }
    }

    pub fn commission(&self) -> Option<i64> {
        match self.details {
            EventDetails::Conversion { commission, .. } => Some(commission),
            EventDetails::Click { .. } => None,
        }
    }

    pub fn referrer(&self) -> Option<&str> {
        match &self.details {
            EventDetails::Click { referrer } => referrer.as_deref(),
            EventDetails::Conversion { .. } => None,
        }
    }

    /// Canonical byte string bound by the server-side signature.
    ///
    /// Only immutable fields participate; status and verification flags change
    /// over the event's lifetime and are excluded.
    pub fn canonical_fields(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}|{}|{}|{}",
            self.id,
            self.kind(),
            self.affiliate_id,
            self.campaign_id,
            self.amount().map(|a| a.to_string()).unwrap_or_default(),
            self.timestamp.timestamp_millis(),
            self.session_key,
            self.hashed_identifier,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversion(amount: i64) -> Event {
        Event {
            id: "evt-1".to_string(),
            affiliate_id: "aff-1".to_string(),
            campaign_id: "camp-1".to_string(),
            details: EventDetails::Conversion {
                amount,
                commission: amount / 10,
            },
            timestamp: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            session_key: "sess".to_string(),
            hashed_identifier: "abc".to_string(),
            user_agent: "Mozilla/5.0".to_string(),
            client_fingerprint: None,
            signature: String::new(),
            risk_score: 0,
            status: VerificationStatus::Pending,
            security_flags: vec![],
            webhook_validated: false,
        }
    }

    #[test]
    fn test_event_kind_dispatch() {
        let event = conversion(5_000);
        assert_eq!(event.kind(), EventKind::Conversion);
        assert_eq!(event.amount(), Some(5_000));
        assert_eq!(event.commission(), Some(500));
        assert_eq!(event.referrer(), None);
    }

    #[test]
    fn test_canonical_fields_ignore_status() {
        let mut event = conversion(5_000);
        let before = event.canonical_fields();
        event.status = VerificationStatus::Verified;
        event.risk_score = 40;
        assert_eq!(before, event.canonical_fields());
        assert_eq!(
            before,
            "evt-1|conversion|aff-1|camp-1|5000|1700000000000|sess|abc"
        );
    }

    #[test]
    fn test_event_json_shape() {
        let json = serde_json::to_value(conversion(7_500)).unwrap();
        assert_eq!(json["affiliateId"], "aff-1");
        assert_eq!(json["details"]["type"], "conversion");
        assert_eq!(json["details"]["amount"], 7_500);
        assert_eq!(json["status"], "pending");
        assert!(json.get("clientFingerprint").is_none());
    }
}
