//! Inbound event submissions

use super::event::EventKind;
use serde::{Deserialize, Serialize};

/// Identity of the party submitting an event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "lowercase")]
pub enum Caller {
    /// Live tracking traffic
    #[default]
    Anonymous,
    /// Authenticated dashboard user triggering a test event
    User(String),
}

/// Kind-specific part of a submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SubmissionKind {
    Click {
        #[serde(default)]
        referrer: Option<String>,
    },
    Conversion {
        /// Amount in minor currency units
        amount: i64,
    },
}

/// A click or conversion report as received by the ingestion gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSubmission {
    pub affiliate_id: String,
    pub campaign_id: String,
    pub kind: SubmissionKind,
    #[serde(default)]
    pub user_agent: Option<String>,
    pub client_ip: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub client_fingerprint: Option<String>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
    #[serde(default)]
    pub caller: Caller,
}

impl EventSubmission {
    pub fn click(
        affiliate_id: impl Into<String>,
        campaign_id: impl Into<String>,
        client_ip: impl Into<String>,
    ) -> Self {
        Self::new(
            affiliate_id,
            campaign_id,
            client_ip,
            SubmissionKind::Click { referrer: None },
        )
    }

    pub fn conversion(
        affiliate_id: impl Into<String>,
        campaign_id: impl Into<String>,
        client_ip: impl Into<String>,
        amount: i64,
    ) -> Self {
        Self::new(
            affiliate_id,
            campaign_id,
            client_ip,
            SubmissionKind::Conversion { amount },
        )
    }

    fn new(
        affiliate_id: impl Into<String>,
        campaign_id: impl Into<String>,
        client_ip: impl Into<String>,
        kind: SubmissionKind,
    ) -> Self {
        Self {
            affiliate_id: affiliate_id.into(),
            campaign_id: campaign_id.into(),
            kind,
            user_agent: None,
            client_ip: client_ip.into(),
            session_id: None,
            client_fingerprint: None,
            idempotency_key: None,
            caller: Caller::Anonymous,
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_referrer(mut self, referrer: impl Into<String>) -> Self {
        if let SubmissionKind::Click { referrer: slot } = &mut self.kind {
            *slot = Some(referrer.into());
        }
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.client_fingerprint = Some(fingerprint.into());
        self
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    pub fn with_caller(mut self, caller: Caller) -> Self {
        self.caller = caller;
        self
    }

    pub fn event_kind(&self) -> EventKind {
        match self.kind {
            SubmissionKind::Click { .. } => EventKind::Click,
            SubmissionKind::Conversion { .. } => EventKind::Conversion,
        }
    }

    pub fn amount(&self) -> Option<i64> {
        match self.kind {
            SubmissionKind::Conversion { amount } => Some(amount),
            SubmissionKind::Click { .. } => None,
        }
    }

    /// User agent with `None` normalized to empty
    pub fn user_agent_str(&self) -> &str {
        self.user_agent.as_deref().unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_click() {
        let submission = EventSubmission::click("aff", "camp", "10.0.0.1")
            .with_referrer("https://blog.example.com")
            .with_session("s-1");

        assert_eq!(submission.event_kind(), EventKind::Click);
        assert_eq!(submission.amount(), None);
        assert_eq!(
            submission.kind,
            SubmissionKind::Click {
                referrer: Some("https://blog.example.com".to_string())
            }
        );
        assert_eq!(submission.user_agent_str(), "");
    }

    #[test]
    fn test_referrer_ignored_for_conversion() {
        let submission =
            EventSubmission::conversion("aff", "camp", "10.0.0.1", 1_000).with_referrer("x");
        assert_eq!(submission.kind, SubmissionKind::Conversion { amount: 1_000 });
    }
}
