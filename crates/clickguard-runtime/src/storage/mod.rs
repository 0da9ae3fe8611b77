//! Storage layer
//!
//! The persistent store is the only shared mutable resource of the pipeline.
//! It is split by concern into async traits so that backends can be mixed:
//! - [`EventStore`]: events, their audit trail and affiliate aggregates
//! - [`QueueStore`]: verification queue items
//! - [`DeliveryStore`]: webhook delivery records
//! - [`ActivityLog`]: suspicious activity records
//! - [`Directory`]: campaign/affiliate lookups owned by the CRUD layer
//!
//! Event status only changes through [`EventStore::apply_transition`], which
//! accepts a [`Transition`] that only the verification state machine can build.

mod directory;
mod memory;
#[cfg(feature = "sqlx")]
pub mod postgres;

pub use directory::{DirectorySeed, StaticDirectory};
pub use memory::InMemoryStore;
#[cfg(feature = "sqlx")]
pub use postgres::PostgresStore;

use crate::error::Result;
use crate::verification::{Genesis, Transition};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clickguard_core::{
    Affiliate, AffiliateStats, AuditLogEntry, Campaign, Event, EventKind, SuspiciousActivity,
    VerificationQueueItem, WebhookDeliveryRecord,
};

/// Filter for event lookups; unset fields match everything
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventQuery {
    pub kind: Option<EventKind>,
    pub affiliate_id: Option<String>,
    pub campaign_id: Option<String>,
    pub hashed_identifier: Option<String>,
    pub session_key: Option<String>,
    /// Inclusive lower bound
    pub since: Option<DateTime<Utc>>,
    /// Inclusive upper bound
    pub until: Option<DateTime<Utc>>,
    pub exclude_id: Option<String>,
    pub limit: Option<usize>,
}

impl EventQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(mut self, kind: EventKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn affiliate(mut self, affiliate_id: impl Into<String>) -> Self {
        self.affiliate_id = Some(affiliate_id.into());
        self
    }

    pub fn campaign(mut self, campaign_id: impl Into<String>) -> Self {
        self.campaign_id = Some(campaign_id.into());
        self
    }

    pub fn identifier(mut self, hashed_identifier: impl Into<String>) -> Self {
        self.hashed_identifier = Some(hashed_identifier.into());
        self
    }

    pub fn session(mut self, session_key: impl Into<String>) -> Self {
        self.session_key = Some(session_key.into());
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn excluding(mut self, event_id: impl Into<String>) -> Self {
        self.exclude_id = Some(event_id.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Check if an event matches this query (ignores `limit`)
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(kind) = self.kind {
            if event.kind() != kind {
                return false;
            }
        }
        if let Some(ref affiliate_id) = self.affiliate_id {
            if &event.affiliate_id != affiliate_id {
                return false;
            }
        }
        if let Some(ref campaign_id) = self.campaign_id {
            if &event.campaign_id != campaign_id {
                return false;
            }
        }
        if let Some(ref identifier) = self.hashed_identifier {
            if &event.hashed_identifier != identifier {
                return false;
            }
        }
        if let Some(ref session_key) = self.session_key {
            if &event.session_key != session_key {
                return false;
            }
        }
        if let Some(since) = self.since {
            if event.timestamp < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if event.timestamp > until {
                return false;
            }
        }
        if let Some(ref exclude_id) = self.exclude_id {
            if &event.id == exclude_id {
                return false;
            }
        }
        true
    }
}

/// Events, audit trail and affiliate aggregates
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Persist a new event together with its genesis audit entries.
    ///
    /// This is the atomic commit point of an ingestion: either the event and all
    /// of its entries are stored, or nothing is.
    async fn insert_event(&self, genesis: &Genesis) -> Result<()>;

    async fn get_event(&self, event_id: &str) -> Result<Option<Event>>;

    /// Apply a status transition and append its audit entry atomically.
    ///
    /// Fails with `Conflict` if the stored status no longer equals `transition.from()`.
    async fn apply_transition(&self, transition: &Transition) -> Result<Event>;

    /// Audit entries of an event in append order
    async fn audit_trail(&self, event_id: &str) -> Result<Vec<AuditLogEntry>>;

    async fn count_events(&self, query: &EventQuery) -> Result<u32>;

    /// Matching events ordered by timestamp, oldest first
    async fn find_events(&self, query: &EventQuery) -> Result<Vec<Event>>;

    async fn mark_webhook_validated(&self, event_id: &str) -> Result<()>;

    /// Read-modify-write of an affiliate's aggregates under the store's lock.
    /// `sign` is `1` for a conversion entering verified and `-1` for one leaving it.
    async fn apply_affiliate_delta(
        &self,
        affiliate_id: &str,
        amount: i64,
        commission: i64,
        sign: i64,
    ) -> Result<AffiliateStats>;

    async fn affiliate_stats(&self, affiliate_id: &str) -> Result<Option<AffiliateStats>>;
}

/// Verification queue persistence
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Insert a new item; fails with `QueueConflict` if the event already has an open item
    async fn insert_item(&self, item: &VerificationQueueItem) -> Result<()>;

    async fn open_item(&self, event_id: &str) -> Result<Option<VerificationQueueItem>>;

    /// Atomically pick the most urgent due item and mark it processing
    async fn claim_next(&self, now: DateTime<Utc>) -> Result<Option<VerificationQueueItem>>;

    /// Replace the open item of `item.conversion_id`
    async fn update_item(&self, item: &VerificationQueueItem) -> Result<()>;

    async fn open_items(&self) -> Result<Vec<VerificationQueueItem>>;
}

/// Webhook delivery records
#[async_trait]
pub trait DeliveryStore: Send + Sync {
    /// Insert or replace a record by id
    async fn save_delivery(&self, record: &WebhookDeliveryRecord) -> Result<()>;

    async fn deliveries_for(&self, event_id: &str) -> Result<Vec<WebhookDeliveryRecord>>;
}

/// Suspicious activity records
#[async_trait]
pub trait ActivityLog: Send + Sync {
    async fn record_activity(&self, activity: &SuspiciousActivity) -> Result<()>;

    async fn activities_for_campaign(&self, campaign_id: &str) -> Result<Vec<SuspiciousActivity>>;
}

/// Campaign/affiliate lookups
#[async_trait]
pub trait Directory: Send + Sync {
    async fn campaign(&self, campaign_id: &str) -> Result<Option<Campaign>>;

    async fn affiliate(&self, affiliate_id: &str) -> Result<Option<Affiliate>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use clickguard_core::{EventDetails, VerificationStatus};

    fn click(id: &str, at: DateTime<Utc>) -> Event {
        Event {
            id: id.to_string(),
            affiliate_id: "aff".to_string(),
            campaign_id: "camp".to_string(),
            details: EventDetails::Click { referrer: None },
            timestamp: at,
            session_key: "s1".to_string(),
            hashed_identifier: "ip1".to_string(),
            user_agent: String::new(),
            client_fingerprint: None,
            signature: String::new(),
            risk_score: 0,
            status: VerificationStatus::Pending,
            security_flags: vec![],
            webhook_validated: false,
        }
    }

    #[test]
    fn test_query_matches_fields() {
        let now = Utc::now();
        let event = click("e1", now);

        assert!(EventQuery::new().matches(&event));
        assert!(EventQuery::new().kind(EventKind::Click).matches(&event));
        assert!(!EventQuery::new().kind(EventKind::Conversion).matches(&event));
        assert!(EventQuery::new().identifier("ip1").session("s1").matches(&event));
        assert!(!EventQuery::new().affiliate("other").matches(&event));
        assert!(!EventQuery::new().excluding("e1").matches(&event));
    }

    #[test]
    fn test_query_time_bounds_inclusive() {
        let now = Utc::now();
        let event = click("e1", now);

        assert!(EventQuery::new().since(now).until(now).matches(&event));
        assert!(!EventQuery::new()
            .since(now + Duration::seconds(1))
            .matches(&event));
        assert!(!EventQuery::new()
            .until(now - Duration::seconds(1))
            .matches(&event));
    }
}
