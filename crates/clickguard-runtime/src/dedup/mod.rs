//! Deduplication / idempotency
//!
//! Collapses replayed or repeated submissions into the original event:
//! - an explicit idempotency key maps to the event it created
//! - a session produces one first click per affiliate
//! - a conversion near-identical to a recent one (same affiliate and campaign,
//!   amount and time within tolerance) is the same conversion
//!
//! Checks consult the in-memory [`DedupWindow`] first and fall back to the
//! event store. Fallback failures are treated as "unique".

mod window;

pub use window::{DedupWindow, RecentConversion};

use crate::integrity::is_well_formed_signature;
use crate::storage::{EventQuery, EventStore};
use chrono::{DateTime, Duration, Utc};
use clickguard_core::{Event, EventKind};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    pub idempotency_ttl_secs: i64,
    pub session_ttl_secs: i64,
    /// Strict upper bound on the amount difference, in minor units
    pub amount_tolerance: i64,
    /// Maximum time between near-identical conversions
    pub conversion_window_secs: i64,
    /// Age after which remembered conversions are dropped
    pub recent_window_secs: i64,
    /// Remembered conversions per affiliate/campaign pair
    pub recent_cap: usize,
    /// Window operations between full sweeps of expired entries
    pub sweep_every: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            idempotency_ttl_secs: 10 * 60,
            session_ttl_secs: 30 * 60,
            amount_tolerance: 100,
            conversion_window_secs: 60,
            recent_window_secs: 10 * 60,
            recent_cap: 50,
            sweep_every: 256,
        }
    }
}

/// Why a submission is a duplicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateReason {
    IdempotencyKey,
    SessionClick,
    NearIdenticalConversion,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DedupVerdict {
    Unique,
    Duplicate {
        original_id: String,
        reason: DuplicateReason,
    },
}

impl DedupVerdict {
    fn duplicate(original_id: impl Into<String>, reason: DuplicateReason) -> Self {
        DedupVerdict::Duplicate {
            original_id: original_id.into(),
            reason,
        }
    }
}

/// The identifying parts of a submission
#[derive(Debug, Clone)]
pub struct DedupProbe<'a> {
    pub idempotency_key: Option<&'a str>,
    pub affiliate_id: &'a str,
    pub campaign_id: &'a str,
    pub session_key: &'a str,
    pub kind: EventKind,
    pub amount: Option<i64>,
    pub at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct Deduplicator {
    window: Arc<DedupWindow>,
    events: Arc<dyn EventStore>,
    config: DedupConfig,
}

impl Deduplicator {
    pub fn new(events: Arc<dyn EventStore>, config: DedupConfig) -> Self {
        Self {
            window: Arc::new(DedupWindow::new(config.clone())),
            events,
            config,
        }
    }

    pub fn window(&self) -> &DedupWindow {
        &self.window
    }

    pub async fn check(&self, probe: &DedupProbe<'_>) -> DedupVerdict {
        if let Some(key) = probe.idempotency_key {
            if let Some(original) = self.window.idempotent(key, probe.at) {
                return DedupVerdict::duplicate(original, DuplicateReason::IdempotencyKey);
            }
        }

        match probe.kind {
            EventKind::Click => self.check_click(probe).await,
            EventKind::Conversion => self.check_conversion(probe).await,
        }
    }

    async fn check_click(&self, probe: &DedupProbe<'_>) -> DedupVerdict {
        if let Some(original) =
            self.window
                .first_click(probe.affiliate_id, probe.session_key, probe.at)
        {
            return DedupVerdict::duplicate(original, DuplicateReason::SessionClick);
        }

        let query = EventQuery::new()
            .kind(EventKind::Click)
            .affiliate(probe.affiliate_id)
            .session(probe.session_key)
            .since(probe.at - Duration::seconds(self.config.session_ttl_secs))
            .until(probe.at)
            .limit(1);

        match self.events.find_events(&query).await {
            Ok(found) => match found.into_iter().next() {
                Some(first) => DedupVerdict::duplicate(first.id, DuplicateReason::SessionClick),
                None => DedupVerdict::Unique,
            },
            Err(e) => {
                tracing::warn!(error = %e, "Session dedup fallback failed, treating click as unique");
                DedupVerdict::Unique
            }
        }
    }

    fn is_near(
        &self,
        amount: i64,
        at: DateTime<Utc>,
        prior_amount: i64,
        prior_at: DateTime<Utc>,
        signature: &str,
    ) -> bool {
        (amount - prior_amount).abs() < self.config.amount_tolerance
            && (at - prior_at).num_milliseconds().abs()
                <= self.config.conversion_window_secs * 1000
            && is_well_formed_signature(signature)
    }

    async fn check_conversion(&self, probe: &DedupProbe<'_>) -> DedupVerdict {
        let Some(amount) = probe.amount else {
            return DedupVerdict::Unique;
        };

        let recent = self
            .window
            .recent_conversions(probe.affiliate_id, probe.campaign_id, probe.at);
        if let Some(prior) = recent
            .iter()
            .rev()
            .find(|c| self.is_near(amount, probe.at, c.amount, c.at, &c.signature))
        {
            return DedupVerdict::duplicate(
                prior.event_id.clone(),
                DuplicateReason::NearIdenticalConversion,
            );
        }

        let window = Duration::seconds(self.config.conversion_window_secs);
        let query = EventQuery::new()
            .kind(EventKind::Conversion)
            .affiliate(probe.affiliate_id)
            .campaign(probe.campaign_id)
            .since(probe.at - window)
            .until(probe.at + window);

        match self.events.find_events(&query).await {
            Ok(found) => found
                .iter()
                .rev()
                .find(|e| {
                    e.amount().is_some_and(|prior_amount| {
                        self.is_near(amount, probe.at, prior_amount, e.timestamp, &e.signature)
                    })
                })
                .map(|e| {
                    DedupVerdict::duplicate(e.id.clone(), DuplicateReason::NearIdenticalConversion)
                })
                .unwrap_or(DedupVerdict::Unique),
            Err(e) => {
                tracing::warn!(error = %e, "Conversion dedup fallback failed, treating as unique");
                DedupVerdict::Unique
            }
        }
    }

    /// Register a persisted event so later submissions collapse into it
    pub fn remember(&self, event: &Event, idempotency_key: Option<&str>) {
        let at = event.timestamp;
        if let Some(key) = idempotency_key {
            self.window.remember_key(key, &event.id, at);
        }

        match event.kind() {
            EventKind::Click => {
                self.window
                    .remember_click(&event.affiliate_id, &event.session_key, &event.id, at)
            }
            EventKind::Conversion => {
                if let Some(amount) = event.amount() {
                    self.window.remember_conversion(
                        &event.affiliate_id,
                        &event.campaign_id,
                        RecentConversion {
                            event_id: event.id.clone(),
                            amount,
                            at,
                            signature: event.signature.clone(),
                        },
                        at,
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::Decision;
    use crate::storage::InMemoryStore;
    use crate::verification::genesis;
    use clickguard_core::{EventDetails, VerificationStatus};

    fn conversion(id: &str, amount: i64, at: DateTime<Utc>) -> Event {
        Event {
            id: id.to_string(),
            affiliate_id: "aff".to_string(),
            campaign_id: "camp".to_string(),
            details: EventDetails::Conversion {
                amount,
                commission: 0,
            },
            timestamp: at,
            session_key: "s1".to_string(),
            hashed_identifier: "h".to_string(),
            user_agent: String::new(),
            client_fingerprint: None,
            signature: "ab".repeat(32),
            risk_score: 0,
            status: VerificationStatus::Pending,
            security_flags: vec![],
            webhook_validated: false,
        }
    }

    fn probe(kind: EventKind, amount: Option<i64>, at: DateTime<Utc>) -> DedupProbe<'static> {
        DedupProbe {
            idempotency_key: None,
            affiliate_id: "aff",
            campaign_id: "camp",
            session_key: "s1",
            kind,
            amount,
            at,
        }
    }

    fn dedup() -> (Arc<InMemoryStore>, Deduplicator) {
        let store = Arc::new(InMemoryStore::new());
        let dedup = Deduplicator::new(store.clone(), DedupConfig::default());
        (store, dedup)
    }

    #[tokio::test]
    async fn test_near_identical_conversion() {
        let (_store, dedup) = dedup();
        let now = Utc::now();
        dedup.remember(&conversion("c1", 10_000, now), None);

        let later = now + Duration::seconds(10);
        assert_eq!(
            dedup.check(&probe(EventKind::Conversion, Some(10_050), later)).await,
            DedupVerdict::Duplicate {
                original_id: "c1".into(),
                reason: DuplicateReason::NearIdenticalConversion,
            }
        );
        // Amount tolerance is strict
        assert_eq!(
            dedup.check(&probe(EventKind::Conversion, Some(10_100), later)).await,
            DedupVerdict::Unique
        );
        // Time tolerance is inclusive
        assert_ne!(
            dedup
                .check(&probe(EventKind::Conversion, Some(10_000), now + Duration::seconds(60)))
                .await,
            DedupVerdict::Unique
        );
        assert_eq!(
            dedup
                .check(&probe(EventKind::Conversion, Some(10_000), now + Duration::seconds(61)))
                .await,
            DedupVerdict::Unique
        );
    }

    #[tokio::test]
    async fn test_malformed_prior_signature_is_not_a_match() {
        let (_store, dedup) = dedup();
        let now = Utc::now();
        let mut prior = conversion("c1", 10_000, now);
        prior.signature = "not-a-signature".into();
        dedup.remember(&prior, None);

        assert_eq!(
            dedup
                .check(&probe(EventKind::Conversion, Some(10_000), now + Duration::seconds(5)))
                .await,
            DedupVerdict::Unique
        );
    }

    #[tokio::test]
    async fn test_store_fallback_for_conversions_and_clicks() {
        let (store, dedup) = dedup();
        let now = Utc::now();
        store
            .insert_event(&genesis(conversion("c1", 5_000, now), Decision::Pending, &[]))
            .await
            .unwrap();
        let mut click = conversion("k1", 0, now);
        click.details = EventDetails::Click { referrer: None };
        store
            .insert_event(&genesis(click, Decision::Pending, &[]))
            .await
            .unwrap();

        let later = now + Duration::seconds(30);
        assert!(matches!(
            dedup.check(&probe(EventKind::Conversion, Some(5_001), later)).await,
            DedupVerdict::Duplicate { ref original_id, .. } if original_id == "c1"
        ));
        assert_eq!(
            dedup.check(&probe(EventKind::Click, None, later)).await,
            DedupVerdict::Duplicate {
                original_id: "k1".into(),
                reason: DuplicateReason::SessionClick,
            }
        );
    }

    #[tokio::test]
    async fn test_idempotency_key_wins() {
        let (_store, dedup) = dedup();
        let now = Utc::now();
        dedup.remember(&conversion("c1", 10_000, now), Some("idem-1"));

        let mut different = probe(EventKind::Conversion, Some(99_999), now + Duration::minutes(5));
        different.idempotency_key = Some("idem-1");
        assert_eq!(
            dedup.check(&different).await,
            DedupVerdict::Duplicate {
                original_id: "c1".into(),
                reason: DuplicateReason::IdempotencyKey,
            }
        );
    }
}
