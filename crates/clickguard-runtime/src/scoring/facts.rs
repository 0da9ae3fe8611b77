//! Fact collection
//!
//! Every lookup is bounded by a timeout. A failed or timed-out lookup yields
//! `None`, which the scorer treats as contributing nothing.

use super::config::ScoringConfig;
use crate::error::{Result, RuntimeError};
use crate::lists::BlacklistService;
use crate::observability::MetricsCollector;
use crate::storage::{EventQuery, EventStore};
use chrono::{DateTime, Duration, Utc};
use clickguard_core::{Event, EventKind};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

/// Looked-up facts about an event; `None` marks a failed lookup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskFacts {
    pub blacklisted: Option<bool>,
    /// Prior same-kind events from the same identifier in the rate window
    pub recent_from_identifier: Option<u32>,
    /// Same-kind events of the affiliate in the velocity window
    pub affiliate_velocity: Option<u32>,
}

impl RiskFacts {
    /// True if some lookup that mattered failed
    pub fn is_degraded(&self) -> bool {
        if self.blacklisted == Some(true) {
            return false;
        }
        self.blacklisted.is_none()
            || self.recent_from_identifier.is_none()
            || self.affiliate_velocity.is_none()
    }
}

/// What to collect facts about
#[derive(Debug, Clone)]
pub struct FactProbe<'a> {
    pub kind: EventKind,
    pub hashed_identifier: &'a str,
    pub affiliate_id: &'a str,
    /// End of the trailing windows (inclusive)
    pub at: DateTime<Utc>,
    /// Event to leave out of the counts, when re-checking a stored event
    pub exclude_id: Option<&'a str>,
}

impl<'a> FactProbe<'a> {
    /// Probe for a stored event, over the windows ending at its timestamp
    pub fn for_event(event: &'a Event) -> Self {
        Self {
            kind: event.kind(),
            hashed_identifier: &event.hashed_identifier,
            affiliate_id: &event.affiliate_id,
            at: event.timestamp,
            exclude_id: Some(&event.id),
        }
    }
}

/// Collects [`RiskFacts`] from the blacklist and event store
#[derive(Clone)]
pub struct FactCollector {
    events: Arc<dyn EventStore>,
    blacklist: BlacklistService,
    config: ScoringConfig,
    lookup_timeout: std::time::Duration,
    metrics: Option<Arc<MetricsCollector>>,
}

impl FactCollector {
    pub fn new(
        events: Arc<dyn EventStore>,
        blacklist: BlacklistService,
        config: ScoringConfig,
        lookup_timeout: std::time::Duration,
    ) -> Self {
        Self {
            events,
            blacklist,
            config,
            lookup_timeout,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Collect all facts. The blacklist is consulted first; a hit skips the
    /// remaining lookups since it decides the outcome on its own.
    pub async fn collect(&self, probe: &FactProbe<'_>) -> RiskFacts {
        let started = Instant::now();

        let blacklisted = self
            .bounded("blacklist", self.blacklist.contains(probe.hashed_identifier))
            .await;
        if blacklisted == Some(true) {
            return RiskFacts {
                blacklisted,
                ..RiskFacts::default()
            };
        }

        let rate_query = self
            .base_query(probe)
            .identifier(probe.hashed_identifier)
            .since(probe.at - Duration::seconds(self.config.rate_window_secs));
        let velocity_query = self
            .base_query(probe)
            .affiliate(probe.affiliate_id)
            .since(probe.at - Duration::seconds(self.config.velocity_window_secs));

        let (recent_from_identifier, affiliate_velocity) = tokio::join!(
            self.bounded("identifier_rate", self.events.count_events(&rate_query)),
            self.bounded("affiliate_velocity", self.events.count_events(&velocity_query)),
        );

        if let Some(metrics) = &self.metrics {
            metrics.record_duration("fact_collection", started.elapsed());
        }

        RiskFacts {
            blacklisted,
            recent_from_identifier,
            affiliate_velocity,
        }
    }

    fn base_query(&self, probe: &FactProbe<'_>) -> EventQuery {
        let query = EventQuery::new().kind(probe.kind).until(probe.at);
        match probe.exclude_id {
            Some(id) => query.excluding(id),
            None => query,
        }
    }

    async fn bounded<T, F>(&self, lookup: &'static str, fut: F) -> Option<T>
    where
        F: Future<Output = Result<T>>,
    {
        let outcome = match tokio::time::timeout(self.lookup_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(RuntimeError::Timeout(format!(
                "{} lookup exceeded {:?}",
                lookup, self.lookup_timeout
            ))),
        };

        match outcome {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(lookup, error = %e, "Risk lookup failed, contributing nothing");
                if let Some(metrics) = &self.metrics {
                    metrics.counter("risk_lookup_failures").inc();
                    metrics.record_error(lookup);
                }
                None
            }
        }
    }
}
