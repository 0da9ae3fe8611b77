//! In-memory store
//!
//! Implements every storage trait on a single `RwLock`-guarded state so that
//! each trait operation is one critical section. Suitable for tests, development
//! and single-instance deployments; data is lost on restart.

use super::{ActivityLog, DeliveryStore, EventQuery, EventStore, QueueStore};
use crate::error::{Result, RuntimeError};
use crate::verification::{Genesis, Transition};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clickguard_core::{
    AffiliateStats, AuditLogEntry, Event, QueueItemStatus, SuspiciousActivity,
    VerificationQueueItem, WebhookDeliveryRecord,
};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct StoreState {
    events: HashMap<String, Event>,
    audit: HashMap<String, Vec<AuditLogEntry>>,
    queue: Vec<VerificationQueueItem>,
    deliveries: Vec<WebhookDeliveryRecord>,
    activities: Vec<SuspiciousActivity>,
    stats: HashMap<String, AffiliateStats>,
}

/// In-memory implementation of all storage traits
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<StoreState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of persisted events
    pub async fn event_count(&self) -> usize {
        self.state.read().await.events.len()
    }

    /// All queue items including closed ones
    pub async fn all_queue_items(&self) -> Vec<VerificationQueueItem> {
        self.state.read().await.queue.clone()
    }

    /// All suspicious activity records
    pub async fn all_activities(&self) -> Vec<SuspiciousActivity> {
        self.state.read().await.activities.clone()
    }
}

fn sorted_matches(state: &StoreState, query: &EventQuery) -> Vec<Event> {
    let mut events: Vec<Event> = state
        .events
        .values()
        .filter(|event| query.matches(event))
        .cloned()
        .collect();
    events.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
    if let Some(limit) = query.limit {
        events.truncate(limit);
    }
    events
}

#[async_trait]
impl EventStore for InMemoryStore {
    async fn insert_event(&self, genesis: &Genesis) -> Result<()> {
        let mut state = self.state.write().await;
        let event = genesis.event();

        if state.events.contains_key(&event.id) {
            return Err(RuntimeError::Conflict(format!(
                "event {} already exists",
                event.id
            )));
        }

        state.events.insert(event.id.clone(), event.clone());
        state
            .audit
            .insert(event.id.clone(), genesis.entries().to_vec());
        Ok(())
    }

    async fn get_event(&self, event_id: &str) -> Result<Option<Event>> {
        Ok(self.state.read().await.events.get(event_id).cloned())
    }

    async fn apply_transition(&self, transition: &Transition) -> Result<Event> {
        let mut state = self.state.write().await;

        let event = state
            .events
            .get_mut(transition.event_id())
            .ok_or_else(|| RuntimeError::NotFound(format!("event {}", transition.event_id())))?;

        if event.status != transition.from() {
            return Err(RuntimeError::Conflict(format!(
                "event {} is {}, expected {}",
                event.id,
                event.status,
                transition.from()
            )));
        }

        event.status = transition.to();
        let updated = event.clone();

        state
            .audit
            .entry(transition.event_id().to_string())
            .or_default()
            .push(transition.entry().clone());

        Ok(updated)
    }

    async fn audit_trail(&self, event_id: &str) -> Result<Vec<AuditLogEntry>> {
        Ok(self
            .state
            .read()
            .await
            .audit
            .get(event_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn count_events(&self, query: &EventQuery) -> Result<u32> {
        let state = self.state.read().await;
        let count = state
            .events
            .values()
            .filter(|event| query.matches(event))
            .count();
        Ok(count as u32)
    }

    async fn find_events(&self, query: &EventQuery) -> Result<Vec<Event>> {
        let state = self.state.read().await;
        Ok(sorted_matches(&state, query))
    }

    async fn mark_webhook_validated(&self, event_id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let event = state
            .events
            .get_mut(event_id)
            .ok_or_else(|| RuntimeError::NotFound(format!("event {}", event_id)))?;
        event.webhook_validated = true;
        Ok(())
    }

    async fn apply_affiliate_delta(
        &self,
        affiliate_id: &str,
        amount: i64,
        commission: i64,
        sign: i64,
    ) -> Result<AffiliateStats> {
        let mut state = self.state.write().await;
        let stats = state
            .stats
            .entry(affiliate_id.to_string())
            .or_insert_with(|| AffiliateStats::new(affiliate_id));
        stats.apply(amount, commission, sign);
        Ok(stats.clone())
    }

    async fn affiliate_stats(&self, affiliate_id: &str) -> Result<Option<AffiliateStats>> {
        Ok(self.state.read().await.stats.get(affiliate_id).cloned())
    }
}

#[async_trait]
impl QueueStore for InMemoryStore {
    async fn insert_item(&self, item: &VerificationQueueItem) -> Result<()> {
        let mut state = self.state.write().await;
        let has_open = state
            .queue
            .iter()
            .any(|existing| existing.conversion_id == item.conversion_id && existing.is_open());
        if has_open {
            return Err(RuntimeError::QueueConflict(item.conversion_id.clone()));
        }
        state.queue.push(item.clone());
        Ok(())
    }

    async fn open_item(&self, event_id: &str) -> Result<Option<VerificationQueueItem>> {
        let state = self.state.read().await;
        Ok(state
            .queue
            .iter()
            .find(|item| item.conversion_id == event_id && item.is_open())
            .cloned())
    }

    async fn claim_next(&self, now: DateTime<Utc>) -> Result<Option<VerificationQueueItem>> {
        let mut state = self.state.write().await;

        let next = state
            .queue
            .iter_mut()
            .filter(|item| item.is_due(now))
            .min_by(|a, b| {
                b.priority
                    .cmp(&a.priority)
                    .then_with(|| a.created_at.cmp(&b.created_at))
            });

        Ok(next.map(|item| {
            item.status = QueueItemStatus::Processing;
            item.clone()
        }))
    }

    async fn update_item(&self, item: &VerificationQueueItem) -> Result<()> {
        let mut state = self.state.write().await;
        let slot = state
            .queue
            .iter_mut()
            .find(|existing| existing.conversion_id == item.conversion_id && existing.is_open())
            .ok_or_else(|| {
                RuntimeError::NotFound(format!("open queue item for {}", item.conversion_id))
            })?;
        *slot = item.clone();
        Ok(())
    }

    async fn open_items(&self) -> Result<Vec<VerificationQueueItem>> {
        let state = self.state.read().await;
        Ok(state
            .queue
            .iter()
            .filter(|item| item.is_open())
            .cloned()
            .collect())
    }
}

#[async_trait]
impl DeliveryStore for InMemoryStore {
    async fn save_delivery(&self, record: &WebhookDeliveryRecord) -> Result<()> {
        let mut state = self.state.write().await;
        match state.deliveries.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record.clone(),
            None => state.deliveries.push(record.clone()),
        }
        Ok(())
    }

    async fn deliveries_for(&self, event_id: &str) -> Result<Vec<WebhookDeliveryRecord>> {
        let state = self.state.read().await;
        Ok(state
            .deliveries
            .iter()
            .filter(|r| r.conversion_id == event_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ActivityLog for InMemoryStore {
    async fn record_activity(&self, activity: &SuspiciousActivity) -> Result<()> {
        self.state.write().await.activities.push(activity.clone());
        Ok(())
    }

    async fn activities_for_campaign(&self, campaign_id: &str) -> Result<Vec<SuspiciousActivity>> {
        let state = self.state.read().await;
        Ok(state
            .activities
            .iter()
            .filter(|a| a.campaign_id == campaign_id)
            .cloned()
            .collect())
    }
}
