//! Manual-review queue

use crate::error::Result;
use crate::storage::QueueStore;
use chrono::Duration;
use clickguard_core::{
    Event, QueueItemStatus, QueuePriority, SharedClock, VerificationQueueItem,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Delay before the first retry of a deferred item
    pub base_backoff_secs: i64,
    /// Upper bound for the retry delay
    pub max_backoff_secs: i64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            base_backoff_secs: 60,
            max_backoff_secs: 60 * 60,
        }
    }
}

impl QueueConfig {
    /// Delay after the `retry_count`-th deferral (1-based)
    pub fn backoff(&self, retry_count: u32) -> Duration {
        let exponent = retry_count.saturating_sub(1).min(30);
        let secs = self
            .base_backoff_secs
            .saturating_mul(1i64 << exponent)
            .min(self.max_backoff_secs);
        Duration::seconds(secs)
    }
}

/// Prioritized review queue over a [`QueueStore`]
#[derive(Clone)]
pub struct VerificationQueue {
    store: Arc<dyn QueueStore>,
    config: QueueConfig,
    clock: SharedClock,
}

impl VerificationQueue {
    pub fn new(store: Arc<dyn QueueStore>, config: QueueConfig, clock: SharedClock) -> Self {
        Self {
            store,
            config,
            clock,
        }
    }

    /// Queue an event for review; fails with `QueueConflict` if it already has an open item
    pub async fn enqueue(
        &self,
        event: &Event,
        priority: QueuePriority,
    ) -> Result<VerificationQueueItem> {
        let item = VerificationQueueItem::new(
            &event.id,
            &event.campaign_id,
            &event.affiliate_id,
            priority,
            self.clock.now(),
        );
        self.store.insert_item(&item).await?;
        tracing::debug!(event_id = %event.id, priority = priority.as_str(), "Event queued for review");
        Ok(item)
    }

    /// Claim the most urgent due item
    pub async fn claim_next(&self) -> Result<Option<VerificationQueueItem>> {
        self.store.claim_next(self.clock.now()).await
    }

    /// Close the open item of an event; returns false if there was none
    pub async fn complete(&self, event_id: &str) -> Result<bool> {
        match self.store.open_item(event_id).await? {
            Some(mut item) => {
                item.status = QueueItemStatus::Done;
                self.store.update_item(&item).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Put a claimed item back with exponential backoff
    pub async fn defer(&self, item: &VerificationQueueItem) -> Result<VerificationQueueItem> {
        let mut item = item.clone();
        item.retry_count += 1;
        item.status = QueueItemStatus::Pending;
        item.next_retry_at = Some(self.clock.now() + self.config.backoff(item.retry_count));
        self.store.update_item(&item).await?;
        Ok(item)
    }

    pub async fn open_item(&self, event_id: &str) -> Result<Option<VerificationQueueItem>> {
        self.store.open_item(event_id).await
    }

    pub async fn open_items(&self) -> Result<Vec<VerificationQueueItem>> {
        self.store.open_items().await
    }
}
