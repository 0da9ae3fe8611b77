//! Verification service
//!
//! The only path through which an event's status changes after creation.
//! Side effects of a transition (queue closing, affiliate aggregates, partner
//! notification) happen after the transition has been committed and never
//! undo it.

use super::queue::VerificationQueue;
use super::state::{plan, replay, Actor};
use crate::error::{Result, RuntimeError};
use crate::notify::WebhookDispatcher;
use crate::storage::EventStore;
use clickguard_core::{
    AuditLogEntry, Event, EventKind, SharedClock, VerificationStatus,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Decision of a human reviewer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewAction {
    Verify,
    Reject,
}

impl ReviewAction {
    pub fn target_status(&self) -> VerificationStatus {
        match self {
            ReviewAction::Verify => VerificationStatus::Verified,
            ReviewAction::Reject => VerificationStatus::Rejected,
        }
    }
}

#[derive(Clone)]
pub struct VerificationService {
    events: Arc<dyn EventStore>,
    queue: VerificationQueue,
    clock: SharedClock,
    notifier: Option<WebhookDispatcher>,
}

impl VerificationService {
    pub fn new(events: Arc<dyn EventStore>, queue: VerificationQueue, clock: SharedClock) -> Self {
        Self {
            events,
            queue,
            clock,
            notifier: None,
        }
    }

    /// Notify partners when a conversion becomes verified
    pub fn with_notifier(mut self, notifier: WebhookDispatcher) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn queue(&self) -> &VerificationQueue {
        &self.queue
    }

    async fn load(&self, event_id: &str) -> Result<Event> {
        self.events
            .get_event(event_id)
            .await?
            .ok_or_else(|| RuntimeError::NotFound(format!("event {}", event_id)))
    }

    /// Move an event to a terminal status and run the follow-up effects
    pub async fn transition(
        &self,
        event_id: &str,
        to: VerificationStatus,
        actor: &Actor,
        notes: Option<String>,
    ) -> Result<Event> {
        let current = self.load(event_id).await?;
        let transition = plan(&current, to, actor, notes, self.clock.now())?;
        let updated = self.events.apply_transition(&transition).await?;

        tracing::info!(
            event_id,
            from = %transition.from(),
            to = %transition.to(),
            performed_by = actor.performed_by(),
            action = transition.entry().action.as_str(),
            "Event status changed"
        );

        if let Err(e) = self.queue.complete(event_id).await {
            tracing::error!(event_id, error = %e, "Failed to close queue item");
        }

        if updated.kind() == EventKind::Conversion {
            let sign = if to == VerificationStatus::Verified {
                1
            } else if transition.from() == VerificationStatus::Verified {
                -1
            } else {
                0
            };
            if sign != 0 {
                self.apply_stats(&updated, sign).await;
            }

            if to == VerificationStatus::Verified {
                if let Some(notifier) = &self.notifier {
                    notifier.spawn_delivery(updated.clone());
                }
            }
        }

        Ok(updated)
    }

    async fn apply_stats(&self, event: &Event, sign: i64) {
        let amount = event.amount().unwrap_or(0);
        let commission = event.commission().unwrap_or(0);
        if let Err(e) = self
            .events
            .apply_affiliate_delta(&event.affiliate_id, amount, commission, sign)
            .await
        {
            tracing::error!(
                event_id = %event.id,
                affiliate_id = %event.affiliate_id,
                error = %e,
                "Failed to update affiliate aggregates"
            );
        }
    }

    /// Automatic verification of an event that needs no review
    pub async fn auto_verify(&self, event_id: &str) -> Result<Event> {
        self.transition(event_id, VerificationStatus::Verified, &Actor::System, None)
            .await
    }

    /// Apply a reviewer decision.
    ///
    /// Returns `Ok(false)` without writing anything if the event already holds
    /// the requested status.
    pub async fn review(
        &self,
        event_id: &str,
        action: ReviewAction,
        reviewer_id: &str,
        notes: Option<String>,
    ) -> Result<bool> {
        if reviewer_id.trim().is_empty() {
            return Err(RuntimeError::InvalidInput("reviewer id must not be empty".into()));
        }

        let current = self.load(event_id).await?;
        if current.status == action.target_status() {
            tracing::debug!(event_id, status = %current.status, "Review is a no-op");
            return Ok(false);
        }

        self.transition(
            event_id,
            action.target_status(),
            &Actor::reviewer(reviewer_id),
            notes,
        )
        .await?;
        Ok(true)
    }

    pub async fn audit_trail(&self, event_id: &str) -> Result<Vec<AuditLogEntry>> {
        self.events.audit_trail(event_id).await
    }

    /// Status reconstructed from the audit trail alone
    pub async fn replayed_status(&self, event_id: &str) -> Result<VerificationStatus> {
        let trail = self.events.audit_trail(event_id).await?;
        Ok(replay(&trail)?)
    }
}
