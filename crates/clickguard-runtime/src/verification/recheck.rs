//! Automated re-check of queued events
//!
//! Queued events were let through the gate with little history behind them.
//! By the time an item is claimed more events may have arrived inside the
//! original windows, so the facts are collected again over the windows ending
//! at the event's own timestamp.

use super::queue::VerificationQueue;
use super::service::VerificationService;
use super::state::Actor;
use crate::error::Result;
use crate::scoring::{Decision, FactCollector, FactProbe, RiskScorer, ScoringSubject};
use crate::storage::EventStore;
use clickguard_core::VerificationStatus;
use serde::Serialize;
use std::sync::Arc;

/// What a re-check did with the claimed item
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum RecheckOutcome {
    /// The fresh gate decision rejected the event
    Rejected {
        event_id: String,
        reasons: Vec<String>,
    },
    /// Left for a human, the item is back in the queue with backoff
    Deferred { event_id: String, retry_count: u32 },
    /// The event was already decided, the item was closed
    AlreadyTerminal {
        event_id: String,
        status: VerificationStatus,
    },
    /// The item referenced an unknown event and was closed
    Orphaned { event_id: String },
}

#[derive(Clone)]
pub struct AutoReviewer {
    events: Arc<dyn EventStore>,
    queue: VerificationQueue,
    service: VerificationService,
    collector: FactCollector,
    scorer: Arc<RiskScorer>,
}

impl AutoReviewer {
    pub fn new(
        events: Arc<dyn EventStore>,
        service: VerificationService,
        collector: FactCollector,
        scorer: Arc<RiskScorer>,
    ) -> Self {
        Self {
            events,
            queue: service.queue().clone(),
            service,
            collector,
            scorer,
        }
    }

    /// Claim and re-check the next due item; `None` if the queue has nothing due
    pub async fn recheck_next(&self) -> Result<Option<RecheckOutcome>> {
        let Some(item) = self.queue.claim_next().await? else {
            return Ok(None);
        };
        let event_id = item.conversion_id.clone();

        let Some(event) = self.events.get_event(&event_id).await? else {
            tracing::warn!(event_id = %event_id, "Queue item references unknown event");
            self.queue.complete(&event_id).await?;
            return Ok(Some(RecheckOutcome::Orphaned { event_id }));
        };

        if event.status.is_terminal() {
            self.queue.complete(&event_id).await?;
            return Ok(Some(RecheckOutcome::AlreadyTerminal {
                event_id,
                status: event.status,
            }));
        }

        let facts = self.collector.collect(&FactProbe::for_event(&event)).await;
        let assessment = self
            .scorer
            .assess(&ScoringSubject::from_event(&event), &facts);

        if assessment.decision == Decision::Rejected {
            let reasons = assessment.reasons();
            let notes = format!("automated re-check: {}", reasons.join(", "));
            match self
                .service
                .transition(
                    &event_id,
                    VerificationStatus::Rejected,
                    &Actor::System,
                    Some(notes),
                )
                .await
            {
                Ok(_) => return Ok(Some(RecheckOutcome::Rejected { event_id, reasons })),
                Err(e) => {
                    // Status changed underneath us or the store failed; keep the item alive
                    self.queue.defer(&item).await?;
                    return Err(e);
                }
            }
        }

        let deferred = self.queue.defer(&item).await?;
        tracing::debug!(
            event_id = %event_id,
            retry_count = deferred.retry_count,
            score = assessment.score,
            "Re-check inconclusive, deferred for review"
        );
        Ok(Some(RecheckOutcome::Deferred {
            event_id,
            retry_count: deferred.retry_count,
        }))
    }
}
