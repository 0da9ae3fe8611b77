//! Core TrackingPipeline implementation

use super::types::IngestResponse;
use crate::config::PipelineConfig;
use crate::error::{PreconditionError, Result, SdkError};
use clickguard_core::{
    commission_for, ActivityType, Affiliate, Caller, Event, EventDetails, EventSubmission,
    SharedClock, SubmissionKind, SuspiciousActivity, VerificationStatus,
};
use clickguard_runtime::verification::genesis;
use clickguard_runtime::{
    ActivityLog, AutoReviewer, BlacklistService, CampaignAnalyzer, Decision, DedupProbe,
    DedupVerdict, Deduplicator, DeliveryStore, Directory, EventSigner, EventStore, FactCollector,
    FactProbe, IdentifierHasher, MetricsCollector, RiskAssessment, RiskScorer, ScoringSubject,
    VerificationService,
};
use std::sync::Arc;
use std::time::Instant;

/// Ingestion gateway and entry point for every pipeline operation
#[derive(Clone)]
pub struct TrackingPipeline {
    pub(crate) config: PipelineConfig,
    pub(crate) clock: SharedClock,
    pub(crate) directory: Arc<dyn Directory>,
    pub(crate) events: Arc<dyn EventStore>,
    pub(crate) deliveries: Arc<dyn DeliveryStore>,
    pub(crate) activity: Arc<dyn ActivityLog>,
    pub(crate) hasher: IdentifierHasher,
    pub(crate) signer: EventSigner,
    pub(crate) dedup: Deduplicator,
    pub(crate) collector: FactCollector,
    pub(crate) scorer: Arc<RiskScorer>,
    pub(crate) service: VerificationService,
    pub(crate) reviewer: AutoReviewer,
    pub(crate) blacklist: BlacklistService,
    pub(crate) analyzer: CampaignAnalyzer,
    pub(crate) metrics: Arc<MetricsCollector>,
}

fn require(value: &str, field: &'static str) -> std::result::Result<(), PreconditionError> {
    if value.trim().is_empty() {
        return Err(PreconditionError::MissingField(field));
    }
    Ok(())
}

fn caller_id(caller: &Caller) -> Option<String> {
    match caller {
        Caller::Anonymous => None,
        Caller::User(id) => Some(id.clone()),
    }
}

impl TrackingPipeline {
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }

    /// Ingest a click or conversion.
    ///
    /// Steps run in a fixed order: preconditions, deduplication, scoring,
    /// persistence, dedup registration, rejection handling, queueing and
    /// automatic verification. A rejected event is persisted before
    /// [`SdkError::Rejected`] is returned.
    pub async fn ingest(&self, submission: EventSubmission) -> Result<IngestResponse> {
        let started = Instant::now();
        self.metrics.counter("events_received").inc();

        let result = self.ingest_inner(submission).await;

        self.metrics.record_duration("ingest", started.elapsed());
        match &result {
            Ok(_) => self.metrics.counter("events_accepted").inc(),
            Err(SdkError::Rejected { .. }) => self.metrics.counter("events_rejected").inc(),
            Err(SdkError::Precondition(_)) => self.metrics.record_error("precondition"),
            Err(_) => self.metrics.record_error("ingest"),
        }
        result
    }

    async fn ingest_inner(&self, submission: EventSubmission) -> Result<IngestResponse> {
        let affiliate = self.check_preconditions(&submission).await?;

        let now = self.clock.now();
        let hashed_identifier = self.hasher.hash(&submission.client_ip);
        let session_key = self.session_key(&submission);

        let probe = DedupProbe {
            idempotency_key: submission.idempotency_key.as_deref(),
            affiliate_id: &submission.affiliate_id,
            campaign_id: &submission.campaign_id,
            session_key: &session_key,
            kind: submission.event_kind(),
            amount: submission.amount(),
            at: now,
        };
        if let DedupVerdict::Duplicate {
            original_id,
            reason,
        } = self.dedup.check(&probe).await
        {
            if let Some(original) = self.events.get_event(&original_id).await? {
                tracing::info!(
                    original_id = %original_id,
                    reason = ?reason,
                    "Collapsed duplicate submission"
                );
                self.metrics.counter("duplicates_collapsed").inc();
                return self.replay_response(&original).await;
            }
            tracing::warn!(
                original_id = %original_id,
                "Duplicate points at a missing event, ingesting as new"
            );
        }

        let facts = self
            .collector
            .collect(&FactProbe {
                kind: submission.event_kind(),
                hashed_identifier: &hashed_identifier,
                affiliate_id: &submission.affiliate_id,
                at: now,
                exclude_id: None,
            })
            .await;
        let assessment = self
            .scorer
            .assess(&ScoringSubject::from_submission(&submission), &facts);
        let reasons = assessment.reasons();

        let mut event = Event {
            id: uuid::Uuid::new_v4().to_string(),
            affiliate_id: submission.affiliate_id.clone(),
            campaign_id: submission.campaign_id.clone(),
            details: match &submission.kind {
                SubmissionKind::Click { referrer } => EventDetails::Click {
                    referrer: referrer.clone(),
                },
                SubmissionKind::Conversion { amount } => EventDetails::Conversion {
                    amount: *amount,
                    commission: commission_for(*amount, affiliate.commission_rate),
                },
            },
            timestamp: now,
            session_key,
            hashed_identifier,
            user_agent: submission.user_agent_str().to_string(),
            client_fingerprint: submission.client_fingerprint.clone(),
            signature: String::new(),
            risk_score: assessment.score,
            status: VerificationStatus::Pending,
            security_flags: reasons.clone(),
            webhook_validated: false,
        };
        event.signature = self.signer.sign(&event);

        let created = genesis(event, assessment.decision, &reasons);
        self.events.insert_event(&created).await?;
        let event = created.into_event();

        self.dedup
            .remember(&event, submission.idempotency_key.as_deref());

        tracing::info!(
            event_id = %event.id,
            kind = %event.kind(),
            affiliate_id = %event.affiliate_id,
            campaign_id = %event.campaign_id,
            risk_score = event.risk_score,
            decision = ?assessment.decision,
            degraded = assessment.degraded,
            "Event ingested"
        );

        if assessment.decision == Decision::Rejected {
            self.record_rejection(&event, &submission.caller, &assessment)
                .await;
            return Err(SdkError::Rejected {
                event_id: event.id,
                reasons,
            });
        }

        let priority = self
            .scorer
            .queue_priority(assessment.decision, event.amount());
        if let Some(priority) = priority {
            if let Err(e) = self.service.queue().enqueue(&event, priority).await {
                tracing::error!(event_id = %event.id, error = %e, "Failed to enqueue event for review");
            }
            return Ok(IngestResponse::for_event(&event, true));
        }

        if self.config.auto_verify {
            match self.service.auto_verify(&event.id).await {
                Ok(verified) => return Ok(IngestResponse::for_event(&verified, false)),
                Err(e) => {
                    tracing::error!(event_id = %event.id, error = %e, "Automatic verification failed");
                }
            }
        }

        Ok(IngestResponse::for_event(&event, false))
    }

    /// Validate ids, directory records and the amount; returns the affiliate
    async fn check_preconditions(&self, submission: &EventSubmission) -> Result<Affiliate> {
        require(&submission.affiliate_id, "affiliateId")?;
        require(&submission.campaign_id, "campaignId")?;
        require(&submission.client_ip, "clientIp")?;

        let campaign = self
            .directory
            .campaign(&submission.campaign_id)
            .await?
            .ok_or_else(|| PreconditionError::CampaignNotFound(submission.campaign_id.clone()))?;
        if !campaign.is_active {
            return Err(PreconditionError::CampaignInactive(campaign.id).into());
        }

        let affiliate = self
            .directory
            .affiliate(&submission.affiliate_id)
            .await?
            .ok_or_else(|| {
                PreconditionError::AffiliateNotFound(submission.affiliate_id.clone())
            })?;
        if !affiliate.is_active {
            return Err(PreconditionError::AffiliateInactive(affiliate.id).into());
        }

        if let Some(amount) = submission.amount() {
            if amount <= 0 {
                return Err(PreconditionError::InvalidAmount(amount).into());
            }
        }

        Ok(affiliate)
    }

    /// Client session id, else client fingerprint, else a hash of IP and user agent
    fn session_key(&self, submission: &EventSubmission) -> String {
        let provided = [
            submission.session_id.as_deref(),
            submission.client_fingerprint.as_deref(),
        ]
        .into_iter()
        .flatten()
        .find(|s| !s.trim().is_empty());
        match provided {
            Some(key) => key.to_string(),
            None => self.hasher.hash(&format!(
                "{}|{}",
                submission.client_ip,
                submission.user_agent_str()
            )),
        }
    }

    /// Answer a duplicate with the outcome of the event it collapses into
    async fn replay_response(&self, original: &Event) -> Result<IngestResponse> {
        if original.status == VerificationStatus::Rejected {
            return Err(SdkError::Rejected {
                event_id: original.id.clone(),
                reasons: original.security_flags.clone(),
            });
        }
        let queued = match self.service.queue().open_item(&original.id).await {
            Ok(item) => item.is_some(),
            Err(e) => {
                tracing::warn!(event_id = %original.id, error = %e, "Queue lookup failed");
                false
            }
        };
        let requires_review = queued || original.status == VerificationStatus::Suspicious;
        Ok(IngestResponse::for_event(original, requires_review))
    }

    async fn record_rejection(&self, event: &Event, caller: &Caller, assessment: &RiskAssessment) {
        let mut activity = SuspiciousActivity::new(
            event.campaign_id.clone(),
            ActivityType::RejectedEvent,
            event.timestamp,
        );
        activity.event_id = Some(event.id.clone());
        activity.affiliate_id = Some(event.affiliate_id.clone());
        activity.hashed_identifier = Some(event.hashed_identifier.clone());
        activity.user_agent = Some(event.user_agent.clone());
        activity.referrer = event.referrer().map(str::to_string);
        activity.client_fingerprint = event.client_fingerprint.clone();
        activity.caller = caller_id(caller);
        activity.reasons = assessment.reasons();
        activity.details = serde_json::json!({
            "kind": event.kind(),
            "amount": event.amount(),
            "riskScore": assessment.score,
            "gateScore": assessment.gate_score,
            "degraded": assessment.degraded,
        });

        tracing::warn!(
            event_id = %event.id,
            affiliate_id = %event.affiliate_id,
            reasons = ?activity.reasons,
            "Event rejected"
        );

        if let Err(e) = self.activity.record_activity(&activity).await {
            tracing::error!(event_id = %event.id, error = %e, "Failed to record suspicious activity");
        }
    }
}
