//! Review, queue, blacklist and reporting operations

use super::gateway::TrackingPipeline;
use crate::error::Result;
use clickguard_core::{
    AffiliateStats, AuditLogEntry, BlacklistEntry, Event, SuspiciousActivity,
    VerificationQueueItem, VerificationStatus, WebhookDeliveryRecord,
};
use clickguard_runtime::{FraudReport, RecheckOutcome, ReviewAction};

impl TrackingPipeline {
    /// Apply a reviewer decision to an event.
    ///
    /// Returns `false` when the event already holds the requested status.
    /// Overriding a terminal decision is allowed for reviewers and recorded
    /// as a manual override in the audit trail.
    pub async fn verify_conversion(
        &self,
        event_id: &str,
        action: ReviewAction,
        reviewer_id: &str,
        notes: Option<String>,
    ) -> Result<bool> {
        let changed = self
            .service
            .review(event_id, action, reviewer_id, notes)
            .await?;
        if changed {
            self.metrics
                .counter(match action {
                    ReviewAction::Verify => "reviews_verified",
                    ReviewAction::Reject => "reviews_rejected",
                })
                .inc();
        }
        Ok(changed)
    }

    pub async fn event(&self, event_id: &str) -> Result<Option<Event>> {
        Ok(self.events.get_event(event_id).await?)
    }

    pub async fn audit_trail(&self, event_id: &str) -> Result<Vec<AuditLogEntry>> {
        Ok(self.service.audit_trail(event_id).await?)
    }

    /// Status reconstructed from the audit trail
    pub async fn replayed_status(&self, event_id: &str) -> Result<VerificationStatus> {
        Ok(self.service.replayed_status(event_id).await?)
    }

    /// True if the stored event still matches its server-side signature
    pub async fn verify_integrity(&self, event_id: &str) -> Result<Option<bool>> {
        let event = self.events.get_event(event_id).await?;
        Ok(event.map(|e| self.signer.verify(&e)))
    }

    /// Claim the most urgent due review item for a human reviewer
    pub async fn claim_next_review(&self) -> Result<Option<VerificationQueueItem>> {
        Ok(self.service.queue().claim_next().await?)
    }

    pub async fn open_reviews(&self) -> Result<Vec<VerificationQueueItem>> {
        Ok(self.service.queue().open_items().await?)
    }

    /// Run the automated re-check on the next due review item
    pub async fn recheck_next(&self) -> Result<Option<RecheckOutcome>> {
        let outcome = self.reviewer.recheck_next().await?;
        if let Some(RecheckOutcome::Rejected { .. }) = &outcome {
            self.metrics.counter("recheck_rejections").inc();
        }
        Ok(outcome)
    }

    /// Block a raw client identifier; returns its hash
    pub async fn block_identifier(&self, raw: &str, reason: &str) -> Result<String> {
        Ok(self.blacklist.block_identifier(raw, reason).await?)
    }

    /// Deactivate every active entry for a hashed identifier
    pub async fn unblock_identifier(&self, hashed_identifier: &str) -> Result<usize> {
        Ok(self.blacklist.unblock(hashed_identifier).await?)
    }

    pub async fn is_blacklisted(&self, hashed_identifier: &str) -> Result<bool> {
        Ok(self.blacklist.contains(hashed_identifier).await?)
    }

    pub async fn blacklist_history(&self, hashed_identifier: &str) -> Result<Vec<BlacklistEntry>> {
        Ok(self.blacklist.history(hashed_identifier).await?)
    }

    /// Keyed hash of a raw identifier, as stored on events
    pub fn hash_identifier(&self, raw: &str) -> String {
        self.hasher.hash(raw)
    }

    /// Click population analysis of a campaign
    pub async fn fraud_report(
        &self,
        campaign_id: &str,
        window_hours: Option<i64>,
    ) -> Result<FraudReport> {
        Ok(self.analyzer.analyze(campaign_id, window_hours).await?)
    }

    pub async fn suspicious_activities(&self, campaign_id: &str) -> Result<Vec<SuspiciousActivity>> {
        Ok(self.activity.activities_for_campaign(campaign_id).await?)
    }

    pub async fn affiliate_stats(&self, affiliate_id: &str) -> Result<Option<AffiliateStats>> {
        Ok(self.events.affiliate_stats(affiliate_id).await?)
    }

    pub async fn deliveries_for(&self, event_id: &str) -> Result<Vec<WebhookDeliveryRecord>> {
        Ok(self.deliveries.deliveries_for(event_id).await?)
    }

    /// Drop expired dedup window entries; returns how many were removed
    pub fn purge_dedup_window(&self) -> usize {
        self.dedup.window().purge_expired(self.clock.now())
    }
}
