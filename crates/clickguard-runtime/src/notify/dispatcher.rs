//! Webhook dispatcher with bounded retries

use super::transport::{WebhookPayload, WebhookTransport, MAX_RESPONSE_BODY};
use crate::error::{Result, RuntimeError};
use crate::storage::{DeliveryStore, EventStore};
use chrono::{DateTime, Duration, Utc};
use clickguard_core::{DeliveryStatus, Event, SharedClock, WebhookDeliveryRecord};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Partner endpoints notified for every verified conversion
    pub targets: Vec<String>,
    pub max_retries: u32,
    pub base_backoff_ms: i64,
    pub request_timeout_ms: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            max_retries: 3,
            base_backoff_ms: 1000,
            request_timeout_ms: 5000,
        }
    }
}

impl DispatcherConfig {
    /// Delay before the `retry_count`-th retry (1-based)
    pub fn backoff(&self, retry_count: u32) -> Duration {
        let exponent = retry_count.saturating_sub(1).min(20);
        Duration::milliseconds(self.base_backoff_ms.saturating_mul(1i64 << exponent))
    }
}

/// Result of a single delivery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    PendingRetry { next_attempt_at: DateTime<Utc> },
    Exhausted,
}

fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_RESPONSE_BODY {
        return body.to_string();
    }
    let mut end = MAX_RESPONSE_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    body[..end].to_string()
}

#[derive(Clone)]
pub struct WebhookDispatcher {
    transport: Arc<dyn WebhookTransport>,
    deliveries: Arc<dyn DeliveryStore>,
    events: Arc<dyn EventStore>,
    config: DispatcherConfig,
    clock: SharedClock,
}

impl WebhookDispatcher {
    pub fn new(
        transport: Arc<dyn WebhookTransport>,
        deliveries: Arc<dyn DeliveryStore>,
        events: Arc<dyn EventStore>,
        config: DispatcherConfig,
        clock: SharedClock,
    ) -> Self {
        Self {
            transport,
            deliveries,
            events,
            config,
            clock,
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Perform one attempt for `record` and persist the result
    pub async fn attempt(
        &self,
        record: &mut WebhookDeliveryRecord,
        event: &Event,
    ) -> Result<DeliveryOutcome> {
        let payload = WebhookPayload::from_event(event).ok_or_else(|| {
            RuntimeError::InvalidInput(format!("event {} is not a conversion", event.id))
        })?;

        let sent_at = self.clock.now();
        record.sent_at = Some(sent_at);

        let delivered = match self.transport.post(&record.target_url, &payload).await {
            Ok(response) => {
                record.response_code = Some(response.status);
                record.response_body = Some(truncate_body(&response.body));
                record.received_at = Some(self.clock.now());
                response.is_success()
            }
            Err(e) => {
                record.response_code = None;
                record.response_body = Some(truncate_body(&e.to_string()));
                record.received_at = None;
                false
            }
        };

        let outcome = if delivered {
            record.status = DeliveryStatus::Success;
            DeliveryOutcome::Delivered
        } else if record.retry_count < record.max_retries {
            record.retry_count += 1;
            DeliveryOutcome::PendingRetry {
                next_attempt_at: sent_at + self.config.backoff(record.retry_count),
            }
        } else {
            record.status = DeliveryStatus::Failed;
            DeliveryOutcome::Exhausted
        };

        self.deliveries.save_delivery(record).await?;

        match outcome {
            DeliveryOutcome::Delivered => {
                if let Err(e) = self.events.mark_webhook_validated(&event.id).await {
                    tracing::warn!(event_id = %event.id, error = %e, "Failed to flag webhook as validated");
                }
            }
            DeliveryOutcome::PendingRetry { next_attempt_at } => {
                tracing::warn!(
                    event_id = %event.id,
                    target = %record.target_url,
                    code = ?record.response_code,
                    retry = record.retry_count,
                    next_attempt_at = %next_attempt_at,
                    "Webhook attempt failed, retry scheduled"
                );
            }
            DeliveryOutcome::Exhausted => {
                tracing::error!(
                    event_id = %event.id,
                    target = %record.target_url,
                    code = ?record.response_code,
                    "Webhook delivery exhausted retries"
                );
            }
        }

        Ok(outcome)
    }

    /// Drive delivery to every configured target until it succeeds or exhausts
    pub async fn deliver(&self, event: &Event) -> Result<Vec<DeliveryOutcome>> {
        let mut outcomes = Vec::with_capacity(self.config.targets.len());

        for target in &self.config.targets {
            let mut record =
                WebhookDeliveryRecord::new(&event.id, target, self.config.max_retries);
            self.deliveries.save_delivery(&record).await?;

            loop {
                match self.attempt(&mut record, event).await? {
                    DeliveryOutcome::PendingRetry { next_attempt_at } => {
                        let wait = (next_attempt_at - self.clock.now())
                            .to_std()
                            .unwrap_or_default();
                        tokio::time::sleep(wait).await;
                    }
                    outcome => {
                        outcomes.push(outcome);
                        break;
                    }
                }
            }
        }

        Ok(outcomes)
    }

    /// Run [`deliver`](Self::deliver) on a detached task
    pub fn spawn_delivery(&self, event: Event) -> tokio::task::JoinHandle<()> {
        let dispatcher = self.clone();
        tokio::spawn(async move {
            if dispatcher.config.targets.is_empty() {
                return;
            }
            match dispatcher.deliver(&event).await {
                Ok(outcomes) => {
                    let delivered = outcomes
                        .iter()
                        .filter(|o| **o == DeliveryOutcome::Delivered)
                        .count();
                    tracing::info!(
                        event_id = %event.id,
                        delivered,
                        targets = outcomes.len(),
                        "Webhook delivery finished"
                    );
                }
                Err(e) => {
                    tracing::error!(event_id = %event.id, error = %e, "Webhook delivery failed");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::TransportResponse;
    use crate::scoring::Decision;
    use crate::storage::InMemoryStore;
    use crate::verification::genesis;
    use async_trait::async_trait;
    use clickguard_core::{EventDetails, SystemClock, VerificationStatus};
    use std::sync::Mutex;

    /// Replies with the scripted status codes in order, then repeats the last
    struct ScriptedTransport {
        statuses: Mutex<Vec<u16>>,
        calls: Mutex<u32>,
    }

    impl ScriptedTransport {
        fn new(statuses: &[u16]) -> Self {
            Self {
                statuses: Mutex::new(statuses.iter().rev().copied().collect()),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl WebhookTransport for ScriptedTransport {
        async fn post(&self, _url: &str, _payload: &WebhookPayload) -> Result<TransportResponse> {
            *self.calls.lock().unwrap() += 1;
            let mut statuses = self.statuses.lock().unwrap();
            let status = if statuses.len() > 1 {
                statuses.pop().unwrap()
            } else {
                statuses[0]
            };
            if status == 0 {
                return Err(RuntimeError::Delivery("connection refused".into()));
            }
            Ok(TransportResponse {
                status,
                body: "x".repeat(4096),
            })
        }
    }

    fn conversion() -> Event {
        Event {
            id: "c1".to_string(),
            affiliate_id: "aff".to_string(),
            campaign_id: "camp".to_string(),
            details: EventDetails::Conversion {
                amount: 10_000,
                commission: 500,
            },
            timestamp: Utc::now(),
            session_key: "s".to_string(),
            hashed_identifier: "h".to_string(),
            user_agent: String::new(),
            client_fingerprint: None,
            signature: String::new(),
            risk_score: 0,
            status: VerificationStatus::Verified,
            security_flags: vec![],
            webhook_validated: false,
        }
    }

    async fn setup(statuses: &[u16]) -> (Arc<InMemoryStore>, Arc<ScriptedTransport>, WebhookDispatcher) {
        let store = Arc::new(InMemoryStore::new());
        store
            .insert_event(&genesis(conversion(), Decision::Pending, &[]))
            .await
            .unwrap();
        let transport = Arc::new(ScriptedTransport::new(statuses));
        let config = DispatcherConfig {
            targets: vec!["https://partner.example/hook".to_string()],
            base_backoff_ms: 1,
            ..DispatcherConfig::default()
        };
        let dispatcher = WebhookDispatcher::new(
            transport.clone(),
            store.clone(),
            store.clone(),
            config,
            Arc::new(SystemClock),
        );
        (store, transport, dispatcher)
    }

    #[test]
    fn test_backoff_schedule() {
        let config = DispatcherConfig::default();
        assert_eq!(config.backoff(1), Duration::seconds(1));
        assert_eq!(config.backoff(2), Duration::seconds(2));
        assert_eq!(config.backoff(3), Duration::seconds(4));
    }

    #[test]
    fn test_truncate_body_respects_char_boundaries() {
        assert_eq!(truncate_body("short"), "short");
        let long = "é".repeat(1000);
        let cut = truncate_body(&long);
        assert!(cut.len() <= MAX_RESPONSE_BODY);
        assert!(cut.chars().all(|c| c == 'é'));
    }

    #[tokio::test]
    async fn test_delivered_after_retries() {
        let (store, transport, dispatcher) = setup(&[500, 0, 200]).await;

        let outcomes = dispatcher.deliver(&conversion()).await.unwrap();
        assert_eq!(outcomes, vec![DeliveryOutcome::Delivered]);
        assert_eq!(transport.calls(), 3);

        let records = store.deliveries_for("c1").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, DeliveryStatus::Success);
        assert_eq!(records[0].retry_count, 2);
        assert_eq!(records[0].response_code, Some(200));
        assert_eq!(records[0].response_body.as_ref().unwrap().len(), MAX_RESPONSE_BODY);

        let event = store.get_event("c1").await.unwrap().unwrap();
        assert!(event.webhook_validated);
    }

    #[tokio::test]
    async fn test_exhausted_after_max_retries() {
        let (store, transport, dispatcher) = setup(&[503]).await;

        let outcomes = dispatcher.deliver(&conversion()).await.unwrap();
        assert_eq!(outcomes, vec![DeliveryOutcome::Exhausted]);
        assert_eq!(transport.calls(), 4);

        let record = &store.deliveries_for("c1").await.unwrap()[0];
        assert_eq!(record.status, DeliveryStatus::Failed);
        assert_eq!(record.retry_count, record.max_retries);

        // Failure never touches verification status
        let event = store.get_event("c1").await.unwrap().unwrap();
        assert_eq!(event.status, VerificationStatus::Pending);
        assert!(!event.webhook_validated);
    }

    #[tokio::test]
    async fn test_clicks_are_not_delivered() {
        let (_store, _transport, dispatcher) = setup(&[200]).await;
        let mut click = conversion();
        click.details = EventDetails::Click { referrer: None };

        let mut record = WebhookDeliveryRecord::new("c1", "https://partner.example/hook", 3);
        assert!(matches!(
            dispatcher.attempt(&mut record, &click).await,
            Err(RuntimeError::InvalidInput(_))
        ));
    }
}
