//! Common test utilities for SDK integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use clickguard_core::{Affiliate, Campaign, EventSubmission, ManualClock};
use clickguard_runtime::{
    BlacklistBackend, DirectorySeed, InMemoryStore, RuntimeError, StaticDirectory, TransportResponse,
    WebhookPayload, WebhookTransport,
};
use clickguard_sdk::{PipelineConfig, TrackingPipeline, TrackingPipelineBuilder};
use std::sync::{Arc, Mutex};

pub const SECRET: &str = "integration-test-secret-0123456789";
pub const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
pub const AFFILIATE: &str = "aff-1";
pub const CAMPAIGN: &str = "camp-1";
pub const WEBHOOK_URL: &str = "https://partner.example.com/hooks/conversions";

/// Records every webhook post and answers with a fixed status
pub struct RecordingTransport {
    status: u16,
    posts: Mutex<Vec<(String, WebhookPayload)>>,
}

impl RecordingTransport {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            posts: Mutex::new(Vec::new()),
        }
    }

    pub fn posts(&self) -> Vec<(String, WebhookPayload)> {
        self.posts.lock().unwrap().clone()
    }
}

#[async_trait]
impl WebhookTransport for RecordingTransport {
    async fn post(
        &self,
        url: &str,
        payload: &WebhookPayload,
    ) -> Result<TransportResponse, RuntimeError> {
        self.posts
            .lock()
            .unwrap()
            .push((url.to_string(), payload.clone()));
        Ok(TransportResponse {
            status: self.status,
            body: "ok".to_string(),
        })
    }
}

/// Pipeline wired to in-memory stores, a manual clock and a recording transport
pub struct Harness {
    pub pipeline: TrackingPipeline,
    pub store: Arc<InMemoryStore>,
    pub clock: ManualClock,
    pub transport: Arc<RecordingTransport>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_config(PipelineConfig::default()).await
    }

    pub async fn with_config(config: PipelineConfig) -> Self {
        Self::build(config, None).await
    }

    pub async fn build(config: PipelineConfig, blacklist: Option<Arc<dyn BlacklistBackend>>) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 10, 14, 0, 0).unwrap());
        let transport = Arc::new(RecordingTransport::new(200));

        let mut builder = TrackingPipelineBuilder::new();
        if let Some(backend) = blacklist {
            builder = builder.with_blacklist_backend(backend);
        }
        let pipeline = builder
            .with_config(config)
            .with_secret(SECRET)
            .with_clock(Arc::new(clock.clone()))
            .with_memory_store(store.clone())
            .with_directory(Arc::new(directory()))
            .with_transport(transport.clone())
            .build()
            .await
            .unwrap();

        Self {
            pipeline,
            store,
            clock,
            transport,
        }
    }

    pub fn advance(&self, seconds: i64) {
        self.clock.advance(Duration::seconds(seconds));
    }

    /// Wait for detached webhook deliveries to reach the transport
    pub async fn wait_for_posts(&self, expected: usize) -> Vec<(String, WebhookPayload)> {
        for _ in 0..100 {
            let posts = self.transport.posts();
            if posts.len() >= expected {
                return posts;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        self.transport.posts()
    }
}

pub fn directory() -> StaticDirectory {
    StaticDirectory::from_seed(DirectorySeed {
        campaigns: vec![
            Campaign {
                id: CAMPAIGN.to_string(),
                name: "Spring Sale".to_string(),
                is_active: true,
            },
            Campaign {
                id: "camp-closed".to_string(),
                name: "Winter Sale".to_string(),
                is_active: false,
            },
        ],
        affiliates: vec![
            Affiliate {
                id: AFFILIATE.to_string(),
                name: "Deal Blog".to_string(),
                is_active: true,
                commission_rate: 10.0,
            },
            Affiliate {
                id: "aff-suspended".to_string(),
                name: "Coupon Farm".to_string(),
                is_active: false,
                commission_rate: 15.0,
            },
        ],
    })
}

/// Browser click with its own session
pub fn click(ip: &str, session: &str) -> EventSubmission {
    EventSubmission::click(AFFILIATE, CAMPAIGN, ip)
        .with_user_agent(BROWSER_UA)
        .with_session(session)
}

/// Browser conversion with its own session
pub fn conversion(ip: &str, session: &str, amount: i64) -> EventSubmission {
    EventSubmission::conversion(AFFILIATE, CAMPAIGN, ip, amount)
        .with_user_agent(BROWSER_UA)
        .with_session(session)
}
