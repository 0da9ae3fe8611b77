//! Builder pattern for TrackingPipeline

use crate::config::PipelineConfig;
use crate::error::{Result, SdkError};
use crate::pipeline::TrackingPipeline;
use clickguard_core::{SharedClock, SystemClock};
use clickguard_runtime::{
    ActivityLog, AutoReviewer, BlacklistBackend, BlacklistService, CampaignAnalyzer,
    DeliveryStore, Deduplicator, Directory, EventSigner, EventStore, FactCollector,
    IdentifierHasher, InMemoryStore, MemoryBackend, MetricsCollector, QueueStore,
    ReqwestTransport, RiskScorer, ServerSecret, StaticDirectory, VerificationQueue,
    VerificationService, WebhookDispatcher, WebhookTransport,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Builder for TrackingPipeline
///
/// # Example
///
/// ```rust,ignore
/// use clickguard_sdk::{PipelineConfig, TrackingPipelineBuilder};
///
/// // In-memory stores, directory seeded from YAML
/// let pipeline = TrackingPipelineBuilder::new()
///     .with_config(PipelineConfig::from_file("config/pipeline.yaml")?)
///     .with_directory_seed("config/directory.yaml")
///     .with_secret("a-long-server-held-secret")
///     .build()
///     .await?;
///
/// // PostgreSQL for everything
/// let store = Arc::new(PostgresStore::connect("postgresql://localhost/clickguard").await?);
/// let pipeline = TrackingPipelineBuilder::new()
///     .with_postgres(store)
///     .with_secret(secret)
///     .build()
///     .await?;
/// ```
pub struct TrackingPipelineBuilder {
    config: PipelineConfig,
    secret: Option<String>,
    clock: Option<SharedClock>,
    events: Option<Arc<dyn EventStore>>,
    queue_store: Option<Arc<dyn QueueStore>>,
    deliveries: Option<Arc<dyn DeliveryStore>>,
    activity: Option<Arc<dyn ActivityLog>>,
    directory: Option<Arc<dyn Directory>>,
    blacklist: Option<Arc<dyn BlacklistBackend>>,
    transport: Option<Arc<dyn WebhookTransport>>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl TrackingPipelineBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
            secret: None,
            clock: None,
            events: None,
            queue_store: None,
            deliveries: None,
            activity: None,
            directory: None,
            blacklist: None,
            transport: None,
            metrics: None,
        }
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Server-held secret; takes precedence over `server_secret` in the config
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Use one in-memory store for events, queue, deliveries and activities
    pub fn with_memory_store(mut self, store: Arc<InMemoryStore>) -> Self {
        self.events = Some(store.clone());
        self.queue_store = Some(store.clone());
        self.deliveries = Some(store.clone());
        self.activity = Some(store);
        self
    }

    /// Use PostgreSQL for every store, the directory and the blacklist
    #[cfg(feature = "sqlx")]
    pub fn with_postgres(mut self, store: Arc<clickguard_runtime::storage::PostgresStore>) -> Self {
        tracing::info!("Configuring PostgreSQL storage");
        self.events = Some(store.clone());
        self.queue_store = Some(store.clone());
        self.deliveries = Some(store.clone());
        self.activity = Some(store.clone());
        self.directory = Some(store.clone());
        self.blacklist = Some(store);
        self
    }

    pub fn with_event_store(mut self, events: Arc<dyn EventStore>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_queue_store(mut self, queue: Arc<dyn QueueStore>) -> Self {
        self.queue_store = Some(queue);
        self
    }

    pub fn with_directory(mut self, directory: Arc<dyn Directory>) -> Self {
        self.directory = Some(directory);
        self
    }

    /// Seed the in-memory directory from a YAML file at build time
    pub fn with_directory_seed(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.directory_seed = Some(path.into());
        self
    }

    pub fn with_blacklist_backend(mut self, backend: Arc<dyn BlacklistBackend>) -> Self {
        self.blacklist = Some(backend);
        self
    }

    /// Webhook transport (defaults to reqwest)
    pub fn with_transport(mut self, transport: Arc<dyn WebhookTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    async fn load_directory(&self) -> Result<Arc<dyn Directory>> {
        if let Some(directory) = &self.directory {
            return Ok(directory.clone());
        }
        match &self.config.directory_seed {
            Some(path) => {
                let content = tokio::fs::read_to_string(path).await?;
                let directory = StaticDirectory::from_yaml_str(&content)?;
                let (campaigns, affiliates) = directory.sizes().await;
                tracing::info!(
                    path = %path.display(),
                    campaigns,
                    affiliates,
                    "Loaded directory seed"
                );
                Ok(Arc::new(directory))
            }
            None => {
                tracing::warn!("No directory configured, every submission will fail its preconditions");
                Ok(Arc::new(StaticDirectory::new()))
            }
        }
    }

    /// Build the pipeline
    pub async fn build(self) -> Result<TrackingPipeline> {
        self.config.validate()?;

        let secret = self
            .secret
            .clone()
            .or_else(|| self.config.server_secret.clone())
            .ok_or_else(|| SdkError::Config("a server secret is required".to_string()))?;
        let secret = ServerSecret::new(secret)?;
        let hasher = IdentifierHasher::new(&secret)?;
        let signer = EventSigner::new(&secret)?;

        let directory = self.load_directory().await?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let metrics = self.metrics.unwrap_or_default();

        let memory = Arc::new(InMemoryStore::new());
        let events: Arc<dyn EventStore> = self.events.unwrap_or_else(|| memory.clone());
        let queue_store: Arc<dyn QueueStore> = self.queue_store.unwrap_or_else(|| memory.clone());
        let deliveries: Arc<dyn DeliveryStore> =
            self.deliveries.unwrap_or_else(|| memory.clone());
        let activity: Arc<dyn ActivityLog> = self.activity.unwrap_or_else(|| memory.clone());
        let blacklist_backend: Arc<dyn BlacklistBackend> = self
            .blacklist
            .unwrap_or_else(|| Arc::new(MemoryBackend::new()));

        let config = self.config;
        let transport: Arc<dyn WebhookTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(Duration::from_millis(
                config.webhooks.request_timeout_ms,
            ))?),
        };

        let scorer = Arc::new(RiskScorer::new(config.scoring.clone())?);
        let blacklist = BlacklistService::new(blacklist_backend, hasher.clone(), clock.clone());
        let collector = FactCollector::new(
            events.clone(),
            blacklist.clone(),
            config.scoring.clone(),
            config.lookup_timeout(),
        )
        .with_metrics(metrics.clone());

        let dispatcher = WebhookDispatcher::new(
            transport,
            deliveries.clone(),
            events.clone(),
            config.webhooks.clone(),
            clock.clone(),
        );
        let queue = VerificationQueue::new(queue_store, config.queue.clone(), clock.clone());
        let service =
            VerificationService::new(events.clone(), queue, clock.clone()).with_notifier(dispatcher);
        let reviewer = AutoReviewer::new(
            events.clone(),
            service.clone(),
            collector.clone(),
            scorer.clone(),
        );
        let analyzer = CampaignAnalyzer::new(
            events.clone(),
            activity.clone(),
            config.report.clone(),
            clock.clone(),
        );
        let dedup = Deduplicator::new(events.clone(), config.dedup.clone());

        tracing::info!(
            auto_verify = config.auto_verify,
            webhook_targets = config.webhooks.targets.len(),
            "Tracking pipeline ready"
        );

        Ok(TrackingPipeline {
            config,
            clock,
            directory,
            events,
            deliveries,
            activity,
            hasher,
            signer,
            dedup,
            collector,
            scorer,
            service,
            reviewer,
            blacklist,
            analyzer,
            metrics,
        })
    }
}

impl Default for TrackingPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
