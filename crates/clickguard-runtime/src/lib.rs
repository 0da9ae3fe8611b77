//! ClickGuard Runtime - scoring, verification and delivery for tracked events
//!
//! This crate holds everything between an accepted submission and a trusted event:
//! - Risk Scoring Engine ([`scoring`]): fact collection and the pure composite score
//! - Verification State Machine & Queue ([`verification`]): audited status transitions
//! - Deduplication ([`dedup`]): idempotency keys, session clicks, near-identical conversions
//! - Notification Dispatcher ([`notify`]): partner webhooks with bounded retries
//! - Campaign click analysis ([`report`]) and blacklist management ([`lists`])
//! - Storage traits with in-memory and PostgreSQL backends ([`storage`])

pub mod dedup;
pub mod error;
pub mod integrity;
pub mod lists;
pub mod notify;
pub mod observability;
pub mod report;
pub mod scoring;
pub mod storage;
pub mod verification;

// Re-export main types
pub use dedup::{DedupConfig, DedupProbe, DedupVerdict, DedupWindow, Deduplicator, DuplicateReason};
pub use error::{Result, RuntimeError};
pub use integrity::{is_well_formed_signature, EventSigner, IdentifierHasher, ServerSecret};
pub use lists::{BlacklistBackend, BlacklistService, MemoryBackend};
pub use notify::{
    DeliveryOutcome, DispatcherConfig, ReqwestTransport, TransportResponse, WebhookDispatcher,
    WebhookPayload, WebhookTransport,
};
pub use observability::{Counter, Histogram, MetricsCollector};
pub use report::{CampaignAnalyzer, FraudReport, HourConcentration, ReportConfig, SourceCount};
pub use scoring::{
    Decision, FactCollector, FactProbe, Heuristic, RiskAssessment, RiskFacts, RiskScorer, ScoringConfig,
    ScoringSubject, Severity, Signal,
};
pub use storage::{
    ActivityLog, DeliveryStore, Directory, DirectorySeed, EventQuery, EventStore, InMemoryStore, QueueStore,
    StaticDirectory,
};
pub use verification::{
    Actor, AutoReviewer, Genesis, QueueConfig, RecheckOutcome, ReviewAction, Transition,
    VerificationQueue, VerificationService,
};
