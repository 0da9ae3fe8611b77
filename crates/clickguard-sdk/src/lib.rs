//! ClickGuard SDK
//!
//! High-level API for ingesting affiliate clicks and conversions: the
//! [`TrackingPipeline`] validates, deduplicates, scores, persists and routes
//! every submission, and exposes review, blacklist and reporting operations.

pub mod builder;
pub mod config;
pub mod error;
pub mod pipeline;

// Re-export main types
pub use builder::TrackingPipelineBuilder;
pub use config::PipelineConfig;
pub use error::{PreconditionError, Result, SdkError};
pub use pipeline::{IngestResponse, TrackingPipeline};

// Re-export commonly used types from dependencies
pub use clickguard_core::{
    Affiliate, AuditAction, AuditLogEntry, Caller, Campaign, Event, EventKind, EventSubmission,
    VerificationStatus,
};
pub use clickguard_runtime::{
    FraudReport, MetricsCollector, RecheckOutcome, ReviewAction, RuntimeError,
};
