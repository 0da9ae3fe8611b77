//! ClickGuard Core - Core types and definitions for the ClickGuard tracking pipeline
//!
//! This crate provides the fundamental types shared across the ClickGuard workspace:
//! - Tracked events (clicks and conversions) and their verification status
//! - Audit trail, verification queue, blacklist and webhook delivery records
//! - Collaborator records (campaigns, affiliates) and commission arithmetic
//! - A clock abstraction and error types

pub mod clock;
pub mod commission;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use commission::commission_for;
pub use error::{CoreError, Result};
pub use types::{
    ActivityType, Affiliate, AffiliateStats, AuditAction, AuditLogEntry, BlacklistEntry,
    Caller, Campaign, DeliveryStatus, Event, EventDetails, EventKind, EventSubmission,
    QueueItemStatus, QueuePriority, SubmissionKind, SuspiciousActivity, VerificationQueueItem,
    VerificationStatus, WebhookDeliveryRecord, SYSTEM_ACTOR,
};
