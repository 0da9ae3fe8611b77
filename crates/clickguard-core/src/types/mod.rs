//! Data model for the tracking pipeline

pub mod activity;
pub mod audit;
pub mod blacklist;
pub mod directory;
pub mod event;
pub mod queue;
pub mod status;
pub mod submission;
pub mod webhook;

pub use activity::{ActivityType, SuspiciousActivity};
pub use audit::{AuditAction, AuditLogEntry, SYSTEM_ACTOR};
pub use blacklist::BlacklistEntry;
pub use directory::{Affiliate, AffiliateStats, Campaign};
pub use event::{Event, EventDetails, EventKind};
pub use queue::{QueueItemStatus, QueuePriority, VerificationQueueItem};
pub use status::VerificationStatus;
pub use submission::{Caller, EventSubmission, SubmissionKind};
pub use webhook::{DeliveryStatus, WebhookDeliveryRecord};
