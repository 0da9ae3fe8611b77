//! Verification State Machine & Queue
//!
//! - [`state`]: legal status transitions, audit entries and trail replay
//! - [`queue`]: prioritized manual-review queue
//! - [`service`]: applies transitions through the store and handles side effects
//! - [`recheck`]: automated re-check of queued events

mod queue;
mod recheck;
mod service;
pub mod state;

pub use queue::{QueueConfig, VerificationQueue};
pub use recheck::{AutoReviewer, RecheckOutcome};
pub use service::{ReviewAction, VerificationService};
pub use state::{genesis, plan, replay, Actor, Genesis, Transition};
