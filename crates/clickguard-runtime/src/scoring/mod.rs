//! Risk Scoring Engine
//!
//! Scoring is split in two halves:
//! - [`FactCollector`] performs the async lookups (blacklist, rate, velocity),
//!   each bounded by a timeout and degrading to "unknown" on failure
//! - [`RiskScorer`] is a pure function from a [`ScoringSubject`] and its
//!   [`RiskFacts`] to a [`RiskAssessment`]

mod config;
mod engine;
mod facts;
mod heuristics;

pub use config::ScoringConfig;
pub use engine::{Decision, RiskAssessment, RiskScorer, ScoringSubject};
pub use facts::{FactCollector, FactProbe, RiskFacts};
pub use heuristics::{Heuristic, Severity, Signal};
