//! Composite risk score

use super::config::ScoringConfig;
use super::facts::RiskFacts;
use super::heuristics::{Heuristic, Severity, Signal};
use crate::error::{Result, RuntimeError};
use clickguard_core::{Event, EventKind, EventSubmission, QueuePriority, VerificationStatus};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// The per-event inputs to scoring, dispatched on event kind once
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringSubject {
    pub kind: EventKind,
    /// Conversion amount; `None` for clicks
    pub amount: Option<i64>,
    pub user_agent: String,
}

impl ScoringSubject {
    pub fn from_submission(submission: &EventSubmission) -> Self {
        Self {
            kind: submission.event_kind(),
            amount: submission.amount(),
            user_agent: submission.user_agent_str().to_string(),
        }
    }

    pub fn from_event(event: &Event) -> Self {
        Self {
            kind: event.kind(),
            amount: event.amount(),
            user_agent: event.user_agent.clone(),
        }
    }
}

/// Scoring outcome for a new event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Pending,
    Suspicious,
    Rejected,
}

impl Decision {
    /// Status the event holds once its genesis is persisted
    pub fn status(&self) -> VerificationStatus {
        match self {
            Decision::Pending => VerificationStatus::Pending,
            Decision::Suspicious => VerificationStatus::Suspicious,
            Decision::Rejected => VerificationStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Composite score, clamped to 0..=100. Reported to callers and used for
    /// queue priority; it does not decide rejection.
    pub score: u8,
    /// Score of blocking heuristics only, clamped to 0..=100. Rejection
    /// happens at `reject_threshold`. A conversion with `very_high_amount`
    /// and `short_user_agent` has `score` 100 but `gate_score` 40, and is
    /// queued as suspicious.
    pub gate_score: u8,
    pub signals: Vec<Signal>,
    /// True if any lookup failed and contributed nothing
    pub degraded: bool,
    pub decision: Decision,
}

impl RiskAssessment {
    /// Reason tags in trigger order
    pub fn reasons(&self) -> Vec<String> {
        self.signals
            .iter()
            .map(|s| s.heuristic.tag().to_string())
            .collect()
    }

    pub fn has(&self, heuristic: Heuristic) -> bool {
        self.signals.iter().any(|s| s.heuristic == heuristic)
    }
}

fn clamp_points(points: u32) -> u8 {
    points.min(100) as u8
}

/// Pure scoring over subject and facts
#[derive(Debug, Clone)]
pub struct RiskScorer {
    config: ScoringConfig,
    bot_pattern: Option<Regex>,
}

impl RiskScorer {
    /// Compile the configured bot patterns into one case-insensitive matcher
    pub fn new(config: ScoringConfig) -> Result<Self> {
        let bot_pattern = if config.bot_patterns.is_empty() {
            None
        } else {
            let alternation = config
                .bot_patterns
                .iter()
                .map(|p| format!("(?:{})", p))
                .collect::<Vec<_>>()
                .join("|");
            let regex = RegexBuilder::new(&alternation)
                .case_insensitive(true)
                .build()
                .map_err(|e| RuntimeError::Config(format!("invalid bot pattern: {}", e)))?;
            Some(regex)
        };

        Ok(Self {
            config,
            bot_pattern,
        })
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn is_bot_user_agent(&self, user_agent: &str) -> bool {
        self.bot_pattern
            .as_ref()
            .is_some_and(|re| re.is_match(user_agent))
    }

    /// Evaluate all heuristics for one subject
    pub fn assess(&self, subject: &ScoringSubject, facts: &RiskFacts) -> RiskAssessment {
        if facts.blacklisted == Some(true) {
            return self.combine(vec![Signal::new(Heuristic::Blacklisted)], false);
        }

        let mut signals = Vec::new();

        if let Some(recent) = facts.recent_from_identifier {
            if recent >= self.config.rate_critical_threshold {
                signals.push(Signal::new(Heuristic::RateLimitCritical));
            } else if recent >= self.config.rate_warning_threshold {
                signals.push(Signal::new(Heuristic::RateLimitWarning));
            }
        }

        let user_agent = subject.user_agent.trim();
        if user_agent.chars().count() < self.config.min_user_agent_len {
            signals.push(Signal::new(Heuristic::ShortUserAgent));
        }
        if self.is_bot_user_agent(user_agent) {
            signals.push(Signal::new(Heuristic::BotUserAgent));
        }

        if subject.kind == EventKind::Conversion {
            if let Some(amount) = subject.amount {
                if amount > self.config.very_high_amount() {
                    signals.push(Signal::new(Heuristic::VeryHighAmount));
                } else if amount > self.config.high_amount {
                    signals.push(Signal::new(Heuristic::HighAmount));
                }
            }
        }

        if let Some(velocity) = facts.affiliate_velocity {
            if velocity > self.config.velocity_threshold {
                signals.push(Signal::new(Heuristic::AffiliateVelocity));
            }
        }

        self.combine(signals, facts.is_degraded())
    }

    /// Combine triggered signals into a score and decision
    pub fn combine(&self, signals: Vec<Signal>, degraded: bool) -> RiskAssessment {
        let total: u32 = signals.iter().map(|s| s.points).sum();
        let gate: u32 = signals
            .iter()
            .filter(|s| s.heuristic.is_blocking())
            .map(|s| s.points)
            .sum();

        let score = clamp_points(total);
        let gate_score = clamp_points(gate);

        let decision = if signals.iter().any(|s| s.heuristic == Heuristic::Blacklisted)
            || gate_score >= self.config.reject_threshold
        {
            Decision::Rejected
        } else if score > 0 && signals.iter().any(|s| s.severity() >= Severity::Warning) {
            Decision::Suspicious
        } else {
            Decision::Pending
        };

        RiskAssessment {
            score,
            gate_score,
            signals,
            degraded,
            decision,
        }
    }

    /// Review priority for a new event, `None` if it needs no review
    pub fn queue_priority(&self, decision: Decision, amount: Option<i64>) -> Option<QueuePriority> {
        let amount = amount.unwrap_or(0);
        match decision {
            Decision::Rejected => None,
            Decision::Suspicious => Some(QueuePriority::High),
            Decision::Pending if amount > self.config.very_high_amount() => {
                Some(QueuePriority::High)
            }
            Decision::Pending if amount > self.config.high_amount => Some(QueuePriority::Medium),
            Decision::Pending => None,
        }
    }
}
