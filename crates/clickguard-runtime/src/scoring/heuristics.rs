//! Heuristic catalogue

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// A single scoring rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Heuristic {
    Blacklisted,
    RateLimitCritical,
    RateLimitWarning,
    ShortUserAgent,
    BotUserAgent,
    HighAmount,
    VeryHighAmount,
    AffiliateVelocity,
}

impl Heuristic {
    /// Machine-readable reason tag
    pub fn tag(&self) -> &'static str {
        match self {
            Heuristic::Blacklisted => "blacklisted",
            Heuristic::RateLimitCritical => "rate_limit_critical",
            Heuristic::RateLimitWarning => "rate_limit_warning",
            Heuristic::ShortUserAgent => "short_user_agent",
            Heuristic::BotUserAgent => "bot_user_agent",
            Heuristic::HighAmount => "high_amount",
            Heuristic::VeryHighAmount => "very_high_amount",
            Heuristic::AffiliateVelocity => "affiliate_velocity",
        }
    }

    pub fn points(&self) -> u32 {
        match self {
            Heuristic::Blacklisted => 100,
            Heuristic::RateLimitCritical => 80,
            Heuristic::RateLimitWarning => 50,
            Heuristic::ShortUserAgent => 40,
            Heuristic::BotUserAgent => 90,
            Heuristic::HighAmount => 60,
            Heuristic::VeryHighAmount => 90,
            Heuristic::AffiliateVelocity => 50,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Heuristic::Blacklisted | Heuristic::RateLimitCritical | Heuristic::BotUserAgent => {
                Severity::Critical
            }
            Heuristic::RateLimitWarning
            | Heuristic::ShortUserAgent
            | Heuristic::VeryHighAmount
            | Heuristic::AffiliateVelocity => Severity::Warning,
            Heuristic::HighAmount => Severity::Info,
        }
    }

    /// Whether the heuristic counts toward the rejection gate.
    /// Amount heuristics measure exposure, not fraud evidence.
    pub fn is_blocking(&self) -> bool {
        !matches!(self, Heuristic::HighAmount | Heuristic::VeryHighAmount)
    }
}

impl std::fmt::Display for Heuristic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// A triggered heuristic and the points it contributed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
    pub heuristic: Heuristic,
    pub points: u32,
}

impl Signal {
    pub fn new(heuristic: Heuristic) -> Self {
        Self {
            heuristic,
            points: heuristic.points(),
        }
    }

    pub fn severity(&self) -> Severity {
        self.heuristic.severity()
    }
}

impl From<Heuristic> for Signal {
    fn from(heuristic: Heuristic) -> Self {
        Signal::new(heuristic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_heuristics_are_not_blocking() {
        assert!(!Heuristic::HighAmount.is_blocking());
        assert!(!Heuristic::VeryHighAmount.is_blocking());
        assert!(Heuristic::BotUserAgent.is_blocking());
        assert!(Heuristic::Blacklisted.is_blocking());
    }

    #[test]
    fn test_tag_serialization_matches() {
        let json = serde_json::to_string(&Heuristic::RateLimitCritical).unwrap();
        assert_eq!(json, format!("\"{}\"", Heuristic::RateLimitCritical.tag()));
        assert_eq!(Signal::new(Heuristic::ShortUserAgent).points, 40);
    }
}
