//! Scoring thresholds

use serde::{Deserialize, Serialize};

/// Thresholds and windows used by fact collection and scoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Trailing window for the per-identifier rate heuristic
    pub rate_window_secs: i64,
    /// Prior events in the window that raise a warning
    pub rate_warning_threshold: u32,
    /// Prior events in the window that are critical
    pub rate_critical_threshold: u32,
    /// User agents shorter than this are flagged
    pub min_user_agent_len: usize,
    /// Case-insensitive regex fragments matched against the user agent
    pub bot_patterns: Vec<String>,
    /// Conversion amount (minor units) above which exposure is high
    pub high_amount: i64,
    /// Multiple of `high_amount` above which exposure is very high
    pub very_high_multiplier: i64,
    /// Trailing window for the affiliate velocity heuristic
    pub velocity_window_secs: i64,
    /// Events per window above which an affiliate is flagged
    pub velocity_threshold: u32,
    /// Gate score at or above which an event is rejected
    pub reject_threshold: u8,
}

impl ScoringConfig {
    pub fn very_high_amount(&self) -> i64 {
        self.high_amount.saturating_mul(self.very_high_multiplier)
    }
}

fn default_bot_patterns() -> Vec<String> {
    [
        "bot",
        "crawler",
        "spider",
        "headless",
        "phantomjs",
        "selenium",
        "puppeteer",
        "playwright",
        "webdriver",
        "curl",
        "wget",
        "python-requests",
        "httpclient",
        "scrapy",
        "go-http-client",
        "java/",
        "okhttp",
        "axios",
        "node-fetch",
        "postman",
    ]
    .iter()
    .map(|p| p.to_string())
    .collect()
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            rate_window_secs: 5 * 60,
            rate_warning_threshold: 3,
            rate_critical_threshold: 5,
            min_user_agent_len: 20,
            bot_patterns: default_bot_patterns(),
            high_amount: 100_000,
            very_high_multiplier: 5,
            velocity_window_secs: 60 * 60,
            velocity_threshold: 20,
            reject_threshold: 70,
        }
    }
}
