//! Pipeline configuration
//!
//! Every threshold and window has a default; a YAML document only needs to
//! name what it overrides:
//!
//! ```yaml
//! auto_verify: true
//! lookup_timeout_ms: 250
//! scoring:
//!   high_amount: 250000
//! webhooks:
//!   targets: ["https://partner.example.com/hooks/conversions"]
//! ```

use crate::error::{Result, SdkError};
use clickguard_runtime::{DedupConfig, DispatcherConfig, QueueConfig, ReportConfig, ScoringConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub scoring: ScoringConfig,
    pub dedup: DedupConfig,
    pub queue: QueueConfig,
    pub webhooks: DispatcherConfig,
    pub report: ReportConfig,

    /// Budget for each fact lookup during scoring
    pub lookup_timeout_ms: u64,

    /// Verify events that need no review right after ingestion
    pub auto_verify: bool,

    /// Server-held secret for identifier hashing and event signatures
    #[serde(skip_serializing)]
    pub server_secret: Option<String>,

    /// YAML file with the campaign/affiliate directory
    pub directory_seed: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            scoring: ScoringConfig::default(),
            dedup: DedupConfig::default(),
            queue: QueueConfig::default(),
            webhooks: DispatcherConfig::default(),
            report: ReportConfig::default(),
            lookup_timeout_ms: 200,
            auto_verify: true,
            server_secret: None,
            directory_seed: None,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&content)
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.server_secret = Some(secret.into());
        self
    }

    pub fn with_webhook_target(mut self, url: impl Into<String>) -> Self {
        self.webhooks.targets.push(url.into());
        self
    }

    pub fn auto_verify(mut self, enable: bool) -> Self {
        self.auto_verify = enable;
        self
    }

    /// Reject combinations that would make the pipeline misbehave
    pub fn validate(&self) -> Result<()> {
        if self.lookup_timeout_ms == 0 {
            return Err(SdkError::Config("lookup_timeout_ms must be positive".into()));
        }
        if self.scoring.reject_threshold == 0 || self.scoring.reject_threshold > 100 {
            return Err(SdkError::Config(
                "scoring.reject_threshold must be within 1..=100".into(),
            ));
        }
        if self.scoring.rate_warning_threshold > self.scoring.rate_critical_threshold {
            return Err(SdkError::Config(
                "scoring.rate_warning_threshold exceeds rate_critical_threshold".into(),
            ));
        }
        if self.scoring.high_amount <= 0 || self.scoring.very_high_multiplier < 1 {
            return Err(SdkError::Config("scoring amount thresholds must be positive".into()));
        }
        if self.dedup.recent_cap == 0 {
            return Err(SdkError::Config("dedup.recent_cap must be positive".into()));
        }
        if !(1..=clickguard_runtime::report::MAX_WINDOW_HOURS).contains(&self.report.window_hours) {
            return Err(SdkError::Config("report.window_hours is out of range".into()));
        }
        if self.dedup.sweep_every == 0 {
            return Err(SdkError::Config("dedup.sweep_every must be positive".into()));
        }
        Ok(())
    }
}
