//! Campaign click-population analysis
//!
//! Looks at all clicks of a campaign over a window and reports identifiers
//! with an excessive click count and hours of the day that hold an outsized
//! share of the traffic. Findings are advisory: they are recorded as
//! suspicious activity and never change any event's status.

use crate::error::{Result, RuntimeError};
use crate::storage::{ActivityLog, EventQuery, EventStore};
use chrono::{DateTime, Duration, Timelike, Utc};
use clickguard_core::{ActivityType, Event, EventKind, SharedClock, SuspiciousActivity};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Longest window a report may cover
pub const MAX_WINDOW_HOURS: i64 = 24 * 366;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub window_hours: i64,
    /// Identifiers with more clicks than this are reported
    pub excessive_clicks_threshold: u32,
    /// Hours holding more than this share of clicks are reported
    pub hour_share_threshold: f64,
    /// Hour analysis needs at least this many clicks
    pub min_clicks_for_hour_analysis: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            window_hours: 24,
            excessive_clicks_threshold: 50,
            hour_share_threshold: 0.40,
            min_clicks_for_hour_analysis: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceCount {
    pub hashed_identifier: String,
    pub clicks: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourConcentration {
    /// Hour of day, UTC
    pub hour: u32,
    pub clicks: u32,
    pub share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FraudReport {
    pub campaign_id: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub total_clicks: usize,
    pub excessive_sources: Vec<SourceCount>,
    pub hour_concentrations: Vec<HourConcentration>,
}

impl FraudReport {
    pub fn is_clean(&self) -> bool {
        self.excessive_sources.is_empty() && self.hour_concentrations.is_empty()
    }
}

fn window_start(window_end: DateTime<Utc>, hours: i64) -> Result<DateTime<Utc>> {
    if !(1..=MAX_WINDOW_HOURS).contains(&hours) {
        return Err(RuntimeError::InvalidInput(format!(
            "window must be between 1 and {} hours, got {}",
            MAX_WINDOW_HOURS, hours
        )));
    }
    Duration::try_hours(hours)
        .and_then(|span| window_end.checked_sub_signed(span))
        .ok_or_else(|| RuntimeError::InvalidInput(format!("window of {} hours is out of range", hours)))
}

/// Pure analysis over an already-selected click population
pub fn analyze_clicks(
    campaign_id: &str,
    clicks: &[Event],
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    config: &ReportConfig,
) -> FraudReport {
    let mut per_source: HashMap<&str, u32> = HashMap::new();
    let mut per_hour = [0u32; 24];
    for click in clicks {
        *per_source.entry(click.hashed_identifier.as_str()).or_default() += 1;
        per_hour[click.timestamp.hour() as usize] += 1;
    }

    let mut excessive_sources: Vec<SourceCount> = per_source
        .into_iter()
        .filter(|(_, clicks)| *clicks > config.excessive_clicks_threshold)
        .map(|(identifier, clicks)| SourceCount {
            hashed_identifier: identifier.to_string(),
            clicks,
        })
        .collect();
    excessive_sources.sort_by(|a, b| {
        b.clicks
            .cmp(&a.clicks)
            .then_with(|| a.hashed_identifier.cmp(&b.hashed_identifier))
    });

    let total = clicks.len();
    let hour_concentrations = if total >= config.min_clicks_for_hour_analysis && total > 0 {
        per_hour
            .iter()
            .enumerate()
            .filter_map(|(hour, &count)| {
                let share = count as f64 / total as f64;
                (share > config.hour_share_threshold).then_some(HourConcentration {
                    hour: hour as u32,
                    clicks: count,
                    share,
                })
            })
            .collect()
    } else {
        Vec::new()
    };

    FraudReport {
        campaign_id: campaign_id.to_string(),
        window_start,
        window_end,
        total_clicks: total,
        excessive_sources,
        hour_concentrations,
    }
}

#[derive(Clone)]
pub struct CampaignAnalyzer {
    events: Arc<dyn EventStore>,
    activity: Arc<dyn ActivityLog>,
    config: ReportConfig,
    clock: SharedClock,
}

impl CampaignAnalyzer {
    pub fn new(
        events: Arc<dyn EventStore>,
        activity: Arc<dyn ActivityLog>,
        config: ReportConfig,
        clock: SharedClock,
    ) -> Self {
        Self {
            events,
            activity,
            config,
            clock,
        }
    }

    /// Analyze the campaign's clicks over the trailing window
    /// (the configured one unless `window_hours` is given).
    ///
    /// Windows outside `1..=MAX_WINDOW_HOURS` are rejected as invalid input.
    pub async fn analyze(&self, campaign_id: &str, window_hours: Option<i64>) -> Result<FraudReport> {
        let hours = window_hours.unwrap_or(self.config.window_hours);
        let window_end = self.clock.now();
        let window_start = window_start(window_end, hours)?;

        let clicks = self
            .events
            .find_events(
                &EventQuery::new()
                    .kind(EventKind::Click)
                    .campaign(campaign_id)
                    .since(window_start)
                    .until(window_end),
            )
            .await?;

        let report = analyze_clicks(campaign_id, &clicks, window_start, window_end, &self.config);
        self.record_findings(&report).await;

        tracing::info!(
            campaign_id,
            total_clicks = report.total_clicks,
            excessive_sources = report.excessive_sources.len(),
            hour_concentrations = report.hour_concentrations.len(),
            "Campaign fraud report generated"
        );
        Ok(report)
    }

    async fn record_findings(&self, report: &FraudReport) {
        let now = report.window_end;
        let mut findings = Vec::new();

        for source in &report.excessive_sources {
            let mut activity =
                SuspiciousActivity::new(&report.campaign_id, ActivityType::ExcessiveClicks, now);
            activity.hashed_identifier = Some(source.hashed_identifier.clone());
            activity.reasons = vec!["excessive_clicks".to_string()];
            activity.details = serde_json::json!({
                "clicks": source.clicks,
                "threshold": self.config.excessive_clicks_threshold,
                "windowStart": report.window_start,
            });
            findings.push(activity);
        }

        for hour in &report.hour_concentrations {
            let mut activity =
                SuspiciousActivity::new(&report.campaign_id, ActivityType::HourConcentration, now);
            activity.reasons = vec!["hour_concentration".to_string()];
            activity.details = serde_json::json!({
                "hour": hour.hour,
                "clicks": hour.clicks,
                "share": hour.share,
                "totalClicks": report.total_clicks,
            });
            findings.push(activity);
        }

        for activity in findings {
            if let Err(e) = self.activity.record_activity(&activity).await {
                tracing::warn!(
                    campaign_id = %report.campaign_id,
                    activity_type = activity.activity_type.as_str(),
                    error = %e,
                    "Failed to record report finding"
                );
            }
        }
    }
}
