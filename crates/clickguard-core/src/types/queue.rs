//! Verification queue items

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Review priority; ordering is `Low < Medium < High`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueuePriority {
    Low,
    Medium,
    High,
}

impl QueuePriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueuePriority::Low => "low",
            QueuePriority::Medium => "medium",
            QueuePriority::High => "high",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(QueuePriority::Low),
            "medium" => Some(QueuePriority::Medium),
            "high" => Some(QueuePriority::High),
            _ => None,
        }
    }
}

/// Processing state of a queue item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueItemStatus {
    Pending,
    Processing,
    Done,
}

impl QueueItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueItemStatus::Pending => "pending",
            QueueItemStatus::Processing => "processing",
            QueueItemStatus::Done => "done",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(QueueItemStatus::Pending),
            "processing" => Some(QueueItemStatus::Processing),
            "done" => Some(QueueItemStatus::Done),
            _ => None,
        }
    }
}

/// An event awaiting human or automated re-check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationQueueItem {
    pub conversion_id: String,
    pub campaign_id: String,
    pub affiliate_id: String,
    pub priority: QueuePriority,
    pub status: QueueItemStatus,
    pub created_at: DateTime<Utc>,
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_retry_at: Option<DateTime<Utc>>,
}

impl VerificationQueueItem {
    pub fn new(
        conversion_id: impl Into<String>,
        campaign_id: impl Into<String>,
        affiliate_id: impl Into<String>,
        priority: QueuePriority,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            conversion_id: conversion_id.into(),
            campaign_id: campaign_id.into(),
            affiliate_id: affiliate_id.into(),
            priority,
            status: QueueItemStatus::Pending,
            created_at,
            retry_count: 0,
            next_retry_at: None,
        }
    }

    /// Open items count toward the one-open-item-per-event limit
    pub fn is_open(&self) -> bool {
        self.status != QueueItemStatus::Done
    }

    /// Pending and past its retry delay
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == QueueItemStatus::Pending
            && self.next_retry_at.map_or(true, |at| at <= now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_priority_ordering() {
        assert!(QueuePriority::High > QueuePriority::Medium);
        assert!(QueuePriority::Medium > QueuePriority::Low);
    }

    #[test]
    fn test_item_due() {
        let now = Utc::now();
        let mut item = VerificationQueueItem::new("e", "c", "a", QueuePriority::High, now);
        assert!(item.is_open());
        assert!(item.is_due(now));

        item.next_retry_at = Some(now + Duration::minutes(1));
        assert!(!item.is_due(now));
        assert!(item.is_due(now + Duration::minutes(1)));

        item.status = QueueItemStatus::Processing;
        assert!(!item.is_due(now + Duration::hours(1)));

        item.status = QueueItemStatus::Done;
        assert!(!item.is_open());
    }
}
