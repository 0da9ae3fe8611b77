//! Webhook delivery records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Success,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Success => "success",
            DeliveryStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(DeliveryStatus::Pending),
            "success" => Some(DeliveryStatus::Success),
            "failed" => Some(DeliveryStatus::Failed),
            _ => None,
        }
    }
}

/// Delivery attempt group for one (event, target URL) pair.
///
/// Invariant: `retry_count <= max_retries`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookDeliveryRecord {
    pub id: String,
    pub conversion_id: String,
    pub target_url: String,
    pub status: DeliveryStatus,
    pub response_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_body: Option<String>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub sent_at: Option<DateTime<Utc>>,
    pub received_at: Option<DateTime<Utc>>,
}

impl WebhookDeliveryRecord {
    pub fn new(
        conversion_id: impl Into<String>,
        target_url: impl Into<String>,
        max_retries: u32,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            conversion_id: conversion_id.into(),
            target_url: target_url.into(),
            status: DeliveryStatus::Pending,
            response_code: None,
            response_body: None,
            retry_count: 0,
            max_retries,
            sent_at: None,
            received_at: None,
        }
    }

    /// Whether another attempt is allowed after a failure
    pub fn can_retry(&self) -> bool {
        self.status == DeliveryStatus::Pending && self.retry_count < self.max_retries
    }
}
