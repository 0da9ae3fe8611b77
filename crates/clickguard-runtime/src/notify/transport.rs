//! Webhook transport

use crate::error::{Result, RuntimeError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clickguard_core::Event;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const WEBHOOK_HEADER: &str = "X-Tracking-Webhook";
pub const WEBHOOK_HEADER_VALUE: &str = "conversion-verification";
/// Stored response bodies are cut to this many bytes
pub const MAX_RESPONSE_BODY: usize = 1024;

/// Body of a conversion-verification webhook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    pub conversion_id: String,
    pub affiliate_id: String,
    pub campaign_id: String,
    pub amount: i64,
    pub commission: i64,
    pub timestamp: DateTime<Utc>,
}

impl WebhookPayload {
    /// Payload for a conversion; `None` for clicks
    pub fn from_event(event: &Event) -> Option<Self> {
        Some(Self {
            conversion_id: event.id.clone(),
            affiliate_id: event.affiliate_id.clone(),
            campaign_id: event.campaign_id.clone(),
            amount: event.amount()?,
            commission: event.commission()?,
            timestamp: event.timestamp,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends a webhook payload to one target
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    /// Any HTTP response is `Ok`; only transport failures are errors
    async fn post(&self, url: &str, payload: &WebhookPayload) -> Result<TransportResponse>;
}

/// HTTP transport over reqwest
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RuntimeError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl WebhookTransport for ReqwestTransport {
    async fn post(&self, url: &str, payload: &WebhookPayload) -> Result<TransportResponse> {
        tracing::debug!(url, conversion_id = %payload.conversion_id, "Sending webhook");

        let response = self
            .client
            .post(url)
            .header(WEBHOOK_HEADER, WEBHOOK_HEADER_VALUE)
            .json(payload)
            .send()
            .await
            .map_err(|e| RuntimeError::Delivery(format!("HTTP request failed: {}", e)))?;

        let status = response.status().as_u16();
        let body = read_capped_body(response, MAX_RESPONSE_BODY).await;

        Ok(TransportResponse { status, body })
    }
}

/// Read at most `limit` bytes of the body. The status has already been
/// received, so a failed or oversized read only shortens the stored body.
async fn read_capped_body(mut response: reqwest::Response, limit: usize) -> String {
    let mut buf: Vec<u8> = Vec::new();
    while buf.len() < limit {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                let take = chunk.len().min(limit - buf.len());
                buf.extend_from_slice(&chunk[..take]);
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, read = buf.len(), "Failed to read webhook response body");
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}
