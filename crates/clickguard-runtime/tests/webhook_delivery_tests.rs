//! Webhook delivery over HTTP
//!
//! These tests use mockito to stand in for partner endpoints; a raw socket
//! covers the partner that breaks off its response body.

use chrono::Utc;
use clickguard_core::{
    DeliveryStatus, Event, EventDetails, SystemClock, VerificationStatus,
};
use clickguard_runtime::verification::genesis;
use clickguard_runtime::notify::{WebhookPayload, WebhookTransport, MAX_RESPONSE_BODY};
use clickguard_runtime::{
    Decision, DeliveryOutcome, DeliveryStore, DispatcherConfig, EventStore, InMemoryStore,
    ReqwestTransport, WebhookDispatcher,
};
use mockito::{Matcher, Server};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

fn verified_conversion(id: &str) -> Event {
    Event {
        id: id.to_string(),
        affiliate_id: "aff-42".to_string(),
        campaign_id: "spring-sale".to_string(),
        details: EventDetails::Conversion {
            amount: 25_000,
            commission: 2_500,
        },
        timestamp: Utc::now(),
        session_key: "session".to_string(),
        hashed_identifier: "hashed".to_string(),
        user_agent: String::new(),
        client_fingerprint: None,
        signature: String::new(),
        risk_score: 0,
        status: VerificationStatus::Verified,
        security_flags: vec![],
        webhook_validated: false,
    }
}

async fn dispatcher_for(
    targets: Vec<String>,
    event: &Event,
) -> (Arc<InMemoryStore>, WebhookDispatcher) {
    let store = Arc::new(InMemoryStore::new());
    store
        .insert_event(&genesis(event.clone(), Decision::Pending, &[]))
        .await
        .unwrap();

    let config = DispatcherConfig {
        targets,
        base_backoff_ms: 5,
        ..DispatcherConfig::default()
    };
    let transport = ReqwestTransport::new(Duration::from_secs(2)).unwrap();
    let dispatcher = WebhookDispatcher::new(
        Arc::new(transport),
        store.clone(),
        store.clone(),
        config,
        Arc::new(SystemClock),
    );
    (store, dispatcher)
}

#[tokio::test]
async fn test_delivery_sends_header_and_payload() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/hooks/conversions")
        .match_header("X-Tracking-Webhook", "conversion-verification")
        .match_header("content-type", "application/json")
        .match_body(Matcher::PartialJson(serde_json::json!({
            "conversionId": "conv-1",
            "affiliateId": "aff-42",
            "campaignId": "spring-sale",
            "amount": 25000,
            "commission": 2500
        })))
        .with_status(200)
        .with_body(r#"{"received":true}"#)
        .expect(1)
        .create_async()
        .await;

    let event = verified_conversion("conv-1");
    let target = format!("{}/hooks/conversions", server.url());
    let (store, dispatcher) = dispatcher_for(vec![target.clone()], &event).await;

    let outcomes = dispatcher.deliver(&event).await.unwrap();
    assert_eq!(outcomes, vec![DeliveryOutcome::Delivered]);
    mock.assert_async().await;

    let records = store.deliveries_for("conv-1").await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].target_url, target);
    assert_eq!(records[0].status, DeliveryStatus::Success);
    assert_eq!(records[0].response_code, Some(200));
    assert_eq!(records[0].response_body.as_deref(), Some(r#"{"received":true}"#));
    assert!(records[0].received_at.is_some());

    let stored = store.get_event("conv-1").await.unwrap().unwrap();
    assert!(stored.webhook_validated);
}

#[tokio::test]
async fn test_failing_partner_exhausts_retries() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/hook")
        .with_status(500)
        .with_body("x".repeat(5000))
        .expect(4)
        .create_async()
        .await;

    let event = verified_conversion("conv-2");
    let (store, dispatcher) = dispatcher_for(vec![format!("{}/hook", server.url())], &event).await;

    let outcomes = dispatcher.deliver(&event).await.unwrap();
    assert_eq!(outcomes, vec![DeliveryOutcome::Exhausted]);
    mock.assert_async().await;

    let record = &store.deliveries_for("conv-2").await.unwrap()[0];
    assert_eq!(record.status, DeliveryStatus::Failed);
    assert_eq!(record.retry_count, 3);
    assert!(record.retry_count <= record.max_retries);
    assert_eq!(record.response_code, Some(500));
    assert_eq!(record.response_body.as_ref().unwrap().len(), 1024);

    let stored = store.get_event("conv-2").await.unwrap().unwrap();
    assert!(!stored.webhook_validated);
    assert_eq!(stored.status, VerificationStatus::Pending);
}

#[tokio::test]
async fn test_each_target_gets_its_own_record() {
    let mut server = Server::new_async().await;
    let ok = server
        .mock("POST", "/a")
        .with_status(202)
        .create_async()
        .await;
    let flaky = server
        .mock("POST", "/b")
        .with_status(404)
        .expect(4)
        .create_async()
        .await;

    let event = verified_conversion("conv-3");
    let targets = vec![format!("{}/a", server.url()), format!("{}/b", server.url())];
    let (store, dispatcher) = dispatcher_for(targets, &event).await;

    let outcomes = dispatcher.deliver(&event).await.unwrap();
    assert_eq!(
        outcomes,
        vec![DeliveryOutcome::Delivered, DeliveryOutcome::Exhausted]
    );
    ok.assert_async().await;
    flaky.assert_async().await;
    assert_eq!(store.deliveries_for("conv-3").await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_unreachable_target_records_transport_error() {
    let event = verified_conversion("conv-4");
    // Port 9 (discard) on localhost is expected to refuse connections
    let (store, dispatcher) =
        dispatcher_for(vec!["http://127.0.0.1:9/hook".to_string()], &event).await;

    let outcomes = dispatcher.deliver(&event).await.unwrap();
    assert_eq!(outcomes, vec![DeliveryOutcome::Exhausted]);

    let record = &store.deliveries_for("conv-4").await.unwrap()[0];
    assert_eq!(record.response_code, None);
    assert!(record.response_body.as_ref().unwrap().contains("HTTP request failed"));
}

#[tokio::test]
async fn test_oversized_success_body_is_read_up_to_cap() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/hook")
        .with_status(200)
        .with_body("y".repeat(2 * 1024 * 1024))
        .create_async()
        .await;

    let transport = ReqwestTransport::new(Duration::from_secs(2)).unwrap();
    let event = verified_conversion("conv-5");
    let payload = WebhookPayload::from_event(&event).unwrap();
    let response = transport
        .post(&format!("{}/hook", server.url()), &payload)
        .await
        .unwrap();
    mock.assert_async().await;

    assert!(response.is_success());
    assert_eq!(response.body.len(), MAX_RESPONSE_BODY);
}

/// Partner that answers 200 with a Content-Length it never fulfils
async fn short_body_partner() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            request.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&request).to_lowercase();
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if request.len() >= end + 4 + length {
                    break;
                }
            }
            if n == 0 {
                break;
            }
        }
        socket
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 4096\r\n\r\npartial")
            .await
            .unwrap();
        socket.shutdown().await.unwrap();
    });
    format!("http://{}/hook", addr)
}

#[tokio::test]
async fn test_success_status_wins_over_broken_body() {
    let url = short_body_partner().await;
    let event = verified_conversion("conv-6");
    let (store, dispatcher) = dispatcher_for(vec![url], &event).await;

    let outcomes = dispatcher.deliver(&event).await.unwrap();
    assert_eq!(outcomes, vec![DeliveryOutcome::Delivered]);

    let record = &store.deliveries_for("conv-6").await.unwrap()[0];
    assert_eq!(record.status, DeliveryStatus::Success);
    assert_eq!(record.response_code, Some(200));
    assert_eq!(record.retry_count, 0);

    let stored = store.get_event("conv-6").await.unwrap().unwrap();
    assert!(stored.webhook_validated);
}
