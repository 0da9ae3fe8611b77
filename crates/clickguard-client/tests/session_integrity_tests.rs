//! End-to-end checks of the client integrity helpers

use chrono::{Duration, Utc};
use clickguard_client::{ClientSession, DeviceTraits, SignaturePurpose};
use clickguard_core::ManualClock;
use std::sync::Arc;

fn session(clock: &ManualClock) -> ClientSession {
    ClientSession::with_clock(
        DeviceTraits {
            user_agent: "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X)".into(),
            language: "en-GB".into(),
            platform: "iPhone".into(),
            screen: "390x844x32".into(),
            timezone: "Europe/London".into(),
            hardware_concurrency: 6,
        },
        Arc::new(clock.clone()),
    )
}

#[test]
fn test_signature_is_bound_to_its_session() {
    let clock = ManualClock::new(Utc::now());
    let alice = session(&clock);
    let mallory = session(&clock);

    let signature = alice.sign("payload", SignaturePurpose::BearerToken).unwrap();
    assert!(!mallory.verify("payload", &signature));
    assert!(alice.verify("payload", &signature));
}

#[test]
fn test_bearer_token_expires_after_an_hour() {
    let clock = ManualClock::new(Utc::now());
    let session = session(&clock);
    let token = session.sign("user-42", SignaturePurpose::BearerToken).unwrap();

    clock.advance(Duration::minutes(61));
    assert!(!session.verify("user-42", &token));
}

#[test]
fn test_cache_survives_repeated_reads_until_expiry() {
    let clock = ManualClock::new(Utc::now());
    let session = session(&clock);
    session.cache().set("campaign", &"c-7".to_string()).unwrap();

    for _ in 0..3 {
        assert_eq!(session.cache().get::<String>("campaign").as_deref(), Some("c-7"));
    }
    clock.advance(Duration::hours(25));
    assert_eq!(session.cache().get::<String>("campaign"), None);
}
