//! Per-session integrity state

use crate::cache::SecureCache;
use crate::error::{ClientError, Result};
use crate::fingerprint::{self, DeviceTraits};
use crate::guard::RecentSubmissions;
use crate::signing::{SessionSigner, SignaturePurpose};
use clickguard_core::{SharedClock, SystemClock};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::{Arc, OnceLock};
use uuid::Uuid;

/// Values a client attaches to a tracking submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparedSubmission {
    pub idempotency_key: String,
    pub signature: String,
    pub client_fingerprint: String,
}

/// A browsing session on the submitting side
///
/// Each session gets its own random salt and signing secret, so fingerprints
/// and signatures are not linkable across sessions.
pub struct ClientSession {
    id: Uuid,
    traits: DeviceTraits,
    salt: [u8; 16],
    fingerprint: OnceLock<String>,
    signer: Arc<SessionSigner>,
    cache: SecureCache,
    recent: RecentSubmissions,
}

impl ClientSession {
    pub fn new(traits: DeviceTraits) -> Self {
        Self::with_clock(traits, Arc::new(SystemClock))
    }

    pub fn with_clock(traits: DeviceTraits, clock: SharedClock) -> Self {
        let signer = Arc::new(SessionSigner::new(clock.clone()));
        Self {
            id: Uuid::new_v4(),
            traits,
            salt: rand::random(),
            fingerprint: OnceLock::new(),
            cache: SecureCache::new(signer.clone(), clock.clone()),
            recent: RecentSubmissions::new(clock),
            signer,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn fingerprint(&self) -> &str {
        self.fingerprint
            .get_or_init(|| fingerprint::compute(&self.traits, &self.salt))
    }

    pub fn sign(&self, payload: &str, purpose: SignaturePurpose) -> Option<String> {
        self.signer.sign(payload, purpose)
    }

    pub fn verify(&self, payload: &str, signature: &str) -> bool {
        self.signer.verify(payload, signature)
    }

    pub fn cache(&self) -> &SecureCache {
        &self.cache
    }

    /// Stable for the same payload within this session
    pub fn idempotency_key(&self, payload: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.id.as_bytes());
        hasher.update(payload.as_bytes());
        hex::encode(&hasher.finalize()[..16])
    }

    /// Attach idempotency key, signature and fingerprint to a payload
    ///
    /// Fails with [`ClientError::DuplicateSubmission`] when the same payload
    /// was prepared within the guard window.
    pub fn prepare_submission(&self, payload: &str) -> Result<PreparedSubmission> {
        if !self.recent.should_submit(payload) {
            return Err(ClientError::DuplicateSubmission);
        }
        let signature = self
            .sign(payload, SignaturePurpose::Payload)
            .ok_or_else(|| ClientError::Signing("payload".to_string()))?;

        Ok(PreparedSubmission {
            idempotency_key: self.idempotency_key(payload),
            signature,
            client_fingerprint: self.fingerprint().to_string(),
        })
    }
}

impl std::fmt::Debug for ClientSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSession")
            .field("id", &self.id)
            .field("signer", &self.signer)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use clickguard_core::ManualClock;

    fn traits() -> DeviceTraits {
        DeviceTraits {
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) Firefox/128.0".into(),
            language: "de-DE".into(),
            platform: "Linux x86_64".into(),
            screen: "1920x1080x24".into(),
            timezone: "Europe/Berlin".into(),
            hardware_concurrency: 4,
        }
    }

    #[test]
    fn test_fingerprint_cached_per_session() {
        let session = ClientSession::new(traits());
        let first = session.fingerprint().to_string();
        assert_eq!(first, session.fingerprint());

        let other = ClientSession::new(traits());
        assert_ne!(first, other.fingerprint());
    }

    #[test]
    fn test_idempotency_key_stable_within_session() {
        let session = ClientSession::new(traits());
        let key = session.idempotency_key(r#"{"amount":500}"#);
        assert_eq!(key.len(), 32);
        assert_eq!(key, session.idempotency_key(r#"{"amount":500}"#));
        assert_ne!(key, session.idempotency_key(r#"{"amount":501}"#));

        let other = ClientSession::new(traits());
        assert_ne!(key, other.idempotency_key(r#"{"amount":500}"#));
    }

    #[test]
    fn test_prepare_submission_suppresses_double_submit() {
        let clock = ManualClock::new(Utc::now());
        let session = ClientSession::with_clock(traits(), Arc::new(clock.clone()));
        let payload = r#"{"campaignId":"c1","amount":500}"#;

        let prepared = session.prepare_submission(payload).unwrap();
        assert_eq!(prepared.client_fingerprint, session.fingerprint());
        assert!(session.verify(payload, &prepared.signature));

        assert!(matches!(
            session.prepare_submission(payload),
            Err(ClientError::DuplicateSubmission)
        ));

        clock.advance(Duration::seconds(11));
        let again = session.prepare_submission(payload).unwrap();
        assert_eq!(again.idempotency_key, prepared.idempotency_key);
        assert_ne!(again.signature, prepared.signature);
    }
}
