//! Server-side integrity primitives
//!
//! Trust decisions are derived here from a server-held secret and never from
//! anything a client can reconstruct:
//! - [`IdentifierHasher`] turns raw client identifiers (IP addresses) into keyed
//!   hashes before they are counted, stored or blacklisted.
//! - [`EventSigner`] binds the immutable fields of a persisted event with HMAC-SHA256.

use crate::error::{Result, RuntimeError};
use clickguard_core::Event;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Length of a hex-encoded HMAC-SHA256 tag
pub const SIGNATURE_HEX_LEN: usize = 64;

/// Server-held secret from which purpose-specific keys are derived
#[derive(Clone)]
pub struct ServerSecret(Vec<u8>);

impl ServerSecret {
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self> {
        let bytes = secret.as_ref();
        if bytes.len() < 16 {
            return Err(RuntimeError::Config(
                "server secret must be at least 16 bytes".to_string(),
            ));
        }
        Ok(Self(bytes.to_vec()))
    }

    /// Derive an independent key for `label`
    fn derive(&self, label: &str) -> Result<Vec<u8>> {
        let mut mac = HmacSha256::new_from_slice(&self.0)
            .map_err(|e| RuntimeError::Config(format!("invalid server secret: {}", e)))?;
        mac.update(label.as_bytes());
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

impl std::fmt::Debug for ServerSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ServerSecret(..)")
    }
}

fn keyed(key: &[u8]) -> Result<HmacSha256> {
    HmacSha256::new_from_slice(key)
        .map_err(|e| RuntimeError::Config(format!("invalid HMAC key: {}", e)))
}

/// Keyed hashing of client identifiers
#[derive(Clone)]
pub struct IdentifierHasher {
    mac: HmacSha256,
}

impl IdentifierHasher {
    pub fn new(secret: &ServerSecret) -> Result<Self> {
        Ok(Self {
            mac: keyed(&secret.derive("clickguard/identifier")?)?,
        })
    }

    /// Hex-encoded keyed hash of `raw` (trimmed, lowercased)
    pub fn hash(&self, raw: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(raw.trim().to_ascii_lowercase().as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

/// Signs persisted events
#[derive(Clone)]
pub struct EventSigner {
    mac: HmacSha256,
}

impl EventSigner {
    pub fn new(secret: &ServerSecret) -> Result<Self> {
        Ok(Self {
            mac: keyed(&secret.derive("clickguard/event-signature")?)?,
        })
    }

    pub fn sign(&self, event: &Event) -> String {
        let mut mac = self.mac.clone();
        mac.update(event.canonical_fields().as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Constant-time check of `event.signature` against its canonical fields
    pub fn verify(&self, event: &Event) -> bool {
        if !is_well_formed_signature(&event.signature) {
            return false;
        }
        let Ok(expected) = hex::decode(&event.signature) else {
            return false;
        };
        let mut mac = self.mac.clone();
        mac.update(event.canonical_fields().as_bytes());
        mac.verify_slice(&expected).is_ok()
    }
}

/// Structural check only: 64 lowercase hex characters
pub fn is_well_formed_signature(signature: &str) -> bool {
    signature.len() == SIGNATURE_HEX_LEN
        && signature
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use clickguard_core::{EventDetails, VerificationStatus};

    fn secret() -> ServerSecret {
        ServerSecret::new("test-secret-with-enough-bytes").unwrap()
    }

    fn event() -> Event {
        Event {
            id: "evt-1".to_string(),
            affiliate_id: "aff-1".to_string(),
            campaign_id: "camp-1".to_string(),
            details: EventDetails::Conversion {
                amount: 12_000,
                commission: 1_200,
            },
            timestamp: Utc::now(),
            session_key: "s".to_string(),
            hashed_identifier: "h".to_string(),
            user_agent: String::new(),
            client_fingerprint: None,
            signature: String::new(),
            risk_score: 0,
            status: VerificationStatus::Pending,
            security_flags: vec![],
            webhook_validated: false,
        }
    }

    #[test]
    fn test_short_secret_rejected() {
        assert!(matches!(
            ServerSecret::new("short"),
            Err(RuntimeError::Config(_))
        ));
    }

    #[test]
    fn test_identifier_hash_is_stable_and_normalized() {
        let hasher = IdentifierHasher::new(&secret()).unwrap();
        let a = hasher.hash("203.0.113.7");
        let b = hasher.hash(" 203.0.113.7 ");
        assert_eq!(a, b);
        assert_ne!(a, hasher.hash("203.0.113.8"));
        assert!(is_well_formed_signature(&a));
    }

    #[test]
    fn test_keys_are_separated_by_purpose() {
        let secret = secret();
        let hasher = IdentifierHasher::new(&secret).unwrap();
        let signer = EventSigner::new(&secret).unwrap();

        let mut e = event();
        e.signature = signer.sign(&e);
        assert_ne!(e.signature, hasher.hash(&e.canonical_fields()));
    }

    #[test]
    fn test_sign_and_verify() {
        let signer = EventSigner::new(&secret()).unwrap();
        let mut e = event();
        e.signature = signer.sign(&e);

        assert!(signer.verify(&e));

        // Status changes do not invalidate the signature
        e.status = VerificationStatus::Verified;
        assert!(signer.verify(&e));

        // Tampering with a bound field does
        e.details = EventDetails::Conversion {
            amount: 99_000,
            commission: 1_200,
        };
        assert!(!signer.verify(&e));
    }

    #[test]
    fn test_signature_from_other_secret_fails() {
        let signer = EventSigner::new(&secret()).unwrap();
        let other = EventSigner::new(&ServerSecret::new("another-secret-value-xyz").unwrap())
            .unwrap();
        let mut e = event();
        e.signature = other.sign(&e);
        assert!(!signer.verify(&e));
    }

    #[test]
    fn test_well_formed_signature() {
        assert!(is_well_formed_signature(&"a".repeat(64)));
        assert!(!is_well_formed_signature(&"a".repeat(63)));
        assert!(!is_well_formed_signature(&"A".repeat(64)));
        assert!(!is_well_formed_signature(&"g".repeat(64)));
        assert!(!is_well_formed_signature(""));
    }
}
