//! Session-scoped signatures
//!
//! Format: `v1.<purpose>.<issued_ms>.<nonce_hex>.<key_prefix>.<mac_hex>`
//!
//! The MAC is HMAC-SHA256 over `purpose|issued_ms|nonce|payload` keyed by a
//! 32-byte per-session secret. Only the first 8 hex characters of the secret's
//! SHA-256 are embedded so a verifier can tell which key a signature claims.

use chrono::{DateTime, Duration, TimeZone, Utc};
use clickguard_core::SharedClock;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;

type HmacSha256 = Hmac<Sha256>;

const VERSION: &str = "v1";
const KEY_PREFIX_LEN: usize = 8;
const NONCE_LEN: usize = 16;
/// Tolerated clock difference for signatures issued "in the future"
const MAX_CLOCK_SKEW_SECS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignaturePurpose {
    Payload,
    BearerToken,
    CachedValue,
}

impl SignaturePurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignaturePurpose::Payload => "payload",
            SignaturePurpose::BearerToken => "bearer",
            SignaturePurpose::CachedValue => "cache",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "payload" => Some(SignaturePurpose::Payload),
            "bearer" => Some(SignaturePurpose::BearerToken),
            "cache" => Some(SignaturePurpose::CachedValue),
            _ => None,
        }
    }

    pub fn ttl(&self) -> Duration {
        match self {
            SignaturePurpose::Payload => Duration::minutes(5),
            SignaturePurpose::BearerToken => Duration::hours(1),
            SignaturePurpose::CachedValue => Duration::hours(24),
        }
    }

    /// Cached values are re-verified on every read, so their nonces are reusable
    fn single_use(&self) -> bool {
        !matches!(self, SignaturePurpose::CachedValue)
    }
}

struct Parsed<'a> {
    purpose: SignaturePurpose,
    issued_ms: i64,
    nonce: &'a str,
    key_prefix: &'a str,
    mac: Vec<u8>,
}

fn parse(signature: &str) -> Option<Parsed<'_>> {
    let mut parts = signature.split('.');
    let version = parts.next()?;
    let purpose = SignaturePurpose::parse(parts.next()?)?;
    let issued_ms = parts.next()?.parse().ok()?;
    let nonce = parts.next()?;
    let key_prefix = parts.next()?;
    let mac = hex::decode(parts.next()?).ok()?;
    if parts.next().is_some() || version != VERSION {
        return None;
    }
    if nonce.len() != NONCE_LEN * 2 || hex::decode(nonce).is_err() {
        return None;
    }
    Some(Parsed {
        purpose,
        issued_ms,
        nonce,
        key_prefix,
        mac,
    })
}

/// Signs and verifies payloads with a per-session secret
pub struct SessionSigner {
    secret: [u8; 32],
    key_prefix: String,
    clock: SharedClock,
    /// nonce → expiry of the signature that used it
    used_nonces: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl SessionSigner {
    /// Signer with a fresh random secret
    pub fn new(clock: SharedClock) -> Self {
        Self::with_secret(rand::random(), clock)
    }

    pub fn with_secret(secret: [u8; 32], clock: SharedClock) -> Self {
        let digest = hex::encode(Sha256::digest(secret));
        Self {
            key_prefix: digest[..KEY_PREFIX_LEN].to_string(),
            secret,
            clock,
            used_nonces: Mutex::new(HashMap::new()),
        }
    }

    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    fn mac(&self, purpose: SignaturePurpose, issued_ms: i64, nonce: &str, payload: &str) -> Option<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.secret).ok()?;
        mac.update(purpose.as_str().as_bytes());
        mac.update(b"|");
        mac.update(issued_ms.to_string().as_bytes());
        mac.update(b"|");
        mac.update(nonce.as_bytes());
        mac.update(b"|");
        mac.update(payload.as_bytes());
        Some(mac)
    }

    pub fn sign(&self, payload: &str, purpose: SignaturePurpose) -> Option<String> {
        let issued_ms = self.clock.now().timestamp_millis();
        let nonce = hex::encode(rand::random::<[u8; NONCE_LEN]>());
        let mac = self.mac(purpose, issued_ms, &nonce, payload)?;
        Some(format!(
            "{}.{}.{}.{}.{}.{}",
            VERSION,
            purpose.as_str(),
            issued_ms,
            nonce,
            self.key_prefix,
            hex::encode(mac.finalize().into_bytes())
        ))
    }

    /// Check a signature; never panics, failures are logged at debug level
    pub fn verify(&self, payload: &str, signature: &str) -> bool {
        match self.check(payload, signature) {
            Ok(()) => true,
            Err(reason) => {
                tracing::debug!(reason, "Signature rejected");
                false
            }
        }
    }

    fn check(&self, payload: &str, signature: &str) -> std::result::Result<(), &'static str> {
        let parsed = parse(signature).ok_or("malformed")?;
        if parsed.key_prefix != self.key_prefix {
            return Err("unknown key");
        }

        let now = self.clock.now();
        let issued = Utc
            .timestamp_millis_opt(parsed.issued_ms)
            .single()
            .ok_or("bad timestamp")?;
        if issued - now > Duration::seconds(MAX_CLOCK_SKEW_SECS) {
            return Err("issued in the future");
        }
        let expires = issued + parsed.purpose.ttl();
        if now > expires {
            return Err("expired");
        }

        let single_use = parsed.purpose.single_use();
        let mut used = self
            .used_nonces
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if single_use {
            used.retain(|_, expiry| *expiry >= now);
            if used.contains_key(parsed.nonce) {
                return Err("replayed nonce");
            }
        }

        let mac = self
            .mac(parsed.purpose, parsed.issued_ms, parsed.nonce, payload)
            .ok_or("key setup failed")?;
        mac.verify_slice(&parsed.mac).map_err(|_| "mac mismatch")?;

        if single_use {
            used.insert(parsed.nonce.to_string(), expires);
        }
        Ok(())
    }
}

impl std::fmt::Debug for SessionSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSigner")
            .field("key_prefix", &self.key_prefix)
            .finish_non_exhaustive()
    }
}
