//! Signed, expiring key/value cache

use crate::error::Result;
use crate::signing::{SessionSigner, SignaturePurpose};
use chrono::{DateTime, Utc};
use clickguard_core::SharedClock;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    signature: String,
    expires_at: DateTime<Utc>,
}

/// Session-local cache whose entries carry a `CachedValue` signature
///
/// An entry that fails verification or has expired is evicted and reads as `None`.
pub struct SecureCache {
    signer: Arc<SessionSigner>,
    clock: SharedClock,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl SecureCache {
    pub fn new(signer: Arc<SessionSigner>, clock: SharedClock) -> Self {
        Self {
            signer,
            clock,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Binds the key into the signed material so values cannot be swapped between keys
    fn material(key: &str, value: &str) -> String {
        format!("{}\u{1f}{}", key, value)
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_string(value)?;
        let signature = self
            .signer
            .sign(&Self::material(key, &value), SignaturePurpose::CachedValue)
            .ok_or_else(|| crate::ClientError::Signing("cache entry".to_string()))?;
        let expires_at = self.clock.now() + SignaturePurpose::CachedValue.ttl();

        self.entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(
                key.to_string(),
                CacheEntry {
                    value,
                    signature,
                    expires_at,
                },
            );
        Ok(())
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let entry = self
            .entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .cloned()?;

        let valid = self.clock.now() <= entry.expires_at
            && self
                .signer
                .verify(&Self::material(key, &entry.value), &entry.signature);
        if !valid {
            tracing::debug!(key, "Dropping invalid cache entry");
            self.remove(key);
            return None;
        }
        serde_json::from_str(&entry.value).ok()
    }

    pub fn remove(&self, key: &str) -> bool {
        self.entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(key)
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    fn tamper(&self, key: &str, value: &str) {
        if let Some(entry) = self.entries.write().unwrap().get_mut(key) {
            entry.value = value.to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use clickguard_core::ManualClock;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Preferences {
        affiliate_id: String,
        opted_in: bool,
    }

    fn cache() -> (ManualClock, SecureCache) {
        let clock = ManualClock::new(Utc::now());
        let shared: SharedClock = Arc::new(clock.clone());
        let signer = Arc::new(SessionSigner::new(shared.clone()));
        (clock, SecureCache::new(signer, shared))
    }

    #[test]
    fn test_set_and_get() {
        let (_clock, cache) = cache();
        let prefs = Preferences {
            affiliate_id: "aff-1".to_string(),
            opted_in: true,
        };
        cache.set("prefs", &prefs).unwrap();

        assert_eq!(cache.get::<Preferences>("prefs"), Some(prefs));
        // Reads are repeatable
        assert!(cache.get::<Preferences>("prefs").is_some());
        assert_eq!(cache.get::<Preferences>("missing"), None);
    }

    #[test]
    fn test_expired_entry_reads_as_none() {
        let (clock, cache) = cache();
        cache.set("count", &3u32).unwrap();

        clock.advance(Duration::hours(23));
        assert_eq!(cache.get::<u32>("count"), Some(3));

        clock.advance(Duration::hours(2));
        assert_eq!(cache.get::<u32>("count"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_tampered_entry_reads_as_none() {
        let (_clock, cache) = cache();
        cache.set("count", &3u32).unwrap();
        cache.tamper("count", "4");

        assert_eq!(cache.get::<u32>("count"), None);
        assert_eq!(cache.len(), 0);
    }
}
