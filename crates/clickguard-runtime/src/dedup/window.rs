//! In-memory dedup window
//!
//! Three concurrent maps, each pruned on access:
//! - idempotency key → event id
//! - (affiliate, session key) → first click id
//! - (affiliate, campaign) → recent conversions
//!
//! Keys that are never looked up again are dropped by a full sweep run every
//! `sweep_every` operations.

use super::DedupConfig;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Stamped {
    event_id: String,
    at: DateTime<Utc>,
}

/// A conversion remembered for near-duplicate detection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentConversion {
    pub event_id: String,
    pub amount: i64,
    pub at: DateTime<Utc>,
    pub signature: String,
}

#[derive(Debug, Default)]
pub struct DedupWindow {
    idempotency: DashMap<String, Stamped>,
    sessions: DashMap<(String, String), Stamped>,
    recent: DashMap<(String, String), Vec<RecentConversion>>,
    config: DedupConfig,
    ops: AtomicUsize,
}

impl DedupWindow {
    pub fn new(config: DedupConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Count one operation and sweep when due. Must run before any map guard
    /// is taken.
    fn tick(&self, now: DateTime<Utc>) {
        let every = self.config.sweep_every.max(1);
        let n = self.ops.fetch_add(1, Ordering::Relaxed) + 1;
        if n % every == 0 {
            let removed = self.purge_expired(now);
            if removed > 0 {
                tracing::debug!(removed, "Swept expired dedup window entries");
            }
        }
    }

    /// Entry counts of the idempotency, session and recent-conversion maps
    pub fn sizes(&self) -> (usize, usize, usize) {
        (self.idempotency.len(), self.sessions.len(), self.recent.len())
    }

    /// Event id previously registered under the key, if still within its TTL
    pub fn idempotent(&self, key: &str, now: DateTime<Utc>) -> Option<String> {
        self.tick(now);
        let ttl = Duration::seconds(self.config.idempotency_ttl_secs);
        let expired = match self.idempotency.get(key) {
            Some(entry) if now - entry.at <= ttl => return Some(entry.event_id.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.idempotency.remove(key);
        }
        None
    }

    pub fn remember_key(&self, key: &str, event_id: &str, now: DateTime<Utc>) {
        self.tick(now);
        self.idempotency.insert(
            key.to_string(),
            Stamped {
                event_id: event_id.to_string(),
                at: now,
            },
        );
    }

    /// First click of the session, if within the session TTL
    pub fn first_click(
        &self,
        affiliate_id: &str,
        session_key: &str,
        now: DateTime<Utc>,
    ) -> Option<String> {
        self.tick(now);
        let ttl = Duration::seconds(self.config.session_ttl_secs);
        let key = (affiliate_id.to_string(), session_key.to_string());
        let expired = match self.sessions.get(&key) {
            Some(entry) if now - entry.at <= ttl => return Some(entry.event_id.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.sessions.remove(&key);
        }
        None
    }

    /// Register a click as the session's first; an existing live entry is kept
    pub fn remember_click(
        &self,
        affiliate_id: &str,
        session_key: &str,
        event_id: &str,
        now: DateTime<Utc>,
    ) {
        self.tick(now);
        let ttl = Duration::seconds(self.config.session_ttl_secs);
        let stamped = Stamped {
            event_id: event_id.to_string(),
            at: now,
        };
        self.sessions
            .entry((affiliate_id.to_string(), session_key.to_string()))
            .and_modify(|existing| {
                if now - existing.at > ttl {
                    *existing = stamped.clone();
                }
            })
            .or_insert(stamped);
    }

    fn prune(&self, entries: &mut Vec<RecentConversion>, now: DateTime<Utc>) {
        let horizon = now - Duration::seconds(self.config.recent_window_secs);
        entries.retain(|c| c.at > horizon);
        if entries.len() > self.config.recent_cap {
            let excess = entries.len() - self.config.recent_cap;
            entries.drain(..excess);
        }
    }

    /// Recent conversions of an affiliate/campaign pair, oldest first
    pub fn recent_conversions(
        &self,
        affiliate_id: &str,
        campaign_id: &str,
        now: DateTime<Utc>,
    ) -> Vec<RecentConversion> {
        self.tick(now);
        let key = (affiliate_id.to_string(), campaign_id.to_string());
        match self.recent.get_mut(&key) {
            Some(mut entries) => {
                self.prune(&mut entries, now);
                entries.to_vec()
            }
            None => Vec::new(),
        }
    }

    pub fn remember_conversion(
        &self,
        affiliate_id: &str,
        campaign_id: &str,
        conversion: RecentConversion,
        now: DateTime<Utc>,
    ) {
        self.tick(now);
        let mut entries = self
            .recent
            .entry((affiliate_id.to_string(), campaign_id.to_string()))
            .or_default();
        entries.push(conversion);
        self.prune(&mut entries, now);
    }

    /// Drop every expired entry; returns how many were removed
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let idempotency_ttl = Duration::seconds(self.config.idempotency_ttl_secs);
        let session_ttl = Duration::seconds(self.config.session_ttl_secs);

        let before = self.idempotency.len() + self.sessions.len() + self.recent.len();
        self.idempotency.retain(|_, v| now - v.at <= idempotency_ttl);
        self.sessions.retain(|_, v| now - v.at <= session_ttl);
        self.recent.retain(|_, entries| {
            self.prune(entries, now);
            !entries.is_empty()
        });
        let after = self.idempotency.len() + self.sessions.len() + self.recent.len();
        before.saturating_sub(after)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversion(id: &str, amount: i64, at: DateTime<Utc>) -> RecentConversion {
        RecentConversion {
            event_id: id.to_string(),
            amount,
            at,
            signature: "0".repeat(64),
        }
    }

    #[test]
    fn test_idempotency_key_expires() {
        let window = DedupWindow::new(DedupConfig::default());
        let now = Utc::now();
        window.remember_key("k1", "e1", now);

        assert_eq!(window.idempotent("k1", now + Duration::minutes(10)), Some("e1".into()));
        assert_eq!(window.idempotent("k1", now + Duration::minutes(11)), None);
        assert_eq!(window.idempotent("k1", now), None);
    }

    #[test]
    fn test_first_click_is_kept() {
        let window = DedupWindow::new(DedupConfig::default());
        let now = Utc::now();
        window.remember_click("aff", "s1", "e1", now);
        window.remember_click("aff", "s1", "e2", now + Duration::minutes(1));

        assert_eq!(
            window.first_click("aff", "s1", now + Duration::minutes(2)),
            Some("e1".into())
        );
        assert_eq!(window.first_click("other", "s1", now), None);
        assert_eq!(window.first_click("aff", "s1", now + Duration::minutes(31)), None);
    }

    #[test]
    fn test_recent_window_prunes_by_age() {
        let window = DedupWindow::new(DedupConfig::default());
        let now = Utc::now();
        window.remember_conversion("aff", "camp", conversion("old", 100, now), now);
        window.remember_conversion(
            "aff",
            "camp",
            conversion("new", 100, now + Duration::minutes(5)),
            now + Duration::minutes(5),
        );

        let recent = window.recent_conversions("aff", "camp", now + Duration::minutes(11));
        let ids: Vec<_> = recent.iter().map(|c| c.event_id.as_str()).collect();
        assert_eq!(ids, vec!["new"]);
    }

    #[test]
    fn test_recent_window_caps_entries() {
        let window = DedupWindow::new(DedupConfig::default());
        let now = Utc::now();
        for i in 0..60 {
            window.remember_conversion("aff", "camp", conversion(&format!("e{}", i), i, now), now);
        }

        let recent = window.recent_conversions("aff", "camp", now);
        assert_eq!(recent.len(), 50);
        assert_eq!(recent[0].event_id, "e10");
        assert_eq!(recent[49].event_id, "e59");
    }

    #[test]
    fn test_stale_keys_are_swept_without_explicit_purge() {
        let window = DedupWindow::new(DedupConfig::default());
        let t0 = Utc::now();
        for i in 0..10_000 {
            window.remember_key(&format!("k{}", i), &format!("e{}", i), t0);
            window.remember_click("aff", &format!("s{}", i), &format!("e{}", i), t0);
        }
        window.remember_conversion("aff", "camp", conversion("c1", 100, t0), t0);
        let (keys, sessions, recent) = window.sizes();
        assert!(keys > 9_000 && sessions > 9_000);
        assert_eq!(recent, 1);

        // Lookups of unrelated keys a week later
        let later = t0 + Duration::days(7);
        for i in 0..300 {
            assert_eq!(window.idempotent(&format!("fresh-{}", i), later), None);
        }

        assert_eq!(window.sizes(), (0, 0, 0));
    }

    #[test]
    fn test_sweep_keeps_live_entries() {
        let config = DedupConfig {
            sweep_every: 4,
            ..Default::default()
        };
        let window = DedupWindow::new(config);
        let now = Utc::now();
        window.remember_key("old", "e1", now);
        window.remember_key("live", "e2", now + Duration::minutes(8));

        for _ in 0..4 {
            window.first_click("aff", "unknown", now + Duration::minutes(12));
        }

        assert_eq!(window.sizes().0, 1);
        assert_eq!(
            window.idempotent("live", now + Duration::minutes(12)),
            Some("e2".into())
        );
    }

    #[test]
    fn test_purge_expired() {
        let window = DedupWindow::new(DedupConfig::default());
        let now = Utc::now();
        window.remember_key("k1", "e1", now);
        window.remember_click("aff", "s1", "e1", now);
        window.remember_conversion("aff", "camp", conversion("c1", 100, now), now);

        assert_eq!(window.purge_expired(now + Duration::minutes(5)), 0);
        assert_eq!(window.purge_expired(now + Duration::minutes(40)), 3);
    }
}
