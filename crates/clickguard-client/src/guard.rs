//! Recent-submission guard

use chrono::{DateTime, Duration, Utc};
use clickguard_core::SharedClock;
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use std::sync::Mutex;

pub const DEFAULT_GUARD_WINDOW_SECS: i64 = 10;
pub const DEFAULT_GUARD_CAPACITY: usize = 32;

/// Remembers digests of recently submitted payloads
///
/// Entries are pruned by age on every call and the oldest are dropped once
/// the capacity is reached.
pub struct RecentSubmissions {
    window: Duration,
    capacity: usize,
    clock: SharedClock,
    seen: Mutex<VecDeque<([u8; 32], DateTime<Utc>)>>,
}

impl RecentSubmissions {
    pub fn new(clock: SharedClock) -> Self {
        Self::with_limits(
            clock,
            Duration::seconds(DEFAULT_GUARD_WINDOW_SECS),
            DEFAULT_GUARD_CAPACITY,
        )
    }

    pub fn with_limits(clock: SharedClock, window: Duration, capacity: usize) -> Self {
        Self {
            window,
            capacity: capacity.max(1),
            clock,
            seen: Mutex::new(VecDeque::new()),
        }
    }

    /// Returns `false` if the same payload was submitted within the window;
    /// otherwise records it and returns `true`
    pub fn should_submit(&self, payload: &str) -> bool {
        let digest: [u8; 32] = Sha256::digest(payload.as_bytes()).into();
        let now = self.clock.now();
        let mut seen = self
            .seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let cutoff = now - self.window;
        seen.retain(|(_, at)| *at > cutoff);

        if seen.iter().any(|(d, _)| *d == digest) {
            tracing::debug!("Suppressing repeated submission");
            return false;
        }

        while seen.len() >= self.capacity {
            seen.pop_front();
        }
        seen.push_back((digest, now));
        true
    }

    pub fn len(&self) -> usize {
        self.seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clickguard_core::ManualClock;
    use std::sync::Arc;

    #[test]
    fn test_repeat_within_window_is_suppressed() {
        let clock = ManualClock::new(Utc::now());
        let guard = RecentSubmissions::new(Arc::new(clock.clone()));

        assert!(guard.should_submit(r#"{"amount":100}"#));
        assert!(!guard.should_submit(r#"{"amount":100}"#));
        assert!(guard.should_submit(r#"{"amount":101}"#));

        clock.advance(Duration::seconds(11));
        assert!(guard.should_submit(r#"{"amount":100}"#));
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let clock = ManualClock::new(Utc::now());
        let guard = RecentSubmissions::new(Arc::new(clock));

        for i in 0..40 {
            assert!(guard.should_submit(&format!("payload-{}", i)));
        }
        assert_eq!(guard.len(), DEFAULT_GUARD_CAPACITY);
        // The first few were evicted, the latest are still remembered
        assert!(guard.should_submit("payload-0"));
        assert!(!guard.should_submit("payload-39"));
    }
}
