//! Blacklist service

use super::backend::BlacklistBackend;
use crate::error::Result;
use crate::integrity::IdentifierHasher;
use clickguard_core::{BlacklistEntry, SharedClock};
use std::sync::Arc;

/// Blacklist operations over a backend, hashing raw identifiers on the way in
#[derive(Clone)]
pub struct BlacklistService {
    backend: Arc<dyn BlacklistBackend>,
    hasher: IdentifierHasher,
    clock: SharedClock,
}

impl BlacklistService {
    pub fn new(
        backend: Arc<dyn BlacklistBackend>,
        hasher: IdentifierHasher,
        clock: SharedClock,
    ) -> Self {
        Self {
            backend,
            hasher,
            clock,
        }
    }

    /// Block a raw identifier (e.g. an IP address); returns its hash
    pub async fn block_identifier(&self, raw: &str, reason: &str) -> Result<String> {
        let hashed = self.hasher.hash(raw);
        self.block_hashed(&hashed, reason).await?;
        Ok(hashed)
    }

    /// Block an already-hashed identifier
    pub async fn block_hashed(&self, hashed_identifier: &str, reason: &str) -> Result<()> {
        let entry = BlacklistEntry::new(hashed_identifier, reason, self.clock.now());
        self.backend.append(entry).await?;
        tracing::info!(identifier = %hashed_identifier, reason, "Identifier blacklisted");
        Ok(())
    }

    /// Deactivate entries for a hashed identifier; history is kept
    pub async fn unblock(&self, hashed_identifier: &str) -> Result<usize> {
        let changed = self.backend.deactivate(hashed_identifier).await?;
        if changed > 0 {
            tracing::info!(identifier = %hashed_identifier, changed, "Blacklist entries deactivated");
        }
        Ok(changed)
    }

    pub async fn contains(&self, hashed_identifier: &str) -> Result<bool> {
        self.backend.is_active(hashed_identifier).await
    }

    pub async fn history(&self, hashed_identifier: &str) -> Result<Vec<BlacklistEntry>> {
        self.backend.entries(hashed_identifier).await
    }

    pub fn hasher(&self) -> &IdentifierHasher {
        &self.hasher
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrity::ServerSecret;
    use crate::lists::MemoryBackend;
    use clickguard_core::SystemClock;

    fn service() -> BlacklistService {
        let secret = ServerSecret::new("0123456789abcdef0123").unwrap();
        BlacklistService::new(
            Arc::new(MemoryBackend::new()),
            IdentifierHasher::new(&secret).unwrap(),
            Arc::new(SystemClock),
        )
    }

    #[tokio::test]
    async fn test_block_raw_identifier_stores_hash() {
        let service = service();
        let hashed = service
            .block_identifier("203.0.113.7", "fraud ring")
            .await
            .unwrap();

        assert_ne!(hashed, "203.0.113.7");
        assert_eq!(hashed, service.hasher().hash("203.0.113.7"));
        assert!(service.contains(&hashed).await.unwrap());
    }

    #[tokio::test]
    async fn test_unblock_keeps_history() {
        let service = service();
        let hashed = service.block_identifier("198.51.100.1", "abuse").await.unwrap();

        assert_eq!(service.unblock(&hashed).await.unwrap(), 1);
        assert!(!service.contains(&hashed).await.unwrap());

        let history = service.history(&hashed).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].reason, "abuse");
    }
}
