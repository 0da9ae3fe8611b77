//! Blacklist storage backends

use crate::error::Result;
use clickguard_core::BlacklistEntry;
use tokio::sync::RwLock;

/// Storage for blacklist entries
#[async_trait::async_trait]
pub trait BlacklistBackend: Send + Sync {
    /// Check if an active entry exists for the hashed identifier
    async fn is_active(&self, hashed_identifier: &str) -> Result<bool>;

    /// Append a new entry
    async fn append(&self, entry: BlacklistEntry) -> Result<()>;

    /// Deactivate all active entries for the hashed identifier, returning how many changed
    async fn deactivate(&self, hashed_identifier: &str) -> Result<usize>;

    /// All entries for the hashed identifier, oldest first
    async fn entries(&self, hashed_identifier: &str) -> Result<Vec<BlacklistEntry>>;
}

/// In-memory blacklist backend
///
/// Suitable for testing and single-instance deployments; entries are lost on restart.
#[derive(Default)]
pub struct MemoryBackend {
    entries: RwLock<Vec<BlacklistEntry>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl BlacklistBackend for MemoryBackend {
    async fn is_active(&self, hashed_identifier: &str) -> Result<bool> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .any(|e| e.active && e.hashed_identifier == hashed_identifier))
    }

    async fn append(&self, entry: BlacklistEntry) -> Result<()> {
        self.entries.write().await.push(entry);
        Ok(())
    }

    async fn deactivate(&self, hashed_identifier: &str) -> Result<usize> {
        let mut entries = self.entries.write().await;
        let mut changed = 0;
        for entry in entries
            .iter_mut()
            .filter(|e| e.active && e.hashed_identifier == hashed_identifier)
        {
            entry.active = false;
            changed += 1;
        }
        Ok(changed)
    }

    async fn entries(&self, hashed_identifier: &str) -> Result<Vec<BlacklistEntry>> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|e| e.hashed_identifier == hashed_identifier)
            .cloned()
            .collect())
    }
}
