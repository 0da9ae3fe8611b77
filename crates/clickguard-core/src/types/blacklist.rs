//! Blacklisted identifiers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A hashed identifier treated as untrusted while `active`.
///
/// Entries are soft-disabled and never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlacklistEntry {
    pub hashed_identifier: String,
    pub reason: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl BlacklistEntry {
    pub fn new(
        hashed_identifier: impl Into<String>,
        reason: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            hashed_identifier: hashed_identifier.into(),
            reason: reason.into(),
            active: true,
            created_at,
        }
    }
}
