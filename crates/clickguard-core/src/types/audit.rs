//! Append-only audit trail

use super::status::VerificationStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `performed_by` value for automated transitions
pub const SYSTEM_ACTOR: &str = "system";

/// Audited action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuditAction {
    Created,
    Verified,
    Rejected,
    ManuallyOverridden,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Created => "created",
            AuditAction::Verified => "verified",
            AuditAction::Rejected => "rejected",
            AuditAction::ManuallyOverridden => "manually-overridden",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created" => Some(AuditAction::Created),
            "verified" => Some(AuditAction::Verified),
            "rejected" => Some(AuditAction::Rejected),
            "manually-overridden" => Some(AuditAction::ManuallyOverridden),
            _ => None,
        }
    }
}

/// One status transition of an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub id: String,
    /// Event the entry belongs to (clicks included, the name follows the
    /// conversion-centric admin surface)
    pub conversion_id: String,
    pub action: AuditAction,
    pub old_value: Option<VerificationStatus>,
    pub new_value: VerificationStatus,
    pub performed_by: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl AuditLogEntry {
    pub fn is_automated(&self) -> bool {
        self.performed_by == SYSTEM_ACTOR
    }
}
