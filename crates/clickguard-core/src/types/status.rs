//! Verification status of a tracked event

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Verification status
///
/// `Suspicious` is a sub-state of `Pending` that forces manual review.
/// `Verified` and `Rejected` are terminal for the automated path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    Pending,
    Suspicious,
    Verified,
    Rejected,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::Suspicious => "suspicious",
            VerificationStatus::Verified => "verified",
            VerificationStatus::Rejected => "rejected",
        }
    }

    /// Terminal for the automated pipeline (manual overrides still apply)
    pub fn is_terminal(&self) -> bool {
        matches!(self, VerificationStatus::Verified | VerificationStatus::Rejected)
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VerificationStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(VerificationStatus::Pending),
            "suspicious" => Ok(VerificationStatus::Suspicious),
            "verified" => Ok(VerificationStatus::Verified),
            "rejected" => Ok(VerificationStatus::Rejected),
            other => Err(CoreError::InvalidStatus(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip_str() {
        for status in [
            VerificationStatus::Pending,
            VerificationStatus::Suspicious,
            VerificationStatus::Verified,
            VerificationStatus::Rejected,
        ] {
            assert_eq!(status.as_str().parse::<VerificationStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_status_invalid() {
        let err = "approved".parse::<VerificationStatus>().unwrap_err();
        assert_eq!(err, CoreError::InvalidStatus("approved".to_string()));
    }

    #[test]
    fn test_terminal_states() {
        assert!(!VerificationStatus::Pending.is_terminal());
        assert!(!VerificationStatus::Suspicious.is_terminal());
        assert!(VerificationStatus::Verified.is_terminal());
        assert!(VerificationStatus::Rejected.is_terminal());
    }
}
