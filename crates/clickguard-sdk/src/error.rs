//! SDK error types

use thiserror::Error;

/// A submission that cannot be accepted as given; nothing was written
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PreconditionError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("campaign not found: {0}")]
    CampaignNotFound(String),

    #[error("campaign is not active: {0}")]
    CampaignInactive(String),

    #[error("affiliate not found: {0}")]
    AffiliateNotFound(String),

    #[error("affiliate is not active: {0}")]
    AffiliateInactive(String),

    #[error("conversion amount must be positive, got {0}")]
    InvalidAmount(i64),
}

impl PreconditionError {
    /// True for references to records that do not exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            PreconditionError::CampaignNotFound(_) | PreconditionError::AffiliateNotFound(_)
        )
    }
}

/// SDK error type
#[derive(Error, Debug)]
pub enum SdkError {
    /// Submission failed a precondition
    #[error("Precondition failed: {0}")]
    Precondition(#[from] PreconditionError),

    /// The event was persisted and rejected by the scoring engine.
    ///
    /// The message is deliberately generic and never carries the score.
    #[error("validation failed: suspicious activity detected")]
    Rejected {
        event_id: String,
        reasons: Vec<String>,
    },

    /// Runtime error
    #[error("Runtime error: {0}")]
    Runtime(#[from] clickguard_runtime::RuntimeError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed YAML configuration
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for SDK operations
pub type Result<T> = std::result::Result<T, SdkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_message_is_generic() {
        let error = SdkError::Rejected {
            event_id: "evt-1".to_string(),
            reasons: vec!["bot_user_agent".to_string()],
        };
        assert_eq!(
            error.to_string(),
            "validation failed: suspicious activity detected"
        );
    }

    #[test]
    fn test_precondition_conversion() {
        let error: SdkError = PreconditionError::CampaignInactive("camp-9".to_string()).into();
        assert!(error.to_string().contains("Precondition failed"));
        assert!(error.to_string().contains("camp-9"));
    }

    #[test]
    fn test_not_found_classification() {
        assert!(PreconditionError::AffiliateNotFound("a".into()).is_not_found());
        assert!(!PreconditionError::AffiliateInactive("a".into()).is_not_found());
        assert!(!PreconditionError::InvalidAmount(0).is_not_found());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "pipeline.yaml");
        let sdk_error: SdkError = io_error.into();
        assert!(sdk_error.to_string().contains("I/O error"));
        assert!(sdk_error.to_string().contains("pipeline.yaml"));
    }
}
