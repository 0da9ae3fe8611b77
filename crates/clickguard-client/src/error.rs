//! Client error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Duplicate submission suppressed")]
    DuplicateSubmission,
}

pub type Result<T> = std::result::Result<T, ClientError>;
