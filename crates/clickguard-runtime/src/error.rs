//! Runtime error types

use clickguard_core::CoreError;
use thiserror::Error;

/// Runtime error
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Backing store failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rejected by the verification state machine
    #[error("Invalid transition: {0}")]
    InvalidTransition(#[from] CoreError),

    /// Optimistic concurrency check failed
    #[error("Conflict: {0}")]
    Conflict(String),

    /// An event already has an open verification queue item
    #[error("Queue conflict: event {0} already has an open queue item")]
    QueueConflict(String),

    /// Webhook transport failure
    #[error("Delivery error: {0}")]
    Delivery(String),

    /// Lookup exceeded its deadline
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Caller-supplied value is unusable
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Database error
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;
