//! Server error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use clickguard_runtime::RuntimeError;
use clickguard_sdk::{PreconditionError, SdkError};
use serde_json::json;
use std::fmt;

/// Server error type
#[derive(Debug)]
pub enum ServerError {
    /// Malformed request or missing field
    InvalidRequest(String),

    /// Referenced record does not exist
    NotFound(String),

    /// Well-formed request the current state cannot accept
    Unprocessable(String),

    /// Conflicting state change
    Conflict(String),

    /// Missing or wrong admin token
    Unauthorized,

    /// Event persisted and rejected by the scoring engine
    Rejected { reasons: Vec<String> },

    /// Internal server error
    InternalError(String),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            ServerError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ServerError::Unprocessable(msg) => write!(f, "Unprocessable: {}", msg),
            ServerError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ServerError::Unauthorized => write!(f, "Unauthorized"),
            ServerError::Rejected { .. } => {
                write!(f, "validation failed: suspicious activity detected")
            }
            ServerError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ServerError {}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServerError::Conflict(_) => StatusCode::CONFLICT,
            ServerError::Unauthorized => StatusCode::UNAUTHORIZED,
            ServerError::Rejected { .. } => StatusCode::FORBIDDEN,
            ServerError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ServerError::Rejected { reasons } => json!({
                "error": "validation failed",
                "message": "suspicious activity detected",
                "reasons": reasons,
            }),
            ServerError::InternalError(msg) => {
                tracing::error!(error = %msg, "Request failed");
                json!({
                    "error": "internal error",
                    "status": status.as_u16(),
                })
            }
            other => json!({
                "error": other.to_string(),
                "status": status.as_u16(),
            }),
        };

        (status, Json(body)).into_response()
    }
}

impl From<PreconditionError> for ServerError {
    fn from(err: PreconditionError) -> Self {
        match err {
            PreconditionError::MissingField(_) => ServerError::InvalidRequest(err.to_string()),
            _ if err.is_not_found() => ServerError::NotFound(err.to_string()),
            _ => ServerError::Unprocessable(err.to_string()),
        }
    }
}

impl From<RuntimeError> for ServerError {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::NotFound(_) => ServerError::NotFound(err.to_string()),
            RuntimeError::InvalidInput(_) => ServerError::InvalidRequest(err.to_string()),
            RuntimeError::InvalidTransition(_)
            | RuntimeError::Conflict(_)
            | RuntimeError::QueueConflict(_) => ServerError::Conflict(err.to_string()),
            other => ServerError::InternalError(other.to_string()),
        }
    }
}

impl From<SdkError> for ServerError {
    fn from(err: SdkError) -> Self {
        match err {
            SdkError::Precondition(e) => e.into(),
            SdkError::Rejected { reasons, .. } => ServerError::Rejected { reasons },
            SdkError::Runtime(e) => e.into(),
            other => ServerError::InternalError(other.to_string()),
        }
    }
}

impl From<anyhow::Error> for ServerError {
    fn from(err: anyhow::Error) -> Self {
        ServerError::InternalError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_precondition_status_mapping() {
        let cases = vec![
            (PreconditionError::MissingField("clientIp"), StatusCode::BAD_REQUEST),
            (
                PreconditionError::CampaignNotFound("c".to_string()),
                StatusCode::NOT_FOUND,
            ),
            (
                PreconditionError::AffiliateNotFound("a".to_string()),
                StatusCode::NOT_FOUND,
            ),
            (
                PreconditionError::CampaignInactive("c".to_string()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                PreconditionError::AffiliateInactive("a".to_string()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (PreconditionError::InvalidAmount(0), StatusCode::UNPROCESSABLE_ENTITY),
        ];
        for (err, expected) in cases {
            let server_err: ServerError = SdkError::Precondition(err.clone()).into();
            assert_eq!(server_err.status(), expected, "{:?}", err);
        }
    }

    #[test]
    fn test_runtime_status_mapping() {
        let err: ServerError = SdkError::Runtime(RuntimeError::NotFound("evt".into())).into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err: ServerError = SdkError::Runtime(RuntimeError::InvalidInput("x".into())).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err: ServerError = SdkError::Runtime(RuntimeError::QueueConflict("x".into())).into();
        assert_eq!(err.status(), StatusCode::CONFLICT);

        let err: ServerError = SdkError::Runtime(RuntimeError::Storage("down".into())).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_rejection_body_has_no_score() {
        let err: ServerError = SdkError::Rejected {
            event_id: "evt-1".to_string(),
            reasons: vec!["bot_user_agent".to_string()],
        }
        .into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body = body_json(response).await;
        assert_eq!(body["error"], "validation failed");
        assert_eq!(body["reasons"][0], "bot_user_agent");
        assert!(body.get("riskScore").is_none());
        assert!(body.get("eventId").is_none());
    }

    #[tokio::test]
    async fn test_internal_error_hides_detail() {
        let response = ServerError::InternalError("connection refused at 10.0.0.3".to_string())
            .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"], "internal error");
        assert_eq!(body["status"], 500);
    }

    #[test]
    fn test_anyhow_error_conversion() {
        let server_err: ServerError = anyhow::anyhow!("something went wrong").into();
        assert!(server_err.to_string().contains("something went wrong"));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ServerError>();
    }
}
