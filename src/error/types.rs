//! API error types
//!
//! Every failed request answers with `{"error": ..., "details": ...}` and a
//! matching HTTP status. `details` is omitted when there is nothing to add.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::services::image::ImageError;
use crate::services::storyteller::StoryError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("{message}")]
    Failed {
        status: StatusCode,
        message: String,
        details: Option<String>,
    },

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn failed(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Failed {
            status,
            message: message.into(),
            details: None,
        }
    }

    /// Attach a `details` string; only meaningful for [`ApiError::Failed`]
    pub fn with_details(self, details: impl Into<String>) -> Self {
        match self {
            Self::Failed {
                status, message, ..
            } => Self::Failed {
                status,
                message,
                details: Some(details.into()),
            },
            other => other,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Failed { status, .. } => *status,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoryError> for ApiError {
    fn from(err: StoryError) -> Self {
        ApiError::failed(StatusCode::INTERNAL_SERVER_ERROR, "Failed to generate response")
            .with_details(err.to_string())
    }
}

impl From<ImageError> for ApiError {
    fn from(err: ImageError) -> Self {
        let status = StatusCode::from_u16(err.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        ApiError::failed(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::InvalidRequest(msg) => ErrorBody {
                error: msg,
                details: None,
            },
            ApiError::Failed {
                message, details, ..
            } => ErrorBody {
                error: message,
                details,
            },
            ApiError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                ErrorBody {
                    error: "Internal server error".to_string(),
                    details: Some(err.to_string()),
                }
            }
        };

        (status, Json(body)).into_response()
    }
}

/// JSON error body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::key_pool::PoolError;

    #[test]
    fn test_story_error_maps_to_500_with_details() {
        let err: ApiError = StoryError::Pool(PoolError::NoCredentialsAvailable).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        match err {
            ApiError::Failed { message, details, .. } => {
                assert_eq!(message, "Failed to generate response");
                assert_eq!(details.as_deref(), Some("No API keys are configured"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_image_error_keeps_status() {
        let err: ApiError = ImageError::RateLimited.into();
        assert_eq!(err.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(err.to_string(), "Rate limit hit - try again later");

        let err: ApiError = ImageError::EmptyPrompt.into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_details_only_on_failed() {
        let err = ApiError::InvalidRequest("Command is required".into()).with_details("ignored");
        assert!(matches!(err, ApiError::InvalidRequest(_)));
    }

    #[test]
    fn test_body_omits_empty_details() {
        let body = ErrorBody {
            error: "Command is required".to_string(),
            details: None,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({"error": "Command is required"})
        );
    }
}
