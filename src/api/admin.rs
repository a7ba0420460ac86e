//! Operator endpoints
//!
//! Key pool introspection, forced exhaustion for drills, a notification
//! ping, and an ad-hoc key test. All routes sit behind the admin key guard.

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    Json,
};

use crate::error::ApiError;
use crate::schemas::game::{
    ExhaustKeyResponse, KeyStatusQuery, KeyStatusResponse, NotifyResponse, TestGeminiRequest,
    TestGeminiResponse,
};
use crate::server::state::AppState;
use crate::services::notifier::Notification;
use crate::services::storyteller::{KeyTestOutcome, DEFAULT_TEST_PROMPT};

const SAFETY_ERROR: &str = "The API request was blocked by safety filters. Please try a different prompt.";
const SAFETY_FRIENDLY: &str =
    "I notice the request might not be appropriate. Please try with more family-friendly content.";

/// GET /api/game/key-status[?validate=true]
pub async fn key_status(
    State(state): State<AppState>,
    Query(query): Query<KeyStatusQuery>,
) -> Json<KeyStatusResponse> {
    let status = state.pool().status();

    let key_validations = if query.wants_validation() {
        Some(state.storyteller.validate_keys().await)
    } else {
        None
    };

    Json(KeyStatusResponse {
        total_keys: status.total,
        available_keys: status.available,
        current_key_index: status.current_slot,
        key_validations,
    })
}

/// POST /api/game/exhaust-key
pub async fn exhaust_key(State(state): State<AppState>) -> Result<Json<ExhaustKeyResponse>, ApiError> {
    let pool = state.pool();
    if pool.total_count() == 0 {
        return Err(
            ApiError::failed(StatusCode::INTERNAL_SERVER_ERROR, "Failed to exhaust key")
                .with_details("No API keys are configured"),
        );
    }

    let old_slot = pool.current_slot();
    pool.mark_active_exhausted();
    let status = pool.status();

    Ok(Json(ExhaustKeyResponse {
        success: true,
        message: format!(
            "Key #{} marked as exhausted. Now using key #{}.",
            old_slot, status.current_slot
        ),
        available_keys: status.available,
        total_keys: status.total,
    }))
}

/// POST /api/game/notify
pub async fn notify(State(state): State<AppState>) -> Result<Json<NotifyResponse>, ApiError> {
    let Some(notifier) = state.notifier.as_ref() else {
        return Err(
            ApiError::failed(StatusCode::INTERNAL_SERVER_ERROR, "Notification configuration missing")
                .with_details("NOTIFY_WEBHOOK_URL is not set"),
        );
    };

    notifier.send(&Notification::test_ping()).await.map_err(|e| {
        tracing::error!(error = %e, "Error sending test notification");
        ApiError::failed(StatusCode::INTERNAL_SERVER_ERROR, "Failed to send test notification")
            .with_details(e.to_string())
    })?;

    Ok(Json(NotifyResponse {
        success: true,
        message: "Test notification sent successfully".to_string(),
    }))
}

/// POST /api/game/test-gemini
pub async fn test_gemini(
    State(state): State<AppState>,
    payload: Result<Json<TestGeminiRequest>, JsonRejection>,
) -> Result<Json<TestGeminiResponse>, ApiError> {
    let Json(body) = payload.map_err(|e| {
        ApiError::failed(e.status(), "Failed to test API key").with_details(e.body_text())
    })?;

    let key = body
        .key
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| ApiError::InvalidRequest("API key is required".to_string()))?;
    let prompt = body
        .prompt
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_TEST_PROMPT.to_string());

    let response = match state.storyteller.test_key(&key, &prompt).await {
        KeyTestOutcome::Success(text) => TestGeminiResponse {
            success: true,
            key_valid: true,
            response: Some(text),
            ..Default::default()
        },
        KeyTestOutcome::SafetyBlocked => TestGeminiResponse {
            success: false,
            key_valid: true,
            error: Some(SAFETY_ERROR.to_string()),
            friendly_message: Some(SAFETY_FRIENDLY.to_string()),
            details: Some("Content was blocked by safety filters".to_string()),
            ..Default::default()
        },
        KeyTestOutcome::Failed { error, details } => TestGeminiResponse {
            success: false,
            key_valid: false,
            error: Some(error),
            details: Some(details),
            ..Default::default()
        },
    };

    Ok(Json(response))
}
