//! Application routing
//!
//! This module defines all HTTP routes for the application.

use axum::{
    http::HeaderName,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::api::{admin, game, health, image};
use crate::middleware::{log_request, require_admin_key, REQUEST_ID_HEADER, TRACE_ID_HEADER};
use crate::server::state::AppState;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    // Health check routes (no authentication required)
    let health_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness))
        .route("/liveness", get(health::liveness));

    // Operator routes, guarded by the admin key
    let admin_routes = Router::new()
        .route("/key-status", get(admin::key_status))
        .route("/exhaust-key", post(admin::exhaust_key))
        .route("/notify", post(admin::notify))
        .route("/test-gemini", post(admin::test_gemini))
        .layer(middleware::from_fn_with_state(
            state.admin_auth.clone(),
            require_admin_key,
        ));

    let game_routes = Router::new()
        .route("/generate", post(game::generate))
        .merge(admin_routes);

    Router::new()
        .nest("/api/game", game_routes)
        .route("/api/image", post(image::generate_image))
        .merge(health_routes)
        // Apply middleware layers (order matters: first added = outermost = runs first)
        .layer(create_cors_layer())
        // Custom request logging with trace IDs
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

/// Create CORS layer with permissive settings for the browser client
fn create_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([
            HeaderName::from_static(TRACE_ID_HEADER),
            HeaderName::from_static(REQUEST_ID_HEADER),
        ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::error::ErrorBody;
    use crate::schemas::game::{GenerateResponse, KeyStatusResponse};
    use crate::schemas::gemini::GeminiRequest;
    use crate::services::content_filter::CONTENT_WARNING;
    use crate::services::gemini::{NarrativeProvider, ProviderError};
    use crate::services::key_pool::KeyConfig;
    use crate::services::notifier::{Notification, NotificationSender, NotifyError};
    use crate::services::storyteller::SAFETY_DEFLECTION;
    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde::de::DeserializeOwned;
    use std::sync::{Arc, Mutex};
    use tower::ServiceExt;

    const ADMIN_KEY: &str = "admin-secret";

    /// Keys named `spent-*` are over quota, prompts mentioning "dragon fire"
    /// are blocked, everything else gets `reply`.
    struct FakeGemini {
        reply: String,
    }

    #[async_trait]
    impl NarrativeProvider for FakeGemini {
        async fn generate_text(
            &self,
            api_key: &str,
            request: &GeminiRequest,
        ) -> Result<String, ProviderError> {
            if api_key.starts_with("spent") {
                return Err(ProviderError::Api {
                    code: 429,
                    status: "RESOURCE_EXHAUSTED".to_string(),
                    message: "Quota exceeded".to_string(),
                });
            }
            if request.prompt_text().unwrap_or_default().contains("dragon fire") {
                return Err(ProviderError::Blocked {
                    reason: "SAFETY".to_string(),
                });
            }
            Ok(self.reply.clone())
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<Notification>>,
    }

    #[async_trait]
    impl NotificationSender for RecordingNotifier {
        async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
            self.sent.lock().unwrap().push(notification.clone());
            Ok(())
        }
    }

    fn settings(keys: &[&str]) -> Settings {
        let mut settings = Settings {
            gemini_keys: keys
                .iter()
                .enumerate()
                .map(|(i, secret)| KeyConfig::new(format!("GEMINI_API_KEY_{}", i + 1), *secret))
                .collect(),
            admin_api_key: Some(ADMIN_KEY.to_string()),
            ..Settings::default()
        };
        settings.generation.rotation_delay_ms = 0;
        settings.generation.diagnostic_probe = false;
        settings
    }

    fn router_with(settings: Settings, reply: &str, notifier: Option<Arc<dyn NotificationSender>>) -> Router {
        let provider = Arc::new(FakeGemini {
            reply: reply.to_string(),
        });
        let state = AppState::from_parts(settings, provider, notifier).unwrap();
        create_router(state)
    }

    fn router(keys: &[&str], reply: &str) -> Router {
        router_with(settings(keys), reply, None)
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn admin(method: &str, uri: &str, body: Option<serde_json::Value>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-admin-key", ADMIN_KEY);
        match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn read_json<T: DeserializeOwned>(response: axum::response::Response) -> T {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_routes() {
        let app = router(&["k1"], "ok");

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-trace-id"));

        let response = app
            .oneshot(Request::builder().uri("/liveness").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_ready_requires_keys() {
        let response = router(&[], "ok")
            .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response = router(&[], "ok")
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body: serde_json::Value = read_json(response).await;
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["keys"]["total"], 0);

        let response = router(&["k1"], "ok")
            .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_generate_returns_story() {
        let response = router(&["k1"], "The door creaks open.")
            .oneshot(post_json(
                "/api/game/generate",
                serde_json::json!({"command": "open the door", "genre": "Fantasy"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: GenerateResponse = read_json(response).await;
        assert_eq!(body.response, "The door creaks open.");
    }

    #[tokio::test]
    async fn test_generate_requires_command() {
        let response = router(&["k1"], "ok")
            .oneshot(post_json("/api/game/generate", serde_json::json!({"command": "  "})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: ErrorBody = read_json(response).await;
        assert_eq!(body.error, "Command is required");
    }

    #[tokio::test]
    async fn test_generate_rejects_malformed_body() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/game/generate")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = router(&["k1"], "ok").oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: ErrorBody = read_json(response).await;
        assert_eq!(body.error, "Failed to generate response");
        assert!(body.details.is_some());
    }

    #[tokio::test]
    async fn test_prohibited_command_gets_warning() {
        let response = router(&["k1"], "unused")
            .oneshot(post_json(
                "/api/game/generate",
                serde_json::json!({"command": "call him a r e t a r d"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: GenerateResponse = read_json(response).await;
        assert_eq!(body.response, CONTENT_WARNING);
    }

    #[tokio::test]
    async fn test_story_output_is_masked() {
        let response = router(&["k1"], "The goblin shouts retard at you.")
            .oneshot(post_json("/api/game/generate", serde_json::json!({"command": "listen"})))
            .await
            .unwrap();

        let body: GenerateResponse = read_json(response).await;
        assert_eq!(body.response, "The goblin shouts ****** at you.");
    }

    #[tokio::test]
    async fn test_safety_block_deflects() {
        let response = router(&["k1"], "unused")
            .oneshot(post_json(
                "/api/game/generate",
                serde_json::json!({"command": "breathe dragon fire on the village"}),
            ))
            .await
            .unwrap();

        let body: GenerateResponse = read_json(response).await;
        assert_eq!(body.response, SAFETY_DEFLECTION);
    }

    #[tokio::test]
    async fn test_generate_rotates_past_spent_key() {
        let settings = settings(&["spent-1", "fresh-2"]);
        let provider = Arc::new(FakeGemini {
            reply: "You made it.".to_string(),
        });
        let state = AppState::from_parts(settings, provider, None).unwrap();
        let app = create_router(state.clone());

        let response = app
            .oneshot(post_json("/api/game/generate", serde_json::json!({"command": "run"})))
            .await
            .unwrap();

        let body: GenerateResponse = read_json(response).await;
        assert_eq!(body.response, "You made it.");
        assert_eq!(state.pool().current_slot(), 2);
        assert_eq!(state.pool().available_count(), 1);
    }

    #[tokio::test]
    async fn test_generate_without_keys_is_server_error() {
        let response = router(&[], "ok")
            .oneshot(post_json("/api/game/generate", serde_json::json!({"command": "look"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: ErrorBody = read_json(response).await;
        assert_eq!(body.error, "Failed to generate response");
        assert_eq!(body.details.as_deref(), Some("No API keys are configured"));
    }

    #[tokio::test]
    async fn test_admin_routes_require_key() {
        let response = router(&["k1"], "ok")
            .oneshot(
                Request::builder()
                    .uri("/api/game/key-status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let mut closed = settings(&["k1"]);
        closed.admin_api_key = None;
        let response = router_with(closed, "ok", None)
            .oneshot(admin("GET", "/api/game/key-status", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_key_status_and_exhaust() {
        let app = router(&["k1", "k2", "k3"], "ok");

        let response = app
            .clone()
            .oneshot(admin("POST", "/api/game/exhaust-key", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = read_json(response).await;
        assert_eq!(body["message"], "Key #1 marked as exhausted. Now using key #2.");
        assert_eq!(body["availableKeys"], 2);
        assert_eq!(body["totalKeys"], 3);

        let response = app
            .oneshot(admin("GET", "/api/game/key-status", None))
            .await
            .unwrap();
        let body: KeyStatusResponse = read_json(response).await;
        assert_eq!(body.total_keys, 3);
        assert_eq!(body.available_keys, 2);
        assert_eq!(body.current_key_index, 2);
    }

    #[tokio::test]
    async fn test_key_status_with_validation() {
        let response = router(&["good-1", "spent-2"], "hello")
            .oneshot(admin("GET", "/api/game/key-status?validate=true", None))
            .await
            .unwrap();

        let body: serde_json::Value = read_json(response).await;
        let validations = body["keyValidations"].as_array().unwrap();
        assert_eq!(validations.len(), 2);
        assert_eq!(validations[0]["keyNumber"], 1);
        assert_eq!(validations[0]["valid"], true);
        assert_eq!(validations[1]["valid"], false);
        assert!(validations[1]["error"].as_str().unwrap().contains("Quota exceeded"));
    }

    #[tokio::test]
    async fn test_exhaust_with_empty_pool_fails() {
        let response = router(&[], "ok")
            .oneshot(admin("POST", "/api/game/exhaust-key", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_notify_route() {
        let response = router(&["k1"], "ok")
            .oneshot(admin("POST", "/api/game/notify", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let notifier = Arc::new(RecordingNotifier::default());
        let response = router_with(settings(&["k1"]), "ok", Some(notifier.clone()))
            .oneshot(admin("POST", "/api/game/notify", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = read_json(response).await;
        assert_eq!(body["message"], "Test notification sent successfully");
        assert_eq!(notifier.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_gemini_key_probe() {
        let app = router(&["k1"], "Hello there!");

        let response = app
            .clone()
            .oneshot(admin("POST", "/api/game/test-gemini", Some(serde_json::json!({}))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: ErrorBody = read_json(response).await;
        assert_eq!(body.error, "API key is required");

        let response = app
            .clone()
            .oneshot(admin(
                "POST",
                "/api/game/test-gemini",
                Some(serde_json::json!({"key": "candidate"})),
            ))
            .await
            .unwrap();
        let body: serde_json::Value = read_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["key_valid"], true);
        assert_eq!(body["response"], "Hello there!");

        let response = app
            .clone()
            .oneshot(admin(
                "POST",
                "/api/game/test-gemini",
                Some(serde_json::json!({"key": "candidate", "prompt": "describe dragon fire"})),
            ))
            .await
            .unwrap();
        let body: serde_json::Value = read_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["key_valid"], true);
        assert_eq!(body["details"], "Content was blocked by safety filters");

        let response = app
            .oneshot(admin(
                "POST",
                "/api/game/test-gemini",
                Some(serde_json::json!({"key": "spent-key"})),
            ))
            .await
            .unwrap();
        let body: serde_json::Value = read_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["key_valid"], false);
        assert!(body["error"].as_str().unwrap().contains("Quota exceeded"));
    }

    #[tokio::test]
    async fn test_image_requires_prompt() {
        let response = router(&["k1"], "ok")
            .oneshot(post_json("/api/image", serde_json::json!({"prompt": ""})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: ErrorBody = read_json(response).await;
        assert_eq!(body.error, "Prompt is required");
    }
}
