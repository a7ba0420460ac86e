//! Gemini service for Google Gemini API interactions
//!
//! Calls the `generateContent` REST endpoint with a caller-supplied API key.
//! Key selection and rotation live in the key pool; this client only turns a
//! key and a request into generated text or a classifiable error.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

use crate::schemas::gemini::{models, GeminiError, GeminiRequest, GeminiResponse};

// ============================================================================
// Constants
// ============================================================================

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur when calling the Gemini API
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("[{code} {status}] {message}")]
    Api {
        code: u16,
        status: String,
        message: String,
    },

    #[error("Text not available. Response was blocked due to {reason}")]
    Blocked { reason: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
}

impl ProviderError {
    /// HTTP status attached to the failure, if the provider answered at all
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { code, .. } => Some(*code),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

// ============================================================================
// Provider Trait
// ============================================================================

/// A text-generation backend that authenticates with a per-call API key
#[async_trait]
pub trait NarrativeProvider: Send + Sync {
    /// Generate text for `request` using `api_key`
    ///
    /// Returns the raw generated text, which may be empty.
    async fn generate_text(
        &self,
        api_key: &str,
        request: &GeminiRequest,
    ) -> Result<String, ProviderError>;
}

// ============================================================================
// Gemini Client
// ============================================================================

/// Configuration for the Gemini client
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// Model name (default: gemini-2.0-flash)
    pub model: String,

    /// Base URL (default: generativelanguage.googleapis.com)
    pub base_url: Option<String>,

    /// Transport-level request timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            model: models::GEMINI_2_0_FLASH.to_string(),
            base_url: None,
            timeout_seconds: 60,
        }
    }
}

impl GeminiConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }
}

/// REST client for the Gemini generateContent API
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: Option<String>,
    model: String,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        tracing::info!(model = %config.model, "Initialized Gemini client");

        Ok(Self {
            client,
            base_url: config.base_url,
            model: config.model,
        })
    }

    fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(GEMINI_API_BASE)
    }
}

#[async_trait]
impl NarrativeProvider for GeminiClient {
    async fn generate_text(
        &self,
        api_key: &str,
        request: &GeminiRequest,
    ) -> Result<String, ProviderError> {
        let url = format!("{}/models/{}:generateContent", self.base_url(), self.model);

        tracing::debug!(model = %self.model, url = %url, "Calling Gemini generateContent API");

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            if let Ok(gemini_error) = serde_json::from_str::<GeminiError>(&body) {
                return Err(ProviderError::Api {
                    code: status.as_u16(),
                    status: gemini_error.error.status,
                    message: gemini_error.error.message,
                });
            }

            return Err(ProviderError::Api {
                code: status.as_u16(),
                status: status.canonical_reason().unwrap_or_default().to_string(),
                message: body,
            });
        }

        let response: GeminiResponse = serde_json::from_str(&body).map_err(|e| {
            tracing::error!(error = %e, "Failed to parse Gemini response");
            ProviderError::Parse(e.to_string())
        })?;

        let text = response.text();
        if text.trim().is_empty() {
            if let Some(reason) = response.block_reason() {
                return Err(ProviderError::Blocked { reason });
            }
        }

        if let Some(usage) = &response.usage_metadata {
            tracing::debug!(
                prompt_tokens = usage.prompt_token_count,
                output_tokens = usage.candidates_token_count,
                "Gemini usage"
            );
        }

        Ok(text)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::Path,
        http::{HeaderMap, StatusCode},
        routing::post,
        Json, Router,
    };
    use serde_json::{json, Value};

    /// Fake Gemini endpoint: the API key picks the canned answer
    async fn fake_generate(
        Path(_model_call): Path<String>,
        headers: HeaderMap,
        Json(_body): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        let key = headers
            .get("x-goog-api-key")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        match key {
            "good" => (
                StatusCode::OK,
                Json(json!({"candidates": [{"content": {"parts": [{"text": "A door creaks open."}]}, "finishReason": "STOP"}]})),
            ),
            "quota" => (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({"error": {"code": 429, "message": "Resource has been exhausted (e.g. check quota).", "status": "RESOURCE_EXHAUSTED"}})),
            ),
            "blocked" => (
                StatusCode::OK,
                Json(json!({"promptFeedback": {"blockReason": "SAFETY"}})),
            ),
            _ => (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": {"code": 400, "message": "API key not valid. Please pass a valid API key.", "status": "INVALID_ARGUMENT"}})),
            ),
        }
    }

    async fn spawn_fake_gemini() -> String {
        let app = Router::new().route("/models/:model_call", post(fake_generate));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn client(base_url: String) -> GeminiClient {
        GeminiClient::new(GeminiConfig::default().with_base_url(base_url).with_timeout(5)).unwrap()
    }

    #[test]
    fn test_gemini_config_defaults() {
        let config = GeminiConfig::default();
        assert_eq!(config.model, "gemini-2.0-flash");
        assert!(config.base_url.is_none());

        let config = GeminiConfig::new("gemini-1.5-flash").with_base_url("https://custom.api.com");
        assert_eq!(config.model, "gemini-1.5-flash");
        assert_eq!(config.base_url, Some("https://custom.api.com".to_string()));
    }

    #[tokio::test]
    async fn test_generate_text_success() {
        let client = client(spawn_fake_gemini().await);
        let text = client
            .generate_text("good", &GeminiRequest::from_prompt("look around"))
            .await
            .unwrap();
        assert_eq!(text, "A door creaks open.");
    }

    #[tokio::test]
    async fn test_generate_text_quota_error() {
        let client = client(spawn_fake_gemini().await);
        let err = client
            .generate_text("quota", &GeminiRequest::from_prompt("look around"))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), Some(429));
        match err {
            ProviderError::Api { status, .. } => assert_eq!(status, "RESOURCE_EXHAUSTED"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_generate_text_blocked() {
        let client = client(spawn_fake_gemini().await);
        let err = client
            .generate_text("blocked", &GeminiRequest::from_prompt("something awful"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Blocked { ref reason } if reason == "SAFETY"));
        assert!(err.to_string().contains("blocked due to SAFETY"));
    }

    #[tokio::test]
    async fn test_generate_text_invalid_key() {
        let client = client(spawn_fake_gemini().await);
        let err = client
            .generate_text("nope", &GeminiRequest::from_prompt("hello"))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), Some(400));
        assert!(err.to_string().contains("API key not valid"));
    }
}
