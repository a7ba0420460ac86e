//! HTTP request and response bodies for the game routes

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::services::storyteller::KeyValidation;

// ============================================================================
// Story Generation
// ============================================================================

/// `POST /api/game/generate`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub command: Option<String>,

    /// Pre-joined transcript of recent turns
    #[serde(default)]
    pub context: Option<String>,

    #[serde(default)]
    pub genre: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenerateResponse {
    pub response: String,
}

// ============================================================================
// Admin
// ============================================================================

/// `GET /api/game/key-status`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeyStatusQuery {
    #[serde(default)]
    pub validate: Option<String>,
}

impl KeyStatusQuery {
    pub fn wants_validation(&self) -> bool {
        self.validate.as_deref() == Some("true")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyStatusResponse {
    pub total_keys: usize,
    pub available_keys: usize,
    /// 1-based slot of the active key
    pub current_key_index: usize,
    #[serde(skip_serializing_if = "Option::is_none", skip_deserializing)]
    pub key_validations: Option<Vec<KeyValidation>>,
}

/// `POST /api/game/exhaust-key`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExhaustKeyResponse {
    pub success: bool,
    pub message: String,
    pub available_keys: usize,
    pub total_keys: usize,
}

/// `POST /api/game/notify`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyResponse {
    pub success: bool,
    pub message: String,
}

/// `POST /api/game/test-gemini`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TestGeminiRequest {
    #[serde(default)]
    pub key: Option<String>,

    #[serde(default)]
    pub prompt: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestGeminiResponse {
    pub success: bool,
    pub key_valid: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub friendly_message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

// ============================================================================
// Images
// ============================================================================

/// `POST /api/image`
#[derive(Debug, Clone, Deserialize)]
pub struct ImageGenerateRequest {
    #[serde(default)]
    pub prompt: Option<String>,

    #[serde(default = "default_dimension")]
    pub width: u32,

    #[serde(default = "default_dimension")]
    pub height: u32,
}

fn default_dimension() -> u32 {
    512
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageGenerateResponse {
    pub image: String,
    pub seed: Value,
}
