//! Google Gemini API schema definitions
//!
//! Request and response bodies for the `generateContent` REST endpoint,
//! limited to the text-only subset the storyteller uses.

use serde::{Deserialize, Serialize};

// ============================================================================
// Request Types
// ============================================================================

/// Gemini API request body for generateContent
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeminiRequest {
    /// The content of the conversation
    pub contents: Vec<GeminiContent>,

    /// Generation configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,

    /// Safety settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub safety_settings: Option<Vec<SafetySetting>>,
}

impl GeminiRequest {
    /// A single-turn request with default generation and safety settings
    pub fn from_prompt(prompt: impl Into<String>) -> Self {
        Self {
            contents: vec![GeminiContent::user(prompt)],
            generation_config: None,
            safety_settings: None,
        }
    }

    pub fn with_generation_config(mut self, config: GenerationConfig) -> Self {
        self.generation_config = Some(config);
        self
    }

    pub fn with_safety_settings(mut self, settings: Vec<SafetySetting>) -> Self {
        self.safety_settings = Some(settings);
        self
    }

    /// Text of the first part of the first content block
    pub fn prompt_text(&self) -> Option<&str> {
        self.contents
            .first()
            .and_then(|c| c.parts.first())
            .and_then(|p| p.text.as_deref())
    }
}

/// Content block containing role and parts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeminiContent {
    /// Role: "user" or "model"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// Content parts
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl GeminiContent {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Some("user".to_string()),
            parts: vec![Part::text(text)],
        }
    }
}

/// A part of the content
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
        }
    }
}

/// Generation configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// Temperature (0.0 - 2.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Top P (0.0 - 1.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Top K
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<i32>,

    /// Maximum output tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<i32>,
}

/// Safety setting
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SafetySetting {
    /// Harm category
    pub category: String,

    /// Block threshold
    pub threshold: String,
}

impl SafetySetting {
    pub fn new(category: &str, threshold: &str) -> Self {
        Self {
            category: category.to_string(),
            threshold: threshold.to_string(),
        }
    }
}

// ============================================================================
// Response Types
// ============================================================================

/// Gemini API response for generateContent
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GeminiResponse {
    /// Generated candidates (absent when the prompt itself was blocked)
    #[serde(default)]
    pub candidates: Vec<Candidate>,

    /// Feedback on the prompt, including block reasons
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_feedback: Option<PromptFeedback>,

    /// Usage metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_metadata: Option<UsageMetadata>,
}

impl GeminiResponse {
    /// Concatenated text of the first candidate
    pub fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }

    /// Why the response carries no usable text, if it was blocked
    pub fn block_reason(&self) -> Option<String> {
        if let Some(reason) = self
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.clone())
        {
            return Some(reason);
        }
        self.candidates
            .first()
            .and_then(|c| c.finish_reason.as_deref())
            .filter(|reason| finish_reason::BLOCKING.contains(reason))
            .map(str::to_string)
    }
}

/// A candidate response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    /// The generated content (may be absent for blocked candidates)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<GeminiContent>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub safety_ratings: Option<Vec<SafetyRating>>,
}

/// Safety rating
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafetyRating {
    pub category: String,
    pub probability: String,
}

/// Prompt feedback
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_reason: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub safety_ratings: Option<Vec<SafetyRating>>,
}

/// Usage metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: i32,

    #[serde(default)]
    pub candidates_token_count: i32,

    #[serde(default)]
    pub total_token_count: i32,
}

// ============================================================================
// Error Types
// ============================================================================

/// Gemini API error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiError {
    pub error: GeminiErrorDetail,
}

/// Gemini error detail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiErrorDetail {
    pub code: i32,

    pub message: String,

    /// Canonical status, e.g. `RESOURCE_EXHAUSTED`
    #[serde(default)]
    pub status: String,
}

// ============================================================================
// Constants
// ============================================================================

/// Supported Gemini models
pub mod models {
    pub const GEMINI_2_0_FLASH: &str = "gemini-2.0-flash";
    pub const GEMINI_2_0_FLASH_LITE: &str = "gemini-2.0-flash-lite";
    pub const GEMINI_1_5_FLASH: &str = "gemini-1.5-flash";
}

/// Harm categories
pub mod harm_category {
    pub const HARASSMENT: &str = "HARM_CATEGORY_HARASSMENT";
    pub const HATE_SPEECH: &str = "HARM_CATEGORY_HATE_SPEECH";
    pub const SEXUALLY_EXPLICIT: &str = "HARM_CATEGORY_SEXUALLY_EXPLICIT";
    pub const DANGEROUS_CONTENT: &str = "HARM_CATEGORY_DANGEROUS_CONTENT";
}

/// Block thresholds
pub mod block_threshold {
    pub const BLOCK_ONLY_HIGH: &str = "BLOCK_ONLY_HIGH";
    pub const BLOCK_MEDIUM_AND_ABOVE: &str = "BLOCK_MEDIUM_AND_ABOVE";
}

/// Finish reasons
pub mod finish_reason {
    pub const STOP: &str = "STOP";
    pub const MAX_TOKENS: &str = "MAX_TOKENS";
    pub const SAFETY: &str = "SAFETY";
    pub const RECITATION: &str = "RECITATION";
    pub const BLOCKLIST: &str = "BLOCKLIST";
    pub const PROHIBITED_CONTENT: &str = "PROHIBITED_CONTENT";

    /// Finish reasons that mean the output was withheld
    pub const BLOCKING: &[&str] = &[SAFETY, RECITATION, BLOCKLIST, PROHIBITED_CONTENT];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serializes_camel_case() {
        let request = GeminiRequest::from_prompt("hello")
            .with_generation_config(GenerationConfig {
                temperature: Some(0.8),
                top_k: Some(40),
                max_output_tokens: Some(1024),
                ..Default::default()
            })
            .with_safety_settings(vec![SafetySetting::new(
                harm_category::HARASSMENT,
                block_threshold::BLOCK_ONLY_HIGH,
            )]);

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(json["generationConfig"]["topK"], 40);
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 1024);
        assert!(json["generationConfig"].get("topP").is_none());
        assert_eq!(json["safetySettings"][0]["threshold"], "BLOCK_ONLY_HIGH");
    }

    #[test]
    fn test_response_text_joins_parts() {
        let response: GeminiResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "You enter "}, {"text": "the cave."}]},
                "finishReason": "STOP"
            }]
        }))
        .unwrap();
        assert_eq!(response.text(), "You enter the cave.");
        assert_eq!(response.block_reason(), None);
    }

    #[test]
    fn test_prompt_block_reason() {
        let response: GeminiResponse = serde_json::from_value(serde_json::json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        }))
        .unwrap();
        assert!(response.candidates.is_empty());
        assert_eq!(response.text(), "");
        assert_eq!(response.block_reason().as_deref(), Some("SAFETY"));
    }

    #[test]
    fn test_candidate_block_reason() {
        let response: GeminiResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{"finishReason": "SAFETY"}]
        }))
        .unwrap();
        assert_eq!(response.block_reason().as_deref(), Some("SAFETY"));
    }

    #[test]
    fn test_error_body_parsing() {
        let err: GeminiError = serde_json::from_str(
            r#"{"error":{"code":429,"message":"Resource has been exhausted (e.g. check quota).","status":"RESOURCE_EXHAUSTED"}}"#,
        )
        .unwrap();
        assert_eq!(err.error.code, 429);
        assert_eq!(err.error.status, "RESOURCE_EXHAUSTED");
    }
}
