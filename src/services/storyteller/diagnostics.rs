//! Key diagnostics
//!
//! Trivial provider calls used by operators to check keys, plus the probe
//! that runs after a generation gives up.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use super::classify::{classify, AttemptError, FailureKind};
use super::prompt::story_safety_settings;
use crate::schemas::gemini::GeminiRequest;
use crate::services::gemini::{NarrativeProvider, ProviderError};
use crate::services::key_pool::{redact, LeasedKey};
use crate::utils::{preview, with_timeout};

pub const VALIDATION_PROMPT: &str = "Say hello";
pub const PROBE_PROMPT: &str = "Say 'test successful' if you can see this message.";
pub const DEFAULT_TEST_PROMPT: &str = "Respond with a short hello message";

/// Result of a trivial call made with one configured key
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct KeyValidation {
    pub key_number: usize,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of testing an arbitrary key with a caller-supplied prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyTestOutcome {
    Success(String),
    /// The prompt was refused; the key itself worked
    SafetyBlocked,
    Failed { error: String, details: String },
}

async fn call_once(
    provider: &dyn NarrativeProvider,
    api_key: &str,
    request: &GeminiRequest,
    timeout: Duration,
) -> Result<String, AttemptError> {
    with_timeout(timeout, provider.generate_text(api_key, request))
        .await
        .map_err(|e| AttemptError::from(e.flatten(ProviderError::Timeout)))
}

pub(crate) async fn validate_key(
    provider: &dyn NarrativeProvider,
    key: &LeasedKey,
    timeout: Duration,
) -> KeyValidation {
    tracing::info!(slot = key.slot(), "Testing Gemini API key");
    let request = GeminiRequest::from_prompt(VALIDATION_PROMPT);
    match call_once(provider, key.secret(), &request, timeout).await {
        Ok(_) => KeyValidation {
            key_number: key.slot(),
            valid: true,
            error: None,
        },
        Err(e) => {
            tracing::warn!(slot = key.slot(), error = %e, "Gemini API key failed validation");
            KeyValidation {
                key_number: key.slot(),
                valid: false,
                error: Some(e.to_string()),
            }
        }
    }
}

pub(crate) async fn test_key(
    provider: &dyn NarrativeProvider,
    api_key: &str,
    prompt: &str,
    timeout: Duration,
) -> KeyTestOutcome {
    tracing::info!(key = %redact(api_key), prompt = %preview(prompt, 50), "Testing Gemini API key");
    let request = GeminiRequest::from_prompt(prompt).with_safety_settings(story_safety_settings());
    match call_once(provider, api_key, &request, timeout).await {
        Ok(text) => KeyTestOutcome::Success(text),
        Err(e) => match classify(&e) {
            FailureKind::SafetyBlock => {
                tracing::warn!(error = %e, "Key test blocked by safety filters");
                KeyTestOutcome::SafetyBlocked
            }
            _ => {
                tracing::warn!(error = %e, "Key test failed");
                KeyTestOutcome::Failed {
                    error: e.to_string(),
                    details: format!("{e:?}"),
                }
            }
        },
    }
}

/// Fire a one-off probe with the first configured key and log the outcome
pub(crate) fn spawn_probe(provider: Arc<dyn NarrativeProvider>, key: LeasedKey, timeout: Duration) {
    tokio::spawn(async move {
        tracing::info!(slot = key.slot(), "Attempting direct test of Gemini API");
        let request = GeminiRequest::from_prompt(PROBE_PROMPT);
        match call_once(provider.as_ref(), key.secret(), &request, timeout).await {
            Ok(text) => tracing::info!(result = %preview(&text, 100), "Direct test result"),
            Err(e) => tracing::error!(error = %e, "Direct test failed"),
        }
    });
}
