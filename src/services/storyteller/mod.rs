//! Storyteller Module
//!
//! Turns a player command into narrative text. Each attempt leases the
//! active key from the pool, calls the provider, and is reduced to an
//! [`AttemptOutcome`]: success ends the turn, a safety block ends it with a
//! deflection, a key failure rotates and retries, anything else abandons
//! with an apology. Provider failures never surface as errors; only an empty
//! key pool does.

mod classify;
mod diagnostics;
mod prompt;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::schemas::gemini::GeminiRequest;
use crate::services::gemini::{NarrativeProvider, ProviderError};
use crate::services::key_pool::{KeyPool, LeasedKey, PoolError};
use crate::utils::{preview, with_timeout, DEFAULT_ATTEMPT_TIMEOUT};

pub use classify::{classify, is_safety_message, AttemptError, FailureKind};
pub use diagnostics::{KeyTestOutcome, KeyValidation, DEFAULT_TEST_PROMPT};
pub use prompt::{build_story_request, render_prompt};

// ============================================================================
// Fixed Responses
// ============================================================================

pub const SAFETY_DEFLECTION: &str = "I notice the conversation is heading in a direction that might not be appropriate. Could you please rephrase your request with more family-friendly language? I'm here to help create a fun adventure story we can both enjoy!";

const APOLOGY_PREFIX: &str = "Sorry, I'm having trouble continuing our adventure right now. Would you mind trying a different approach or wording? ";
const APOLOGY_AT_CAPACITY: &str = "Our storytellers are currently at capacity. Please try again later.";
const APOLOGY_TRY_AGAIN: &str = "I'm excited to see where your adventure goes next!";

pub const SERVICE_UNAVAILABLE: &str =
    "I apologize, but our storytelling services are currently unavailable. Please try again later.";

/// Apology shown when a turn is abandoned
pub fn apology(keys_available: bool) -> String {
    let tail = if keys_available {
        APOLOGY_TRY_AGAIN
    } else {
        APOLOGY_AT_CAPACITY
    };
    format!("{APOLOGY_PREFIX}{tail}")
}

// ============================================================================
// Types
// ============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoryError {
    #[error(transparent)]
    Pool(#[from] PoolError),
}

/// One player turn
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub command: String,
    /// Pre-joined transcript of recent turns
    pub context: Option<String>,
    pub genre: Option<String>,
}

impl GenerationRequest {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Default::default()
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = Some(genre.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct StorytellerConfig {
    /// Upper bound on a single provider call
    pub attempt_timeout: Duration,
    /// Pause between rotating to a new key and retrying
    pub rotation_delay: Duration,
    /// Run a one-off provider probe after a turn is abandoned
    pub diagnostic_probe: bool,
}

impl Default for StorytellerConfig {
    fn default() -> Self {
        Self {
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            rotation_delay: Duration::from_millis(500),
            diagnostic_probe: true,
        }
    }
}

/// What a single attempt means for the turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success(String),
    SafetyBlocked,
    /// The active key is spent; mark it and try the next one
    Rotate,
    Abandon,
}

/// Reduce an attempt result to the next step of the turn
pub fn evaluate_attempt(result: &Result<String, AttemptError>) -> AttemptOutcome {
    match result {
        Ok(text) if !text.trim().is_empty() => AttemptOutcome::Success(text.clone()),
        Ok(_) => AttemptOutcome::Abandon,
        Err(e) => match classify(e) {
            FailureKind::SafetyBlock => AttemptOutcome::SafetyBlocked,
            FailureKind::KeyExhausted => AttemptOutcome::Rotate,
            FailureKind::Other => AttemptOutcome::Abandon,
        },
    }
}

// ============================================================================
// Storyteller
// ============================================================================

/// Generation orchestrator over a shared key pool
#[derive(Clone)]
pub struct Storyteller {
    pool: KeyPool,
    provider: Arc<dyn NarrativeProvider>,
    config: StorytellerConfig,
}

impl Storyteller {
    pub fn new(pool: KeyPool, provider: Arc<dyn NarrativeProvider>, config: StorytellerConfig) -> Self {
        Self {
            pool,
            provider,
            config,
        }
    }

    pub fn pool(&self) -> &KeyPool {
        &self.pool
    }

    /// Generate the narrative for one turn
    ///
    /// Makes at most one attempt per configured key plus one, so a reset
    /// triggered mid-turn still gets a try.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<String, StoryError> {
        let provider_request = build_story_request(
            &request.command,
            request.context.as_deref(),
            request.genre.as_deref(),
        );
        let max_attempts = self.pool.total_count() + 1;

        tracing::debug!(
            prompt_chars = provider_request.prompt_text().map_or(0, str::len),
            command = %preview(&request.command, 100),
            "Built story prompt"
        );

        for attempt in 1..=max_attempts {
            let key = self.pool.lease_active()?;
            let result = self.attempt(&key, &provider_request, cancel).await;

            match evaluate_attempt(&result) {
                AttemptOutcome::Success(text) => {
                    tracing::info!(slot = key.slot(), attempt, "Generated story response");
                    return Ok(text);
                }
                AttemptOutcome::SafetyBlocked => {
                    tracing::warn!(slot = key.slot(), "Content was blocked by safety filters");
                    return Ok(SAFETY_DEFLECTION.to_string());
                }
                AttemptOutcome::Rotate => {
                    tracing::warn!(
                        slot = key.slot(),
                        attempt,
                        error = %describe(&result),
                        "Key exhausted or invalid, rotating to next key"
                    );
                    self.pool.mark_exhausted(key.slot());

                    if attempt == max_attempts {
                        break;
                    }
                    if !self.pause(cancel).await {
                        return Ok(apology(self.pool.available_count() > 0));
                    }
                    tracing::info!(slot = self.pool.current_slot(), "Retrying with next key");
                }
                AttemptOutcome::Abandon => {
                    tracing::error!(
                        slot = key.slot(),
                        attempt,
                        error = %describe(&result),
                        "Story generation failed"
                    );
                    if self.config.diagnostic_probe && !cancel.is_cancelled() {
                        self.spawn_probe();
                    }
                    return Ok(apology(self.pool.available_count() > 0));
                }
            }
        }

        tracing::error!(max_attempts, "Attempt budget exhausted without a response");
        Ok(SERVICE_UNAVAILABLE.to_string())
    }

    async fn attempt(
        &self,
        key: &LeasedKey,
        request: &GeminiRequest,
        cancel: &CancellationToken,
    ) -> Result<String, AttemptError> {
        let call = with_timeout(
            self.config.attempt_timeout,
            self.provider.generate_text(key.secret(), request),
        );

        tokio::select! {
            _ = cancel.cancelled() => Err(AttemptError::Cancelled),
            result = call => {
                let text = result.map_err(|e| e.flatten(ProviderError::Timeout))?;
                if text.trim().is_empty() {
                    Err(AttemptError::EmptyResponse)
                } else {
                    Ok(text)
                }
            }
        }
    }

    /// Pacing delay before the next key; false if the caller went away
    async fn pause(&self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(self.config.rotation_delay) => true,
        }
    }

    fn spawn_probe(&self) {
        if let Some(first) = self.pool.key_snapshot().into_iter().next() {
            diagnostics::spawn_probe(self.provider.clone(), first, self.config.attempt_timeout);
        }
    }

    /// Make a trivial call with every configured key, in slot order
    pub async fn validate_keys(&self) -> Vec<KeyValidation> {
        let mut results = Vec::new();
        for key in self.pool.key_snapshot() {
            results.push(
                diagnostics::validate_key(self.provider.as_ref(), &key, self.config.attempt_timeout)
                    .await,
            );
        }
        results
    }

    /// Try an arbitrary key outside the pool
    pub async fn test_key(&self, api_key: &str, prompt: &str) -> KeyTestOutcome {
        diagnostics::test_key(self.provider.as_ref(), api_key, prompt, self.config.attempt_timeout)
            .await
    }
}

fn describe(result: &Result<String, AttemptError>) -> String {
    match result {
        Ok(_) => AttemptError::EmptyResponse.to_string(),
        Err(e) => e.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================
