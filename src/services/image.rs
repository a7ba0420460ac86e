//! Stable Horde image generation
//!
//! Submits an async job, polls until the job reports done, then fetches the
//! first generated image. Horde is a volunteer queue, so polling backs off
//! gradually and slows further when the queue is long.

use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::schemas::horde::{
    HordeCheckResponse, HordeGenerationRequest, HordeParams, HordeStatusResponse,
    HordeSubmitResponse,
};
use crate::utils::preview;

pub const HORDE_API_BASE: &str = "https://stablehorde.net/api/v2";
pub const ANONYMOUS_API_KEY: &str = "0000000000";

const PROMPT_SUFFIX: &str = ", cinematic lighting, detailed, realistic";
const NEGATIVE_PROMPT: &str = "(text), (writing), (letters), (numbers), (words), (font), (type), (typography), watermark, caption, label, signature, logo, (worst quality), (low quality), (blurry), artifacts";

// ============================================================================
// Errors
// ============================================================================

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("Prompt is required")]
    EmptyPrompt,

    #[error("Rate limit hit - try again later")]
    RateLimited,

    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("Request failed: {body}")]
    Rejected { status: u16, body: String },

    #[error("No generation ID received")]
    MissingId,

    #[error("Failed to check status")]
    StatusCheckFailed,

    #[error("Generation timed out")]
    TimedOut,

    #[error("Failed to get result")]
    ResultFailed,

    #[error("No image generated")]
    NoImage,

    #[error("Failed to process result")]
    ResultUnreadable,

    #[error("Server error")]
    Transport(#[source] reqwest::Error),
}

impl ImageError {
    /// HTTP status the route should answer with
    pub fn status_code(&self) -> u16 {
        match self {
            Self::EmptyPrompt => 400,
            Self::RateLimited => 429,
            Self::InvalidApiKey => 401,
            Self::Rejected { status, .. } => *status,
            _ => 500,
        }
    }
}

// ============================================================================
// Poll Schedule
// ============================================================================

/// Timing of the check loop
#[derive(Debug, Clone)]
pub struct PollSchedule {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Multiplier applied to the delay after every wait
    pub growth: f64,
    /// Extra multiplier once the queue position passes `busy_queue`
    pub busy_growth: f64,
    pub busy_queue: i64,
    pub max_polls: u32,
    /// Extra pause after a 429 from the check endpoint
    pub rate_limit_wait: Duration,
    /// Consecutive 429s from the check endpoint before giving up
    pub max_rate_limited: u32,
    /// Extra pause after a transport failure
    pub error_wait: Duration,
    /// Pause between `done` and fetching the result
    pub settle: Duration,
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(6),
            max_delay: Duration::from_secs(15),
            growth: 1.2,
            busy_growth: 1.5,
            busy_queue: 50,
            max_polls: 30,
            rate_limit_wait: Duration::from_secs(15),
            max_rate_limited: 20,
            error_wait: Duration::from_secs(10),
            settle: Duration::from_secs(2),
        }
    }
}

impl PollSchedule {
    /// Wait before the next check, then grow the delay
    fn next_wait(&self, delay: &mut Duration) -> Duration {
        let wait = (*delay).min(self.max_delay);
        *delay = delay.mul_f64(self.growth);
        wait
    }

    fn slow_down(&self, delay: &mut Duration, queue_position: i64) {
        if queue_position > self.busy_queue {
            *delay = delay.mul_f64(self.busy_growth).min(self.max_delay);
        }
    }
}

// ============================================================================
// Client
// ============================================================================

/// Requested image
#[derive(Debug, Clone)]
pub struct ImageRequest {
    pub prompt: String,
    pub width: u32,
    pub height: u32,
}

/// Generated image and its seed
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedImage {
    pub image: String,
    pub seed: Value,
}

#[derive(Debug, Clone)]
pub struct HordeConfig {
    pub base_url: String,
    pub api_key: String,
    pub schedule: PollSchedule,
}

impl Default for HordeConfig {
    fn default() -> Self {
        Self {
            base_url: HORDE_API_BASE.to_string(),
            api_key: ANONYMOUS_API_KEY.to_string(),
            schedule: PollSchedule::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HordeClient {
    client: Client,
    base_url: String,
    api_key: String,
    schedule: PollSchedule,
}

impl HordeClient {
    pub fn new(config: HordeConfig) -> Result<Self, ImageError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(ImageError::Transport)?;

        if config.api_key == ANONYMOUS_API_KEY {
            tracing::warn!("Using anonymous Stable Horde key - expect rate limits");
        }

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
            schedule: config.schedule,
        })
    }

    fn job_request(request: &ImageRequest) -> HordeGenerationRequest {
        HordeGenerationRequest {
            prompt: format!("{}{}", request.prompt, PROMPT_SUFFIX),
            negative_prompt: Some(NEGATIVE_PROMPT.to_string()),
            params: HordeParams {
                width: request.width,
                height: request.height,
                steps: 30,
                cfg_scale: 7.5,
                sampler_name: "k_euler_a".to_string(),
                n: 1,
            },
            nsfw: false,
            models: vec!["stable_diffusion".to_string()],
            r2: false,
        }
    }

    pub async fn generate(&self, request: &ImageRequest) -> Result<GeneratedImage, ImageError> {
        if request.prompt.trim().is_empty() {
            return Err(ImageError::EmptyPrompt);
        }

        tracing::info!(prompt = %preview(&request.prompt, 100), "Generating image");

        let id = self.submit(request).await?;
        tracing::info!(id = %id, "Image generation started");

        self.wait_until_done(&id).await?;
        tokio::time::sleep(self.schedule.settle).await;
        self.fetch_result(&id).await
    }

    async fn submit(&self, request: &ImageRequest) -> Result<String, ImageError> {
        let resp = self
            .client
            .post(format!("{}/generate/async", self.base_url))
            .header("apikey", &self.api_key)
            .json(&Self::job_request(request))
            .send()
            .await
            .map_err(ImageError::Transport)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), error = %body, "Failed to submit image job");
            return Err(match status {
                StatusCode::TOO_MANY_REQUESTS => ImageError::RateLimited,
                StatusCode::UNAUTHORIZED => ImageError::InvalidApiKey,
                _ => ImageError::Rejected {
                    status: status.as_u16(),
                    body,
                },
            });
        }

        let submitted: HordeSubmitResponse = resp.json().await.map_err(ImageError::Transport)?;
        submitted
            .id
            .filter(|id| !id.is_empty())
            .ok_or(ImageError::MissingId)
    }

    async fn wait_until_done(&self, id: &str) -> Result<(), ImageError> {
        let schedule = &self.schedule;
        let url = format!("{}/generate/check/{}", self.base_url, id);
        let mut delay = schedule.initial_delay;
        let mut polls = 0;
        let mut rate_limited = 0;

        while polls < schedule.max_polls {
            tokio::time::sleep(schedule.next_wait(&mut delay)).await;

            let resp = match self.client.get(&url).header("apikey", &self.api_key).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    tracing::error!(error = %e, "Image status poll failed");
                    tokio::time::sleep(schedule.error_wait).await;
                    polls += 1;
                    continue;
                }
            };

            let status = resp.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                rate_limited += 1;
                if rate_limited >= schedule.max_rate_limited {
                    tracing::error!(rate_limited, "Image status check stayed rate limited");
                    return Err(ImageError::RateLimited);
                }
                tracing::info!(rate_limited, "Image status check rate limited, waiting");
                tokio::time::sleep(schedule.rate_limit_wait).await;
                continue;
            }
            rate_limited = 0;

            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                tracing::error!(status = status.as_u16(), error = %body, "Image status check failed");
                polls += 1;
                if polls == schedule.max_polls {
                    return Err(ImageError::StatusCheckFailed);
                }
                continue;
            }

            let check: HordeCheckResponse = match resp.json().await {
                Ok(check) => check,
                Err(e) => {
                    tracing::error!(error = %e, "Unreadable image status");
                    tokio::time::sleep(schedule.error_wait).await;
                    polls += 1;
                    continue;
                }
            };

            if check.done {
                tracing::info!(polls = polls + 1, "Image generation complete");
                return Ok(());
            }

            polls += 1;
            tracing::debug!(
                poll = polls,
                queue_position = check.queue_position,
                wait_time = check.wait_time,
                "Image still queued"
            );
            schedule.slow_down(&mut delay, check.queue_position);
        }

        tracing::error!(max_polls = schedule.max_polls, "Image generation timed out");
        Err(ImageError::TimedOut)
    }

    async fn fetch_result(&self, id: &str) -> Result<GeneratedImage, ImageError> {
        let resp = self
            .client
            .get(format!("{}/generate/status/{}", self.base_url, id))
            .header("apikey", &self.api_key)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Error getting image result");
                ImageError::ResultUnreadable
            })?;

        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::error!(error = %body, "Failed to get image result");
            return Err(ImageError::ResultFailed);
        }

        let status: HordeStatusResponse = resp.json().await.map_err(|e| {
            tracing::error!(error = %e, "Error reading image result");
            ImageError::ResultUnreadable
        })?;

        let generation = status.generations.into_iter().next();
        match generation {
            Some(g) => match g.img.filter(|img| !img.is_empty()) {
                Some(image) => Ok(GeneratedImage {
                    image,
                    seed: g.seed,
                }),
                None => Err(ImageError::NoImage),
            },
            None => Err(ImageError::NoImage),
        }
    }
}
