//! Application state container
//!
//! This module defines the shared application state that is passed
//! to all request handlers via Axum's state extraction.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::Settings;
use crate::middleware::AdminAuth;
use crate::services::{
    ContentFilter, GeminiClient, GeminiConfig, HordeClient, HordeConfig, KeyPool, LowKeyNotice,
    NarrativeProvider, NotificationSender, Storyteller, StorytellerConfig, WebhookNotifier,
};

/// Shared application state
///
/// Cheap to clone; the key pool and every service inside are shared.
#[derive(Clone)]
pub struct AppState {
    /// Application settings
    pub settings: Arc<Settings>,

    /// Generation orchestrator and the key pool it rotates through
    pub storyteller: Storyteller,

    pub content_filter: Arc<ContentFilter>,

    pub images: Arc<HordeClient>,

    /// Operator notification channel, if configured
    pub notifier: Option<Arc<dyn NotificationSender>>,

    pub admin_auth: AdminAuth,

    /// Application start time (for uptime calculation)
    pub start_time: Instant,
}

impl AppState {
    /// Create the application state with the real Gemini and webhook clients
    pub fn new(settings: Settings) -> anyhow::Result<Self> {
        let mut gemini_config = GeminiConfig::new(settings.generation.model.clone())
            .with_timeout(settings.generation.attempt_timeout_seconds + 5);
        if let Some(base_url) = &settings.generation.base_url {
            gemini_config = gemini_config.with_base_url(base_url.clone());
        }
        let provider: Arc<dyn NarrativeProvider> = Arc::new(GeminiClient::new(gemini_config)?);

        let notifier: Option<Arc<dyn NotificationSender>> = match &settings.notify.webhook_url {
            Some(url) => {
                tracing::debug!(url = %url, "Creating webhook notifier");
                Some(Arc::new(WebhookNotifier::new(
                    url.clone(),
                    settings.notify.recipient.clone(),
                )?))
            }
            None => {
                tracing::warn!("NOTIFY_WEBHOOK_URL not set; low-key notices will only be logged");
                None
            }
        };

        Self::from_parts(settings, provider, notifier)
    }

    /// Assemble the state around an existing provider and notifier
    pub fn from_parts(
        settings: Settings,
        provider: Arc<dyn NarrativeProvider>,
        notifier: Option<Arc<dyn NotificationSender>>,
    ) -> anyhow::Result<Self> {
        let notice = LowKeyNotice::new(settings.notify.low_key_threshold, notifier.clone());
        let pool = KeyPool::new(settings.gemini_keys.clone(), notice);

        let storyteller = Storyteller::new(
            pool,
            provider,
            StorytellerConfig {
                attempt_timeout: Duration::from_secs(settings.generation.attempt_timeout_seconds),
                rotation_delay: Duration::from_millis(settings.generation.rotation_delay_ms),
                diagnostic_probe: settings.generation.diagnostic_probe,
            },
        );

        let content_filter = Arc::new(ContentFilter::new(&settings.prohibited_terms)?);
        tracing::debug!(terms = content_filter.term_count(), "Content filter ready");

        let images = Arc::new(HordeClient::new(HordeConfig {
            base_url: settings.image.base_url.clone(),
            api_key: settings.image.api_key.clone(),
            ..HordeConfig::default()
        })?);

        let admin_auth = AdminAuth::new(settings.admin_api_key.clone());

        tracing::info!(
            keys = storyteller.pool().total_count(),
            admin_routes = admin_auth.is_enabled(),
            notifications = notifier.is_some(),
            "Application state initialized"
        );

        Ok(Self {
            settings: Arc::new(settings),
            storyteller,
            content_filter,
            images,
            notifier,
            admin_auth,
            start_time: Instant::now(),
        })
    }

    /// Get the application uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn pool(&self) -> &KeyPool {
        self.storyteller.pool()
    }
}
