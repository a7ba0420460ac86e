//! Services module
//!
//! Contains business logic and external service integrations.

pub mod content_filter;
pub mod gemini;
pub mod image;
pub mod key_pool;
pub mod notifier;
pub mod storyteller;

pub use content_filter::ContentFilter;
pub use gemini::{GeminiClient, GeminiConfig, NarrativeProvider, ProviderError};
pub use image::{HordeClient, HordeConfig, ImageError};
pub use key_pool::{KeyConfig, KeyPool, LowKeyNotice, LowKeyThreshold};
pub use notifier::{Notification, NotificationSender, NotifyError, WebhookNotifier};
pub use storyteller::{GenerationRequest, StoryError, Storyteller, StorytellerConfig};
