//! QuestGPT game server library
//!
//! Story narration through Gemini with API key rotation, prohibited-language
//! screening, and Stable Horde illustrations.

// Public modules
pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod middleware;
pub mod schemas;
pub mod server;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use config::Settings;
pub use error::ApiError;
pub use server::App;
