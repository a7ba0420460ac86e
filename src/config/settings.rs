//! Application settings and configuration
//!
//! Settings come from environment variables (and a `.env` file when present)
//! with defaults suitable for local development.

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;

use crate::schemas::gemini::models;
use crate::services::image::{ANONYMOUS_API_KEY, HORDE_API_BASE};
use crate::services::key_pool::{KeyConfig, LowKeyThreshold};
use crate::services::content_filter::DEFAULT_PROHIBITED_TERMS;

/// Highest `GEMINI_API_KEY_{n}` slot read at startup
pub const MAX_KEY_SLOTS: usize = 5;

/// Application environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[value(alias = "dev")]
    Development,
    #[value(alias = "stage")]
    Staging,
    #[value(alias = "prod")]
    Production,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Staging => write!(f, "staging"),
            Environment::Production => write!(f, "production"),
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Environment::Development
    }
}

impl std::str::FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "staging" | "stage" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            _ => anyhow::bail!("Invalid environment: {}. Expected: development, staging, or production", s),
        }
    }
}

/// Story generation settings
#[derive(Debug, Clone, Serialize)]
pub struct GenerationSettings {
    pub model: String,
    pub base_url: Option<String>,
    /// Bound on a single provider attempt
    pub attempt_timeout_seconds: u64,
    /// Pause before retrying with a rotated key
    pub rotation_delay_ms: u64,
    pub diagnostic_probe: bool,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: models::GEMINI_2_0_FLASH.to_string(),
            base_url: None,
            attempt_timeout_seconds: 30,
            rotation_delay_ms: 500,
            diagnostic_probe: true,
        }
    }
}

/// Operator notification settings
#[derive(Debug, Clone, Default, Serialize)]
pub struct NotifySettings {
    pub webhook_url: Option<String>,
    pub recipient: Option<String>,
    #[serde(skip)]
    pub low_key_threshold: LowKeyThreshold,
}

/// Image generation settings
#[derive(Debug, Clone, Serialize)]
pub struct ImageSettings {
    pub base_url: String,
    #[serde(skip_serializing)]
    pub api_key: String,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            base_url: HORDE_API_BASE.to_string(),
            api_key: ANONYMOUS_API_KEY.to_string(),
        }
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize)]
pub struct Settings {
    // App settings
    pub app_name: String,
    pub app_version: String,
    pub environment: Environment,
    pub log_level: String,

    // Server settings
    pub host: String,
    pub port: u16,

    // Gemini keys, in slot order
    #[serde(skip)]
    pub gemini_keys: Vec<KeyConfig>,

    pub generation: GenerationSettings,

    pub notify: NotifySettings,

    /// Guards the operator routes; they are closed when unset
    #[serde(skip_serializing)]
    pub admin_api_key: Option<String>,

    pub image: ImageSettings,

    pub prohibited_terms: Vec<String>,
}

impl Settings {
    /// Load settings from environment variables with defaults
    pub fn load() -> Result<Self> {
        // Load .env file if it exists (ignored in production typically)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let or_default = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());
        let defaults = Self::default();

        let gemini_keys = (1..=MAX_KEY_SLOTS)
            .filter_map(|slot| {
                let name = format!("GEMINI_API_KEY_{slot}");
                var(&name).map(|secret| KeyConfig::new(name, secret))
            })
            .collect();

        let settings = Self {
            app_name: or_default("APP_NAME", &defaults.app_name),
            app_version: defaults.app_version,
            environment: or_default("ENVIRONMENT", "development")
                .parse()
                .unwrap_or_default(),
            log_level: or_default("LOG_LEVEL", "info"),

            host: or_default("HOST", &defaults.host),
            port: or_default("PORT", "3000")
                .parse()
                .context("Invalid PORT value")?,

            gemini_keys,

            generation: GenerationSettings {
                model: or_default("GEMINI_MODEL", &defaults.generation.model),
                base_url: var("GEMINI_BASE_URL"),
                attempt_timeout_seconds: or_default("PROVIDER_TIMEOUT_SECS", "30")
                    .parse()
                    .context("Invalid PROVIDER_TIMEOUT_SECS value")?,
                rotation_delay_ms: or_default("ROTATION_DELAY_MS", "500")
                    .parse()
                    .context("Invalid ROTATION_DELAY_MS value")?,
                diagnostic_probe: or_default("DIAGNOSTIC_PROBE", "true")
                    .parse()
                    .unwrap_or(true),
            },

            notify: NotifySettings {
                webhook_url: var("NOTIFY_WEBHOOK_URL"),
                recipient: var("NOTIFY_RECIPIENT"),
                low_key_threshold: match var("LOW_KEY_THRESHOLD") {
                    Some(raw) => raw.parse().context("Invalid LOW_KEY_THRESHOLD value")?,
                    None => LowKeyThreshold::default(),
                },
            },

            admin_api_key: var("ADMIN_API_KEY"),

            image: ImageSettings {
                base_url: or_default("HORDE_BASE_URL", HORDE_API_BASE),
                api_key: or_default("HORDE_API_KEY", ANONYMOUS_API_KEY),
            },

            prohibited_terms: match var("PROHIBITED_TERMS") {
                Some(raw) => raw
                    .split(',')
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect(),
                None => defaults.prohibited_terms,
            },
        };

        settings.validate()?;

        Ok(settings)
    }

    /// Validate settings
    fn validate(&self) -> Result<()> {
        if self.port == 0 {
            anyhow::bail!("Port cannot be 0");
        }

        if self.generation.attempt_timeout_seconds == 0 {
            anyhow::bail!("PROVIDER_TIMEOUT_SECS must be > 0");
        }

        if self.gemini_keys.is_empty() {
            tracing::warn!("No GEMINI_API_KEY_1..{} variables set; story generation will fail", MAX_KEY_SLOTS);
        }

        if self.environment == Environment::Production && self.admin_api_key.is_none() {
            tracing::warn!("Running in production without ADMIN_API_KEY; admin routes are disabled");
        }

        Ok(())
    }

    /// Get the server address string
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_name: "questgpt-server".to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            environment: Environment::Development,
            log_level: "info".to_string(),
            host: "0.0.0.0".to_string(),
            port: 3000,
            gemini_keys: Vec::new(),
            generation: GenerationSettings::default(),
            notify: NotifySettings::default(),
            admin_api_key: None,
            image: ImageSettings::default(),
            prohibited_terms: DEFAULT_PROHIBITED_TERMS.iter().map(|t| t.to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_vars(vars: &[(&str, &str)]) -> Result<Settings> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.app_name, "questgpt-server");
        assert_eq!(settings.port, 3000);
        assert!(settings.gemini_keys.is_empty());
        assert_eq!(settings.image.api_key, "0000000000");
        assert_eq!(settings.prohibited_terms.len(), 8);
    }

    #[test]
    fn test_environment_parsing() {
        assert_eq!("development".parse::<Environment>().unwrap(), Environment::Development);
        assert_eq!("dev".parse::<Environment>().unwrap(), Environment::Development);
        assert_eq!("production".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!("prod".parse::<Environment>().unwrap(), Environment::Production);
        assert!("moon".parse::<Environment>().is_err());
    }

    #[test]
    fn test_keys_load_in_slot_order_skipping_gaps() {
        let settings = from_vars(&[
            ("GEMINI_API_KEY_4", "fourth"),
            ("GEMINI_API_KEY_1", "first"),
            ("GEMINI_API_KEY_2", "   "),
            ("GEMINI_API_KEY_6", "ignored"),
        ])
        .unwrap();

        let names: Vec<&str> = settings.gemini_keys.iter().map(|k| k.name.as_str()).collect();
        assert_eq!(names, vec!["GEMINI_API_KEY_1", "GEMINI_API_KEY_4"]);
        assert_eq!(settings.gemini_keys[1].secret, "fourth");
    }

    #[test]
    fn test_overrides() {
        let settings = from_vars(&[
            ("PORT", "8080"),
            ("ENVIRONMENT", "prod"),
            ("LOW_KEY_THRESHOLD", "30%"),
            ("ROTATION_DELAY_MS", "10"),
            ("PROHIBITED_TERMS", "foo, bar,,"),
            ("ADMIN_API_KEY", "sekret"),
        ])
        .unwrap();

        assert_eq!(settings.server_addr(), "0.0.0.0:8080");
        assert_eq!(settings.environment, Environment::Production);
        assert_eq!(settings.notify.low_key_threshold, LowKeyThreshold::Fraction(0.3));
        assert_eq!(settings.generation.rotation_delay_ms, 10);
        assert_eq!(settings.prohibited_terms, vec!["foo", "bar"]);
        assert_eq!(settings.admin_api_key.as_deref(), Some("sekret"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(from_vars(&[("PORT", "not-a-port")]).is_err());
        assert!(from_vars(&[("PORT", "0")]).is_err());
        assert!(from_vars(&[("LOW_KEY_THRESHOLD", "150%")]).is_err());
        assert!(from_vars(&[("PROVIDER_TIMEOUT_SECS", "0")]).is_err());
    }

    #[test]
    fn test_serialized_settings_hide_secrets() {
        let settings = from_vars(&[
            ("GEMINI_API_KEY_1", "gemini-secret"),
            ("ADMIN_API_KEY", "admin-secret"),
            ("HORDE_API_KEY", "horde-secret"),
        ])
        .unwrap();

        let json = serde_json::to_string(&settings).unwrap();
        assert!(!json.contains("gemini-secret"));
        assert!(!json.contains("admin-secret"));
        assert!(!json.contains("horde-secret"));
    }
}
