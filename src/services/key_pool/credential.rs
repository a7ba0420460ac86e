//! Provider API key types
//!
//! A pool slot is one Gemini API key loaded at startup. Slots are numbered from 1
//! in load order and keep their number for the lifetime of the process.

use std::fmt;

use crate::utils::truncate_str;

// ============================================================================
// Key Configuration
// ============================================================================

/// A named API key as read from configuration (e.g. `GEMINI_API_KEY_3`)
#[derive(Clone, PartialEq, Eq)]
pub struct KeyConfig {
    /// Configuration name the key was read from
    pub name: String,
    /// The API key itself
    pub secret: String,
}

impl KeyConfig {
    pub fn new(name: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for KeyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyConfig")
            .field("name", &self.name)
            .field("secret", &redact(&self.secret))
            .finish()
    }
}

// ============================================================================
// Pool Slot
// ============================================================================

/// One API key held by the pool together with its exhaustion flag
#[derive(Clone)]
pub(crate) struct Credential {
    pub(crate) slot: usize,
    pub(crate) name: String,
    pub(crate) secret: String,
    pub(crate) exhausted: bool,
}

impl Credential {
    pub(crate) fn new(slot: usize, config: KeyConfig) -> Self {
        Self {
            slot,
            name: config.name,
            secret: config.secret,
            exhausted: false,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("slot", &self.slot)
            .field("name", &self.name)
            .field("secret", &redact(&self.secret))
            .field("exhausted", &self.exhausted)
            .finish()
    }
}

// ============================================================================
// Leased Key
// ============================================================================

/// A key handed out for a single provider call
#[derive(Clone, PartialEq, Eq)]
pub struct LeasedKey {
    slot: usize,
    secret: String,
}

impl LeasedKey {
    pub(crate) fn new(slot: usize, secret: impl Into<String>) -> Self {
        Self {
            slot,
            secret: secret.into(),
        }
    }

    /// 1-based slot this key occupies in the pool
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// The key material, to be sent to the provider
    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for LeasedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeasedKey")
            .field("slot", &self.slot)
            .field("secret", &redact(&self.secret))
            .finish()
    }
}

/// Shorten key material so it can appear in logs and debug output
pub fn redact(secret: &str) -> String {
    if secret.chars().count() > 8 {
        format!("{}...", truncate_str(secret, 4))
    } else {
        "***".to_string()
    }
}
