//! Low-key notice policy
//!
//! Decides when the pool is running low and remembers whether the operator
//! has already been told about it.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::services::notifier::{Notification, NotificationSender};

// ============================================================================
// Threshold
// ============================================================================

/// When the number of usable keys counts as "low"
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LowKeyThreshold {
    /// Low when at most this many keys remain usable
    Count(usize),
    /// Low when the usable share of all keys is at most this fraction
    Fraction(f64),
}

impl Default for LowKeyThreshold {
    fn default() -> Self {
        Self::Count(2)
    }
}

impl LowKeyThreshold {
    pub fn is_low(&self, available: usize, total: usize) -> bool {
        match *self {
            Self::Count(limit) => available <= limit,
            Self::Fraction(share) => (available as f64) <= share * total as f64,
        }
    }
}

impl FromStr for LowKeyThreshold {
    type Err = anyhow::Error;

    /// Accepts a plain count (`2`) or a percentage (`30%`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(percent) = s.strip_suffix('%') {
            let value: f64 = percent
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid low key percentage: {}", s))?;
            if !(0.0..=100.0).contains(&value) {
                anyhow::bail!("Low key percentage must be between 0% and 100%, got {}", s);
            }
            return Ok(Self::Fraction(value / 100.0));
        }
        let count = s
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid low key threshold: {}. Expected a count or a percentage", s))?;
        Ok(Self::Count(count))
    }
}

impl fmt::Display for LowKeyThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count(n) => write!(f, "<= {} keys", n),
            Self::Fraction(share) => write!(f, "<= {:.0}% of keys", share * 100.0),
        }
    }
}

// ============================================================================
// Notice State
// ============================================================================

/// Result of one low-key check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeOutcome {
    /// A notice already went out during this process lifetime
    AlreadySent,
    /// Enough keys remain
    AboveThreshold,
    /// Low, but there is nowhere to send the notice
    Unconfigured,
    /// Another check is delivering the notice right now
    InFlight,
    /// The notice was delivered just now
    Sent,
    /// Delivery failed; a later check will try again
    Failed,
}

/// One-shot alert state shared by every clone of a pool
pub struct LowKeyNotice {
    pub(crate) threshold: LowKeyThreshold,
    pub(crate) sender: Option<Arc<dyn NotificationSender>>,
    sent: AtomicBool,
    sending: AtomicBool,
    unconfigured_warned: AtomicBool,
}

impl LowKeyNotice {
    pub fn new(threshold: LowKeyThreshold, sender: Option<Arc<dyn NotificationSender>>) -> Self {
        Self {
            threshold,
            sender,
            sent: AtomicBool::new(false),
            sending: AtomicBool::new(false),
            unconfigured_warned: AtomicBool::new(false),
        }
    }

    /// A notice that never has anywhere to go
    pub fn disabled() -> Self {
        Self::new(LowKeyThreshold::default(), None)
    }

    pub fn was_sent(&self) -> bool {
        self.sent.load(Ordering::SeqCst)
    }

    pub(crate) fn mark_sent(&self) {
        self.sent.store(true, Ordering::SeqCst);
    }

    /// Claim the right to deliver; false while another delivery is pending
    pub(crate) fn begin_send(&self) -> bool {
        self.sending
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Release the delivery claim, recording success first
    pub(crate) fn finish_send(&self, delivered: bool) {
        if delivered {
            self.mark_sent();
        }
        self.sending.store(false, Ordering::SeqCst);
    }

    /// True only the first time it is called
    pub(crate) fn first_unconfigured_warning(&self) -> bool {
        !self.unconfigured_warned.swap(true, Ordering::SeqCst)
    }

    /// No sender and the operator has already been warned about it
    pub(crate) fn is_silenced(&self) -> bool {
        self.sender.is_none() && self.unconfigured_warned.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for LowKeyNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LowKeyNotice")
            .field("threshold", &self.threshold)
            .field("configured", &self.sender.is_some())
            .field("sent", &self.was_sent())
            .finish()
    }
}

/// Build the alert text for the current pool state
pub(crate) fn low_key_notification(available: usize, total: usize, exhausted: &[String]) -> Notification {
    let renew = if exhausted.is_empty() {
        "none yet".to_string()
    } else {
        exhausted.join(", ")
    };
    Notification::new(
        "QuestGPT: Running Low on API Keys",
        format!(
            "QuestGPT is running low on available Gemini API keys! Only {} of {} keys remaining.\n\n\
             The following keys need renewal: {}\n\n\
             Please update your API keys as soon as possible to ensure uninterrupted service.",
            available, total, renew
        ),
    )
}
