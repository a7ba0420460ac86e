//! Key Pool Implementation
//!
//! Holds the ordered list of API keys, the index of the active key, and the
//! low-key notice state. Selection is strictly sequential: the active key is
//! used until it is marked exhausted, then the next slot in circular order
//! takes over. When every key is exhausted the next lease resets them all,
//! on the assumption that provider quotas replenish over time.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;

use super::credential::{Credential, KeyConfig, LeasedKey};
use super::notice::{low_key_notification, LowKeyNotice, NoticeOutcome};

// ============================================================================
// Errors
// ============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("No API keys are configured")]
    NoCredentialsAvailable,
}

// ============================================================================
// Pool Status
// ============================================================================

/// Point-in-time view of the pool, safe to show to operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub total: usize,
    pub available: usize,
    /// 1-based slot of the active key, 0 when the pool is empty
    pub current_slot: usize,
}

// ============================================================================
// Key Pool
// ============================================================================

#[derive(Debug)]
struct PoolState {
    credentials: Vec<Credential>,
    active: usize,
}

impl PoolState {
    fn available(&self) -> usize {
        self.credentials.iter().filter(|c| !c.exhausted).count()
    }
}

#[derive(Debug)]
struct PoolInner {
    state: Mutex<PoolState>,
    notice: LowKeyNotice,
}

/// Shared pool of provider API keys
///
/// Cloning is cheap; all clones observe the same keys and flags. The state
/// lock is never held across an `.await`.
#[derive(Debug, Clone)]
pub struct KeyPool {
    inner: Arc<PoolInner>,
}

impl KeyPool {
    /// Create a pool from configured keys, numbering slots from 1 in order
    pub fn new(keys: Vec<KeyConfig>, notice: LowKeyNotice) -> Self {
        let credentials: Vec<Credential> = keys
            .into_iter()
            .enumerate()
            .map(|(idx, key)| Credential::new(idx + 1, key))
            .collect();

        if credentials.is_empty() {
            tracing::error!("No Gemini API keys configured; story generation will fail");
        } else {
            tracing::info!(
                key_count = credentials.len(),
                threshold = %notice.threshold,
                notifications = notice.sender.is_some(),
                "Loaded Gemini API keys"
            );
        }

        Self {
            inner: Arc::new(PoolInner {
                state: Mutex::new(PoolState {
                    credentials,
                    active: 0,
                }),
                notice,
            }),
        }
    }

    /// Create a pool that never sends low-key notices
    pub fn without_notice(keys: Vec<KeyConfig>) -> Self {
        Self::new(keys, LowKeyNotice::disabled())
    }

    fn state(&self) -> MutexGuard<'_, PoolState> {
        // Every mutation leaves the state consistent, so a poisoned lock is still usable
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// 1-based slot of the active key (0 when the pool is empty)
    pub fn current_slot(&self) -> usize {
        let state = self.state();
        state
            .credentials
            .get(state.active)
            .map(|c| c.slot)
            .unwrap_or(0)
    }

    pub fn total_count(&self) -> usize {
        self.state().credentials.len()
    }

    pub fn available_count(&self) -> usize {
        self.state().available()
    }

    pub fn status(&self) -> PoolStatus {
        let state = self.state();
        PoolStatus {
            total: state.credentials.len(),
            available: state.available(),
            current_slot: state
                .credentials
                .get(state.active)
                .map(|c| c.slot)
                .unwrap_or(0),
        }
    }

    /// Whether the low-key notice has gone out during this process lifetime
    pub fn notice_sent(&self) -> bool {
        self.inner.notice.was_sent()
    }

    /// Mark the key in `slot` exhausted after a call with it failed
    ///
    /// The active key only moves on when `slot` is still the active one, so
    /// concurrent turns that fail on the same key rotate past it once.
    /// Returns false when the slot is unknown or already exhausted.
    pub fn mark_exhausted(&self, slot: usize) -> bool {
        {
            let mut state = self.state();
            let Some(idx) = state.credentials.iter().position(|c| c.slot == slot) else {
                return false;
            };
            if state.credentials[idx].exhausted {
                tracing::debug!(slot, "API key already marked as exhausted");
                return false;
            }

            let total = state.credentials.len();
            state.credentials[idx].exhausted = true;
            if state.active == idx {
                state.active = (idx + 1) % total;
            }

            tracing::warn!(
                slot,
                active_slot = state.credentials[state.active].slot,
                available = state.available(),
                total,
                "Marked API key as exhausted"
            );
        }

        self.spawn_notice_check();
        true
    }

    /// Mark the active key exhausted and move on to the next slot
    ///
    /// Operator drill; does nothing on an empty pool.
    pub fn mark_active_exhausted(&self) {
        {
            let mut state = self.state();
            let total = state.credentials.len();
            if total == 0 {
                return;
            }

            let active = state.active;
            state.credentials[active].exhausted = true;
            let exhausted_slot = state.credentials[active].slot;
            state.active = (active + 1) % total;

            tracing::warn!(
                slot = exhausted_slot,
                next_slot = state.credentials[state.active].slot,
                available = state.available(),
                total,
                "Marked API key as exhausted, moving to next key"
            );
        }

        self.spawn_notice_check();
    }

    /// Hand out a usable key for the next provider call
    pub fn lease_active(&self) -> Result<LeasedKey, PoolError> {
        let leased = {
            let mut state = self.state();
            let total = state.credentials.len();
            if total == 0 {
                return Err(PoolError::NoCredentialsAvailable);
            }

            if state.credentials.iter().all(|c| c.exhausted) {
                for cred in state.credentials.iter_mut() {
                    cred.exhausted = false;
                }
                state.active = 0;
                tracing::warn!(total, "All API keys were exhausted, resetting every key to try again");
            }

            let start = state.active;
            let found = (0..total)
                .map(|offset| (start + offset) % total)
                .find(|&idx| !state.credentials[idx].exhausted);

            let Some(idx) = found else {
                return Err(PoolError::NoCredentialsAvailable);
            };

            state.active = idx;
            let cred = &state.credentials[idx];
            LeasedKey::new(cred.slot, cred.secret.clone())
        };

        self.spawn_notice_check();
        Ok(leased)
    }

    /// Slot and key material for every configured key, in slot order
    pub(crate) fn key_snapshot(&self) -> Vec<LeasedKey> {
        self.state()
            .credentials
            .iter()
            .map(|c| LeasedKey::new(c.slot, c.secret.clone()))
            .collect()
    }

    /// Run the low-key check in the background if a runtime is available
    fn spawn_notice_check(&self) {
        let notice = &self.inner.notice;
        if notice.was_sent() || notice.is_silenced() {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let pool = self.clone();
                handle.spawn(async move {
                    pool.check_low_keys().await;
                });
            }
            Err(_) => {
                tracing::debug!("No async runtime available, skipping low-key check");
            }
        }
    }

    /// Send the low-key notice if the pool is low and none has been sent yet
    ///
    /// Only one delivery is pending at a time. A failed delivery leaves the
    /// notice unsent so a later check retries.
    pub async fn check_low_keys(&self) -> NoticeOutcome {
        let notice = &self.inner.notice;
        if notice.was_sent() {
            return NoticeOutcome::AlreadySent;
        }

        let (available, total, exhausted) = {
            let state = self.state();
            let exhausted: Vec<String> = state
                .credentials
                .iter()
                .filter(|c| c.exhausted)
                .map(|c| c.name.clone())
                .collect();
            (state.available(), state.credentials.len(), exhausted)
        };

        if total == 0 || !notice.threshold.is_low(available, total) {
            return NoticeOutcome::AboveThreshold;
        }

        let Some(sender) = notice.sender.as_ref() else {
            if notice.first_unconfigured_warning() {
                tracing::warn!(
                    available,
                    total,
                    "Running low on API keys but no notification channel is configured"
                );
            } else {
                tracing::debug!(available, total, "Low on API keys, no notification channel");
            }
            return NoticeOutcome::Unconfigured;
        };

        if !notice.begin_send() {
            return NoticeOutcome::InFlight;
        }
        if notice.was_sent() {
            notice.finish_send(false);
            return NoticeOutcome::AlreadySent;
        }

        tracing::info!(available, total, "Sending low API key notification");
        let notification = low_key_notification(available, total, &exhausted);
        let result = sender.send(&notification).await;
        notice.finish_send(result.is_ok());

        match result {
            Ok(()) => {
                tracing::info!("Low API key notification sent");
                NoticeOutcome::Sent
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to send low API key notification");
                NoticeOutcome::Failed
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
