//! Key Pool Module
//!
//! Manages the Gemini API keys used for story generation.
//!
//! # Features
//! - Sequential selection: one active key until it fails with a quota or auth error
//! - Circular rotation to the next usable slot on exhaustion
//! - Full reset once every key is exhausted (quotas replenish over time)
//! - One-time low-key notice to the operator
//!
//! # Example
//! ```ignore
//! use key_pool::{KeyConfig, KeyPool};
//!
//! let pool = KeyPool::without_notice(vec![
//!     KeyConfig::new("GEMINI_API_KEY_1", "first"),
//!     KeyConfig::new("GEMINI_API_KEY_2", "second"),
//! ]);
//!
//! let key = pool.lease_active()?;
//! // ... provider rejects the key with a 429 ...
//! pool.mark_exhausted(key.slot());
//! assert_eq!(pool.current_slot(), 2);
//! ```

mod credential;
mod notice;
mod pool;

pub use credential::{redact, KeyConfig, LeasedKey};
pub use notice::{LowKeyNotice, LowKeyThreshold, NoticeOutcome};
pub use pool::{KeyPool, PoolError, PoolStatus};
